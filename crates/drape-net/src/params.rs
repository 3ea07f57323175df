//! Learned parameters of a CPU model, grouped by sub-network.

use drape_core::{DrapeError, DrapeResult};

use crate::config::ModelConfig;
use crate::graph_builder::EDGE_SET_COUNT;
use crate::mlp::{Mlp, MlpShape, Network};
use crate::nn::Rng;

/// Weights of one interaction block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockParams {
    pub edge_net: Mlp,
    pub node_net: Mlp,
}

/// Every sub-network of an encode-process-decode model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub node_encoder: Mlp,
    pub edge_encoder: Mlp,
    pub blocks: Vec<BlockParams>,
    pub expand: Mlp,
    pub reduce: Mlp,
    pub decoder: Mlp,
}

/// Expected shape of each sub-network for `config`.
pub(crate) struct Shapes {
    pub node_encoder: MlpShape,
    pub edge_encoder: MlpShape,
    pub edge_net: MlpShape,
    pub node_net: MlpShape,
    pub expand: MlpShape,
    pub reduce: MlpShape,
    pub decoder: MlpShape,
}

impl Shapes {
    pub(crate) fn for_config(config: &ModelConfig) -> Self {
        let l = config.latent_width;
        let shape = |input_width, output_width, layer_norm| MlpShape {
            input_width,
            hidden_width: l,
            num_layers: config.num_layers,
            output_width,
            layer_norm,
        };
        Self {
            node_encoder: shape(config.node_input_width(), l, true),
            edge_encoder: shape(config.edge_input_width(), l, true),
            edge_net: shape(3 * l, l, true),
            node_net: shape((1 + EDGE_SET_COUNT) * l, l, true),
            expand: shape(drape_core::POSITION_DIM, l, config.normalize_gate),
            reduce: shape(l, l, true),
            decoder: shape(l, config.output_width, false),
        }
    }
}

fn expect_shape(name: &str, mlp: &Mlp, shape: &MlpShape) -> DrapeResult<()> {
    let ok = mlp.input_width() == shape.input_width
        && mlp.output_width() == shape.output_width
        && mlp.num_layers() == shape.num_layers
        && mlp.has_layer_norm() == shape.layer_norm;
    if !ok {
        return Err(DrapeError::config(format!(
            "{name} is {mlp:?}, configuration needs {} layers {}→{}{}",
            shape.num_layers,
            shape.input_width,
            shape.output_width,
            if shape.layer_norm { " with norm" } else { "" }
        )));
    }
    Ok(())
}

impl ModelParams {
    /// Draws all weights from one seeded generator, in checkpoint order.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] if `config` is invalid.
    pub fn new_random(config: &ModelConfig, seed: u64) -> DrapeResult<Self> {
        config.validate()?;
        let shapes = Shapes::for_config(config);
        let mut rng = Rng::new(seed);
        let node_encoder = Mlp::with_rng(&mut rng, shapes.node_encoder)?;
        let edge_encoder = Mlp::with_rng(&mut rng, shapes.edge_encoder)?;
        let blocks = (0..config.message_passing_steps)
            .map(|_| {
                Ok(BlockParams {
                    edge_net: Mlp::with_rng(&mut rng, shapes.edge_net)?,
                    node_net: Mlp::with_rng(&mut rng, shapes.node_net)?,
                })
            })
            .collect::<DrapeResult<Vec<_>>>()?;
        Ok(Self {
            node_encoder,
            edge_encoder,
            blocks,
            expand: Mlp::with_rng(&mut rng, shapes.expand)?,
            reduce: Mlp::with_rng(&mut rng, shapes.reduce)?,
            decoder: Mlp::with_rng(&mut rng, shapes.decoder)?,
        })
    }

    /// Checks every sub-network against the shapes `config` implies.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] naming the first
    /// sub-network that does not fit.
    pub fn validate(&self, config: &ModelConfig) -> DrapeResult<()> {
        config.validate()?;
        let shapes = Shapes::for_config(config);
        if self.blocks.len() != config.message_passing_steps {
            return Err(DrapeError::config(format!(
                "{} blocks of parameters for {} message-passing steps",
                self.blocks.len(),
                config.message_passing_steps
            )));
        }
        expect_shape("node encoder", &self.node_encoder, &shapes.node_encoder)?;
        expect_shape("edge encoder", &self.edge_encoder, &shapes.edge_encoder)?;
        for (i, block) in self.blocks.iter().enumerate() {
            expect_shape(&format!("block {i} edge net"), &block.edge_net, &shapes.edge_net)?;
            expect_shape(&format!("block {i} node net"), &block.node_net, &shapes.node_net)?;
        }
        expect_shape("gate expansion", &self.expand, &shapes.expand)?;
        expect_shape("gate reduction", &self.reduce, &shapes.reduce)?;
        expect_shape("decoder", &self.decoder, &shapes.decoder)
    }

    /// Sub-networks in checkpoint order.
    pub(crate) fn mlps(&self) -> Vec<&Mlp> {
        let mut all = vec![&self.node_encoder, &self.edge_encoder];
        for block in &self.blocks {
            all.push(&block.edge_net);
            all.push(&block.node_net);
        }
        all.extend([&self.expand, &self.reduce, &self.decoder]);
        all
    }

    /// Total number of learned scalars.
    pub fn param_count(&self) -> usize {
        self.mlps().iter().map(|m| m.param_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> ModelConfig {
        ModelConfig {
            latent_width: 8,
            message_passing_steps: 2,
            num_layers: 2,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn random_params_fit_their_config() {
        let p = ModelParams::new_random(&small(), 5).unwrap();
        assert!(p.validate(&small()).is_ok());
        assert_eq!(p.blocks.len(), 2);
        assert_eq!(p.mlps().len(), 2 + 2 * 2 + 3);
        assert_eq!(p.blocks[0].edge_net.input_width(), 24);
        assert_eq!(p.blocks[0].node_net.input_width(), 16);
        assert!(!p.decoder.has_layer_norm());
    }

    #[test]
    fn blocks_do_not_share_weights() {
        let p = ModelParams::new_random(&small(), 5).unwrap();
        assert_ne!(p.blocks[0], p.blocks[1]);
    }

    #[test]
    fn seed_is_deterministic() {
        assert_eq!(
            ModelParams::new_random(&small(), 1).unwrap(),
            ModelParams::new_random(&small(), 1).unwrap()
        );
    }

    #[test]
    fn mismatched_config_rejected() {
        let p = ModelParams::new_random(&small(), 5).unwrap();
        let wider = ModelConfig {
            latent_width: 16,
            ..small()
        };
        assert!(matches!(
            p.validate(&wider),
            Err(DrapeError::InvalidConfiguration { .. })
        ));
        let longer = ModelConfig {
            message_passing_steps: 3,
            ..small()
        };
        assert!(p.validate(&longer).is_err());
        let no_gate_norm = ModelConfig {
            normalize_gate: false,
            ..small()
        };
        assert!(p.validate(&no_gate_norm).is_err());
    }

    #[test]
    fn param_count_sums_sub_networks() {
        let config = ModelConfig {
            latent_width: 4,
            message_passing_steps: 1,
            num_layers: 1,
            ..ModelConfig::default()
        };
        let p = ModelParams::new_random(&config, 0).unwrap();
        // single-layer nets: in·out + out, plus 2·out for norms
        let expected = (12 * 4 + 4 + 8)
            + (7 * 4 + 4 + 8)
            + (12 * 4 + 4 + 8)
            + (8 * 4 + 4 + 8)
            + (3 * 4 + 4 + 8)
            + (4 * 4 + 4 + 8)
            + (4 * 3 + 3);
        assert_eq!(p.param_count(), expected);
    }
}
