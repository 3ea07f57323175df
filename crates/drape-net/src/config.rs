//! Structural model configuration.

use serde::{Deserialize, Serialize};

use drape_core::{DrapeError, DrapeResult, NodeType, POSITION_DIM};

use crate::segment::Aggregator;

/// Everything that fixes the shape of a model.
///
/// Missing JSON fields fall back to [`ModelConfig::default`].
///
/// # Example
///
/// ```
/// use drape_net::config::ModelConfig;
/// use drape_net::segment::Aggregator;
///
/// let config = ModelConfig::from_json(r#"{ "aggregator": "mean", "latent_width": 64 }"#).unwrap();
/// assert_eq!(config.aggregator, Aggregator::Mean);
/// assert_eq!(config.latent_width, 64);
/// assert_eq!(config.message_passing_steps, 15);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Reduction used by every processor step.
    pub aggregator: Aggregator,

    /// Number of interaction blocks (default: 15).
    pub message_passing_steps: usize,

    /// Latent width `L` for nodes and edges (default: 128).
    pub latent_width: usize,

    /// Linear transforms per sub-network (default: 3).
    pub num_layers: usize,

    /// Width of the decoded per-node quantity (default: 3).
    pub output_width: usize,

    /// Columns of `mesh_pos` the model expects (default: 2).
    pub mesh_pos_width: usize,

    /// Layer-normalize the expanded salience gate (default: true).
    pub normalize_gate: bool,

    /// Percentage of nodes that seed the salience gate (default: 1).
    pub salience_percent: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            aggregator: Aggregator::Sum,
            message_passing_steps: 15,
            latent_width: 128,
            num_layers: 3,
            output_width: POSITION_DIM,
            mesh_pos_width: 2,
            normalize_gate: true,
            salience_percent: 1,
        }
    }
}

impl ModelConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] for malformed JSON,
    /// an unknown aggregator name, or values rejected by
    /// [`ModelConfig::validate`].
    pub fn from_json(json: &str) -> DrapeResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| DrapeError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration describes a buildable model.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] if a count or width is
    /// zero, `mesh_pos_width` is not 2 or 3, or `salience_percent` is
    /// outside `1..=100`.
    pub fn validate(&self) -> DrapeResult<()> {
        let positive = [
            ("message_passing_steps", self.message_passing_steps),
            ("latent_width", self.latent_width),
            ("num_layers", self.num_layers),
            ("output_width", self.output_width),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(DrapeError::config(format!("{field} must be positive")));
            }
        }
        if !(2..=3).contains(&self.mesh_pos_width) {
            return Err(DrapeError::config(format!(
                "mesh_pos_width must be 2 or 3, got {}",
                self.mesh_pos_width
            )));
        }
        if !(1..=100).contains(&self.salience_percent) {
            return Err(DrapeError::config(format!(
                "salience_percent must be in 1..=100, got {}",
                self.salience_percent
            )));
        }
        Ok(())
    }

    /// Raw node feature width: velocity plus node type one-hot.
    pub fn node_input_width(&self) -> usize {
        POSITION_DIM + NodeType::SIZE
    }

    /// Raw edge feature width for the configured mesh dimension.
    pub fn edge_input_width(&self) -> usize {
        crate::graph_builder::edge_feature_width(self.mesh_pos_width)
    }
}
