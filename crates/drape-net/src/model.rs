//! Model assembly: the learned encode-process-decode core and the cloth
//! wrapper that builds graphs and integrates positions.
//!
//! ## Pipeline
//!
//! ```text
//! frame ─► build_graph ─► raw graph ─┬─► (normalizers) ─► encoder ─► processor ─┐
//!                                    │                                          │
//!                                    └──────────── salience ──► pooling ◄───────┘
//!                                                                  │
//!                                            decoder ─► (integrator) ─► output
//! ```

use tracing::debug;

use drape_core::{
    DrapeError, DrapeResult, Matrix, MultiGraph, TrajectoryFrame, POSITION_DIM,
};

use crate::block::{InteractionBlock, Processor};
use crate::config::ModelConfig;
use crate::context::ExecutionContext;
use crate::decoder::FeatureDecoder;
use crate::encoder::FeatureEncoder;
use crate::graph_builder::{self, EDGE_SET_COUNT};
use crate::integrator::integrate;
use crate::normalizer::NormalizerSet;
use crate::params::ModelParams;
use crate::pooling::SaliencePooling;
use crate::segment::SegmentReducer;

/// Whether the integrator runs after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Return the raw decoder output.
    Training,
    /// Integrate the decoder output into next positions.
    Inference,
}

/// Result of [`ClothModel::forward`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Per-node decoder output, one row per node.
    Raw(Matrix),
    /// Integrated world positions for the next step.
    NextPosition(Vec<[f32; POSITION_DIM]>),
}

/// Encoder, processor, pooling and decoder wired together.
///
/// # Example
///
/// ```
/// use drape_net::config::ModelConfig;
/// use drape_net::model::EncodeProcessDecode;
///
/// let config = ModelConfig { latent_width: 8, message_passing_steps: 2, ..ModelConfig::default() };
/// let model = EncodeProcessDecode::new_random(config, 42).unwrap();
/// assert_eq!(model.processor().steps(), 2);
/// ```
#[derive(Debug)]
pub struct EncodeProcessDecode {
    config: ModelConfig,
    encoder: FeatureEncoder,
    processor: Processor,
    pooling: SaliencePooling,
    decoder: FeatureDecoder,
}

impl EncodeProcessDecode {
    /// Random CPU model, see [`ModelParams::new_random`].
    pub fn new_random(config: ModelConfig, seed: u64) -> DrapeResult<Self> {
        let params = ModelParams::new_random(&config, seed)?;
        Self::from_params(config, params)
    }

    /// CPU model from existing parameters.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] if `params` does not
    /// fit `config`.
    pub fn from_params(config: ModelConfig, params: ModelParams) -> DrapeResult<Self> {
        params.validate(&config)?;
        let reducer = SegmentReducer::new(config.aggregator);
        let encoder = FeatureEncoder::new(
            Box::new(params.node_encoder),
            Box::new(params.edge_encoder),
        )?;
        let blocks = params
            .blocks
            .into_iter()
            .map(|b| {
                InteractionBlock::new(
                    Box::new(b.edge_net),
                    Box::new(b.node_net),
                    reducer,
                    EDGE_SET_COUNT,
                )
            })
            .collect::<DrapeResult<Vec<_>>>()?;
        let processor = Processor::new(blocks)?;
        let pooling = SaliencePooling::new(
            Box::new(params.expand),
            Box::new(params.reduce),
            config.salience_percent,
        )?;
        let decoder = FeatureDecoder::new(Box::new(params.decoder));
        Self::from_parts(config, encoder, processor, pooling, decoder)
    }

    /// Assembles a model from pre-built stages, which may use any
    /// [`Network`](crate::mlp::Network) implementation.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] if a stage's widths or
    /// the processor depth disagree with `config`.
    pub fn from_parts(
        config: ModelConfig,
        encoder: FeatureEncoder,
        processor: Processor,
        pooling: SaliencePooling,
        decoder: FeatureDecoder,
    ) -> DrapeResult<Self> {
        config.validate()?;
        let l = config.latent_width;
        let checks = [
            ("encoder node input", encoder.node_input_width(), config.node_input_width()),
            ("encoder edge input", encoder.edge_input_width(), config.edge_input_width()),
            ("encoder latent", encoder.latent_width(), l),
            ("processor latent", processor.latent_width(), l),
            ("processor steps", processor.steps(), config.message_passing_steps),
            ("pooling latent", pooling.latent_width(), l),
            ("decoder latent", decoder.latent_width(), l),
            ("decoder output", decoder.output_width(), config.output_width),
        ];
        for (what, got, want) in checks {
            if got != want {
                return Err(DrapeError::config(format!(
                    "{what} is {got}, configuration needs {want}"
                )));
            }
        }
        if let Some(block) = processor
            .blocks()
            .iter()
            .find(|b| b.reducer().aggregator() != config.aggregator)
        {
            return Err(DrapeError::config(format!(
                "processor reduces with {}, configuration says {}",
                block.reducer().aggregator(),
                config.aggregator
            )));
        }
        if pooling.percent() != config.salience_percent {
            return Err(DrapeError::config(format!(
                "pooling seeds {}% of nodes, configuration says {}%",
                pooling.percent(),
                config.salience_percent
            )));
        }
        Ok(Self {
            config,
            encoder,
            processor,
            pooling,
            decoder,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn pooling(&self) -> &SaliencePooling {
        &self.pooling
    }

    pub fn decoder(&self) -> &FeatureDecoder {
        &self.decoder
    }

    /// Runs the learned pipeline on a raw graph.
    pub fn forward(&self, raw: &MultiGraph, ctx: &mut ExecutionContext) -> DrapeResult<Matrix> {
        self.forward_split(raw, raw, ctx)
    }

    /// Runs the pipeline on `input` while taking salience from `raw`.
    ///
    /// `input` is usually the normalized version of `raw`; both must
    /// describe the same nodes and edges.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] for structural problems and
    /// [`DrapeError::NumericInstability`] if the context's policy is
    /// [`NumericCheck::Fail`](crate::context::NumericCheck::Fail) and a
    /// stage produced NaN or Inf.
    pub fn forward_split(
        &self,
        input: &MultiGraph,
        raw: &MultiGraph,
        ctx: &mut ExecutionContext,
    ) -> DrapeResult<Matrix> {
        if input.edge_sets().len() != EDGE_SET_COUNT {
            return Err(DrapeError::shape(format!(
                "model expects {EDGE_SET_COUNT} edge set, graph has {}",
                input.edge_sets().len()
            )));
        }
        let latent = self.encoder.forward(input)?;
        ctx.inspect("encoder", latent.node_features())?;

        let latent = self.processor.forward(latent, ctx)?;

        let latent = self.pooling.forward(latent, raw)?;
        ctx.inspect("pooling", latent.node_features())?;

        let out = self.decoder.forward(&latent)?;
        ctx.inspect("decoder", &out)?;
        debug!(
            nodes = out.rows(),
            steps = self.processor.steps(),
            "forward pass complete"
        );
        Ok(out)
    }
}

/// A learned cloth simulator: graph construction, the learned model,
/// optional normalization and position integration.
///
/// # Example
///
/// ```
/// use drape_core::{Matrix, NodeType, TrajectoryFrame};
/// use drape_net::config::ModelConfig;
/// use drape_net::context::ExecutionContext;
/// use drape_net::model::{ClothModel, EncodeProcessDecode, Mode, ModelOutput};
///
/// let config = ModelConfig { latent_width: 8, message_passing_steps: 1, ..ModelConfig::default() };
/// let model = ClothModel::new(EncodeProcessDecode::new_random(config, 7).unwrap());
/// let frame = TrajectoryFrame {
///     world_pos: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
///     prev_world_pos: vec![[0.0, 0.0, 0.0]; 3],
///     mesh_pos: Matrix::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap(),
///     node_type: vec![NodeType::Normal; 3],
///     cells: vec![[0, 1, 2]],
/// };
/// let mut ctx = ExecutionContext::default();
/// match model.forward(&frame, Mode::Inference, &mut ctx).unwrap() {
///     ModelOutput::NextPosition(next) => assert_eq!(next.len(), 3),
///     ModelOutput::Raw(_) => unreachable!(),
/// }
/// ```
#[derive(Debug)]
pub struct ClothModel {
    model: EncodeProcessDecode,
    normalizers: Option<NormalizerSet>,
}

impl ClothModel {
    /// Simulator without normalization statistics.
    pub fn new(model: EncodeProcessDecode) -> Self {
        Self {
            model,
            normalizers: None,
        }
    }

    /// Attaches read-only normalization statistics.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if a normalizer's width does
    /// not match the feature it applies to.
    pub fn with_normalizers(mut self, normalizers: NormalizerSet) -> DrapeResult<Self> {
        let c = self.model.config();
        normalizers.check_widths(c.node_input_width(), c.edge_input_width(), c.output_width)?;
        self.normalizers = Some(normalizers);
        Ok(self)
    }

    pub fn model(&self) -> &EncodeProcessDecode {
        &self.model
    }

    pub fn config(&self) -> &ModelConfig {
        self.model.config()
    }

    pub fn normalizers(&self) -> Option<&NormalizerSet> {
        self.normalizers.as_ref()
    }

    /// Builds the raw input graph for `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if the frame is malformed or
    /// its mesh coordinates are not as wide as the model expects.
    pub fn build_graph(&self, frame: &TrajectoryFrame) -> DrapeResult<MultiGraph> {
        let want = self.config().mesh_pos_width;
        if frame.num_nodes() > 0 && frame.mesh_dim() != want {
            return Err(DrapeError::shape(format!(
                "frame has {}-wide mesh positions, model expects {want}",
                frame.mesh_dim()
            )));
        }
        graph_builder::build_graph(frame)
    }

    /// One forward pass.
    ///
    /// In [`Mode::Training`] the decoder output is returned untouched. In
    /// [`Mode::Inference`] it is de-normalized (if an output normalizer is
    /// attached) and integrated into next positions.
    pub fn forward(
        &self,
        frame: &TrajectoryFrame,
        mode: Mode,
        ctx: &mut ExecutionContext,
    ) -> DrapeResult<ModelOutput> {
        let raw = self.build_graph(frame)?;
        let out = match &self.normalizers {
            Some(norms) => {
                let input = norms.normalize_graph(&raw)?;
                self.model.forward_split(&input, &raw, ctx)?
            }
            None => self.model.forward(&raw, ctx)?,
        };
        match mode {
            Mode::Training => Ok(ModelOutput::Raw(out)),
            Mode::Inference => {
                let acceleration = match &self.normalizers {
                    Some(norms) => norms.denormalize_output(out)?,
                    None => out,
                };
                let next = integrate(&frame.world_pos, &frame.prev_world_pos, &acceleration)?;
                Ok(ModelOutput::NextPosition(next))
            }
        }
    }

    /// Inference forward pass returning the next positions directly.
    pub fn predict_next(
        &self,
        frame: &TrajectoryFrame,
        ctx: &mut ExecutionContext,
    ) -> DrapeResult<Vec<[f32; POSITION_DIM]>> {
        match self.forward(frame, Mode::Inference, ctx)? {
            ModelOutput::NextPosition(next) => Ok(next),
            ModelOutput::Raw(_) => Err(DrapeError::shape(
                "inference pass returned raw output instead of positions",
            )),
        }
    }
}
