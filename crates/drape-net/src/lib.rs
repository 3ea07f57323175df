//! # drape-net
//!
//! Learned cloth dynamics: an encode-process-decode graph network over
//! triangle meshes.
//!
//! A [`TrajectoryFrame`](drape_core::TrajectoryFrame) is turned into a
//! mesh graph, encoded into a latent space, refined by stacked
//! message-passing blocks, re-mixed by salience pooling, decoded into a
//! per-node acceleration and integrated into next positions.
//!
//! ## Key Components
//!
//! - [`graph_builder::build_graph`]: frame → raw [`MultiGraph`](drape_core::MultiGraph)
//! - [`segment::segment_reduce`]: single-pass scatter reduction
//! - [`encoder::FeatureEncoder`], [`decoder::FeatureDecoder`]
//! - [`block::InteractionBlock`], [`block::Processor`]: message passing
//! - [`pooling::SaliencePooling`]: salience-seeded global gate
//! - [`integrator::integrate`]: `2·x − x_prev + a`
//! - [`model::ClothModel`]: the whole pipeline
//! - [`rollout::rollout`]: autoregressive multi-step prediction
//! - [`checkpoint`]: binary parameter files
//!
//! ## Architecture Rules
//!
//! - Every learned sub-network is a [`mlp::Network`]; widths are fixed at
//!   construction and checked on each call.
//! - Parameters are read-only during a forward pass. Per-call state lives
//!   in an explicit [`context::ExecutionContext`].
//! - Candle code is confined to [`gpu`] behind the `gpu` feature.
//!
//! ## GPU Support
//!
//! ```bash
//! cargo test -p drape-net --features gpu
//! ```

pub use drape_core;

// Internal shared primitives
mod nn;

pub mod block;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod decoder;
pub mod encoder;
pub mod graph_builder;
pub mod integrator;
pub mod mlp;
pub mod model;
pub mod normalizer;
pub mod params;
pub mod pooling;
pub mod rollout;
pub mod segment;

#[cfg(feature = "gpu")]
pub mod gpu;

#[cfg(test)]
mod test_support;

pub use config::ModelConfig;
pub use context::{ExecutionContext, NumericCheck};
pub use model::{ClothModel, EncodeProcessDecode, Mode, ModelOutput};
pub use segment::Aggregator;
