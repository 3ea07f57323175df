//! # drape-core
//!
//! Shared data model for the drape cloth simulator.
//!
//! A [`TrajectoryFrame`] is one time step of a cloth trajectory: node
//! positions for the current and previous step, rest-state mesh
//! coordinates, per-node [`NodeType`] tags and the triangle list.
//! The learned model turns a frame into a [`MultiGraph`] (node features
//! plus one or more [`EdgeSet`]s), all stored as dense row-major
//! [`Matrix`] values.
//!
//! ## Key Types
//!
//! - [`Matrix`]: dense `f32` matrix, one row per node or edge
//! - [`EdgeSet`], [`MultiGraph`]: immutable graph records
//! - [`NodeType`]: node role tag (normal, handle, obstacle, ...)
//! - [`TrajectoryFrame`]: raw per-step mesh state
//! - [`DrapeError`]: error type shared by every drape crate
//!
//! ## Architecture Rules
//!
//! - No numeric model code here; only data and validation.
//! - Every structural violation surfaces as [`DrapeError::ShapeMismatch`].

pub mod error;
pub mod frame;
pub mod graph;
pub mod matrix;
pub mod node_type;

pub use error::{DrapeError, DrapeResult};
pub use frame::TrajectoryFrame;
pub use graph::{EdgeSet, MultiGraph};
pub use matrix::Matrix;
pub use node_type::NodeType;

/// Spatial dimension of world positions, velocities and accelerations.
pub const POSITION_DIM: usize = 3;

/// Name of the edge set derived from the triangle mesh.
pub const MESH_EDGES: &str = "mesh_edges";
