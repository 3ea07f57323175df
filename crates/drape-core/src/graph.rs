//! Immutable graph records passed between model stages.
//!
//! A [`MultiGraph`] owns a node feature matrix and any number of named
//! [`EdgeSet`]s. Stages never mutate a graph in place: they build a new one
//! with one field replaced (`with_features`, `with_node_features`, ...),
//! which re-checks that entity counts did not change. Sender and receiver
//! index arrays are reference counted and shared between the old and new
//! record.

use std::sync::Arc;

use crate::error::{DrapeError, DrapeResult};
use crate::matrix::Matrix;

/// A named set of directed edges with one feature row per edge.
///
/// # Example
///
/// ```
/// use drape_core::{EdgeSet, Matrix};
///
/// let features = Matrix::zeros(2, 4);
/// let edges = EdgeSet::new("mesh_edges", features, vec![0, 1], vec![1, 0]).unwrap();
/// assert_eq!(edges.len(), 2);
///
/// let latent = edges.with_features(Matrix::zeros(2, 8)).unwrap();
/// assert_eq!(latent.features().cols(), 8);
/// assert_eq!(latent.senders(), edges.senders());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSet {
    name: Arc<str>,
    features: Matrix,
    senders: Arc<[usize]>,
    receivers: Arc<[usize]>,
}

impl EdgeSet {
    /// Creates an edge set.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if `features`, `senders` and
    /// `receivers` disagree on the edge count.
    pub fn new(
        name: &str,
        features: Matrix,
        senders: Vec<usize>,
        receivers: Vec<usize>,
    ) -> DrapeResult<Self> {
        if senders.len() != receivers.len() || senders.len() != features.rows() {
            return Err(DrapeError::shape(format!(
                "edge set '{name}': {} senders, {} receivers, {} feature rows",
                senders.len(),
                receivers.len(),
                features.rows()
            )));
        }
        Ok(Self {
            name: Arc::from(name),
            features,
            senders: senders.into(),
            receivers: receivers.into(),
        })
    }

    /// Edge set name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-edge features.
    pub fn features(&self) -> &Matrix {
        &self.features
    }

    /// Sender node index per edge.
    pub fn senders(&self) -> &[usize] {
        &self.senders
    }

    /// Receiver node index per edge.
    pub fn receivers(&self) -> &[usize] {
        &self.receivers
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// `true` if the set has no edges.
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Returns a copy with the features replaced; topology is shared.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if the row count changes.
    pub fn with_features(&self, features: Matrix) -> DrapeResult<Self> {
        if features.rows() != self.len() {
            return Err(DrapeError::shape(format!(
                "edge set '{}': replacement has {} rows for {} edges",
                self.name,
                features.rows(),
                self.len()
            )));
        }
        Ok(Self {
            name: Arc::clone(&self.name),
            features,
            senders: Arc::clone(&self.senders),
            receivers: Arc::clone(&self.receivers),
        })
    }
}

/// Node features plus an ordered list of edge sets.
///
/// Every sender and receiver index is guaranteed to address a row of
/// `node_features`.
///
/// # Example
///
/// ```
/// use drape_core::{EdgeSet, Matrix, MultiGraph};
///
/// let nodes = Matrix::zeros(3, 2);
/// let edges = EdgeSet::new("mesh_edges", Matrix::zeros(1, 1), vec![0], vec![2]).unwrap();
/// let graph = MultiGraph::new(nodes, vec![edges]).unwrap();
/// assert_eq!(graph.num_nodes(), 3);
///
/// let bad = EdgeSet::new("mesh_edges", Matrix::zeros(1, 1), vec![0], vec![3]).unwrap();
/// assert!(MultiGraph::new(Matrix::zeros(3, 2), vec![bad]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MultiGraph {
    node_features: Matrix,
    edge_sets: Vec<EdgeSet>,
}

impl MultiGraph {
    /// Creates a graph, validating every edge index.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if an edge references a node
    /// outside `0..node_features.rows()`.
    pub fn new(node_features: Matrix, edge_sets: Vec<EdgeSet>) -> DrapeResult<Self> {
        let n = node_features.rows();
        for set in &edge_sets {
            let worst = set
                .senders()
                .iter()
                .chain(set.receivers())
                .copied()
                .max();
            if let Some(idx) = worst.filter(|&i| i >= n) {
                return Err(DrapeError::shape(format!(
                    "edge set '{}' references node {idx} but the graph has {n} nodes",
                    set.name()
                )));
            }
        }
        Ok(Self {
            node_features,
            edge_sets,
        })
    }

    /// Node feature matrix.
    pub fn node_features(&self) -> &Matrix {
        &self.node_features
    }

    /// Edge sets in construction order.
    pub fn edge_sets(&self) -> &[EdgeSet] {
        &self.edge_sets
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.node_features.rows()
    }

    /// Looks up an edge set by name.
    pub fn edge_set(&self, name: &str) -> Option<&EdgeSet> {
        self.edge_sets.iter().find(|s| s.name() == name)
    }

    /// Splits the graph into its parts.
    pub fn into_parts(self) -> (Matrix, Vec<EdgeSet>) {
        (self.node_features, self.edge_sets)
    }

    /// Replaces the node features, keeping edge sets.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if the node count changes.
    pub fn with_node_features(self, node_features: Matrix) -> DrapeResult<Self> {
        if node_features.rows() != self.num_nodes() {
            return Err(DrapeError::shape(format!(
                "node replacement has {} rows for {} nodes",
                node_features.rows(),
                self.num_nodes()
            )));
        }
        Ok(Self {
            node_features,
            edge_sets: self.edge_sets,
        })
    }

    /// Replaces the edge sets, keeping node features.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if the number of edge sets or
    /// any set's edge count or topology changes.
    pub fn with_edge_sets(self, edge_sets: Vec<EdgeSet>) -> DrapeResult<Self> {
        if edge_sets.len() != self.edge_sets.len() {
            return Err(DrapeError::shape(format!(
                "{} edge sets replace {}",
                edge_sets.len(),
                self.edge_sets.len()
            )));
        }
        for (new, old) in edge_sets.iter().zip(&self.edge_sets) {
            if new.senders() != old.senders() || new.receivers() != old.receivers() {
                return Err(DrapeError::shape(format!(
                    "edge set '{}' topology changed during replacement",
                    old.name()
                )));
            }
        }
        Ok(Self {
            node_features: self.node_features,
            edge_sets,
        })
    }
}
