//! One time step of a cloth trajectory.
//!
//! A frame carries two consecutive world-space position arrays (so a
//! velocity can be formed), the rest-state mesh coordinates, per-node
//! types and the triangle list. Frames are produced by an external loader
//! and are read-only inside the model.

use serde::{Deserialize, Serialize};

use crate::error::{DrapeError, DrapeResult};
use crate::matrix::Matrix;
use crate::node_type::NodeType;
use crate::POSITION_DIM;

/// Raw mesh state for a single step.
///
/// # Example
///
/// ```
/// use drape_core::{Matrix, NodeType, TrajectoryFrame};
///
/// let frame = TrajectoryFrame {
///     world_pos: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
///     prev_world_pos: vec![[0.0, 0.0, 0.0]; 3],
///     mesh_pos: Matrix::from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap(),
///     node_type: vec![NodeType::Normal; 3],
///     cells: vec![[0, 1, 2]],
/// };
/// assert!(frame.validate().is_ok());
/// assert_eq!(frame.num_nodes(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryFrame {
    /// Current world-space position per node.
    pub world_pos: Vec<[f32; POSITION_DIM]>,

    /// World-space position per node one step earlier.
    #[serde(alias = "prev|world_pos")]
    pub prev_world_pos: Vec<[f32; POSITION_DIM]>,

    /// Rest-state (material space) coordinates, 2 or 3 columns.
    pub mesh_pos: Matrix,

    /// Role of every node.
    pub node_type: Vec<NodeType>,

    /// Triangles as node index triples.
    pub cells: Vec<[usize; 3]>,
}

impl TrajectoryFrame {
    /// Number of mesh nodes.
    pub fn num_nodes(&self) -> usize {
        self.world_pos.len()
    }

    /// Width of the rest-state coordinates (2 or 3 for a valid frame).
    pub fn mesh_dim(&self) -> usize {
        self.mesh_pos.cols()
    }

    /// Checks the structural contract of the frame.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if per-node arrays disagree in
    /// length, `mesh_pos` is not 2 or 3 wide, or a cell references a node
    /// outside `0..num_nodes()`.
    pub fn validate(&self) -> DrapeResult<()> {
        let n = self.num_nodes();
        let lengths = [
            ("prev_world_pos", self.prev_world_pos.len()),
            ("mesh_pos", self.mesh_pos.rows()),
            ("node_type", self.node_type.len()),
        ];
        for (field, len) in lengths {
            if len != n {
                return Err(DrapeError::shape(format!(
                    "{field} has {len} entries, world_pos has {n}"
                )));
            }
        }
        if n > 0 && !(2..=3).contains(&self.mesh_dim()) {
            return Err(DrapeError::shape(format!(
                "mesh_pos must be 2 or 3 wide, got {}",
                self.mesh_dim()
            )));
        }
        for (c, cell) in self.cells.iter().enumerate() {
            if let Some(&bad) = cell.iter().find(|&&i| i >= n) {
                return Err(DrapeError::shape(format!(
                    "cell {c} references node {bad} but the mesh has {n} nodes"
                )));
            }
        }
        Ok(())
    }

    /// Per-node velocity `world_pos - prev_world_pos`.
    pub fn velocity(&self) -> Vec<[f32; POSITION_DIM]> {
        self.world_pos
            .iter()
            .zip(&self.prev_world_pos)
            .map(|(cur, prev)| std::array::from_fn(|d| cur[d] - prev[d]))
            .collect()
    }

    /// Builds the frame for the following step.
    ///
    /// The current positions become the previous ones and `next` becomes
    /// current. Mesh coordinates, node types and cells carry over.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if `next` has the wrong length.
    ///
    /// # Example
    ///
    /// ```
    /// use drape_core::{Matrix, NodeType, TrajectoryFrame};
    ///
    /// let frame = TrajectoryFrame {
    ///     world_pos: vec![[1.0, 0.0, 0.0]],
    ///     prev_world_pos: vec![[0.0, 0.0, 0.0]],
    ///     mesh_pos: Matrix::from_rows(&[[0.0, 0.0]]).unwrap(),
    ///     node_type: vec![NodeType::Normal],
    ///     cells: vec![],
    /// };
    /// let next = frame.advance(vec![[2.0, 0.0, 0.0]]).unwrap();
    /// assert_eq!(next.prev_world_pos, vec![[1.0, 0.0, 0.0]]);
    /// assert_eq!(next.world_pos, vec![[2.0, 0.0, 0.0]]);
    /// ```
    pub fn advance(&self, next: Vec<[f32; POSITION_DIM]>) -> DrapeResult<Self> {
        if next.len() != self.num_nodes() {
            return Err(DrapeError::shape(format!(
                "next positions cover {} nodes, frame has {}",
                next.len(),
                self.num_nodes()
            )));
        }
        Ok(Self {
            world_pos: next,
            prev_world_pos: self.world_pos.clone(),
            mesh_pos: self.mesh_pos.clone(),
            node_type: self.node_type.clone(),
            cells: self.cells.clone(),
        })
    }
}
