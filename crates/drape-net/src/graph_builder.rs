//! Turns a raw [`TrajectoryFrame`] into the model's input graph.
//!
//! Node features are `velocity (3) ‖ one_hot(node_type) (9)`. Edges come
//! from the triangle list, one directed edge per triangle side in each
//! direction. Sides shared by two triangles appear twice per direction;
//! they are kept as is.
//!
//! Edge features, with `rel_x = x[sender] - x[receiver]`:
//!
//! | columns          | content            |
//! |------------------|--------------------|
//! | 0..3             | `rel_world_pos`    |
//! | 3                | `‖rel_world_pos‖`  |
//! | 4..4+m           | `rel_mesh_pos`     |
//! | 4+m              | `‖rel_mesh_pos‖`   |

use tracing::debug;

use drape_core::{
    DrapeError, DrapeResult, EdgeSet, Matrix, MultiGraph, NodeType, TrajectoryFrame, MESH_EDGES,
    POSITION_DIM,
};

/// Raw node feature width.
pub const NODE_FEATURE_WIDTH: usize = POSITION_DIM + NodeType::SIZE;

/// Number of edge sets produced by [`build_graph`].
pub const EDGE_SET_COUNT: usize = 1;

/// Raw edge feature width for a mesh with `mesh_dim` rest-state columns.
pub const fn edge_feature_width(mesh_dim: usize) -> usize {
    POSITION_DIM + 1 + mesh_dim + 1
}

/// Expands triangles into directed `(senders, receivers)` index arrays.
///
/// Each triangle `(a, b, c)` yields `a→b`, `b→c`, `c→a`. After all
/// triangles, the reversed copy of every edge is appended, so edge `i`
/// and edge `i + 3·C` connect the same pair in opposite directions.
///
/// # Errors
///
/// Returns [`DrapeError::ShapeMismatch`] if a cell references a node
/// outside `0..num_nodes`.
///
/// # Example
///
/// ```
/// use drape_net::graph_builder::triangles_to_edges;
///
/// let (s, r) = triangles_to_edges(&[[0, 1, 2]], 3).unwrap();
/// assert_eq!(s, vec![0, 1, 2, 1, 2, 0]);
/// assert_eq!(r, vec![1, 2, 0, 0, 1, 2]);
/// ```
pub fn triangles_to_edges(
    cells: &[[usize; 3]],
    num_nodes: usize,
) -> DrapeResult<(Vec<usize>, Vec<usize>)> {
    let one_way = cells.len() * 3;
    let mut senders = Vec::with_capacity(2 * one_way);
    let mut receivers = Vec::with_capacity(2 * one_way);
    for (c, &[a, b, d]) in cells.iter().enumerate() {
        if let Some(bad) = [a, b, d].into_iter().find(|&i| i >= num_nodes) {
            return Err(DrapeError::shape(format!(
                "cell {c} references node {bad} but the mesh has {num_nodes} nodes"
            )));
        }
        senders.extend([a, b, d]);
        receivers.extend([b, d, a]);
    }
    let (fwd_s, fwd_r) = (senders.clone(), receivers.clone());
    senders.extend(fwd_r);
    receivers.extend(fwd_s);
    Ok((senders, receivers))
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Builds the raw input graph for one frame.
///
/// Deterministic: the same frame always yields bit-identical features.
///
/// # Errors
///
/// Returns [`DrapeError::ShapeMismatch`] if the frame fails
/// [`TrajectoryFrame::validate`].
pub fn build_graph(frame: &TrajectoryFrame) -> DrapeResult<MultiGraph> {
    frame.validate()?;
    let n = frame.num_nodes();

    let mut nodes = Matrix::zeros(n, NODE_FEATURE_WIDTH);
    for (i, (vel, ty)) in frame.velocity().iter().zip(&frame.node_type).enumerate() {
        let row = nodes.row_mut(i);
        row[..POSITION_DIM].copy_from_slice(vel);
        row[POSITION_DIM..].copy_from_slice(&ty.one_hot());
    }

    let (senders, receivers) = triangles_to_edges(&frame.cells, n)?;
    let mesh_dim = frame.mesh_dim();
    let mut edges = Matrix::zeros(senders.len(), edge_feature_width(mesh_dim));
    for (e, (&s, &r)) in senders.iter().zip(&receivers).enumerate() {
        let row = edges.row_mut(e);
        let (world, rest) = row.split_at_mut(POSITION_DIM);
        for (d, w) in world.iter_mut().enumerate() {
            *w = frame.world_pos[s][d] - frame.world_pos[r][d];
        }
        rest[0] = norm(world);
        let mesh = &mut rest[1..=mesh_dim];
        for (d, m) in mesh.iter_mut().enumerate() {
            *m = frame.mesh_pos.get(s, d) - frame.mesh_pos.get(r, d);
        }
        rest[1 + mesh_dim] = norm(&rest[1..=mesh_dim]);
    }

    debug!(
        nodes = n,
        edges = senders.len(),
        cells = frame.cells.len(),
        "built mesh graph"
    );
    let mesh_edges = EdgeSet::new(MESH_EDGES, edges, senders, receivers)?;
    MultiGraph::new(nodes, vec![mesh_edges])
}
