//! Rectangular cloth sheets at rest, for trying a model without a dataset.

use clap::ValueEnum;

use drape_core::{DrapeResult, Matrix, NodeType, TrajectoryFrame};

/// Which nodes of the top edge are held in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Pin {
    None,
    #[default]
    Corners,
    TopRow,
}

/// A `width × height` node sheet hanging in the x/y plane, row 0 at the top.
///
/// Every quad is split into two triangles. Rest coordinates double as
/// mesh positions, and the previous frame equals the current one so the
/// sheet starts with zero velocity.
pub fn hanging_sheet(
    width: usize,
    height: usize,
    spacing: f32,
    pin: Pin,
) -> DrapeResult<TrajectoryFrame> {
    let n = width * height;
    let mut world_pos = Vec::with_capacity(n);
    let mut mesh = Vec::with_capacity(n);
    for row in 0..height {
        for col in 0..width {
            let x = col as f32 * spacing;
            let y = -(row as f32) * spacing;
            world_pos.push([x, y, 0.0]);
            mesh.push([x, y]);
        }
    }

    let mut cells = Vec::with_capacity(2 * width.saturating_sub(1) * height.saturating_sub(1));
    for row in 0..height.saturating_sub(1) {
        for col in 0..width.saturating_sub(1) {
            let i = row * width + col;
            cells.push([i, i + 1, i + width]);
            cells.push([i + 1, i + width + 1, i + width]);
        }
    }

    let mut node_type = vec![NodeType::Normal; n];
    if height > 0 && width > 0 {
        match pin {
            Pin::None => {}
            Pin::Corners => {
                node_type[0] = NodeType::Handle;
                node_type[width - 1] = NodeType::Handle;
            }
            Pin::TopRow => node_type[..width].fill(NodeType::Handle),
        }
    }

    let frame = TrajectoryFrame {
        prev_world_pos: world_pos.clone(),
        world_pos,
        mesh_pos: if n == 0 {
            Matrix::zeros(0, 2)
        } else {
            Matrix::from_rows(&mesh)?
        },
        node_type,
        cells,
    };
    frame.validate()?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_has_two_triangles_per_quad() {
        let frame = hanging_sheet(4, 3, 0.5, Pin::None).unwrap();
        assert_eq!(frame.num_nodes(), 12);
        assert_eq!(frame.cells.len(), 2 * 3 * 2);
        assert!(frame
            .cells
            .iter()
            .flatten()
            .all(|&i| i < frame.num_nodes()));
        assert_eq!(frame.mesh_dim(), 2);
    }

    #[test]
    fn sheet_starts_at_rest() {
        let frame = hanging_sheet(3, 3, 1.0, Pin::Corners).unwrap();
        assert!(frame.velocity().iter().flatten().all(|&v| v == 0.0));
        assert_eq!(frame.world_pos[4], [1.0, -1.0, 0.0]);
    }

    #[test]
    fn pin_modes_mark_top_edge() {
        let corners = hanging_sheet(3, 2, 1.0, Pin::Corners).unwrap();
        let handles: Vec<usize> = corners
            .node_type
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_free())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(handles, vec![0, 2]);

        let row = hanging_sheet(3, 2, 1.0, Pin::TopRow).unwrap();
        assert!(row.node_type[..3].iter().all(|t| *t == NodeType::Handle));
        assert!(row.node_type[3..].iter().all(|t| *t == NodeType::Normal));
    }

    #[test]
    fn single_row_has_no_cells() {
        let frame = hanging_sheet(5, 1, 1.0, Pin::TopRow).unwrap();
        assert!(frame.cells.is_empty());
        assert_eq!(frame.num_nodes(), 5);
    }
}
