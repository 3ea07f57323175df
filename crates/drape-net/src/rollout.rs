//! Autoregressive rollout: feed each prediction back in as the next
//! frame's current state.

use serde::Serialize;
use tracing::{debug, info};

use drape_core::{DrapeResult, TrajectoryFrame, POSITION_DIM};

use crate::context::ExecutionContext;
use crate::model::ClothModel;

/// Predicted world positions, one entry per step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rollout {
    pub positions: Vec<Vec<[f32; POSITION_DIM]>>,
}

impl Rollout {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions after the final step.
    pub fn last(&self) -> Option<&[[f32; POSITION_DIM]]> {
        self.positions.last().map(Vec::as_slice)
    }
}

/// Runs `steps` inference passes starting from `initial`.
///
/// Only [`NodeType::Normal`](drape_core::NodeType::Normal) nodes move;
/// every other node keeps its current position.
///
/// # Errors
///
/// Propagates the first error of any forward pass.
pub fn rollout(
    model: &ClothModel,
    initial: &TrajectoryFrame,
    steps: usize,
    ctx: &mut ExecutionContext,
) -> DrapeResult<Rollout> {
    let mut frame = initial.clone();
    let mut positions = Vec::with_capacity(steps);
    for step in 0..steps {
        let mut next = model.predict_next(&frame, ctx)?;
        for ((pos, cur), ty) in next.iter_mut().zip(&frame.world_pos).zip(&frame.node_type) {
            if !ty.is_free() {
                *pos = *cur;
            }
        }
        debug!(step, "rollout step");
        frame = frame.advance(next.clone())?;
        positions.push(next);
    }
    info!(
        steps,
        nodes = initial.num_nodes(),
        issues = ctx.issues().len(),
        "rollout finished"
    );
    Ok(Rollout { positions })
}
