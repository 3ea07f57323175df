//! Segment reduction on device tensors.
//!
//! Sum and mean scatter with `index_add`. Candle has no scatter-max, so
//! max and min round-trip through the host reducer.

use candle_core::{DType, Tensor};

use drape_core::{DrapeError, DrapeResult};

use super::{backend_err, matrix_to_tensor, tensor_to_matrix};
use crate::segment::{self, Aggregator};

/// Device counterpart of [`crate::segment::segment_reduce`].
///
/// `data` is `[E, D]` f32, `segment_ids` is `[E]` u32. The result is
/// `[num_segments, D]` on the same device, with zero rows for empty
/// segments.
///
/// # Errors
///
/// Returns [`DrapeError::ShapeMismatch`] for mismatched lengths or
/// out-of-range ids, and [`DrapeError::Backend`] if a tensor operation
/// fails.
pub fn segment_reduce(
    data: &Tensor,
    segment_ids: &Tensor,
    num_segments: usize,
    aggregator: Aggregator,
) -> DrapeResult<Tensor> {
    let map_err = backend_err("gpu segment_reduce");
    let (rows, cols) = data.dims2().map_err(|e| DrapeError::shape(e.to_string()))?;
    let ids: Vec<u32> = segment_ids.to_vec1().map_err(&map_err)?;
    if ids.len() != rows {
        return Err(DrapeError::shape(format!(
            "segment reduce: {} ids for {rows} rows",
            ids.len()
        )));
    }
    if let Some(&bad) = ids.iter().find(|&&s| s as usize >= num_segments) {
        return Err(DrapeError::shape(format!(
            "segment id {bad} out of range for {num_segments} segments"
        )));
    }

    let device = data.device();
    let zeros = Tensor::zeros((num_segments, cols), DType::F32, device).map_err(&map_err)?;
    if rows == 0 {
        return Ok(zeros);
    }
    match aggregator {
        Aggregator::Sum => zeros.index_add(segment_ids, data, 0).map_err(&map_err),
        Aggregator::Mean => {
            let sums = zeros.index_add(segment_ids, data, 0).map_err(&map_err)?;
            let ones = Tensor::ones(rows, DType::F32, device).map_err(&map_err)?;
            let counts = Tensor::zeros(num_segments, DType::F32, device)
                .and_then(|c| c.index_add(segment_ids, &ones, 0))
                .and_then(|c| c.clamp(1f32, f32::MAX))
                .and_then(|c| c.unsqueeze(1))
                .map_err(&map_err)?;
            sums.broadcast_div(&counts).map_err(&map_err)
        }
        Aggregator::Max | Aggregator::Min => {
            let host = tensor_to_matrix(data)?;
            let ids: Vec<usize> = ids.into_iter().map(|s| s as usize).collect();
            let reduced = segment::segment_reduce(&host, &ids, num_segments, aggregator)?;
            matrix_to_tensor(&reduced, device)
        }
    }
}
