//! Candle-backed implementations, compiled with the `gpu` feature.
//!
//! [`GpuMlp`] holds an [`Mlp`](crate::mlp::Mlp)'s weights as device
//! tensors and implements [`Network`](crate::mlp::Network), so a model can
//! be assembled from device-resident sub-networks with
//! [`EncodeProcessDecode::from_parts`](crate::model::EncodeProcessDecode::from_parts).
//! The device is always passed in explicitly.

pub mod mlp;
pub mod segment;

pub use mlp::GpuMlp;
pub use segment::segment_reduce;

use candle_core::{Device, Tensor};

use drape_core::{DrapeError, DrapeResult, Matrix};

pub(crate) fn backend_err(context: &'static str) -> impl Fn(candle_core::Error) -> DrapeError {
    move |e| DrapeError::Backend {
        message: format!("{context}: {e}"),
    }
}

/// Uploads a matrix as a `[rows, cols]` f32 tensor.
pub fn matrix_to_tensor(m: &Matrix, device: &Device) -> DrapeResult<Tensor> {
    Tensor::from_slice(m.data(), (m.rows(), m.cols()), device)
        .map_err(backend_err("matrix_to_tensor"))
}

/// Downloads a 2-D f32 tensor.
///
/// # Errors
///
/// Returns [`DrapeError::ShapeMismatch`] for tensors that are not 2-D and
/// [`DrapeError::Backend`] if the copy fails.
pub fn tensor_to_matrix(t: &Tensor) -> DrapeResult<Matrix> {
    let (rows, cols) = t.dims2().map_err(|e| DrapeError::shape(e.to_string()))?;
    let data = t
        .flatten_all()
        .and_then(|flat| flat.to_vec1::<f32>())
        .map_err(backend_err("tensor_to_matrix"))?;
    Matrix::from_vec(rows, cols, data)
}
