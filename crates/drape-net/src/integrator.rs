//! Explicit second-order position update.

use drape_core::{DrapeError, DrapeResult, Matrix, POSITION_DIM};

/// `next = 2·current − previous + predicted`, per node and axis.
///
/// # Errors
///
/// Returns [`DrapeError::ShapeMismatch`] if the three inputs cover
/// different node counts or `predicted` is not 3 wide.
///
/// # Example
///
/// ```
/// use drape_core::Matrix;
/// use drape_net::integrator::integrate;
///
/// let next = integrate(&[[1.0, 0.0, 0.0]], &[[0.0; 3]], &Matrix::zeros(1, 3)).unwrap();
/// assert_eq!(next, vec![[2.0, 0.0, 0.0]]);
/// ```
pub fn integrate(
    current: &[[f32; POSITION_DIM]],
    previous: &[[f32; POSITION_DIM]],
    predicted: &Matrix,
) -> DrapeResult<Vec<[f32; POSITION_DIM]>> {
    if predicted.cols() != POSITION_DIM {
        return Err(DrapeError::shape(format!(
            "integration needs {POSITION_DIM}-wide predictions, got {}",
            predicted.cols()
        )));
    }
    if current.len() != previous.len() || current.len() != predicted.rows() {
        return Err(DrapeError::shape(format!(
            "integration over {} current, {} previous and {} predicted nodes",
            current.len(),
            previous.len(),
            predicted.rows()
        )));
    }
    Ok(current
        .iter()
        .zip(previous)
        .zip(predicted.iter_rows())
        .map(|((cur, prev), acc)| std::array::from_fn(|d| 2.0 * cur[d] - prev[d] + acc[d]))
        .collect())
}
