//! Read-only feature normalization statistics.
//!
//! Statistics are accumulated elsewhere and handed to the model as fixed
//! values. Nothing in this crate updates them.

use serde::{Deserialize, Serialize};

use drape_core::{DrapeError, DrapeResult, Matrix, MultiGraph};

/// Per-feature `(x − mean) / std` normalization.
///
/// Standard deviations are floored at [`Normalizer::STD_EPSILON`].
///
/// # Example
///
/// ```
/// use drape_core::Matrix;
/// use drape_net::normalizer::Normalizer;
///
/// let norm = Normalizer::new(vec![1.0, 0.0], vec![2.0, 1.0]).unwrap();
/// let x = Matrix::from_rows(&[[3.0, 5.0]]).unwrap();
/// let y = norm.normalize(&x).unwrap();
/// assert_eq!(y.data(), &[1.0, 5.0]);
/// assert_eq!(norm.inverse(&y).unwrap(), x);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NormalizerStats", into = "NormalizerStats")]
pub struct Normalizer {
    mean: Vec<f32>,
    std: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct NormalizerStats {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl TryFrom<NormalizerStats> for Normalizer {
    type Error = DrapeError;

    fn try_from(s: NormalizerStats) -> Result<Self, Self::Error> {
        Self::new(s.mean, s.std)
    }
}

impl From<Normalizer> for NormalizerStats {
    fn from(n: Normalizer) -> Self {
        Self {
            mean: n.mean,
            std: n.std,
        }
    }
}

impl Normalizer {
    pub const STD_EPSILON: f32 = 1e-8;

    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if `mean` and `std` differ in
    /// length, and [`DrapeError::InvalidConfiguration`] if any statistic is
    /// NaN or infinite.
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> DrapeResult<Self> {
        if mean.len() != std.len() {
            return Err(DrapeError::shape(format!(
                "normalizer has {} means and {} deviations",
                mean.len(),
                std.len()
            )));
        }
        for (what, values) in [("mean", &mean), ("std", &std)] {
            if let Some(i) = values.iter().position(|v| !v.is_finite()) {
                return Err(DrapeError::config(format!(
                    "normalizer {what}[{i}] is {}",
                    values[i]
                )));
            }
        }
        let std = std.into_iter().map(|s| s.max(Self::STD_EPSILON)).collect();
        Ok(Self { mean, std })
    }

    /// Zero mean, unit deviation: leaves features unchanged.
    pub fn identity(width: usize) -> Self {
        Self {
            mean: vec![0.0; width],
            std: vec![1.0; width],
        }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Per-feature mean.
    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    /// Per-feature standard deviation, already floored.
    pub fn std(&self) -> &[f32] {
        &self.std
    }

    fn check(&self, x: &Matrix) -> DrapeResult<()> {
        if x.cols() != self.width() {
            return Err(DrapeError::shape(format!(
                "normalizer over {} features applied to {} columns",
                self.width(),
                x.cols()
            )));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] on a width mismatch.
    pub fn normalize(&self, x: &Matrix) -> DrapeResult<Matrix> {
        self.check(x)?;
        let mut out = x.clone();
        for r in 0..out.rows() {
            for ((v, m), s) in out.row_mut(r).iter_mut().zip(&self.mean).zip(&self.std) {
                *v = (*v - m) / s;
            }
        }
        Ok(out)
    }

    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] on a width mismatch.
    pub fn inverse(&self, y: &Matrix) -> DrapeResult<Matrix> {
        self.check(y)?;
        let mut out = y.clone();
        for r in 0..out.rows() {
            for ((v, m), s) in out.row_mut(r).iter_mut().zip(&self.mean).zip(&self.std) {
                *v = *v * s + m;
            }
        }
        Ok(out)
    }
}

/// Normalizers for node inputs, edge inputs and the decoded output.
///
/// Each one is optional; a missing normalizer leaves its features as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerSet {
    pub node: Option<Normalizer>,
    pub edge: Option<Normalizer>,
    pub output: Option<Normalizer>,
}

impl NormalizerSet {
    /// Normalizes raw node features and every edge set's features.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] on a width mismatch.
    pub fn normalize_graph(&self, graph: &MultiGraph) -> DrapeResult<MultiGraph> {
        let nodes = match &self.node {
            Some(n) => n.normalize(graph.node_features())?,
            None => graph.node_features().clone(),
        };
        let edge_sets = graph
            .edge_sets()
            .iter()
            .map(|set| match &self.edge {
                Some(n) => set.with_features(n.normalize(set.features())?),
                None => Ok(set.clone()),
            })
            .collect::<DrapeResult<Vec<_>>>()?;
        MultiGraph::new(nodes, edge_sets)
    }

    /// Maps decoder output back to physical units.
    pub fn denormalize_output(&self, output: Matrix) -> DrapeResult<Matrix> {
        match &self.output {
            Some(n) => n.inverse(&output),
            None => Ok(output),
        }
    }

    /// Checks each normalizer against the widths it will be applied to.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] naming the first mismatch.
    pub fn check_widths(&self, node: usize, edge: usize, output: usize) -> DrapeResult<()> {
        let slots = [
            ("node", &self.node, node),
            ("edge", &self.edge, edge),
            ("output", &self.output, output),
        ];
        for (name, norm, want) in slots {
            if let Some(n) = norm {
                if n.width() != want {
                    return Err(DrapeError::shape(format!(
                        "{name} normalizer covers {} features, model uses {want}",
                        n.width()
                    )));
                }
            }
        }
        Ok(())
    }
}
