//! Feed-forward networks over row-major feature matrices.
//!
//! Every learned sub-network of the model sits behind the [`Network`]
//! trait. The CPU implementation is [`Mlp`]: a stack of dense layers with
//! ReLU between all but the last, optionally followed by a per-row
//! [`LayerNorm`](crate::nn::LayerNorm).
//!
//! Widths are fixed when a network is built and checked on every call.

use std::fmt;

use drape_core::{DrapeError, DrapeResult, Matrix};

use crate::nn::{LayerNorm, Linear, Rng};

/// A learned row-wise map from `input_width` to `output_width` features.
///
/// Implementations must treat rows independently and must not mutate any
/// state during `forward`.
pub trait Network: Send + Sync + fmt::Debug {
    /// Width every input row must have.
    fn input_width(&self) -> usize;

    /// Width of every output row.
    fn output_width(&self) -> usize;

    /// Maps each row of `input` to an output row.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::ShapeMismatch`] if `input.cols()` differs
    /// from [`Network::input_width`].
    fn forward(&self, input: &Matrix) -> DrapeResult<Matrix>;

    /// Number of learned scalars, zero for fixed maps.
    fn param_count(&self) -> usize {
        0
    }
}

/// Checks that `input` fits `net`. Shared by all [`Network`] impls.
pub fn check_input(net: &dyn Network, input: &Matrix, what: &str) -> DrapeResult<()> {
    if input.cols() != net.input_width() {
        return Err(DrapeError::shape(format!(
            "{what}: expected {} input features, got {}",
            net.input_width(),
            input.cols()
        )));
    }
    Ok(())
}

/// Layer widths of an [`Mlp`].
///
/// `num_layers` counts linear transforms. With one layer the network maps
/// `input_width` straight to `output_width`; otherwise every hidden layer
/// is `hidden_width` wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MlpShape {
    pub input_width: usize,
    pub hidden_width: usize,
    pub num_layers: usize,
    pub output_width: usize,
    pub layer_norm: bool,
}

impl MlpShape {
    fn widths(&self) -> Vec<usize> {
        let mut widths = Vec::with_capacity(self.num_layers + 1);
        widths.push(self.input_width);
        widths.extend(std::iter::repeat(self.hidden_width).take(self.num_layers - 1));
        widths.push(self.output_width);
        widths
    }

    fn validate(&self) -> DrapeResult<()> {
        if self.num_layers == 0 {
            return Err(DrapeError::config("an MLP needs at least one layer"));
        }
        if self.input_width == 0 || self.output_width == 0 {
            return Err(DrapeError::config(format!(
                "MLP widths must be positive, got {}→{}",
                self.input_width, self.output_width
            )));
        }
        if self.num_layers > 1 && self.hidden_width == 0 {
            return Err(DrapeError::config("MLP hidden width must be positive"));
        }
        Ok(())
    }
}

/// Multi-layer perceptron with optional trailing layer normalization.
///
/// # Example
///
/// ```
/// use drape_core::Matrix;
/// use drape_net::mlp::{Mlp, MlpShape, Network};
///
/// let mlp = Mlp::new_random(
///     42,
///     MlpShape { input_width: 12, hidden_width: 16, num_layers: 3, output_width: 16, layer_norm: true },
/// )
/// .unwrap();
/// let out = mlp.forward(&Matrix::zeros(5, 12)).unwrap();
/// assert_eq!(out.shape(), (5, 16));
/// assert!(mlp.forward(&Matrix::zeros(5, 11)).is_err());
/// ```
#[derive(Clone, PartialEq)]
pub struct Mlp {
    layers: Vec<Linear>,
    norm: Option<LayerNorm>,
}

impl fmt::Debug for Mlp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mlp({}", self.input_width())?;
        for layer in &self.layers {
            write!(f, "→{}", layer.out_dim())?;
        }
        if self.norm.is_some() {
            write!(f, ", norm")?;
        }
        write!(f, ")")
    }
}

impl Mlp {
    /// Creates an MLP with Xavier-uniform weights and zero biases.
    ///
    /// The same seed always produces the same weights.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] for a zero layer count
    /// or zero width.
    pub fn new_random(seed: u64, shape: MlpShape) -> DrapeResult<Self> {
        let mut rng = Rng::new(seed);
        Self::with_rng(&mut rng, shape)
    }

    /// Draws weights from a shared generator so a whole model can be
    /// initialised from one seed.
    pub(crate) fn with_rng(rng: &mut Rng, shape: MlpShape) -> DrapeResult<Self> {
        shape.validate()?;
        let layers = shape
            .widths()
            .windows(2)
            .map(|w| Linear::new_xavier(rng, w[0], w[1]))
            .collect();
        Ok(Self {
            layers,
            norm: shape.layer_norm.then(|| LayerNorm::new(shape.output_width)),
        })
    }

    /// Assembles an MLP from loaded layers, checking that they chain.
    pub(crate) fn from_layers(layers: Vec<Linear>, norm: Option<LayerNorm>) -> DrapeResult<Self> {
        let last = layers
            .last()
            .ok_or_else(|| DrapeError::config("an MLP needs at least one layer"))?;
        if let Some(pair) = layers.windows(2).find(|w| w[0].out_dim() != w[1].in_dim()) {
            return Err(DrapeError::shape(format!(
                "MLP layers do not chain: {} outputs feed {} inputs",
                pair[0].out_dim(),
                pair[1].in_dim()
            )));
        }
        if let Some(norm) = &norm {
            if norm.dim() != last.out_dim() {
                return Err(DrapeError::shape(format!(
                    "layer norm over {} features follows a {}-wide layer",
                    norm.dim(),
                    last.out_dim()
                )));
            }
        }
        Ok(Self { layers, norm })
    }

    pub(crate) fn layers(&self) -> &[Linear] {
        &self.layers
    }

    pub(crate) fn norm(&self) -> Option<&LayerNorm> {
        self.norm.as_ref()
    }

    /// Number of linear transforms.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// `true` if outputs are layer-normalized.
    pub fn has_layer_norm(&self) -> bool {
        self.norm.is_some()
    }

    /// Total number of learned scalars.
    pub fn param_count(&self) -> usize {
        self.layers.iter().map(Linear::param_count).sum::<usize>()
            + self.norm.as_ref().map_or(0, LayerNorm::param_count)
    }

    fn forward_row(&self, input: &[f32], out: &mut [f32], scratch: &mut [Vec<f32>; 2]) {
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let [src, dst] = scratch;
            let x: &[f32] = if i == 0 { input } else { src.as_slice() };
            if i == last {
                layer.forward_into(x, out);
            } else {
                dst.resize(layer.out_dim(), 0.0);
                layer.forward_into(x, dst);
                dst.iter_mut().for_each(|v| *v = v.max(0.0));
                scratch.swap(0, 1);
            }
        }
        if let Some(norm) = &self.norm {
            norm.forward_in_place(out);
        }
    }
}

impl Network for Mlp {
    fn input_width(&self) -> usize {
        self.layers.first().map_or(0, Linear::in_dim)
    }

    fn output_width(&self) -> usize {
        self.layers.last().map_or(0, Linear::out_dim)
    }

    fn forward(&self, input: &Matrix) -> DrapeResult<Matrix> {
        check_input(self, input, "mlp")?;
        let width = self.output_width();
        let mut out = Matrix::zeros(input.rows(), width);
        let mut scratch = [Vec::new(), Vec::new()];
        for r in 0..input.rows() {
            self.forward_row(input.row(r), out.row_mut(r), &mut scratch);
        }
        Ok(out)
    }

    fn param_count(&self) -> usize {
        Mlp::param_count(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(layers: usize, norm: bool) -> MlpShape {
        MlpShape {
            input_width: 4,
            hidden_width: 8,
            num_layers: layers,
            output_width: 3,
            layer_norm: norm,
        }
    }

    #[test]
    fn layer_count_and_widths() {
        let mlp = Mlp::new_random(1, shape(3, false)).unwrap();
        assert_eq!(mlp.num_layers(), 3);
        assert_eq!(format!("{mlp:?}"), "Mlp(4→8→8→3)");
        let single = Mlp::new_random(1, shape(1, true)).unwrap();
        assert_eq!(format!("{single:?}"), "Mlp(4→3, norm)");
        assert_eq!(single.param_count(), 4 * 3 + 3 + 6);
    }

    #[test]
    fn zero_layers_rejected() {
        let err = Mlp::new_random(1, shape(0, false)).unwrap_err();
        assert!(matches!(err, DrapeError::InvalidConfiguration { .. }));
    }

    #[test]
    fn same_seed_same_weights() {
        let a = Mlp::new_random(9, shape(2, true)).unwrap();
        let b = Mlp::new_random(9, shape(2, true)).unwrap();
        let c = Mlp::new_random(10, shape(2, true)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn relu_between_layers_not_after_last() {
        // 1 → 1 → 1 with weights -1 then 1: relu(-x) for x > 0 is zero.
        let l1 = Linear::from_weights_and_bias(vec![-1.0], vec![0.0], 1, 1).unwrap();
        let l2 = Linear::from_weights_and_bias(vec![1.0], vec![-2.0], 1, 1).unwrap();
        let mlp = Mlp::from_layers(vec![l1, l2], None).unwrap();
        let out = mlp.forward(&Matrix::from_rows(&[[3.0], [-3.0]]).unwrap()).unwrap();
        assert_eq!(out.data(), &[-2.0, 1.0]);
    }

    #[test]
    fn layer_norm_applied_per_row() {
        let mlp = Mlp::new_random(3, shape(2, true)).unwrap();
        let input = Matrix::from_rows(&[[1.0, 2.0, 3.0, 4.0], [0.5, -1.0, 0.0, 2.0]]).unwrap();
        let out = mlp.forward(&input).unwrap();
        for row in out.iter_rows() {
            let mean = row.iter().sum::<f32>() / row.len() as f32;
            assert!(mean.abs() < 1e-5, "row mean should be ~0, got {mean}");
        }
    }

    #[test]
    fn from_layers_rejects_broken_chain() {
        let l1 = Linear::from_weights_and_bias(vec![0.0; 4], vec![0.0; 2], 2, 2).unwrap();
        let l2 = Linear::from_weights_and_bias(vec![0.0; 3], vec![0.0; 1], 3, 1).unwrap();
        assert!(Mlp::from_layers(vec![l1.clone(), l2], None).is_err());
        assert!(Mlp::from_layers(vec![l1], Some(LayerNorm::new(5))).is_err());
        assert!(Mlp::from_layers(vec![], None).is_err());
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let mlp = Mlp::new_random(1, shape(2, true)).unwrap();
        let out = mlp.forward(&Matrix::zeros(0, 4)).unwrap();
        assert_eq!(out.shape(), (0, 3));
    }
}
