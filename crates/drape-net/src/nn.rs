//! Shared neural primitives: PRNG, dense layer, layer normalization.
//!
//! Everything here works on plain `f32` slices. Batching over rows lives
//! in [`crate::mlp::Mlp`].

use drape_core::{DrapeError, DrapeResult};

/// Deterministic splitmix64 PRNG used for weight initialization.
#[derive(Debug, Clone)]
pub(crate) struct Rng(u64);

impl Rng {
    pub(crate) fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }

    /// Uniform f32 in `[0, 1)`.
    pub(crate) fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / ((1u64 << 24) as f32)
    }

    /// Uniform f32 in `[lo, hi)`.
    pub(crate) fn next_f32_range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }
}

/// Fully connected layer `y = W·x + b`.
///
/// Weights are stored row-major as `[out_dim × in_dim]`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Linear {
    weights: Vec<f32>,
    bias: Vec<f32>,
    in_dim: usize,
    out_dim: usize,
}

impl Linear {
    /// Xavier/Glorot uniform weights, zero bias.
    pub(crate) fn new_xavier(rng: &mut Rng, in_dim: usize, out_dim: usize) -> Self {
        let limit = (6.0 / (in_dim + out_dim).max(1) as f32).sqrt();
        let weights = (0..in_dim * out_dim)
            .map(|_| rng.next_f32_range(-limit, limit))
            .collect();
        Self {
            weights,
            bias: vec![0.0; out_dim],
            in_dim,
            out_dim,
        }
    }

    pub(crate) fn from_weights_and_bias(
        weights: Vec<f32>,
        bias: Vec<f32>,
        in_dim: usize,
        out_dim: usize,
    ) -> DrapeResult<Self> {
        if weights.len() != in_dim * out_dim || bias.len() != out_dim {
            return Err(DrapeError::shape(format!(
                "linear {in_dim}→{out_dim}: got {} weights and {} biases",
                weights.len(),
                bias.len()
            )));
        }
        Ok(Self {
            weights,
            bias,
            in_dim,
            out_dim,
        })
    }

    pub(crate) fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub(crate) fn out_dim(&self) -> usize {
        self.out_dim
    }

    pub(crate) fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub(crate) fn bias(&self) -> &[f32] {
        &self.bias
    }

    #[cfg(test)]
    pub(crate) fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    /// Writes `W·input + b` into `out`. Both slices must match the layer.
    pub(crate) fn forward_into(&self, input: &[f32], out: &mut [f32]) {
        debug_assert_eq!(input.len(), self.in_dim);
        debug_assert_eq!(out.len(), self.out_dim);
        for ((o, w_row), b) in out
            .iter_mut()
            .zip(self.weights.chunks_exact(self.in_dim.max(1)))
            .zip(&self.bias)
        {
            let dot: f32 = if self.in_dim == 0 {
                0.0
            } else {
                w_row.iter().zip(input).map(|(w, x)| w * x).sum()
            };
            *o = dot + b;
        }
    }

    pub(crate) fn param_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

/// Per-row layer normalization with learnable gain and shift.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LayerNorm {
    gamma: Vec<f32>,
    beta: Vec<f32>,
    eps: f32,
}

impl LayerNorm {
    pub(crate) const EPS: f32 = 1e-5;

    pub(crate) fn new(dim: usize) -> Self {
        Self {
            gamma: vec![1.0; dim],
            beta: vec![0.0; dim],
            eps: Self::EPS,
        }
    }

    pub(crate) fn from_parts(gamma: Vec<f32>, beta: Vec<f32>) -> DrapeResult<Self> {
        if gamma.len() != beta.len() {
            return Err(DrapeError::shape(format!(
                "layer norm: {} gains vs {} shifts",
                gamma.len(),
                beta.len()
            )));
        }
        Ok(Self {
            gamma,
            beta,
            eps: Self::EPS,
        })
    }

    pub(crate) fn dim(&self) -> usize {
        self.gamma.len()
    }

    pub(crate) fn gamma(&self) -> &[f32] {
        &self.gamma
    }

    pub(crate) fn beta(&self) -> &[f32] {
        &self.beta
    }

    pub(crate) fn eps(&self) -> f32 {
        self.eps
    }

    /// Normalizes `row` to zero mean and unit variance, then scales.
    pub(crate) fn forward_in_place(&self, row: &mut [f32]) {
        debug_assert_eq!(row.len(), self.dim());
        if row.is_empty() {
            return;
        }
        let n = row.len() as f32;
        let mean = row.iter().sum::<f32>() / n;
        let var = row.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n;
        let std = (var + self.eps).sqrt();
        for ((x, g), b) in row.iter_mut().zip(&self.gamma).zip(&self.beta) {
            *x = g * (*x - mean) / std + b;
        }
    }

    pub(crate) fn param_count(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }
}
