//! Device-resident copy of a CPU [`Mlp`].

use std::fmt;

use candle_core::{Device, Tensor, D};
use candle_nn::{Linear, Module};

use drape_core::{DrapeResult, Matrix};

use super::{backend_err, matrix_to_tensor, tensor_to_matrix};
use crate::mlp::{check_input, Mlp, Network};

struct GpuLayerNorm {
    gamma: Tensor,
    beta: Tensor,
    eps: f64,
}

impl GpuLayerNorm {
    fn forward(&self, input: &Tensor) -> Result<Tensor, candle_core::Error> {
        // input: [rows, dim]
        let mean = input.mean_keepdim(D::Minus1)?;
        let centered = input.broadcast_sub(&mean)?;
        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let std = (var + self.eps)?.sqrt()?;
        let normed = centered.broadcast_div(&std)?;
        normed.broadcast_mul(&self.gamma)?.broadcast_add(&self.beta)
    }
}

/// An MLP whose weights live on a candle [`Device`].
///
/// Inference only: weights are copied from an [`Mlp`] and never updated.
///
/// # Example
///
/// ```ignore
/// use candle_core::Device;
/// use drape_net::gpu::GpuMlp;
/// use drape_net::mlp::{Mlp, MlpShape};
///
/// let shape = MlpShape { input_width: 12, hidden_width: 32, num_layers: 3, output_width: 32, layer_norm: true };
/// let cpu = Mlp::new_random(42, shape).unwrap();
/// let gpu = GpuMlp::from_cpu(&cpu, &Device::Cpu).unwrap();
/// ```
pub struct GpuMlp {
    layers: Vec<Linear>,
    norm: Option<GpuLayerNorm>,
    input_width: usize,
    output_width: usize,
    param_count: usize,
    device: Device,
}

impl fmt::Debug for GpuMlp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuMlp({}→{}, {} layers{}, device={:?})",
            self.input_width,
            self.output_width,
            self.layers.len(),
            if self.norm.is_some() { ", norm" } else { "" },
            self.device
        )
    }
}

impl GpuMlp {
    /// Transfers all weights of `cpu` to `device`.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::Backend`](drape_core::DrapeError::Backend) if
    /// a tensor cannot be created.
    pub fn from_cpu(cpu: &Mlp, device: &Device) -> DrapeResult<Self> {
        let map_err = backend_err("GpuMlp from_cpu");
        let layers = cpu
            .layers()
            .iter()
            .map(|layer| {
                let w = Tensor::from_slice(layer.weights(), (layer.out_dim(), layer.in_dim()), device)?;
                let b = Tensor::from_slice(layer.bias(), (layer.out_dim(),), device)?;
                Ok(Linear::new(w, Some(b)))
            })
            .collect::<Result<Vec<_>, candle_core::Error>>()
            .map_err(&map_err)?;
        let norm = match cpu.norm() {
            Some(n) => {
                let dim = n.dim();
                Some(GpuLayerNorm {
                    gamma: Tensor::from_slice(n.gamma(), (1, dim), device).map_err(&map_err)?,
                    beta: Tensor::from_slice(n.beta(), (1, dim), device).map_err(&map_err)?,
                    eps: f64::from(n.eps()),
                })
            }
            None => None,
        };
        Ok(Self {
            layers,
            norm,
            input_width: cpu.input_width(),
            output_width: cpu.output_width(),
            param_count: cpu.param_count(),
            device: device.clone(),
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Batched forward pass on device tensors, `[rows, in] → [rows, out]`.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::Backend`](drape_core::DrapeError::Backend) if
    /// a tensor operation fails.
    pub fn forward_tensor(&self, input: &Tensor) -> DrapeResult<Tensor> {
        let map_err = backend_err("GpuMlp forward");
        let last = self.layers.len() - 1;
        let mut h = input.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h).map_err(&map_err)?;
            if i != last {
                h = h.relu().map_err(&map_err)?;
            }
        }
        match &self.norm {
            Some(norm) => norm.forward(&h).map_err(&map_err),
            None => Ok(h),
        }
    }
}

impl Network for GpuMlp {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn output_width(&self) -> usize {
        self.output_width
    }

    fn forward(&self, input: &Matrix) -> DrapeResult<Matrix> {
        check_input(self, input, "gpu mlp")?;
        if input.rows() == 0 {
            return Ok(Matrix::zeros(0, self.output_width));
        }
        let t = matrix_to_tensor(input, &self.device)?;
        tensor_to_matrix(&self.forward_tensor(&t)?)
    }

    fn param_count(&self) -> usize {
        self.param_count
    }
}
