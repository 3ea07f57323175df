//! Parameter-free networks for unit tests.

use drape_core::{DrapeResult, Matrix};

use crate::mlp::{check_input, Network};

/// Copies a contiguous column range of the input.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Projection {
    input_width: usize,
    start: usize,
    end: usize,
}

impl Projection {
    /// Keeps the first `width` columns.
    pub(crate) fn leading(input_width: usize, width: usize) -> Self {
        Self {
            input_width,
            start: 0,
            end: width,
        }
    }

    /// Keeps the last `width` columns.
    pub(crate) fn trailing(input_width: usize, width: usize) -> Self {
        Self {
            input_width,
            start: input_width - width,
            end: input_width,
        }
    }

    pub(crate) fn identity(width: usize) -> Self {
        Self::leading(width, width)
    }
}

impl Network for Projection {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn output_width(&self) -> usize {
        self.end - self.start
    }

    fn forward(&self, input: &Matrix) -> DrapeResult<Matrix> {
        check_input(self, input, "projection")?;
        input.columns(self.start, self.end)
    }
}
