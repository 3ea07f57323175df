//! Per-call execution context.
//!
//! Every forward pass takes a `&mut ExecutionContext`. It decides what
//! happens when a stage produces NaN or Inf and collects what was seen.

use std::str::FromStr;

use tracing::warn;

use drape_core::{DrapeError, DrapeResult, Matrix};

/// Policy for non-finite values between pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericCheck {
    /// Skip the scan entirely.
    Off,
    /// Log a warning, record a [`NumericIssue`], keep going.
    #[default]
    Warn,
    /// Abort the pass with [`DrapeError::NumericInstability`].
    Fail,
}

impl FromStr for NumericCheck {
    type Err = DrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "warn" => Ok(Self::Warn),
            "fail" => Ok(Self::Fail),
            other => Err(DrapeError::config(format!(
                "unknown numeric check '{other}', expected off, warn or fail"
            ))),
        }
    }
}

/// A stage whose output contained non-finite values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericIssue {
    pub stage: String,
    pub non_finite: usize,
}

/// Explicit state threaded through a forward pass.
///
/// # Example
///
/// ```
/// use drape_core::Matrix;
/// use drape_net::context::{ExecutionContext, NumericCheck};
///
/// let mut ctx = ExecutionContext::new(NumericCheck::Warn);
/// let bad = Matrix::from_rows(&[[f32::NAN, 1.0]]).unwrap();
/// ctx.inspect("decoder", &bad).unwrap();
/// assert_eq!(ctx.issues().len(), 1);
///
/// let mut strict = ExecutionContext::new(NumericCheck::Fail);
/// assert!(strict.inspect("decoder", &bad).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    numeric_check: NumericCheck,
    issues: Vec<NumericIssue>,
}

impl ExecutionContext {
    /// Empty context that applies `numeric_check`.
    pub fn new(numeric_check: NumericCheck) -> Self {
        Self {
            numeric_check,
            issues: Vec::new(),
        }
    }

    /// The active NaN/Inf policy.
    pub fn numeric_check(&self) -> NumericCheck {
        self.numeric_check
    }

    /// Issues recorded since the last [`ExecutionContext::take_issues`].
    pub fn issues(&self) -> &[NumericIssue] {
        &self.issues
    }

    /// Removes and returns the recorded issues.
    pub fn take_issues(&mut self) -> Vec<NumericIssue> {
        std::mem::take(&mut self.issues)
    }

    /// Applies the numeric policy to the output of `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::NumericInstability`] under
    /// [`NumericCheck::Fail`] if `values` holds NaN or Inf.
    pub fn inspect(&mut self, stage: &str, values: &Matrix) -> DrapeResult<()> {
        if self.numeric_check == NumericCheck::Off {
            return Ok(());
        }
        let non_finite = values.non_finite_count();
        if non_finite == 0 {
            return Ok(());
        }
        match self.numeric_check {
            NumericCheck::Fail => Err(DrapeError::NumericInstability {
                stage: stage.to_string(),
                message: format!("{non_finite} non-finite values"),
            }),
            _ => {
                warn!(stage, non_finite, "non-finite values in stage output");
                self.issues.push(NumericIssue {
                    stage: stage.to_string(),
                    non_finite,
                });
                Ok(())
            }
        }
    }
}
