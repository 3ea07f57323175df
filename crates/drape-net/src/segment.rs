//! Segment reduction: folding edge rows into per-node rows.
//!
//! `segment_reduce` is called once per edge set per message-passing step,
//! so it makes exactly one pass over the input rows. Empty segments come
//! out as zero rows for every aggregator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use drape_core::{DrapeError, DrapeResult, Matrix};

/// How rows that share a segment id are combined.
///
/// # Example
///
/// ```
/// use drape_net::segment::Aggregator;
///
/// assert_eq!("MEAN".parse::<Aggregator>().unwrap(), Aggregator::Mean);
/// assert_eq!("add".parse::<Aggregator>().unwrap(), Aggregator::Sum);
/// assert!("median".parse::<Aggregator>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Aggregator {
    #[default]
    Sum,
    Mean,
    Max,
    Min,
}

impl Aggregator {
    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Max => "max",
            Self::Min => "min",
        }
    }

    /// Stable numeric id used in checkpoint headers.
    pub fn id(self) -> u32 {
        match self {
            Self::Sum => 0,
            Self::Mean => 1,
            Self::Max => 2,
            Self::Min => 3,
        }
    }

    /// Inverse of [`Aggregator::id`].
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidConfiguration`] for unknown ids.
    pub fn from_id(id: u32) -> DrapeResult<Self> {
        match id {
            0 => Ok(Self::Sum),
            1 => Ok(Self::Mean),
            2 => Ok(Self::Max),
            3 => Ok(Self::Min),
            _ => Err(DrapeError::config(format!("unknown aggregator id {id}"))),
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Aggregator {
    type Err = DrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            // "add" is what older configs call sum
            "sum" | "add" => Ok(Self::Sum),
            "mean" => Ok(Self::Mean),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            other => Err(DrapeError::config(format!(
                "unknown aggregator '{other}', expected sum, mean, max or min"
            ))),
        }
    }
}

impl TryFrom<String> for Aggregator {
    type Error = DrapeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Aggregator> for String {
    fn from(a: Aggregator) -> Self {
        a.name().to_string()
    }
}

/// Reduces the rows of `data` into `num_segments` rows.
///
/// Row `e` of `data` contributes to output row `segment_ids[e]`. Mean is
/// the arithmetic mean over the rows that actually landed in a segment.
///
/// # Errors
///
/// Returns [`DrapeError::ShapeMismatch`] if `segment_ids` and `data`
/// disagree in length, or an id is `>= num_segments`.
///
/// # Example
///
/// ```
/// use drape_core::Matrix;
/// use drape_net::segment::{segment_reduce, Aggregator};
///
/// let data = Matrix::from_rows(&[[1.0], [3.0], [2.0], [4.0]]).unwrap();
/// let out = segment_reduce(&data, &[0, 1, 2, 2], 4, Aggregator::Mean).unwrap();
/// assert_eq!(out.data(), &[1.0, 3.0, 3.0, 0.0]);
/// ```
pub fn segment_reduce(
    data: &Matrix,
    segment_ids: &[usize],
    num_segments: usize,
    aggregator: Aggregator,
) -> DrapeResult<Matrix> {
    if segment_ids.len() != data.rows() {
        return Err(DrapeError::shape(format!(
            "segment reduce: {} ids for {} rows",
            segment_ids.len(),
            data.rows()
        )));
    }
    if let Some(&bad) = segment_ids.iter().find(|&&s| s >= num_segments) {
        return Err(DrapeError::shape(format!(
            "segment id {bad} out of range for {num_segments} segments"
        )));
    }

    let mut out = Matrix::zeros(num_segments, data.cols());
    let mut counts = vec![0u32; num_segments];
    for (row, &seg) in data.iter_rows().zip(segment_ids) {
        let dst = out.row_mut(seg);
        let first = counts[seg] == 0;
        counts[seg] += 1;
        match aggregator {
            Aggregator::Sum | Aggregator::Mean => {
                dst.iter_mut().zip(row).for_each(|(d, &x)| *d += x);
            }
            Aggregator::Max if first => dst.copy_from_slice(row),
            Aggregator::Max => dst.iter_mut().zip(row).for_each(|(d, &x)| *d = d.max(x)),
            Aggregator::Min if first => dst.copy_from_slice(row),
            Aggregator::Min => dst.iter_mut().zip(row).for_each(|(d, &x)| *d = d.min(x)),
        }
    }

    if aggregator == Aggregator::Mean {
        for (seg, &count) in counts.iter().enumerate() {
            if count > 1 {
                let inv = 1.0 / count as f32;
                out.row_mut(seg).iter_mut().for_each(|d| *d *= inv);
            }
        }
    }
    Ok(out)
}

/// A configured reduction, shared by every block of a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentReducer {
    aggregator: Aggregator,
}

impl SegmentReducer {
    /// Reducer that combines rows with `aggregator`.
    pub fn new(aggregator: Aggregator) -> Self {
        Self { aggregator }
    }

    /// The reduction this reducer applies.
    pub fn aggregator(&self) -> Aggregator {
        self.aggregator
    }

    /// See [`segment_reduce`].
    pub fn reduce(
        &self,
        data: &Matrix,
        segment_ids: &[usize],
        num_segments: usize,
    ) -> DrapeResult<Matrix> {
        segment_reduce(data, segment_ids, num_segments, self.aggregator)
    }
}
