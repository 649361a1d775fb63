use rasterql_datatypes::primitives::CellStatistics;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A function that aggregates the present values of a neighborhood to a single cell value.
pub trait FocalAggregate: Sync + Send {
    /// `values` holds only present cells; `None` means the result is absent
    fn apply(&self, values: &[f64]) -> Option<f64>;
}

/// The reductions available to `focal_reduce`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FocalOperation {
    Sum,
    Mean,
    Min,
    Max,
    Median,
    Mode,
    #[serde(rename = "stddev")]
    #[strum(serialize = "stddev")]
    StandardDeviation,
}

impl FocalAggregate for FocalOperation {
    fn apply(&self, values: &[f64]) -> Option<f64> {
        match self {
            FocalOperation::Sum => Sum.apply(values),
            FocalOperation::Mean => Mean.apply(values),
            FocalOperation::Min => Min.apply(values),
            FocalOperation::Max => Max.apply(values),
            FocalOperation::Median => Median.apply(values),
            FocalOperation::Mode => Mode.apply(values),
            FocalOperation::StandardDeviation => StandardDeviation.apply(values),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sum;

impl FocalAggregate for Sum {
    fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Mean;

impl FocalAggregate for Mean {
    #[allow(clippy::cast_precision_loss)]
    fn apply(&self, values: &[f64]) -> Option<f64> {
        Sum.apply(values).map(|sum| sum / values.len() as f64)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Min;

impl FocalAggregate for Min {
    fn apply(&self, values: &[f64]) -> Option<f64> {
        values.iter().copied().reduce(f64::min)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Max;

impl FocalAggregate for Max {
    fn apply(&self, values: &[f64]) -> Option<f64> {
        values.iter().copied().reduce(f64::max)
    }
}

/// The lower median
#[derive(Debug, Clone, Copy)]
pub struct Median;

impl FocalAggregate for Median {
    fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);
        Some(sorted[(sorted.len() - 1) / 2])
    }
}

/// The most frequent value, the smallest one on ties
#[derive(Debug, Clone, Copy)]
pub struct Mode;

impl FocalAggregate for Mode {
    fn apply(&self, values: &[f64]) -> Option<f64> {
        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);

        let mut best: Option<(f64, usize)> = None;
        for run in sorted.chunk_by(|a, b| a == b) {
            match best {
                Some((_, count)) if count >= run.len() => {}
                _ => best = Some((run[0], run.len())),
            }
        }

        best.map(|(value, _)| value)
    }
}

/// The population standard deviation
#[derive(Debug, Clone, Copy)]
pub struct StandardDeviation;

impl FocalAggregate for StandardDeviation {
    fn apply(&self, values: &[f64]) -> Option<f64> {
        let mut statistics = CellStatistics::new();
        for value in values {
            statistics.add(Some(*value));
        }

        statistics.std_dev().ok().filter(|std_dev| std_dev.is_finite())
    }
}
