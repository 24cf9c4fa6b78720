//! Descriptive statistics over accepted ratings.

use serde::Serialize;
use statrs::statistics::Statistics;

/// Round half away from zero to two decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().mean())
}

/// Sample (n-1) standard deviation, or `None` below two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.iter().std_dev())
}

/// Mean and sample standard deviation of integer ratings, both rounded to two
/// decimals. Independent of sample order.
pub fn describe(ratings: &[i64]) -> (Option<f64>, Option<f64>) {
    let values: Vec<f64> = ratings.iter().map(|&r| r as f64).collect();
    (
        mean(&values).map(round2),
        sample_std_dev(&values).map(round2),
    )
}

/// Aggregate over per-stimulus means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeanSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Summarize a set of means; `None` when there are none.
pub fn summarize_means(means: &[f64]) -> Option<MeanSummary> {
    let mean = mean(means)?;
    Some(MeanSummary {
        count: means.len(),
        mean,
        min: means.iter().copied().fold(f64::INFINITY, f64::min),
        max: means.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}
