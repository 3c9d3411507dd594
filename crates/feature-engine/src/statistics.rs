//! Statistical Helpers for Delay Targets

use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Consistency constant relating the MAD to the standard deviation of a normal distribution
pub const ROBUST_ZSCORE_SCALE: f64 = 0.6745;

/// Arithmetic mean, 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

/// Sample standard deviation, 0.0 when fewer than two values are present
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().std_dev()
}

/// Median (average of the two middle values for even lengths), 0.0 when empty
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    Data::new(values.to_vec()).median()
}

/// Median absolute deviation from `center` (scale factor 1.0)
fn median_abs_deviation(values: &[f64], center: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// `(x - center) / spread`, signed infinity off-center when the spread is zero
fn scaled_deviation(x: f64, center: f64, spread: f64) -> f64 {
    let deviation = x - center;
    if spread > 0.0 {
        deviation / spread
    } else if deviation == 0.0 {
        0.0
    } else {
        deviation.signum() * f64::INFINITY
    }
}

/// Standard z-score of every value.
///
/// Without spread, values at the mean score 0.0 and every other value scores
/// an infinity of its sign.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    let mean = mean(values);
    let std_dev = std_dev(values);
    values
        .iter()
        .map(|&v| scaled_deviation(v, mean, std_dev))
        .collect()
}

/// Robust z-score: `0.6745 * (x - median) / MAD`, with the same zero-spread
/// handling as `zscore`.
pub fn robust_zscore(values: &[f64]) -> Vec<f64> {
    let median = median(values);
    let mad = median_abs_deviation(values, median);
    values
        .iter()
        .map(|&v| ROBUST_ZSCORE_SCALE * scaled_deviation(v, median, mad))
        .collect()
}

/// Round to a fixed number of decimal places, halves to even
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
