//! Latency statistics over a completed sample series

use crate::{
    models::{OutcomeCounts, SampleSeries},
    types::LatencyLevel,
};
use serde::{Deserialize, Serialize};

/// Summary of one run
///
/// All times are in milliseconds. Timing fields are 0 when no pong matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStatistics {
    /// Number of recorded samples
    pub sample_count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    /// Sample standard deviation
    pub std_dev_ms: f64,
    /// Mean absolute difference between consecutive round trips
    pub jitter_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
    /// Matched iterations as a percentage of all iterations
    pub success_rate: f64,
    pub outcomes: OutcomeCounts,
    pub distribution: LatencyDistribution,
    /// Samples outside 1.5 IQR of the quartiles
    pub outlier_count: usize,
}

/// Share of samples per latency level, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyDistribution {
    pub excellent_percentage: f64,
    pub good_percentage: f64,
    pub fair_percentage: f64,
    pub poor_percentage: f64,
}

impl LatencyStatistics {
    pub fn from_series(series: &SampleSeries, outcomes: &OutcomeCounts) -> Self {
        let values = series.rtts_ms();
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = mean(&values);

        Self {
            sample_count: values.len(),
            min_ms: sorted.first().copied().unwrap_or(0.0),
            max_ms: sorted.last().copied().unwrap_or(0.0),
            mean_ms: mean,
            std_dev_ms: standard_deviation(&values, mean),
            jitter_ms: jitter(&values),
            p50_ms: percentile(&sorted, 50.0),
            p90_ms: percentile(&sorted, 90.0),
            p99_ms: percentile(&sorted, 99.0),
            success_rate: outcomes.success_rate(),
            outcomes: *outcomes,
            distribution: distribution(&values),
            outlier_count: count_outliers(&sorted),
        }
    }

    pub fn has_samples(&self) -> bool {
        self.sample_count > 0
    }

    /// Level of the mean round trip, if anything matched
    pub fn latency_level(&self) -> Option<LatencyLevel> {
        self.has_samples().then(|| LatencyLevel::from_rtt_ms(self.mean_ms))
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn standard_deviation(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }

    let variance = values.iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>() / (values.len() - 1) as f64;

    variance.sqrt()
}

/// Linear interpolation between closest ranks; `sorted_values` must be sorted
pub fn percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let lower_value = sorted_values[lower_index];
        let upper_value = sorted_values[upper_index];
        let weight = index - lower_index as f64;
        lower_value + weight * (upper_value - lower_value)
    }
}

/// Values in send order
fn jitter(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let total: f64 = values.windows(2).map(|pair| (pair[1] - pair[0]).abs()).sum();
    total / (values.len() - 1) as f64
}

fn distribution(values: &[f64]) -> LatencyDistribution {
    if values.is_empty() {
        return LatencyDistribution::default();
    }

    let (mut excellent, mut good, mut fair, mut poor) = (0usize, 0usize, 0usize, 0usize);
    for &value in values {
        match LatencyLevel::from_rtt_ms(value) {
            LatencyLevel::Excellent => excellent += 1,
            LatencyLevel::Good => good += 1,
            LatencyLevel::Fair => fair += 1,
            LatencyLevel::Poor => poor += 1,
        }
    }

    let total = values.len() as f64;
    LatencyDistribution {
        excellent_percentage: excellent as f64 / total * 100.0,
        good_percentage: good as f64 / total * 100.0,
        fair_percentage: fair as f64 / total * 100.0,
        poor_percentage: poor as f64 / total * 100.0,
    }
}

fn count_outliers(sorted_values: &[f64]) -> usize {
    if sorted_values.len() < 4 {
        return 0;
    }

    let q1 = percentile(sorted_values, 25.0);
    let q3 = percentile(sorted_values, 75.0);
    let iqr = q3 - q1;
    let lower_bound = q1 - 1.5 * iqr;
    let upper_bound = q3 + 1.5 * iqr;

    sorted_values.iter()
        .filter(|&&x| x < lower_bound || x > upper_bound)
        .count()
}
