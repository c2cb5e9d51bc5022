//! Advanced batch metrics and the overall efficiency rating
//!
//! Every metric is a pure function rounded to one decimal and clamped to `0..=100`.

use serde::Serialize;

use crate::analytics::{round1, FormatShare, SizeChange};

const MB: f64 = 1024.0 * 1024.0;

/// Sub-metrics reported alongside the summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedMetrics {
    pub compression_efficiency: f64,
    pub processing_consistency: f64,
    pub format_optimization: f64,
    pub resource_utilization: f64,
    pub quality_preservation: f64,
    pub batch_efficiency: f64,
}

/// Population variance; zero for an empty slice
#[allow(clippy::cast_precision_loss)]
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// `100 - variance(ratios)`; zero without ratios
pub fn compression_efficiency(ratios: &[f64]) -> f64 {
    if ratios.is_empty() {
        return 0.0;
    }
    round1((100.0 - population_variance(ratios)).max(0.0))
}

/// `100 - variance(per-item ms) / 1000` over positive timings; 100 without timings
pub fn processing_consistency(timings_ms: &[f64]) -> f64 {
    let times: Vec<f64> = timings_ms.iter().copied().filter(|t| *t > 0.0).collect();
    if times.is_empty() {
        return 100.0;
    }
    round1((100.0 - population_variance(&times) / 1000.0).max(0.0))
}

fn format_weight(label: &str) -> f64 {
    match label {
        "WEBP" => 1.5,
        "JPEG" => 1.2,
        "PNG" => 1.0,
        _ => 0.8,
    }
}

/// Share-weighted format score favoring modern codecs
pub fn format_optimization(distribution: &[FormatShare]) -> f64 {
    let score: f64 = distribution
        .iter()
        .map(|share| f64::from(share.percentage) * format_weight(share.label))
        .sum();
    round1(score.min(100.0))
}

/// Input MB/s scaled by ten
#[allow(clippy::cast_precision_loss)]
pub fn resource_utilization(total_original_bytes: u64, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    let throughput = total_original_bytes as f64 / MB / seconds;
    round1((throughput * 10.0).min(100.0))
}

/// `100 - mean |ratio|`, items without a ratio counting as zero
#[allow(clippy::cast_precision_loss)]
pub fn quality_preservation(ratios: &[Option<f64>]) -> f64 {
    if ratios.is_empty() {
        return 0.0;
    }
    let mean = ratios.iter().map(|r| r.unwrap_or(0.0).abs()).sum::<f64>() / ratios.len() as f64;
    round1((100.0 - mean).max(0.0))
}

/// Items/s scaled by twenty
#[allow(clippy::cast_precision_loss)]
pub fn batch_efficiency(successful: usize, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    round1((successful as f64 / seconds * 20.0).min(100.0))
}

/// Overall efficiency bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum EfficiencyRating {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl EfficiencyRating {
    /// Rate a batch from throughput, size change and input volume
    pub fn rate(items_per_second: f64, size_change: SizeChange, total_original_bytes: u64) -> Self {
        let speed = if items_per_second > 1.0 {
            3
        } else if items_per_second > 0.5 {
            2
        } else {
            1
        };
        let size = match size_change {
            SizeChange::Reduced => 3,
            SizeChange::Increased => 2,
            SizeChange::Unchanged => 1,
        };
        let memory = if total_original_bytes < 50 * 1024 * 1024 {
            3
        } else if total_original_bytes < 200 * 1024 * 1024 {
            2
        } else {
            1
        };

        match speed + size + memory {
            s if s >= 8 => Self::Excellent,
            s if s >= 6 => Self::Good,
            s if s >= 4 => Self::Fair,
            _ => Self::Poor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Poor => "Poor",
            Self::Fair => "Fair",
            Self::Good => "Good",
            Self::Excellent => "Excellent",
        }
    }
}
