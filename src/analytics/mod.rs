//! Batch analytics: reduces per-item outcomes to a summary report

pub mod advanced;
pub mod display;

pub use advanced::*;
pub use display::*;

use serde::Serialize;

use crate::processing::Outcome;

const NO_DATA: &str = "No Data";

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Direction of the total size change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeChange {
    Reduced,
    Increased,
    Unchanged,
}

impl SizeChange {
    /// Classify `original - new`
    pub fn from_delta(delta: i64) -> Self {
        match delta {
            d if d > 0 => Self::Reduced,
            d if d < 0 => Self::Increased,
            _ => Self::Unchanged,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Reduced => "Size Reduced",
            Self::Increased => "Size Increased",
            Self::Unchanged => "Size Unchanged",
        }
    }

    /// Impact label from the class and the absolute change percentage
    pub fn quality_impact(self, abs_percentage: f64) -> &'static str {
        match self {
            Self::Increased if abs_percentage > 50.0 => "High Quality",
            Self::Increased if abs_percentage > 20.0 => "Enhanced Quality",
            Self::Increased => "Quality Preserved",
            Self::Reduced if abs_percentage > 70.0 => "Aggressive Compression",
            Self::Reduced if abs_percentage > 40.0 => "Good Compression",
            Self::Reduced if abs_percentage > 10.0 => "Mild Compression",
            Self::Reduced => "Minimal Change",
            Self::Unchanged => "No Change",
        }
    }
}

/// Share of one output format among successful items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatShare {
    pub label: &'static str,
    pub count: usize,
    pub percentage: u32,
}

/// Read-only summary of one batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: u32,

    pub total_original_size: u64,
    pub total_processed_size: u64,
    /// `total_original_size - total_processed_size`
    pub size_delta: i64,
    pub size_change: SizeChange,
    pub size_change_label: &'static str,
    pub size_change_display: String,
    pub size_change_percentage: f64,
    pub size_change_percentage_display: String,
    pub quality_impact: &'static str,

    pub processing_time_seconds: f64,
    pub processing_time_display: String,
    pub items_per_second: f64,
    pub total_megapixels: f64,
    pub megapixel_throughput: f64,

    pub average_compression: f64,
    pub best_compression: f64,
    pub worst_compression: f64,

    pub format_distribution: Vec<FormatShare>,

    pub original_total_display: String,
    pub processed_total_display: String,
    pub average_file_size_display: String,
    pub memory_used_display: String,

    pub efficiency: &'static str,
    pub advanced: AdvancedMetrics,
}

impl AnalyticsReport {
    /// Report for a batch with no successful item
    pub fn empty() -> Self {
        let zero_size = format_file_size(0.0);
        Self {
            total_files: 0,
            successful: 0,
            failed: 0,
            success_rate: 0,
            total_original_size: 0,
            total_processed_size: 0,
            size_delta: 0,
            size_change: SizeChange::Unchanged,
            size_change_label: NO_DATA,
            size_change_display: zero_size.clone(),
            size_change_percentage: 0.0,
            size_change_percentage_display: "0.0%".to_string(),
            quality_impact: NO_DATA,
            processing_time_seconds: 0.0,
            processing_time_display: format_processing_time(0.0),
            items_per_second: 0.0,
            total_megapixels: 0.0,
            megapixel_throughput: 0.0,
            average_compression: 0.0,
            best_compression: 0.0,
            worst_compression: 0.0,
            format_distribution: Vec::new(),
            original_total_display: zero_size.clone(),
            processed_total_display: zero_size.clone(),
            average_file_size_display: zero_size.clone(),
            memory_used_display: zero_size,
            efficiency: NO_DATA,
            advanced: AdvancedMetrics::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.successful == 0
    }
}

/// Summarize a batch; never fails
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn summarize(outcomes: &[Outcome], elapsed_ms: f64) -> AnalyticsReport {
    let successful: Vec<_> = outcomes.iter().filter_map(Outcome::as_success).collect();
    if successful.is_empty() {
        return AnalyticsReport::empty();
    }

    let success_count = successful.len();
    let total_files = outcomes.len();
    let failed = total_files - success_count;
    let success_rate = (success_count as f64 / total_files as f64 * 100.0).round() as u32;

    let total_original: u64 = successful.iter().map(|s| s.original_size).sum();
    let total_processed: u64 = successful.iter().map(|s| s.new_size).sum();
    let size_delta = total_original as i64 - total_processed as i64;
    let size_change = SizeChange::from_delta(size_delta);

    let size_change_percentage = if total_original > 0 {
        round1(size_delta as f64 / total_original as f64 * 100.0)
    } else {
        0.0
    };
    let abs_percentage = size_change_percentage.abs();

    let (size_change_display, size_change_percentage_display) = match size_change {
        SizeChange::Reduced => (
            format!("-{}", format_file_size(size_delta as f64)),
            format!("-{:.1}%", abs_percentage),
        ),
        SizeChange::Increased => (
            format!("+{}", format_file_size(size_delta.unsigned_abs() as f64)),
            format!("+{:.1}%", abs_percentage),
        ),
        SizeChange::Unchanged => (format_file_size(0.0), "0.0%".to_string()),
    };

    let ratios: Vec<f64> = successful
        .iter()
        .filter_map(|s| s.compression_ratio_percent)
        .collect();
    let (average_compression, best_compression, worst_compression) = if ratios.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let average = ratios.iter().sum::<f64>() / ratios.len() as f64;
        let best = ratios.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let worst = ratios.iter().copied().fold(f64::INFINITY, f64::min);
        (round1(average), round1(best), round1(worst))
    };

    let seconds = (elapsed_ms / 1000.0).max(0.0);
    let items_per_second = if seconds > 0.0 {
        round1(success_count as f64 / seconds)
    } else {
        0.0
    };
    let total_megapixels = round1(
        successful
            .iter()
            .map(|s| s.original_dimensions.pixels() as f64)
            .sum::<f64>()
            / 1_000_000.0,
    );
    let megapixel_throughput = if seconds > 0.0 {
        round1(total_megapixels / seconds)
    } else {
        0.0
    };

    let format_distribution = format_distribution(&successful);

    let timings: Vec<f64> = successful.iter().filter_map(|s| s.elapsed_ms).collect();
    let all_ratios: Vec<Option<f64>> = successful
        .iter()
        .map(|s| s.compression_ratio_percent)
        .collect();
    let advanced = AdvancedMetrics {
        compression_efficiency: compression_efficiency(&ratios),
        processing_consistency: processing_consistency(&timings),
        format_optimization: format_optimization(&format_distribution),
        resource_utilization: resource_utilization(total_original, seconds),
        quality_preservation: quality_preservation(&all_ratios),
        batch_efficiency: batch_efficiency(success_count, seconds),
    };

    AnalyticsReport {
        total_files,
        successful: success_count,
        failed,
        success_rate,
        total_original_size: total_original,
        total_processed_size: total_processed,
        size_delta,
        size_change,
        size_change_label: size_change.label(),
        size_change_display,
        size_change_percentage,
        size_change_percentage_display,
        quality_impact: size_change.quality_impact(abs_percentage),
        processing_time_seconds: seconds,
        processing_time_display: format_processing_time(seconds),
        items_per_second,
        total_megapixels,
        megapixel_throughput,
        average_compression,
        best_compression,
        worst_compression,
        format_distribution,
        original_total_display: format_file_size(total_original as f64),
        processed_total_display: format_file_size(total_processed as f64),
        average_file_size_display: format_file_size(total_original as f64 / success_count as f64),
        memory_used_display: format_file_size(total_original as f64 * 2.0),
        efficiency: EfficiencyRating::rate(items_per_second, size_change, total_original).label(),
        advanced,
    }
}

/// Output formats in first-seen order with their share of successful items
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_distribution(successful: &[&crate::processing::SuccessOutcome]) -> Vec<FormatShare> {
    let mut shares: Vec<FormatShare> = Vec::new();
    for outcome in successful {
        let label = outcome.format.label();
        match shares.iter_mut().find(|share| share.label == label) {
            Some(share) => share.count += 1,
            None => shares.push(FormatShare {
                label,
                count: 1,
                percentage: 0,
            }),
        }
    }

    for share in &mut shares {
        share.percentage = (share.count as f64 / successful.len() as f64 * 100.0).round() as u32;
    }
    shares
}
