//! Processing time estimates

use serde::Serialize;

use crate::config::{OutputFormat, ProcessingOptions};
use crate::processing::WorkItem;

/// Baseline cost in milliseconds per megabyte of input
const BASE_MS_PER_MB: f64 = 100.0;

/// Extra cost of lossless PNG output
const PNG_FACTOR: f64 = 1.3;

/// Estimated processing time for a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEstimate {
    pub estimated_time_ms: f64,
    pub estimated_time_seconds: u64,
    pub estimated_time_formatted: String,
}

/// Estimate how long a batch takes to resize locally
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn estimate_processing_time(items: &[WorkItem], options: &ProcessingOptions) -> TimeEstimate {
    let total_bytes: u64 = items.iter().map(WorkItem::size).sum();

    let mut ms_per_mb = BASE_MS_PER_MB * options.algorithm.time_factor();
    if options.format == OutputFormat::Png {
        ms_per_mb *= PNG_FACTOR;
    }

    let total_mb = total_bytes as f64 / (1024.0 * 1024.0);
    let estimated_time_ms = total_mb * ms_per_mb;

    TimeEstimate {
        estimated_time_ms,
        estimated_time_seconds: (estimated_time_ms / 1000.0).round() as u64,
        estimated_time_formatted: format_estimate(estimated_time_ms),
    }
}

/// `Nms` below a second, `Ns` below a minute, otherwise `Xm Ys`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_estimate(ms: f64) -> String {
    let ms = ms.max(0.0);
    if ms < 1000.0 {
        return format!("{}ms", ms.round() as u64);
    }
    if ms < 60_000.0 {
        return format!("{}s", (ms / 1000.0).round() as u64);
    }

    let minutes = (ms / 60_000.0).floor() as u64;
    let seconds = ((ms % 60_000.0) / 1000.0).round() as u64;
    format!("{}m {}s", minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResizeAlgorithm;

    fn items_of(total_mb: usize, count: usize) -> Vec<WorkItem> {
        (0..count)
            .map(|i| {
                WorkItem::new(
                    format!("{}.jpg", i),
                    vec![0u8; total_mb * 1024 * 1024 / count],
                    "image/jpeg",
                )
            })
            .collect()
    }

    #[test]
    fn test_algorithm_factor() {
        let items = items_of(10, 2);
        let options = ProcessingOptions::new(Some(100), None).algorithm(ResizeAlgorithm::Lanczos);
        let estimate = estimate_processing_time(&items, &options);
        assert!((estimate.estimated_time_ms - 1500.0).abs() < 1e-6);
        assert_eq!(estimate.estimated_time_seconds, 2);
        assert_eq!(estimate.estimated_time_formatted, "2s");

        let options = options.algorithm(ResizeAlgorithm::Nearest);
        let estimate = estimate_processing_time(&items, &options);
        assert!((estimate.estimated_time_ms - 800.0).abs() < 1e-6);
        assert_eq!(estimate.estimated_time_formatted, "800ms");
    }

    #[test]
    fn test_png_factor() {
        let items = items_of(10, 1);
        let options = ProcessingOptions::new(Some(100), None)
            .algorithm(ResizeAlgorithm::Bilinear)
            .format(OutputFormat::Png);
        let estimate = estimate_processing_time(&items, &options);
        assert!((estimate.estimated_time_ms - 1300.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_batch() {
        let estimate = estimate_processing_time(&[], &ProcessingOptions::default());
        assert_eq!(estimate.estimated_time_ms, 0.0);
        assert_eq!(estimate.estimated_time_formatted, "0ms");
    }

    #[test]
    fn test_format_estimate() {
        assert_eq!(format_estimate(999.4), "999ms");
        assert_eq!(format_estimate(45_000.0), "45s");
        assert_eq!(format_estimate(125_000.0), "2m 5s");
    }
}
