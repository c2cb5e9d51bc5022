//! Memory capacity checks for a planned batch

use serde::Serialize;
use sysinfo::{System, SystemExt};
use tracing::{debug, warn};

/// Working-set multiplier applied to the encoded input size
const PROCESSING_OVERHEAD: f64 = 3.0;

/// Share of available memory a batch may use
const AVAILABLE_SHARE: f64 = 0.5;

/// Budget used when available memory cannot be read
const CONSERVATIVE_LIMIT_MB: f64 = 500.0;

const MB: f64 = 1024.0 * 1024.0;

/// Result of a memory capacity check
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryCheck {
    pub can_process: bool,
    pub estimated_memory_mb: f64,
    pub available_memory_mb: f64,
    pub recommendation: String,
}

/// Estimate whether `count` items averaging `avg_bytes` fit in memory
///
/// With a known `available_bytes` the budget is half of it, otherwise a
/// conservative 500MB.
#[allow(clippy::cast_precision_loss)]
pub fn check_memory_capacity(
    count: usize,
    avg_bytes: u64,
    available_bytes: Option<u64>,
) -> MemoryCheck {
    let estimated = count as f64 * avg_bytes as f64 * PROCESSING_OVERHEAD / MB;

    let (budget, fine) = match available_bytes {
        Some(bytes) => (
            bytes as f64 / MB * AVAILABLE_SHARE,
            "Memory capacity is sufficient",
        ),
        None => (CONSERVATIVE_LIMIT_MB, "Should be fine to process"),
    };

    let can_process = estimated < budget;
    let recommendation = if estimated > budget {
        "Consider processing in smaller batches"
    } else {
        fine
    };

    debug!(
        "Memory check: {:.1}MB estimated, {:.1}MB budget",
        estimated, budget
    );

    MemoryCheck {
        can_process,
        estimated_memory_mb: estimated,
        available_memory_mb: budget,
        recommendation: recommendation.to_string(),
    }
}

/// Available system memory in bytes, if it can be read
pub fn available_memory() -> Option<u64> {
    let mut system = System::new();
    system.refresh_memory();
    match system.available_memory() {
        0 => {
            warn!("Could not read available memory, using conservative limit");
            None
        }
        bytes => Some(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_fits_in_known_memory() {
        let check = check_memory_capacity(10, 2 * 1024 * 1024, Some(8 * GB));
        assert!(check.can_process);
        assert!((check.estimated_memory_mb - 60.0).abs() < 1e-9);
        assert!((check.available_memory_mb - 4096.0).abs() < 1e-9);
        assert_eq!(check.recommendation, "Memory capacity is sufficient");
    }

    #[test]
    fn test_exceeds_known_memory() {
        let check = check_memory_capacity(100, 50 * 1024 * 1024, Some(GB));
        assert!(!check.can_process);
        assert_eq!(check.recommendation, "Consider processing in smaller batches");
    }

    #[test]
    fn test_conservative_limit_when_unknown() {
        let check = check_memory_capacity(10, 1024 * 1024, None);
        assert!(check.can_process);
        assert!((check.available_memory_mb - 500.0).abs() < 1e-9);
        assert_eq!(check.recommendation, "Should be fine to process");

        let check = check_memory_capacity(200, 1024 * 1024, None);
        assert!(!check.can_process);
    }

    #[test]
    fn test_empty_batch() {
        let check = check_memory_capacity(0, 0, None);
        assert!(check.can_process);
        assert_eq!(check.estimated_memory_mb, 0.0);
    }
}
