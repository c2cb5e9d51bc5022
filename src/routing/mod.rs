//! Remote vs local routing decisions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProcessingOptions;
use crate::error::HybridResizeError;
use crate::processing::WorkItem;

pub mod fallback;
pub mod health;

pub use fallback::*;
pub use health::*;

const MB: f64 = 1024.0 * 1024.0;

// Remote advantages
const REMOTE_REACHABLE_POINTS: u32 = 20;
const REMOTE_FAST_POINTS: u32 = 15;
const LARGE_BATCH_POINTS: u32 = 10;
const LARGE_TOTAL_POINTS: u32 = 15;
const LARGE_AVERAGE_POINTS: u32 = 10;
const COSTLY_OUTPUT_POINTS: u32 = 10;
const COMPLEX_OPTIONS_POINTS: u32 = 15;

// Local advantages
const REMOTE_UNREACHABLE_POINTS: u32 = 50;
const REMOTE_SLOW_POINTS: u32 = 20;
const SMALL_BATCH_POINTS: u32 = 15;
const SMALL_TOTAL_POINTS: u32 = 10;
const SMALL_AVERAGE_POINTS: u32 = 10;

const FAST_LATENCY_MS: u64 = 2000;
const SLOW_LATENCY_MS: u64 = 3000;
const LARGE_BATCH_ITEMS: usize = 5;
const SMALL_BATCH_ITEMS: usize = 3;
const LARGE_TOTAL_MB: f64 = 50.0;
const SMALL_TOTAL_MB: f64 = 20.0;
const LARGE_AVERAGE_MB: f64 = 5.0;
const SMALL_AVERAGE_MB: f64 = 2.0;

/// Clause emitted when no scoring condition favoured the chosen path
pub const BALANCED_CLAUSE: &str = "Balanced performance characteristics";

/// Where a batch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPath {
    Local,
    Remote,
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// How the execution path is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Score both paths
    #[default]
    Auto,
    /// Always run locally without probing
    Local,
    /// Always try remote first, still falling back on failure
    Remote,
}

impl FromStr for RoutingMode {
    type Err = HybridResizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "local" | "client" => Ok(Self::Local),
            "remote" | "server" => Ok(Self::Remote),
            other => Err(HybridResizeError::config(format!(
                "Unknown routing mode '{}'. Use auto, local or remote",
                other
            ))),
        }
    }
}

/// Shape of a batch as seen by the routing engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Workload {
    pub item_count: usize,
    pub total_bytes: u64,
    pub avg_item_bytes: u64,
    /// PNG output or the Lanczos filter
    pub size_costly: bool,
    /// Watermark or quality below 0.7
    pub complex: bool,
}

impl Workload {
    /// Describe a batch and its options
    pub fn from_batch(items: &[WorkItem], options: &ProcessingOptions) -> Self {
        let total_bytes: u64 = items.iter().map(WorkItem::size).sum();
        Self::new(items.len(), total_bytes, options)
    }

    /// Describe a batch from its item count and byte total
    pub fn new(item_count: usize, total_bytes: u64, options: &ProcessingOptions) -> Self {
        let avg_item_bytes = total_bytes.checked_div(item_count as u64).unwrap_or(0);
        Self {
            item_count,
            total_bytes,
            avg_item_bytes,
            size_costly: options.is_size_costly(),
            complex: options.is_complex(),
        }
    }
}

/// Inputs to the scoring table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingFactors {
    pub remote_available: bool,
    pub remote_latency_ms: Option<u64>,
    pub item_count: usize,
    pub total_mb: f64,
    pub avg_mb: f64,
    pub size_costly: bool,
    pub complex_processing: bool,
    pub deployment_unavailable: bool,
}

impl RoutingFactors {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(workload: &Workload, health: &HealthSample) -> Self {
        Self {
            remote_available: health.available,
            remote_latency_ms: health.latency_ms(),
            item_count: workload.item_count,
            total_mb: workload.total_bytes as f64 / MB,
            avg_mb: workload.avg_item_bytes as f64 / MB,
            size_costly: workload.size_costly,
            complex_processing: workload.complex,
            deployment_unavailable: health.deployment_unavailable,
        }
    }

    fn latency_below(&self, ms: u64) -> bool {
        self.remote_latency_ms.map_or(false, |latency| latency < ms)
    }

    fn latency_above(&self, ms: u64) -> bool {
        self.remote_latency_ms.map_or(false, |latency| latency > ms)
    }
}

/// The chosen path with its scores and the clauses that justify it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub chosen_path: ExecutionPath,
    pub local_score: u32,
    pub remote_score: u32,
    pub factors: RoutingFactors,
    pub reasoning: Vec<String>,
}

impl RoutingDecision {
    /// Reasoning clauses joined with `; `
    pub fn reasoning_text(&self) -> String {
        self.reasoning.join("; ")
    }
}

struct Rule {
    side: ExecutionPath,
    points: u32,
    clause: &'static str,
    applies: fn(&RoutingFactors) -> bool,
}

const RULES: [Rule; 12] = [
    Rule {
        side: ExecutionPath::Remote,
        points: REMOTE_REACHABLE_POINTS,
        clause: "Remote server is reachable",
        applies: |f| f.remote_available,
    },
    Rule {
        side: ExecutionPath::Remote,
        points: REMOTE_FAST_POINTS,
        clause: "Remote server responds quickly",
        applies: |f| f.latency_below(FAST_LATENCY_MS),
    },
    Rule {
        side: ExecutionPath::Remote,
        points: LARGE_BATCH_POINTS,
        clause: "Large batch size benefits from remote processing",
        applies: |f| f.item_count > LARGE_BATCH_ITEMS,
    },
    Rule {
        side: ExecutionPath::Remote,
        points: LARGE_TOTAL_POINTS,
        clause: "Large total file size is better handled remotely",
        applies: |f| f.total_mb > LARGE_TOTAL_MB,
    },
    Rule {
        side: ExecutionPath::Remote,
        points: LARGE_AVERAGE_POINTS,
        clause: "Large average file size benefits from remote processing",
        applies: |f| f.avg_mb > LARGE_AVERAGE_MB,
    },
    Rule {
        side: ExecutionPath::Remote,
        points: COSTLY_OUTPUT_POINTS,
        clause: "High-cost formats or algorithms benefit from remote optimization",
        applies: |f| f.size_costly,
    },
    Rule {
        side: ExecutionPath::Remote,
        points: COMPLEX_OPTIONS_POINTS,
        clause: "Complex processing operations are optimized remotely",
        applies: |f| f.complex_processing,
    },
    Rule {
        side: ExecutionPath::Local,
        points: REMOTE_UNREACHABLE_POINTS,
        clause: "Remote server is not available",
        applies: |f| !f.remote_available,
    },
    Rule {
        side: ExecutionPath::Local,
        points: REMOTE_SLOW_POINTS,
        clause: "Remote server response time is too slow",
        applies: |f| f.latency_above(SLOW_LATENCY_MS),
    },
    Rule {
        side: ExecutionPath::Local,
        points: SMALL_BATCH_POINTS,
        clause: "Small batch size is efficient locally",
        applies: |f| f.item_count <= SMALL_BATCH_ITEMS,
    },
    Rule {
        side: ExecutionPath::Local,
        points: SMALL_TOTAL_POINTS,
        clause: "Small file sizes can be processed locally",
        applies: |f| f.total_mb < SMALL_TOTAL_MB,
    },
    Rule {
        side: ExecutionPath::Local,
        points: SMALL_AVERAGE_POINTS,
        clause: "Small average file size is efficient locally",
        applies: |f| f.avg_mb < SMALL_AVERAGE_MB,
    },
];

/// Pure scoring engine choosing between remote and local execution
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingEngine;

impl RoutingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score both paths; ties go to local
    pub fn decide(&self, workload: &Workload, health: &HealthSample) -> RoutingDecision {
        let factors = RoutingFactors::new(workload, health);

        let (mut local_score, mut remote_score) = (0, 0);
        for rule in RULES.iter().filter(|rule| (rule.applies)(&factors)) {
            match rule.side {
                ExecutionPath::Local => local_score += rule.points,
                ExecutionPath::Remote => remote_score += rule.points,
            }
        }

        let chosen_path = if remote_score > local_score {
            ExecutionPath::Remote
        } else {
            ExecutionPath::Local
        };

        let reasoning = reasoning(chosen_path, &factors);

        debug!(
            "Routing: local={} remote={} -> {}",
            local_score, remote_score, chosen_path
        );

        RoutingDecision {
            chosen_path,
            local_score,
            remote_score,
            factors,
            reasoning,
        }
    }
}

/// Clauses of every applicable rule scoring for `path`, in table order
fn reasoning(path: ExecutionPath, factors: &RoutingFactors) -> Vec<String> {
    let clauses: Vec<String> = RULES
        .iter()
        .filter(|rule| rule.side == path && (rule.applies)(factors))
        .map(|rule| rule.clause.to_string())
        .collect();

    if clauses.is_empty() {
        vec![BALANCED_CLAUSE.to_string()]
    } else {
        clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputFormat, ResizeAlgorithm, Watermark};
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    fn plain_options() -> ProcessingOptions {
        ProcessingOptions::new(Some(800), None)
            .format(OutputFormat::Jpeg)
            .algorithm(ResizeAlgorithm::Bilinear)
    }

    fn workload(count: usize, total_bytes: u64, options: &ProcessingOptions) -> Workload {
        Workload::new(count, total_bytes, options)
    }

    #[test]
    fn test_unreachable_small_batch_goes_local() {
        let decision = RoutingEngine::new().decide(
            &workload(2, 2 * MIB, &plain_options()),
            &HealthSample::unreachable("connection refused"),
        );
        assert_eq!(decision.chosen_path, ExecutionPath::Local);
        assert_eq!(decision.remote_score, 0);
        assert_eq!(decision.local_score, 50 + 15 + 10 + 10);
        assert_eq!(decision.reasoning[0], "Remote server is not available");
        assert_eq!(
            decision.reasoning,
            vec![
                "Remote server is not available",
                "Small batch size is efficient locally",
                "Small file sizes can be processed locally",
                "Small average file size is efficient locally",
            ]
        );
    }

    #[test]
    fn test_fast_remote_large_complex_batch_goes_remote() {
        let options = ProcessingOptions::new(Some(800), None)
            .format(OutputFormat::Png)
            .algorithm(ResizeAlgorithm::Lanczos)
            .watermark(Watermark::text("(c)"));
        let decision = RoutingEngine::new().decide(
            &workload(20, 120 * MIB, &options),
            &HealthSample::reachable(Duration::from_millis(400), 200),
        );
        assert_eq!(decision.chosen_path, ExecutionPath::Remote);
        assert_eq!(decision.remote_score, 20 + 15 + 10 + 15 + 10 + 10 + 15);
        assert_eq!(decision.local_score, 0);
        assert_eq!(decision.reasoning.len(), 7);
        assert_eq!(decision.reasoning[0], "Remote server is reachable");
        assert_eq!(
            decision.reasoning[6],
            "Complex processing operations are optimized remotely"
        );
    }

    #[test]
    fn test_tie_goes_local() {
        // remote: reachable 20 + fast 15 = 35
        // local: small batch 15 + small total 10 + small average 10 = 35
        let decision = RoutingEngine::new().decide(
            &workload(3, 3 * MIB, &plain_options()),
            &HealthSample::reachable(Duration::from_millis(100), 200),
        );
        assert_eq!(decision.remote_score, decision.local_score);
        assert_eq!(decision.chosen_path, ExecutionPath::Local);
    }

    #[test]
    fn test_slow_remote_scores_local() {
        let decision = RoutingEngine::new().decide(
            &workload(4, 12 * MIB, &plain_options()),
            &HealthSample::reachable(Duration::from_millis(3500), 200),
        );
        assert_eq!(decision.remote_score, 20);
        assert_eq!(decision.local_score, 20 + 10);
        assert_eq!(decision.chosen_path, ExecutionPath::Local);
        assert_eq!(
            decision.reasoning,
            vec![
                "Remote server response time is too slow",
                "Small file sizes can be processed locally",
            ]
        );
    }

    #[test]
    fn test_unmeasured_latency_scores_nothing() {
        let mut health = HealthSample::reachable(Duration::from_millis(10), 200);
        health.latency = None;
        let decision = RoutingEngine::new().decide(&workload(4, 30 * MIB, &plain_options()), &health);
        assert_eq!(decision.remote_score, 20 + 10);
        assert_eq!(decision.local_score, 0);
        assert_eq!(decision.chosen_path, ExecutionPath::Remote);
        assert_eq!(
            decision.reasoning,
            vec![
                "Remote server is reachable",
                "Large average file size benefits from remote processing",
            ]
        );
    }

    #[test]
    fn test_unreachable_remote_earns_no_latency_points() {
        // remote: 8 items 10 + 60MB total 15 + 7.5MB average 10, no reachable or fast-response points
        let decision = RoutingEngine::new().decide(
            &workload(8, 60 * MIB, &plain_options()),
            &HealthSample::unreachable("timed out"),
        );
        assert_eq!(decision.factors.remote_latency_ms, None);
        assert_eq!(decision.remote_score, 10 + 15 + 10);
        assert_eq!(decision.local_score, 50);
        assert_eq!(decision.chosen_path, ExecutionPath::Local);
        assert_eq!(decision.reasoning, vec!["Remote server is not available"]);
    }

    #[test]
    fn test_balanced_clause_when_chosen_side_scored_nothing() {
        let factors = RoutingFactors {
            remote_available: true,
            remote_latency_ms: Some(2500),
            item_count: 4,
            total_mb: 30.0,
            avg_mb: 7.5,
            size_costly: false,
            complex_processing: false,
            deployment_unavailable: false,
        };
        assert_eq!(reasoning(ExecutionPath::Local, &factors), vec![BALANCED_CLAUSE]);
        assert_eq!(
            reasoning(ExecutionPath::Remote, &factors),
            vec!["Remote server is reachable", "Large average file size benefits from remote processing"]
        );
    }

    #[test]
    fn test_empty_workload() {
        let wl = workload(0, 0, &plain_options());
        assert_eq!(wl.avg_item_bytes, 0);
        let decision = RoutingEngine::new().decide(&wl, &HealthSample::unreachable("down"));
        assert_eq!(decision.chosen_path, ExecutionPath::Local);
    }

    #[test]
    fn test_decision_is_deterministic() {
        let wl = workload(8, 60 * MIB, &plain_options());
        let health = HealthSample::reachable(Duration::from_millis(900), 200);
        let engine = RoutingEngine::new();
        assert_eq!(engine.decide(&wl, &health), engine.decide(&wl, &health));
    }

    #[test]
    fn test_routing_mode_parsing() {
        assert_eq!("auto".parse::<RoutingMode>().unwrap(), RoutingMode::Auto);
        assert_eq!("Remote".parse::<RoutingMode>().unwrap(), RoutingMode::Remote);
        assert_eq!("client".parse::<RoutingMode>().unwrap(), RoutingMode::Local);
        assert!("fastest".parse::<RoutingMode>().is_err());
    }

    #[test]
    fn test_reasoning_text() {
        let decision = RoutingEngine::new().decide(
            &workload(1, MIB, &plain_options()),
            &HealthSample::unreachable("down"),
        );
        assert!(decision
            .reasoning_text()
            .starts_with("Remote server is not available; "));
    }
}
