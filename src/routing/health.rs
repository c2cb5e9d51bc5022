//! Remote health samples and probes

use std::time::Duration;

use async_trait::async_trait;

use crate::routing::ExecutionPath;

/// Latency below which a healthy remote is recommended
pub const RECOMMEND_REMOTE_BELOW: Duration = Duration::from_millis(1000);

/// One measurement of the remote capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSample {
    pub available: bool,
    /// Round-trip time, when a response arrived
    pub latency: Option<Duration>,
    pub status: Option<u16>,
    /// The service answered that it cannot process in this deployment
    pub deployment_unavailable: bool,
    pub error: Option<String>,
}

impl HealthSample {
    /// A reachable remote
    pub fn reachable(latency: Duration, status: u16) -> Self {
        Self {
            available: true,
            latency: Some(latency),
            status: Some(status),
            deployment_unavailable: false,
            error: None,
        }
    }

    /// A remote that could not be reached or timed out
    pub fn unreachable<S: Into<String>>(error: S) -> Self {
        Self {
            available: false,
            latency: None,
            status: None,
            deployment_unavailable: false,
            error: Some(error.into()),
        }
    }

    /// A remote that answered but is not deployed for processing
    pub fn deployment_unavailable(latency: Duration, status: u16) -> Self {
        Self {
            available: false,
            latency: Some(latency),
            status: Some(status),
            deployment_unavailable: true,
            error: Some("Remote functions not available in this deployment".to_string()),
        }
    }

    /// A remote that answered with an error status
    pub fn unhealthy(latency: Duration, status: u16) -> Self {
        Self {
            available: false,
            latency: Some(latency),
            status: Some(status),
            deployment_unavailable: false,
            error: Some(format!("Remote answered with status {}", status)),
        }
    }

    /// Latency in whole milliseconds
    #[allow(clippy::cast_possible_truncation)]
    pub fn latency_ms(&self) -> Option<u64> {
        self.latency.map(|l| l.as_millis() as u64)
    }

    /// Path suggested by this sample alone
    pub fn recommendation(&self) -> ExecutionPath {
        match self.latency {
            Some(latency) if self.available && latency < RECOMMEND_REMOTE_BELOW => {
                ExecutionPath::Remote
            }
            _ => ExecutionPath::Local,
        }
    }
}

/// Measures reachability and latency of the remote capability
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Sample health once; failures are reported as unreachable, never as errors
    async fn probe(&self) -> HealthSample;
}

/// Probe returning a fixed sample
#[derive(Debug, Clone)]
pub struct StaticHealth(pub HealthSample);

#[async_trait]
impl HealthProbe for StaticHealth {
    async fn probe(&self) -> HealthSample {
        self.0.clone()
    }
}
