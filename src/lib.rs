//! HybridResize - batch image resizing routed between a remote service and local processing
//!
//! A batch is validated, scored against live remote health, run on the chosen
//! path in bounded chunks, and summarized. When the remote path fails at the
//! batch level the whole batch is re-run locally.
//!
//! # Features
//!
//! - **Routing**: deterministic remote/local scoring with a reasoning trail
//! - **Chunked execution**: bounded concurrency, per-chunk progress, cancellation
//! - **Fallback**: one-level remote-to-local cascade
//! - **Analytics**: size, compression, throughput and efficiency summaries
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hybridresize::{build_cascade, summarize, Config, ProcessingOptions, WorkItem};
//! use hybridresize::parallel::NoProgress;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> hybridresize::Result<()> {
//! let config = Config::default();
//! let cascade = build_cascade(&config)?;
//! let items = vec![WorkItem::from_path("photo.jpg").await?];
//! let options = ProcessingOptions::new(Some(800), None);
//!
//! let started = std::time::Instant::now();
//! let outcome = cascade
//!     .execute(&items, &options, &NoProgress, &CancellationToken::new())
//!     .await?;
//! let report = summarize(&outcome.outcomes, started.elapsed().as_secs_f64() * 1000.0);
//! println!("{} via {}: {}", report.successful, outcome.path_used, report.efficiency);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analytics;
pub mod config;
pub mod error;
pub mod parallel;
pub mod processing;
pub mod remote;
pub mod routing;

use std::sync::Arc;
use std::time::Duration;

// Re-export commonly used types
pub use analytics::{summarize, AnalyticsReport};
pub use config::{Config, OutputFormat, ProcessingOptions, Quality, ResizeAlgorithm};
pub use error::{ErrorKind, HybridResizeError, Result};
pub use processing::{LocalResizer, Outcome, WorkItem};
pub use routing::{CascadeOutcome, ExecutionPath, FallbackCascade, RoutingDecision, RoutingMode};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Available memory below which a warning is logged
const LOW_MEMORY_BYTES: u64 = 512 * 1024 * 1024;

/// Initialize logging to stderr from `RUST_LOG`
///
/// Repeated calls are no-ops.
pub fn init() -> Result<()> {
    if tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
    {
        info!("HybridResize v{} initialized", VERSION);
    }

    check_system_memory();
    Ok(())
}

/// Initialize logging from the `logging` section of `config`
pub fn init_with_config(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.logging.level).map_err(|e| {
        HybridResizeError::config(format!(
            "Invalid log level '{}': {}",
            config.logging.level, e
        ))
    })?;

    let installed = if config.logging.json_format {
        tracing_subscriber::FmtSubscriber::builder()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    };

    if installed {
        info!("HybridResize v{} initialized with custom config", VERSION);
    }

    check_system_memory();
    Ok(())
}

/// Assemble the cascade described by `config`
///
/// With a remote base URL the HTTP transport serves both the health probe and
/// the remote runner; without one every batch routes local.
pub fn build_cascade(config: &Config) -> Result<FallbackCascade> {
    config.validate()?;

    let (probe, transport): (Arc<dyn routing::HealthProbe>, Arc<dyn remote::RemoteTransport>) =
        match config.remote.base_url {
            Some(_) => {
                let http = Arc::new(remote::HttpTransport::new(&config.remote)?);
                (http.clone(), http)
            }
            None => (
                Arc::new(remote::UnconfiguredTransport),
                Arc::new(remote::UnconfiguredTransport),
            ),
        };

    let remote_runner = remote::RemoteRunner::from_config(transport, &config.remote)
        .with_chunk_yield(Duration::from_millis(config.processing.remote_chunk_yield_ms));
    let local_runner = routing::LocalRunner::new()
        .with_chunk_yield(Duration::from_millis(config.processing.local_chunk_yield_ms));

    Ok(FallbackCascade::new(probe, Arc::new(remote_runner), Arc::new(local_runner))
        .with_mode(config.routing.mode)
        .with_validator(processing::BatchValidator::from_config(&config.processing)))
}

fn check_system_memory() {
    match processing::available_memory() {
        Some(available) if available < LOW_MEMORY_BYTES => warn!(
            "Low available memory: {}MB (recommended: >{}MB)",
            available / (1024 * 1024),
            LOW_MEMORY_BYTES / (1024 * 1024)
        ),
        Some(available) => info!("Available memory: {}MB", available / (1024 * 1024)),
        None => warn!("Could not determine available memory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_init() {
        // Should not fail on multiple calls
        assert!(init().is_ok());
        assert!(init().is_ok());
        assert!(init_with_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_build_cascade() {
        assert!(build_cascade(&Config::default()).is_ok());
        assert!(build_cascade(&Config::example()).is_ok());

        let mut config = Config::default();
        config.remote.batch_size = 0;
        assert!(build_cascade(&config).is_err());
    }
}
