//! Single-level remote-to-local fallback cascade

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ProcessingOptions;
use crate::error::Result;
use crate::parallel::{local_concurrency, BatchProgress, ChunkedExecutor, ItemProcessor, PerItem, ProgressSink};
use crate::processing::{BatchValidator, LocalResizer, Outcome, WorkItem};
use crate::routing::{ExecutionPath, HealthProbe, HealthSample, RoutingDecision, RoutingEngine, RoutingMode, Workload};

/// Runs a whole batch on one execution path
#[async_trait]
pub trait BatchRunner: Send + Sync {
    /// Path this runner executes on
    fn path(&self) -> ExecutionPath;

    async fn run(
        &self,
        items: &[WorkItem],
        options: &ProcessingOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<Outcome>>;
}

/// Local runner: per-item processing with workload-derived concurrency
pub struct LocalRunner<P = LocalResizer> {
    processor: P,
    chunk_yield: Duration,
}

impl LocalRunner<LocalResizer> {
    /// Local runner over the `image`-based resizer
    pub fn new() -> Self {
        Self::with_processor(LocalResizer::new())
    }
}

impl Default for LocalRunner<LocalResizer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ItemProcessor> LocalRunner<P> {
    pub fn with_processor(processor: P) -> Self {
        Self {
            processor,
            chunk_yield: Duration::from_millis(10),
        }
    }

    /// Pause between chunks
    pub fn with_chunk_yield(mut self, chunk_yield: Duration) -> Self {
        self.chunk_yield = chunk_yield;
        self
    }
}

#[async_trait]
impl<P: ItemProcessor> BatchRunner for LocalRunner<P> {
    fn path(&self) -> ExecutionPath {
        ExecutionPath::Local
    }

    async fn run(
        &self,
        items: &[WorkItem],
        options: &ProcessingOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<Outcome>> {
        ChunkedExecutor::new(local_concurrency(items.len()))
            .with_chunk_yield(self.chunk_yield)
            .with_cancellation(cancel.clone())
            .run(items, &PerItem::new(&self.processor, options), progress)
            .await
    }
}

/// Result of a cascade execution
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    /// One outcome per item, in input order
    pub outcomes: Vec<Outcome>,
    /// Path that produced the outcomes
    pub path_used: ExecutionPath,
    pub decision: RoutingDecision,
    /// Why the remote run was abandoned, if it was
    pub fallback_reason: Option<String>,
}

/// Chooses a path once per batch and falls back to local when the remote run fails
pub struct FallbackCascade {
    engine: RoutingEngine,
    health: Arc<dyn HealthProbe>,
    remote: Arc<dyn BatchRunner>,
    local: Arc<dyn BatchRunner>,
    mode: RoutingMode,
    validator: BatchValidator,
}

impl FallbackCascade {
    pub fn new(
        health: Arc<dyn HealthProbe>,
        remote: Arc<dyn BatchRunner>,
        local: Arc<dyn BatchRunner>,
    ) -> Self {
        Self {
            engine: RoutingEngine::new(),
            health,
            remote,
            local,
            mode: RoutingMode::Auto,
            validator: BatchValidator::new(),
        }
    }

    pub fn with_mode(mut self, mode: RoutingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_validator(mut self, validator: BatchValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Sample health (unless routing is forced local) and score the batch
    pub async fn plan(&self, items: &[WorkItem], options: &ProcessingOptions) -> RoutingDecision {
        let health = match self.mode {
            RoutingMode::Local => HealthSample::unreachable("Health probe skipped in local mode"),
            RoutingMode::Auto | RoutingMode::Remote => self.health.probe().await,
        };
        self.engine.decide(&Workload::from_batch(items, options), &health)
    }

    /// Validate, route once, run, and re-run locally if the remote run fails
    pub async fn execute(
        &self,
        items: &[WorkItem],
        options: &ProcessingOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<CascadeOutcome> {
        options.validate()?;
        self.validator.validate_batch(items)?;

        let decision = self.plan(items, options).await;
        let path = match self.mode {
            RoutingMode::Auto => decision.chosen_path,
            RoutingMode::Local => ExecutionPath::Local,
            RoutingMode::Remote => ExecutionPath::Remote,
        };

        info!(
            "Using {} processing for {} items ({})",
            path,
            items.len(),
            decision.reasoning_text()
        );
        progress.report(
            &BatchProgress::stage(items.len(), format!("Using {} processing", path))
                .with_reasoning(decision.reasoning.clone()),
        );

        let runner = match path {
            ExecutionPath::Local => &self.local,
            ExecutionPath::Remote => &self.remote,
        };

        match runner.run(items, options, progress, cancel).await {
            Ok(outcomes) => Ok(CascadeOutcome {
                outcomes,
                path_used: runner.path(),
                decision,
                fallback_reason: None,
            }),
            Err(e) if path == ExecutionPath::Remote && e.triggers_fallback() => {
                let reason = e.user_message();
                warn!("Remote processing failed, falling back to local: {}", reason);
                progress.report(
                    &BatchProgress::stage(items.len(), "Falling back to local processing")
                        .with_warning(format!("Remote processing failed: {}", reason)),
                );

                let outcomes = self.local.run(items, options, progress, cancel).await?;
                Ok(CascadeOutcome {
                    outcomes,
                    path_used: self.local.path(),
                    decision,
                    fallback_reason: Some(reason),
                })
            }
            Err(e) => Err(e),
        }
    }
}
