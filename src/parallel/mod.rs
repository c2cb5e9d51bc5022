//! Chunked concurrent batch execution

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ProcessingOptions;
use crate::error::{HybridResizeError, Result};
use crate::processing::{Outcome, WorkItem};

pub mod progress;
pub mod scheduler;

pub use progress::*;
pub use scheduler::*;

/// Resizes one item at a time; errors become `Failure` outcomes
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process_item(
        &self,
        index: usize,
        item: &WorkItem,
        options: &ProcessingOptions,
    ) -> Result<Outcome>;
}

/// Handles a whole chunk in one call; an error aborts the run
#[async_trait]
pub trait ChunkProcessor: Send + Sync {
    /// Process `chunk`, whose first item has input index `start`
    async fn process_chunk(&self, start: usize, chunk: &[WorkItem]) -> Result<Vec<Outcome>>;
}

/// Adapts an [`ItemProcessor`] to run every item of a chunk concurrently
pub struct PerItem<'a, P: ?Sized> {
    processor: &'a P,
    options: &'a ProcessingOptions,
}

impl<'a, P: ItemProcessor + ?Sized> PerItem<'a, P> {
    pub fn new(processor: &'a P, options: &'a ProcessingOptions) -> Self {
        Self { processor, options }
    }
}

#[async_trait]
impl<'a, P: ItemProcessor + ?Sized> ChunkProcessor for PerItem<'a, P> {
    async fn process_chunk(&self, start: usize, chunk: &[WorkItem]) -> Result<Vec<Outcome>> {
        let futures = chunk.iter().enumerate().map(|(offset, item)| async move {
            let index = start + offset;
            match self.processor.process_item(index, item, self.options).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    debug!("Item {} ({}) failed: {}", index, item.name, e);
                    Outcome::failure(index, item.name.clone(), e.user_message())
                }
            }
        });

        Ok(join_all(futures).await)
    }
}

/// Runs a batch chunk by chunk with bounded concurrency
#[derive(Debug, Clone)]
pub struct ChunkedExecutor {
    concurrency: usize,
    chunk_yield: Duration,
    cancel: CancellationToken,
}

impl ChunkedExecutor {
    /// Create an executor processing `concurrency` items per chunk
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            chunk_yield: Duration::ZERO,
            cancel: CancellationToken::new(),
        }
    }

    /// Pause between chunks; zero disables it
    pub fn with_chunk_yield(mut self, chunk_yield: Duration) -> Self {
        self.chunk_yield = chunk_yield;
        self
    }

    /// Token checked before every chunk
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every item through `processor`, returning one outcome per item in input order
    pub async fn run<P>(
        &self,
        items: &[WorkItem],
        processor: &P,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<Outcome>>
    where
        P: ChunkProcessor + ?Sized,
    {
        if self.concurrency == 0 {
            return Err(HybridResizeError::config(
                "Concurrency must be greater than 0",
            ));
        }

        let total = items.len();
        let plan = ChunkPlan::new(total, self.concurrency);
        let total_chunks = plan.len();
        let start_time = Instant::now();

        info!(
            "Running {} items in {} chunks of up to {}",
            total, total_chunks, self.concurrency
        );

        let mut outcomes = Vec::with_capacity(total);

        for (chunk_idx, range) in plan.ranges().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Run cancelled after {}/{} items", outcomes.len(), total);
                return Err(HybridResizeError::Cancelled {
                    completed: outcomes.len(),
                    total,
                });
            }

            let chunk = &items[range.clone()];
            debug!(
                "Processing chunk {} of {} ({} items)",
                chunk_idx + 1,
                total_chunks,
                chunk.len()
            );

            let mut chunk_outcomes = processor.process_chunk(range.start, chunk).await?;
            chunk_outcomes.sort_by_key(Outcome::index);
            verify_chunk(&chunk_outcomes, range)?;
            outcomes.extend(chunk_outcomes);

            progress.report(&BatchProgress::chunk(
                outcomes.len().min(total),
                total,
                ChunkInfo {
                    current_chunk: chunk_idx + 1,
                    total_chunks,
                    chunk_size: self.concurrency,
                },
            ));

            if chunk_idx + 1 < total_chunks && !self.chunk_yield.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(self.chunk_yield) => {}
                    () = self.cancel.cancelled() => {}
                }
            }
        }

        info!(
            "Run completed: {} items in {:.2}s",
            total,
            start_time.elapsed().as_secs_f64()
        );

        Ok(outcomes)
    }
}

/// A chunk must yield exactly its own input indices
fn verify_chunk(outcomes: &[Outcome], range: std::ops::Range<usize>) -> Result<()> {
    let expected = range.len();
    if outcomes.len() != expected || !outcomes.iter().map(Outcome::index).eq(range.clone()) {
        let got: Vec<usize> = outcomes.iter().map(Outcome::index).collect();
        return Err(HybridResizeError::dispatch(format!(
            "Chunk {}..{} returned outcomes for indices {:?}",
            range.start, range.end, got
        )));
    }
    Ok(())
}
