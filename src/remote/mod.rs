//! Remote execution path: batches of at most ten items sent to the remote service

pub mod transport;
pub mod wire;

pub use transport::*;
pub use wire::*;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{OutputFormat, ProcessingOptions, RemoteConfig};
use crate::error::{HybridResizeError, Result};
use crate::parallel::{remote_concurrency, ChunkProcessor, ChunkedExecutor, ProgressSink};
use crate::processing::{Outcome, ResizedImage, WorkItem};
use crate::routing::{BatchRunner, ExecutionPath};

/// Runs a batch through a [`RemoteTransport`], one request per chunk
pub struct RemoteRunner {
    transport: Arc<dyn RemoteTransport>,
    batch_size: usize,
    chunk_yield: Duration,
}

impl RemoteRunner {
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            transport,
            batch_size: crate::parallel::REMOTE_BATCH_LIMIT,
            chunk_yield: Duration::from_millis(100),
        }
    }

    /// Runner using the batch size of `config`
    pub fn from_config(transport: Arc<dyn RemoteTransport>, config: &RemoteConfig) -> Self {
        Self::new(transport).with_batch_size(config.batch_size)
    }

    /// Items per request, clamped to the request limit
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = remote_concurrency(batch_size);
        self
    }

    /// Pause between requests
    pub fn with_chunk_yield(mut self, chunk_yield: Duration) -> Self {
        self.chunk_yield = chunk_yield;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[async_trait]
impl BatchRunner for RemoteRunner {
    fn path(&self) -> ExecutionPath {
        ExecutionPath::Remote
    }

    async fn run(
        &self,
        items: &[WorkItem],
        options: &ProcessingOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<Outcome>> {
        let requests = RemoteChunks {
            transport: self.transport.as_ref(),
            options,
            run_id: Uuid::new_v4().simple().to_string(),
        };
        info!(
            "Sending {} items to remote in batches of {} (run {})",
            items.len(),
            self.batch_size,
            requests.run_id
        );

        ChunkedExecutor::new(self.batch_size)
            .with_chunk_yield(self.chunk_yield)
            .with_cancellation(cancel.clone())
            .run(items, &requests, progress)
            .await
    }
}

/// One remote request per executor chunk
struct RemoteChunks<'a> {
    transport: &'a dyn RemoteTransport,
    options: &'a ProcessingOptions,
    run_id: String,
}

#[async_trait]
impl<'a> ChunkProcessor for RemoteChunks<'a> {
    async fn process_chunk(&self, start: usize, chunk: &[WorkItem]) -> Result<Vec<Outcome>> {
        let batch_id = format!("batch_{}_{}", self.run_id, start);
        let request = BatchRequest::new(start, chunk, self.options, batch_id);

        match self.transport.send_batch(&request).await? {
            RemoteBatchReply::Completed(results) => {
                debug!(
                    "Batch {} returned {} results",
                    request.batch_id,
                    results.len()
                );
                assemble_outcomes(start, chunk, self.options, results)
            }
            RemoteBatchReply::Unavailable { reason } => {
                warn!("Remote reported unavailable: {}", reason);
                Err(HybridResizeError::remote_unavailable(reason))
            }
        }
    }
}

/// Match response entries back to the chunk's items
///
/// Entries are located by `globalIndex`, or by filename when the index is
/// absent. Items without an entry become failures; entries for unknown or
/// already-answered items are protocol errors.
pub fn assemble_outcomes(
    start: usize,
    chunk: &[WorkItem],
    options: &ProcessingOptions,
    results: Vec<WireResult>,
) -> Result<Vec<Outcome>> {
    let mut slots: Vec<Option<Outcome>> = vec![None; chunk.len()];

    for result in results {
        let offset = match result.global_index {
            Some(global) => global
                .checked_sub(start)
                .filter(|offset| *offset < chunk.len())
                .ok_or_else(|| {
                    HybridResizeError::protocol(format!(
                        "Result for unknown item index {}",
                        global
                    ))
                })?,
            None => chunk
                .iter()
                .enumerate()
                .position(|(i, item)| item.name == result.filename && slots[i].is_none())
                .ok_or_else(|| {
                    HybridResizeError::protocol(format!(
                        "Result for unknown item '{}'",
                        result.filename
                    ))
                })?,
        };

        if slots[offset].is_some() {
            return Err(HybridResizeError::protocol(format!(
                "Duplicate result for item index {}",
                start + offset
            )));
        }

        slots[offset] = Some(item_outcome(start + offset, &chunk[offset], options, result));
    }

    Ok(slots
        .into_iter()
        .enumerate()
        .map(|(offset, slot)| {
            slot.unwrap_or_else(|| {
                Outcome::failure(
                    start + offset,
                    chunk[offset].name.clone(),
                    "No result returned by remote service",
                )
            })
        })
        .collect())
}

fn item_outcome(
    index: usize,
    item: &WorkItem,
    options: &ProcessingOptions,
    result: WireResult,
) -> Outcome {
    if !result.success {
        let reason = result
            .error
            .unwrap_or_else(|| "Remote processing failed".to_string());
        return Outcome::failure(index, item.name.clone(), reason);
    }

    let Some(processed) = result.result else {
        return Outcome::failure(index, item.name.clone(), "Remote returned no image data");
    };

    match from_data_url(&processed.image_data) {
        Ok(payload) => {
            let format = processed
                .format
                .as_deref()
                .and_then(OutputFormat::parse)
                .unwrap_or(options.format);
            Outcome::success(
                index,
                item,
                ResizedImage {
                    payload: payload.into(),
                    original_dimensions: processed.original_dimensions,
                    new_dimensions: processed.new_dimensions,
                    format,
                },
                None,
            )
        }
        Err(e) => Outcome::failure(index, item.name.clone(), e.user_message()),
    }
}
