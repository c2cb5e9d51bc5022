//! Progress events emitted during a batch run

use std::sync::{Mutex, PoisonError};

use indicatif::ProgressBar;
use serde::Serialize;

/// Position of a chunk within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    /// One-based chunk number
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub chunk_size: usize,
}

/// Progress snapshot handed to a sink by reference
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage_completed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_info: Option<ChunkInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Why the current path was chosen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Vec<String>>,
}

impl BatchProgress {
    /// Event emitted after a chunk completes
    pub fn chunk(completed: usize, total: usize, chunk_info: ChunkInfo) -> Self {
        Self {
            completed,
            total,
            percentage_completed: percentage(completed, total),
            chunk_info: Some(chunk_info),
            stage: None,
            warning: None,
            reasoning: None,
        }
    }

    /// Stage change before any items are processed
    pub fn stage<S: Into<String>>(total: usize, stage: S) -> Self {
        Self {
            completed: 0,
            total,
            percentage_completed: 0.0,
            chunk_info: None,
            stage: Some(stage.into()),
            warning: None,
            reasoning: None,
        }
    }

    /// Attach the routing reasoning
    pub fn with_reasoning(mut self, reasoning: Vec<String>) -> Self {
        self.reasoning = Some(reasoning);
        self
    }

    /// Attach a warning
    pub fn with_warning<S: Into<String>>(mut self, warning: S) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 / total as f64 * 100.0).round()
}

/// Receives progress events; called sequentially, never concurrently
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &BatchProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&BatchProgress) + Send + Sync,
{
    fn report(&self, progress: &BatchProgress) {
        self(progress);
    }
}

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: &BatchProgress) {}
}

/// Sink that keeps a copy of every event
#[derive(Debug, Default)]
pub struct ProgressRecorder {
    events: Mutex<Vec<BatchProgress>>,
}

impl ProgressRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far
    pub fn events(&self) -> Vec<BatchProgress> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for ProgressRecorder {
    fn report(&self, progress: &BatchProgress) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(progress.clone());
    }
}

/// Sink driving an `indicatif` progress bar
pub struct ConsoleProgressReporter {
    bar: ProgressBar,
}

impl ConsoleProgressReporter {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl ProgressSink for ConsoleProgressReporter {
    fn report(&self, progress: &BatchProgress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.completed as u64);

        if let Some(warning) = &progress.warning {
            self.bar.println(format!("warning: {}", warning));
        }
        if let Some(stage) = &progress.stage {
            self.bar.set_message(stage.clone());
        } else if let Some(chunk) = &progress.chunk_info {
            self.bar.set_message(format!(
                "chunk {}/{}",
                chunk.current_chunk, chunk.total_chunks
            ));
        }
    }
}
