use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageOutputFormat, RgbImage};
use tokio_util::sync::CancellationToken;

use hybridresize::parallel::{NoProgress, ProgressRecorder};
use hybridresize::processing::{resize_payload, Dimensions, SourceLimits};
use hybridresize::remote::{
    from_data_url, to_data_url, BatchRequest, RemoteBatchReply, RemoteRunner, RemoteTransport,
    WireProcessed, WireResult,
};
use hybridresize::routing::{HealthProbe, HealthSample, LocalRunner, StaticHealth};
use hybridresize::{
    summarize, ExecutionPath, FallbackCascade, HybridResizeError, OutputFormat, ProcessingOptions,
    Result, RoutingMode, WorkItem,
};

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageOutputFormat::Png).unwrap();
    buffer.into_inner()
}

fn batch(n: usize) -> Vec<WorkItem> {
    (0..n)
        .map(|i| WorkItem::new(format!("photo{}.png", i), png(64, 32), "image/png"))
        .collect()
}

fn reachable() -> Arc<dyn HealthProbe> {
    Arc::new(StaticHealth(HealthSample::reachable(
        Duration::from_millis(40),
        200,
    )))
}

fn local() -> Arc<LocalRunner> {
    Arc::new(LocalRunner::new().with_chunk_yield(Duration::ZERO))
}

/// Remote stand-in that resizes with the local codec and records batch sizes
#[derive(Default)]
struct ResizingTransport {
    batches: Mutex<Vec<usize>>,
}

#[async_trait]
impl RemoteTransport for ResizingTransport {
    async fn send_batch(&self, request: &BatchRequest) -> Result<RemoteBatchReply> {
        self.batches.lock().unwrap().push(request.images.len());

        let options = ProcessingOptions::new(request.options.width, request.options.height);
        let results = request
            .images
            .iter()
            .map(|image| {
                let bytes = from_data_url(&image.image_data).unwrap();
                let resized = resize_payload(&bytes, &options, SourceLimits::default()).unwrap();
                WireResult {
                    success: true,
                    filename: image.filename.clone(),
                    global_index: Some(image.global_index),
                    result: Some(WireProcessed {
                        image_data: to_data_url("image/jpeg", &resized.payload),
                        original_size: Some(image.original_size),
                        new_size: Some(resized.payload.len() as u64),
                        original_dimensions: resized.original_dimensions,
                        new_dimensions: resized.new_dimensions,
                        format: Some("jpeg".to_string()),
                    }),
                    error: None,
                }
            })
            .collect();

        Ok(RemoteBatchReply::Completed(results))
    }
}

/// Remote stand-in for a deployment without remote functions
#[derive(Default)]
struct UnavailableTransport {
    calls: AtomicUsize,
}

#[async_trait]
impl RemoteTransport for UnavailableTransport {
    async fn send_batch(&self, _request: &BatchRequest) -> Result<RemoteBatchReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteBatchReply::Unavailable {
            reason: "Server processing unavailable in development".to_string(),
        })
    }
}

/// Probe that counts how often it is sampled
struct CountingProbe {
    calls: AtomicUsize,
}

#[async_trait]
impl HealthProbe for CountingProbe {
    async fn probe(&self) -> HealthSample {
        self.calls.fetch_add(1, Ordering::SeqCst);
        HealthSample::unreachable("offline")
    }
}

#[tokio::test]
async fn remote_batches_of_ten_keep_input_order() {
    let transport = Arc::new(ResizingTransport::default());
    let remote = RemoteRunner::new(transport.clone()).with_chunk_yield(Duration::ZERO);
    let cascade = FallbackCascade::new(reachable(), Arc::new(remote), local())
        .with_mode(RoutingMode::Remote);

    let items = batch(23);
    let options = ProcessingOptions::new(Some(32), None);
    let recorder = ProgressRecorder::new();

    let result = cascade
        .execute(&items, &options, &recorder, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.path_used, ExecutionPath::Remote);
    assert!(result.fallback_reason.is_none());
    assert_eq!(*transport.batches.lock().unwrap(), vec![10, 10, 3]);

    assert_eq!(result.outcomes.len(), 23);
    for (i, outcome) in result.outcomes.iter().enumerate() {
        let success = outcome.as_success().unwrap();
        assert_eq!(success.index, i);
        assert_eq!(success.item_name, format!("photo{}.png", i));
        assert_eq!(success.new_dimensions, Dimensions::new(32, 16));
        assert_eq!(success.format, OutputFormat::Jpeg);
    }

    let events = recorder.events();
    assert_eq!(events[0].stage.as_deref(), Some("Using remote processing"));
    let completed: Vec<usize> = events
        .iter()
        .filter(|e| e.chunk_info.is_some())
        .map(|e| e.completed)
        .collect();
    assert_eq!(completed, vec![10, 20, 23]);
}

#[tokio::test]
async fn unavailable_remote_falls_back_to_local() {
    let transport = Arc::new(UnavailableTransport::default());
    let remote = RemoteRunner::new(transport.clone()).with_chunk_yield(Duration::ZERO);
    let cascade = FallbackCascade::new(reachable(), Arc::new(remote), local())
        .with_mode(RoutingMode::Remote);

    let items = batch(4);
    let options = ProcessingOptions::new(Some(16), Some(16));
    let recorder = ProgressRecorder::new();

    let result = cascade
        .execute(&items, &options, &recorder, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.path_used, ExecutionPath::Local);
    assert!(result
        .fallback_reason
        .as_deref()
        .unwrap()
        .contains("unavailable"));

    assert_eq!(result.outcomes.len(), 4);
    for outcome in &result.outcomes {
        let success = outcome.as_success().unwrap();
        // 64x32 fit into 16x16 keeps the 2:1 aspect ratio
        assert_eq!(success.new_dimensions, Dimensions::new(16, 8));
        let decoded = image::load_from_memory(&success.payload).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    let fallback = recorder
        .events()
        .into_iter()
        .find(|e| e.stage.as_deref() == Some("Falling back to local processing"))
        .unwrap();
    assert!(fallback.warning.is_some());
}

#[tokio::test]
async fn auto_mode_routes_local_when_remote_unreachable() {
    let probe = Arc::new(CountingProbe {
        calls: AtomicUsize::new(0),
    });
    let transport = Arc::new(UnavailableTransport::default());
    let cascade = FallbackCascade::new(
        probe.clone(),
        Arc::new(RemoteRunner::new(transport.clone())),
        local(),
    );

    let mut items = batch(2);
    items.push(WorkItem::new("broken.png", vec![0u8; 64], "image/png"));
    let options = ProcessingOptions::new(Some(32), None);

    let result = cascade
        .execute(&items, &options, &NoProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.path_used, ExecutionPath::Local);
    assert_eq!(result.decision.chosen_path, ExecutionPath::Local);
    assert!(result
        .decision
        .reasoning
        .iter()
        .any(|clause| clause == "Remote server is not available"));

    assert!(result.outcomes[0].is_success());
    assert!(result.outcomes[1].is_success());
    assert!(!result.outcomes[2].is_success());
    assert_eq!(result.outcomes[2].item_name(), "broken.png");

    let report = summarize(&result.outcomes, 500.0);
    assert_eq!(report.total_files, 3);
    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.success_rate, 67);
    assert_eq!(report.format_distribution.len(), 1);
    assert_eq!(report.format_distribution[0].label, "JPEG");
}

#[tokio::test]
async fn oversize_batch_is_rejected_before_probing() {
    let probe = Arc::new(CountingProbe {
        calls: AtomicUsize::new(0),
    });
    let cascade = FallbackCascade::new(
        probe.clone(),
        Arc::new(RemoteRunner::new(Arc::new(UnavailableTransport::default()))),
        local(),
    );

    let items: Vec<WorkItem> = (0..101)
        .map(|i| WorkItem::new(format!("{}.png", i), vec![1u8; 8], "image/png"))
        .collect();

    let err = cascade
        .execute(
            &items,
            &ProcessingOptions::new(Some(32), None),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HybridResizeError::BatchRejected { .. }));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_options_are_rejected() {
    let cascade = FallbackCascade::new(
        reachable(),
        Arc::new(RemoteRunner::new(Arc::new(UnavailableTransport::default()))),
        local(),
    );

    let err = cascade
        .execute(
            &batch(1),
            &ProcessingOptions::default(),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HybridResizeError::InvalidOptions { .. }));
}

#[tokio::test]
async fn cancelled_run_is_not_retried_locally() {
    let cascade = FallbackCascade::new(
        reachable(),
        Arc::new(RemoteRunner::new(Arc::new(ResizingTransport::default()))),
        local(),
    )
    .with_mode(RoutingMode::Remote);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = cascade
        .execute(
            &batch(3),
            &ProcessingOptions::new(Some(32), None),
            &NoProgress,
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HybridResizeError::Cancelled {
            completed: 0,
            total: 3
        }
    ));
}

fn object_keys(value: &serde_json::Value) -> Vec<String> {
    let mut keys: Vec<String> = value.as_object().unwrap().keys().cloned().collect();
    keys.sort();
    keys
}

#[tokio::test]
async fn outcome_schema_matches_across_paths() {
    let items = batch(3);
    let options = ProcessingOptions::new(Some(32), None);
    let token = CancellationToken::new();

    let remote_run = FallbackCascade::new(
        reachable(),
        Arc::new(
            RemoteRunner::new(Arc::new(ResizingTransport::default()))
                .with_chunk_yield(Duration::ZERO),
        ),
        local(),
    )
    .with_mode(RoutingMode::Remote)
    .execute(&items, &options, &NoProgress, &token)
    .await
    .unwrap();

    let local_run = FallbackCascade::new(
        reachable(),
        Arc::new(RemoteRunner::new(Arc::new(UnavailableTransport::default()))),
        local(),
    )
    .with_mode(RoutingMode::Local)
    .execute(&items, &options, &NoProgress, &token)
    .await
    .unwrap();

    assert_eq!(remote_run.path_used, ExecutionPath::Remote);
    assert_eq!(local_run.path_used, ExecutionPath::Local);

    let remote_json = serde_json::to_value(&remote_run.outcomes).unwrap();
    let local_json = serde_json::to_value(&local_run.outcomes).unwrap();
    let remote_list = remote_json.as_array().unwrap();
    let local_list = local_json.as_array().unwrap();
    assert_eq!(remote_list.len(), local_list.len());

    for (from_remote, from_local) in remote_list.iter().zip(local_list) {
        assert_eq!(object_keys(from_remote), object_keys(from_local));
        assert_eq!(from_remote["status"], from_local["status"]);
        assert_eq!(from_remote["index"], from_local["index"]);
        assert_eq!(from_remote["itemName"], from_local["itemName"]);
        assert_eq!(from_remote["newDimensions"], from_local["newDimensions"]);
    }
}
