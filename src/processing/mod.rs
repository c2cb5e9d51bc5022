//! Work items, outcomes and the local resize capability

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::analytics::round1;
use crate::config::{OutputFormat, ProcessingOptions};
use crate::error::{ErrorContext, HybridResizeError, Result};
use crate::parallel::ItemProcessor;

pub mod estimate;
pub mod formats;
pub mod memory;
pub mod resize;
pub mod validation;

pub use estimate::*;
pub use formats::*;
pub use memory::*;
pub use resize::*;
pub use validation::*;

/// One input image, immutable once enqueued
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Display name, usually the source file name
    pub name: String,

    /// Encoded source bytes
    pub payload: Arc<[u8]>,

    /// Declared media type (MIME)
    pub media_type: String,
}

impl WorkItem {
    /// Create a work item with an explicit media type
    pub fn new<N, M>(name: N, payload: impl Into<Arc<[u8]>>, media_type: M) -> Self
    where
        N: Into<String>,
        M: Into<String>,
    {
        Self {
            name: name.into(),
            payload: payload.into(),
            media_type: media_type.into(),
        }
    }

    /// Create a work item, sniffing the media type from the payload
    pub fn sniffed<N: Into<String>>(name: N, payload: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = sniff_media_type(&payload)
            .or_else(|| media_type_from_name(&name))
            .unwrap_or("application/octet-stream")
            .to_string();
        Self::new(name, payload, media_type)
    }

    /// Read a work item from disk
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                HybridResizeError::validation(
                    format!("Invalid input filename: {}", path.display()),
                    None,
                )
            })?
            .to_string();
        let payload = tokio::fs::read(path).await?;
        Ok(Self::sniffed(name, payload))
    }

    /// Payload size in bytes
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count
    pub fn pixels(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Output of a successful resize, before it is tied to a batch index
#[derive(Debug, Clone)]
pub struct ResizedImage {
    pub payload: Arc<[u8]>,
    pub original_dimensions: Dimensions,
    pub new_dimensions: Dimensions,
    pub format: OutputFormat,
}

/// Per-item result
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Outcome {
    Success(SuccessOutcome),
    Failure(FailureOutcome),
}

/// A resized item
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessOutcome {
    pub index: usize,
    pub item_name: String,
    pub original_size: u64,
    pub new_size: u64,
    pub original_dimensions: Dimensions,
    pub new_dimensions: Dimensions,
    /// Size reduction in percent; `None` when the original was empty
    pub compression_ratio_percent: Option<f64>,
    pub format: OutputFormat,
    #[serde(skip)]
    pub payload: Arc<[u8]>,
    pub elapsed_ms: Option<f64>,
}

/// An item that could not be resized
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureOutcome {
    pub index: usize,
    pub item_name: String,
    pub reason: String,
}

impl Outcome {
    /// Build a success outcome from a resized image
    pub fn success(
        index: usize,
        item: &WorkItem,
        resized: ResizedImage,
        elapsed_ms: Option<f64>,
    ) -> Self {
        let original_size = item.size();
        let new_size = resized.payload.len() as u64;
        Self::Success(SuccessOutcome {
            index,
            item_name: item.name.clone(),
            original_size,
            new_size,
            original_dimensions: resized.original_dimensions,
            new_dimensions: resized.new_dimensions,
            compression_ratio_percent: compression_ratio_percent(original_size, new_size),
            format: resized.format,
            payload: resized.payload,
            elapsed_ms,
        })
    }

    /// Build a failure outcome
    pub fn failure<N: Into<String>, R: Into<String>>(index: usize, item_name: N, reason: R) -> Self {
        Self::Failure(FailureOutcome {
            index,
            item_name: item_name.into(),
            reason: reason.into(),
        })
    }

    /// Input index of the originating item
    pub fn index(&self) -> usize {
        match self {
            Self::Success(s) => s.index,
            Self::Failure(f) => f.index,
        }
    }

    /// Name of the originating item
    pub fn item_name(&self) -> &str {
        match self {
            Self::Success(s) => &s.item_name,
            Self::Failure(f) => &f.item_name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn as_success(&self) -> Option<&SuccessOutcome> {
        match self {
            Self::Success(s) => Some(s),
            Self::Failure(_) => None,
        }
    }
}

/// `(original - new) / original * 100` rounded to one decimal
#[allow(clippy::cast_precision_loss)]
pub fn compression_ratio_percent(original_size: u64, new_size: u64) -> Option<f64> {
    if original_size == 0 {
        return None;
    }
    let delta = original_size as f64 - new_size as f64;
    Some(round1(delta / original_size as f64 * 100.0))
}

/// In-process resize capability built on the `image` crate
#[derive(Debug, Clone, Default)]
pub struct LocalResizer {
    limits: SourceLimits,
}

impl LocalResizer {
    /// Create a new local resizer with the default source limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a local resizer with custom source limits
    pub fn with_limits(limits: SourceLimits) -> Self {
        Self { limits }
    }

    /// Decode, resize and re-encode one item
    pub async fn resize(&self, item: &WorkItem, options: &ProcessingOptions) -> Result<ResizedImage> {
        let payload = Arc::clone(&item.payload);
        let options = options.clone();
        let limits = self.limits;
        let name = item.name.clone();

        debug!("Resizing {} ({} bytes)", item.name, item.size());

        tokio::task::spawn_blocking(move || resize_payload(&payload, &options, limits))
            .await
            .map_err(|e| HybridResizeError::system(format!("Task join error: {}", e)))?
            .with_item_context(&name)
    }
}

#[async_trait]
impl ItemProcessor for LocalResizer {
    async fn process_item(
        &self,
        index: usize,
        item: &WorkItem,
        options: &ProcessingOptions,
    ) -> Result<Outcome> {
        let start = Instant::now();
        let resized = self.resize(item, options).await?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            "Resized {}: {} -> {} ({:.1}ms)",
            item.name, resized.original_dimensions, resized.new_dimensions, elapsed_ms
        );

        Ok(Outcome::success(index, item, resized, Some(elapsed_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackgroundColor, Quality, ResizeAlgorithm};
    use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, if x % 2 == 0 { 255 } else { 0 }])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_compression_ratio() {
        assert_eq!(compression_ratio_percent(1000, 250), Some(75.0));
        assert_eq!(compression_ratio_percent(1000, 1500), Some(-50.0));
        assert_eq!(compression_ratio_percent(3, 2), Some(33.3));
        assert_eq!(compression_ratio_percent(0, 10), None);
    }

    #[test]
    fn test_work_item_sniffing() {
        let item = WorkItem::sniffed("a.bin", png_bytes(2, 2));
        assert_eq!(item.media_type, "image/png");

        let item = WorkItem::sniffed("b.jpg", vec![1, 2, 3]);
        assert_eq!(item.media_type, "image/jpeg");

        let item = WorkItem::sniffed("c", vec![1, 2, 3]);
        assert_eq!(item.media_type, "application/octet-stream");
    }

    #[test]
    fn test_outcome_accessors() {
        let failure = Outcome::failure(4, "x.png", "broken");
        assert_eq!(failure.index(), 4);
        assert_eq!(failure.item_name(), "x.png");
        assert!(!failure.is_success());
        assert!(failure.as_success().is_none());
    }

    #[test]
    fn test_outcome_serialization_skips_payload() {
        let item = WorkItem::new("a.png", vec![0u8; 100], "image/png");
        let outcome = Outcome::success(
            0,
            &item,
            ResizedImage {
                payload: vec![0u8; 40].into(),
                original_dimensions: Dimensions::new(10, 10),
                new_dimensions: Dimensions::new(5, 5),
                format: OutputFormat::Png,
            },
            None,
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["compressionRatioPercent"], 60.0);
        assert_eq!(json["newSize"], 40);
        assert!(json.get("payload").is_none());
    }

    #[tokio::test]
    async fn test_local_resize_png() {
        let item = WorkItem::sniffed("wide.png", png_bytes(40, 20));
        let options = ProcessingOptions::new(Some(10), None)
            .format(OutputFormat::Png)
            .algorithm(ResizeAlgorithm::Bilinear);

        let resized = LocalResizer::new().resize(&item, &options).await.unwrap();
        assert_eq!(resized.original_dimensions, Dimensions::new(40, 20));
        assert_eq!(resized.new_dimensions, Dimensions::new(10, 5));

        let decoded = image::load_from_memory(&resized.payload).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 5));
    }

    #[tokio::test]
    async fn test_local_resize_jpeg_flattens_alpha() {
        let item = WorkItem::sniffed("alpha.png", png_bytes(16, 16));
        let options = ProcessingOptions::new(Some(8), Some(8))
            .quality(Quality::from_percent(80).unwrap())
            .background(BackgroundColor::Rgb([0, 0, 0]));

        let resized = LocalResizer::new().resize(&item, &options).await.unwrap();
        assert_eq!(resized.format, OutputFormat::Jpeg);
        let decoded = image::load_from_memory(&resized.payload).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[tokio::test]
    async fn test_corrupt_payload_names_item() {
        let item = WorkItem::new("broken.png", vec![0x89, 0x50, 0x4E, 0x47], "image/png");
        let options = ProcessingOptions::new(Some(10), None);

        let err = LocalResizer::new().resize(&item, &options).await.unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.item_name(), Some("broken.png"));
    }

    #[tokio::test]
    async fn test_process_item_records_index_and_timing() {
        let item = WorkItem::sniffed("tiny.png", png_bytes(4, 4));
        let options = ProcessingOptions::new(Some(2), None).format(OutputFormat::Png);

        let outcome = LocalResizer::new()
            .process_item(7, &item, &options)
            .await
            .unwrap();
        let success = outcome.as_success().unwrap();
        assert_eq!(success.index, 7);
        assert_eq!(success.original_size, item.size());
        assert!(success.elapsed_ms.is_some());
    }
}
