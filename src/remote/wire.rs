//! JSON wire format of the remote batch endpoint

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::config::{ProcessingOptions, Watermark};
use crate::error::{HybridResizeError, Result};
use crate::processing::{Dimensions, WorkItem};

/// Body of `POST {base}/batch-processor`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub images: Vec<WireImage>,
    pub options: WireOptions,
    pub batch_id: String,
}

impl BatchRequest {
    /// Encode a chunk whose first item has input index `start`
    pub fn new(start: usize, chunk: &[WorkItem], options: &ProcessingOptions, batch_id: String) -> Self {
        let images = chunk
            .iter()
            .enumerate()
            .map(|(offset, item)| WireImage {
                image_data: to_data_url(&item.media_type, &item.payload),
                filename: item.name.clone(),
                original_size: item.size(),
                global_index: start + offset,
            })
            .collect();

        Self {
            images,
            options: WireOptions::from(options),
            batch_id,
        }
    }
}

/// One image in a batch request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireImage {
    /// `data:<mime>;base64,<payload>`
    pub image_data: String,
    pub filename: String,
    pub original_size: u64,
    pub global_index: usize,
}

/// Options as the remote expects them; quality uses the 1-100 convention
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub quality: u8,
    pub format: &'static str,
    pub algorithm: &'static str,
    pub maintain_aspect_ratio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
}

impl From<&ProcessingOptions> for WireOptions {
    fn from(options: &ProcessingOptions) -> Self {
        Self {
            width: options.width,
            height: options.height,
            quality: options.quality.as_percent(),
            format: options.format.wire_name(),
            algorithm: options.algorithm.wire_name(),
            maintain_aspect_ratio: options.maintain_aspect_ratio,
            background_color: options.background_color.map(String::from),
            watermark: options.watermark.clone(),
        }
    }
}

/// Body returned by the batch endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchResponse {
    pub success: bool,
    pub fallback_to_client: bool,
    pub batch_id: Option<String>,
    pub results: Vec<WireResult>,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Per-image entry of a batch response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireResult {
    pub success: bool,
    pub filename: String,
    pub global_index: Option<usize>,
    pub result: Option<WireProcessed>,
    pub error: Option<String>,
}

/// Processed image inside a successful entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProcessed {
    pub image_data: String,
    #[serde(default)]
    pub original_size: Option<u64>,
    #[serde(default)]
    pub new_size: Option<u64>,
    pub original_dimensions: Dimensions,
    pub new_dimensions: Dimensions,
    #[serde(default)]
    pub format: Option<String>,
}

/// Decoded reply of one batch call
#[derive(Debug, Clone)]
pub enum RemoteBatchReply {
    /// The remote processed the batch; entries may still be failures
    Completed(Vec<WireResult>),
    /// The remote cannot process in this deployment
    Unavailable { reason: String },
}

/// Classify a raw HTTP reply
pub fn decode_batch_response(status: u16, body: &str) -> Result<RemoteBatchReply> {
    let ok_status = (200..300).contains(&status);

    let response: BatchResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) if ok_status => {
            return Err(HybridResizeError::protocol(format!(
                "Malformed batch response: {}",
                e
            )))
        }
        Err(_) => {
            return Err(HybridResizeError::transport(format!(
                "Remote returned status {}",
                status
            )))
        }
    };

    if response.fallback_to_client {
        let reason = response
            .error
            .or(response.message)
            .unwrap_or_else(|| "Remote processing unavailable".to_string());
        return Ok(RemoteBatchReply::Unavailable { reason });
    }

    if !ok_status {
        return Err(HybridResizeError::transport(format!(
            "Remote returned status {}: {}",
            status,
            response.error.unwrap_or_else(|| "Batch processing failed".to_string())
        )));
    }

    if !response.success {
        return Err(HybridResizeError::protocol(
            response
                .error
                .unwrap_or_else(|| "Batch processing failed".to_string()),
        ));
    }

    Ok(RemoteBatchReply::Completed(response.results))
}

/// Encode bytes as a base64 data URL
pub fn to_data_url(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Decode a base64 data URL (or bare base64) into bytes
pub fn from_data_url(data: &str) -> Result<Vec<u8>> {
    let encoded = match data.split_once(',') {
        Some((header, encoded)) if header.starts_with("data:") => encoded,
        Some(_) => {
            return Err(HybridResizeError::protocol(
                "Image data is not a data URL",
            ))
        }
        None => data,
    };

    STANDARD
        .decode(encoded.trim())
        .map_err(|e| HybridResizeError::protocol(format!("Invalid base64 image data: {}", e)))
}
