//! Error types and handling for HybridResize

use thiserror::Error;

/// Result type alias for HybridResize operations
pub type Result<T> = std::result::Result<T, HybridResizeError>;

/// Main error type for HybridResize operations
#[derive(Debug, Error)]
pub enum HybridResizeError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image decode/encode errors
    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid processing options
    #[error("Invalid processing options: {message}")]
    InvalidOptions { message: String },

    /// Batch rejected before dispatch
    #[error("Batch rejected: {message}")]
    BatchRejected { message: String },

    /// Media type not supported
    #[error("Unsupported image format: {format} (item: {item:?})")]
    UnsupportedFormat {
        format: String,
        item: Option<String>,
    },

    /// Image dimensions too large
    #[error("Image too large: {width}x{height} pixels (limit: {limit}, item: {item:?})")]
    ImageTooLarge {
        width: u32,
        height: u32,
        limit: u64,
        item: Option<String>,
    },

    /// Payload too large
    #[error("File too large: {size} bytes (limit: {limit} bytes, item: {item})")]
    FileTooLarge {
        size: u64,
        limit: u64,
        item: String,
    },

    /// Item validation errors
    #[error("Validation failed: {message} (item: {item:?})")]
    ValidationError {
        message: String,
        item: Option<String>,
    },

    /// HTTP transport errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Remote service unreachable or timed out
    #[error("Remote transport error: {message}")]
    TransportError { message: String },

    /// Remote service answered with something we cannot use
    #[error("Remote protocol error: {message}")]
    ProtocolError { message: String },

    /// Remote service is not available in this deployment
    #[error("Remote processing unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    /// Chunk dispatch failed
    #[error("Batch dispatch error: {message}")]
    DispatchError { message: String },

    /// Run cancelled at a chunk boundary
    #[error("Batch cancelled after {completed}/{total} items")]
    Cancelled { completed: usize, total: usize },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerdeError(String),

    /// System resource errors
    #[error("System resource error: {message}")]
    SystemError { message: String },
}

/// Coarse classification used by the executor and the fallback cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// One item failed; becomes a `Failure` outcome
    Item,
    /// The remote batch failed; triggers fallback
    Transport,
    /// Rejected before dispatch
    Configuration,
    /// Aborts the run
    Fatal,
}

impl HybridResizeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new invalid options error
    pub fn invalid_options<S: Into<String>>(message: S) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    /// Create a new batch rejection error
    pub fn batch_rejected<S: Into<String>>(message: S) -> Self {
        Self::BatchRejected {
            message: message.into(),
        }
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S, item: Option<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
            item,
        }
    }

    /// Create a new image too large error
    pub fn image_too_large(width: u32, height: u32, limit: u64, item: Option<String>) -> Self {
        Self::ImageTooLarge {
            width,
            height,
            limit,
            item,
        }
    }

    /// Create a new file too large error
    pub fn file_too_large<S: Into<String>>(size: u64, limit: u64, item: S) -> Self {
        Self::FileTooLarge {
            size,
            limit,
            item: item.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S, item: Option<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            item,
        }
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::TransportError {
            message: message.into(),
        }
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::ProtocolError {
            message: message.into(),
        }
    }

    /// Create a new remote unavailable error
    pub fn remote_unavailable<S: Into<String>>(reason: S) -> Self {
        Self::RemoteUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a new dispatch error
    pub fn dispatch<S: Into<String>>(message: S) -> Self {
        Self::DispatchError {
            message: message.into(),
        }
    }

    /// Create a new system error
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::SystemError {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IoError(_)
            | Self::ImageError(_)
            | Self::UnsupportedFormat { .. }
            | Self::ImageTooLarge { .. }
            | Self::ValidationError { .. } => ErrorKind::Item,

            Self::HttpError(_)
            | Self::TransportError { .. }
            | Self::ProtocolError { .. }
            | Self::RemoteUnavailable { .. }
            | Self::DispatchError { .. } => ErrorKind::Transport,

            Self::ConfigError { .. }
            | Self::InvalidOptions { .. }
            | Self::BatchRejected { .. }
            | Self::FileTooLarge { .. }
            | Self::SerdeError(_) => ErrorKind::Configuration,

            Self::Cancelled { .. } | Self::SystemError { .. } => ErrorKind::Fatal,
        }
    }

    /// Check if this error is recoverable (processing can continue)
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Item
    }

    /// Whether a remote run that failed with this error should be retried locally
    pub fn triggers_fallback(&self) -> bool {
        !matches!(self, Self::Cancelled { .. }) && self.kind() != ErrorKind::Configuration
    }

    /// Get the associated item name if available
    pub fn item_name(&self) -> Option<&str> {
        match self {
            Self::UnsupportedFormat { item, .. }
            | Self::ImageTooLarge { item, .. }
            | Self::ValidationError { item, .. } => item.as_deref(),

            Self::FileTooLarge { item, .. } => Some(item),

            _ => None,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::ImageError(e) => format!("Image processing failed: {}", e),
            Self::UnsupportedFormat { format, .. } => {
                format!(
                    "Unsupported image format: {}. Supported formats: JPEG, PNG, WebP, GIF, BMP",
                    format
                )
            }
            Self::ImageTooLarge { width, height, limit, .. } => {
                format!(
                    "Image is too large ({}x{} pixels). Limit: {}",
                    width, height, limit
                )
            }
            Self::FileTooLarge { size, limit, .. } => {
                format!(
                    "File is too large ({:.2} MB). Maximum supported: {:.2} MB",
                    *size as f64 / 1024.0 / 1024.0,
                    *limit as f64 / 1024.0 / 1024.0
                )
            }
            Self::ValidationError { message, .. } => message.clone(),
            Self::HttpError(e) if e.is_timeout() => {
                "Remote service did not respond in time".to_string()
            }
            Self::RemoteUnavailable { reason } => {
                format!("Remote processing is unavailable: {}", reason)
            }
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for HybridResizeError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerdeError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for HybridResizeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerdeError(format!("YAML parsing error: {}", err))
    }
}

/// Error context extension for attaching the item name
pub trait ErrorContext<T> {
    /// Add item context to an error
    fn with_item_context(self, item: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<HybridResizeError>,
{
    fn with_item_context(self, item: &str) -> Result<T> {
        self.map_err(|e| {
            let mut error = e.into();

            match &mut error {
                HybridResizeError::UnsupportedFormat { item: i, .. }
                | HybridResizeError::ImageTooLarge { item: i, .. }
                | HybridResizeError::ValidationError { item: i, .. } => {
                    if i.is_none() {
                        *i = Some(item.to_string());
                    }
                }
                _ => {}
            }

            error
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = HybridResizeError::config("test message");
        assert!(matches!(err, HybridResizeError::ConfigError { .. }));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(HybridResizeError::validation("bad", None).kind(), ErrorKind::Item);
        assert_eq!(HybridResizeError::transport("down").kind(), ErrorKind::Transport);
        assert_eq!(
            HybridResizeError::invalid_options("no width").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            HybridResizeError::Cancelled { completed: 3, total: 9 }.kind(),
            ErrorKind::Fatal
        );
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(HybridResizeError::validation("test", None).is_recoverable());
        assert!(!HybridResizeError::system("test").is_recoverable());
    }

    #[test]
    fn test_fallback_classification() {
        assert!(HybridResizeError::remote_unavailable("dev").triggers_fallback());
        assert!(HybridResizeError::protocol("garbage").triggers_fallback());
        assert!(HybridResizeError::dispatch("mismatch").triggers_fallback());
        assert!(!HybridResizeError::Cancelled { completed: 0, total: 1 }.triggers_fallback());
        assert!(!HybridResizeError::batch_rejected("too many").triggers_fallback());
    }

    #[test]
    fn test_user_messages() {
        let err = HybridResizeError::unsupported_format("image/tiff", None);
        let msg = err.user_message();
        assert!(msg.contains("Unsupported image format"));
        assert!(msg.contains("JPEG, PNG, WebP"));
    }

    #[test]
    fn test_item_context() {
        let result: Result<()> = Err(HybridResizeError::validation("broken", None));
        let err = result.with_item_context("a.jpg").unwrap_err();
        assert_eq!(err.item_name(), Some("a.jpg"));

        let result: Result<()> = Err(HybridResizeError::validation("broken", Some("b.jpg".into())));
        let err = result.with_item_context("a.jpg").unwrap_err();
        assert_eq!(err.item_name(), Some("b.jpg"));
    }
}
