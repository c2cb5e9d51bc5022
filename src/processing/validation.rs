//! Batch validation performed before any dispatch

use tracing::debug;

use crate::config::ProcessingConfig;
use crate::error::{HybridResizeError, Result};
use crate::processing::formats::is_supported_media_type;
use crate::processing::WorkItem;

/// Batch validator checking item count, sizes and media types
#[derive(Debug, Clone, Copy)]
pub struct BatchValidator {
    max_files: usize,
    max_file_size: u64,
}

impl BatchValidator {
    /// Create a new batch validator with default limits
    pub fn new() -> Self {
        Self::from_config(&ProcessingConfig::default())
    }

    /// Create a validator from the processing configuration
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            max_files: config.max_files,
            max_file_size: config.max_file_size,
        }
    }

    /// Create a validator with custom limits
    pub fn with_limits(max_files: usize, max_file_size: u64) -> Self {
        Self {
            max_files,
            max_file_size,
        }
    }

    /// Validate a single item
    pub fn validate_item(&self, item: &WorkItem) -> Result<()> {
        if item.payload.is_empty() {
            return Err(HybridResizeError::validation(
                "File is empty",
                Some(item.name.clone()),
            ));
        }

        if item.size() > self.max_file_size {
            return Err(HybridResizeError::file_too_large(
                item.size(),
                self.max_file_size,
                item.name.clone(),
            ));
        }

        if !is_supported_media_type(&item.media_type) {
            return Err(HybridResizeError::unsupported_format(
                item.media_type.clone(),
                Some(item.name.clone()),
            ));
        }

        Ok(())
    }

    /// Validate a whole batch; any violation rejects it and names every offender
    pub fn validate_batch(&self, items: &[WorkItem]) -> Result<()> {
        if items.len() > self.max_files {
            return Err(HybridResizeError::batch_rejected(format!(
                "Too many files: {} (maximum {})",
                items.len(),
                self.max_files
            )));
        }

        let problems: Vec<String> = items
            .iter()
            .filter_map(|item| {
                self.validate_item(item)
                    .err()
                    .map(|e| format!("{}: {}", item.name, e.user_message()))
            })
            .collect();

        if !problems.is_empty() {
            return Err(HybridResizeError::batch_rejected(format!(
                "{} invalid file(s): {}",
                problems.len(),
                problems.join("; ")
            )));
        }

        debug!("Validated batch of {} items", items.len());
        Ok(())
    }
}

impl Default for BatchValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn item(name: &str, size: usize, media_type: &str) -> WorkItem {
        WorkItem::new(name, vec![1u8; size], media_type)
    }

    #[test]
    fn test_valid_batch() {
        let items = vec![item("a.jpg", 10, "image/jpeg"), item("b.png", 10, "image/png")];
        assert!(BatchValidator::new().validate_batch(&items).is_ok());
    }

    #[test]
    fn test_empty_batch_is_valid() {
        assert!(BatchValidator::new().validate_batch(&[]).is_ok());
    }

    #[test]
    fn test_too_many_files() {
        let items: Vec<_> = (0..101)
            .map(|i| item(&format!("{}.jpg", i), 1, "image/jpeg"))
            .collect();
        let err = BatchValidator::new().validate_batch(&items).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("101"));
    }

    #[test]
    fn test_lists_every_offender() {
        let validator = BatchValidator::with_limits(10, 100);
        let items = vec![
            item("ok.jpg", 10, "image/jpeg"),
            item("big.jpg", 101, "image/jpeg"),
            item("doc.pdf", 10, "application/pdf"),
            item("empty.png", 0, "image/png"),
        ];
        let err = validator.validate_batch(&items).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("3 invalid file(s)"));
        assert!(message.contains("big.jpg"));
        assert!(message.contains("doc.pdf"));
        assert!(message.contains("empty.png"));
        assert!(!message.contains("ok.jpg"));
        assert!(!err.triggers_fallback());
    }

    #[test]
    fn test_item_errors() {
        let validator = BatchValidator::with_limits(10, 100);
        assert!(matches!(
            validator.validate_item(&item("big.jpg", 200, "image/jpeg")),
            Err(HybridResizeError::FileTooLarge { .. })
        ));
        assert!(matches!(
            validator.validate_item(&item("x.tif", 5, "image/tiff")),
            Err(HybridResizeError::UnsupportedFormat { .. })
        ));
    }
}
