//! Configuration management for HybridResize

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HybridResizeError, Result};
use crate::routing::RoutingMode;

pub mod options;
pub mod profiles;

pub use options::*;
pub use profiles::*;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batch limits and chunk pacing
    pub processing: ProcessingConfig,

    /// Remote service settings
    pub remote: RemoteConfig,

    /// Routing settings
    pub routing: RoutingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Named option presets, merged over the built-in ones
    pub presets: HashMap<String, ProcessingOptions>,
}

/// Global processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum number of items per batch
    pub max_files: usize,

    /// Maximum payload size per item (in bytes)
    pub max_file_size: u64,

    /// Maximum target dimension
    pub max_dimension: u32,

    /// Pause between local chunks in milliseconds
    pub local_chunk_yield_ms: u64,

    /// Pause between remote chunks in milliseconds
    pub remote_chunk_yield_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_files: 100,
            max_file_size: 50 * 1024 * 1024, // 50MB
            max_dimension: MAX_TARGET_DIMENSION,
            local_chunk_yield_ms: 10,
            remote_chunk_yield_ms: 100,
        }
    }
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the remote functions (None = remote disabled)
    pub base_url: Option<String>,

    /// Health probe timeout in milliseconds
    pub health_timeout_ms: u64,

    /// Batch request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Items per remote request
    pub batch_size: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            health_timeout_ms: 3000,
            request_timeout_ms: 30_000,
            batch_size: crate::parallel::REMOTE_BATCH_LIMIT,
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// How the execution path is chosen
    pub mode: RoutingMode,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            HybridResizeError::config(format!(
                "Failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        match extension_of(path.as_ref()).as_str() {
            "toml" => toml::from_str(&content).map_err(Into::into),
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(Into::into),
            _ => Err(HybridResizeError::config(
                "Unsupported config file format. Use .toml or .yaml",
            )),
        }
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = match extension_of(path.as_ref()).as_str() {
            "toml" => toml::to_string_pretty(self).map_err(|e| {
                HybridResizeError::config(format!("TOML serialization failed: {}", e))
            })?,
            "yaml" | "yml" => serde_yaml::to_string(self).map_err(|e| {
                HybridResizeError::config(format!("YAML serialization failed: {}", e))
            })?,
            _ => {
                return Err(HybridResizeError::config(
                    "Unsupported config file format. Use .toml or .yaml",
                ))
            }
        };

        std::fs::write(&path, content).map_err(|e| {
            HybridResizeError::config(format!(
                "Failed to write config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        Ok(())
    }

    /// Configuration with the built-in presets spelled out, used for `example-config`
    pub fn example() -> Self {
        Self {
            presets: builtin_presets().into_iter().collect(),
            remote: RemoteConfig {
                base_url: Some("https://example.netlify.app/.netlify/functions".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Look up a preset by name; configured presets shadow the built-in ones
    pub fn get_preset(&self, name: &str) -> Result<ProcessingOptions> {
        if let Some(options) = self.presets.get(name) {
            return Ok(options.clone());
        }

        builtin_preset(name).ok_or_else(|| {
            let mut available: Vec<String> = builtin_presets()
                .into_iter()
                .map(|(name, _)| name)
                .chain(self.presets.keys().cloned())
                .collect();
            available.sort();
            available.dedup();
            HybridResizeError::config(format!(
                "Preset '{}' not found. Available presets: {}",
                name,
                available.join(", ")
            ))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (name, preset) in &self.presets {
            preset.validate().map_err(|e| {
                HybridResizeError::config(format!("Invalid preset '{}': {}", name, e))
            })?;
        }

        if self.processing.max_files == 0 {
            return Err(HybridResizeError::config(
                "max_files must be greater than 0",
            ));
        }

        if self.processing.max_file_size == 0 {
            return Err(HybridResizeError::config(
                "max_file_size must be greater than 0",
            ));
        }

        if self.processing.max_dimension == 0 || self.processing.max_dimension > MAX_TARGET_DIMENSION
        {
            return Err(HybridResizeError::config(format!(
                "max_dimension must be between 1 and {}",
                MAX_TARGET_DIMENSION
            )));
        }

        let batch_size = self.remote.batch_size;
        if batch_size == 0 || batch_size > crate::parallel::REMOTE_BATCH_LIMIT {
            return Err(HybridResizeError::config(format!(
                "Remote batch size must be between 1 and {}, got {}",
                crate::parallel::REMOTE_BATCH_LIMIT,
                batch_size
            )));
        }

        if self.remote.health_timeout_ms == 0 || self.remote.request_timeout_ms == 0 {
            return Err(HybridResizeError::config(
                "Remote timeouts must be greater than 0",
            ));
        }

        if let Some(url) = &self.remote.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(HybridResizeError::config(format!(
                    "Remote base URL must start with http:// or https://, got {}",
                    url
                )));
            }
        }

        Ok(())
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}
