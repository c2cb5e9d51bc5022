//! Built-in size presets and output naming

use serde::{Deserialize, Serialize};

use crate::config::{OutputFormat, ProcessingOptions};
use crate::error::{HybridResizeError, Result};

/// Longest output file name produced by [`sanitize_filename`]
pub const MAX_FILENAME_LEN: usize = 255;

const PRESET_TABLE: [(&str, u32, u32); 6] = [
    ("thumbnail", 150, 150),
    ("small", 400, 400),
    ("medium", 800, 800),
    ("large", 1200, 1200),
    ("hd", 1920, 1080),
    ("4k", 3840, 2160),
];

/// Built-in presets in display order
pub fn builtin_presets() -> Vec<(String, ProcessingOptions)> {
    PRESET_TABLE
        .iter()
        .map(|(name, width, height)| {
            (
                (*name).to_string(),
                ProcessingOptions::new(Some(*width), Some(*height)),
            )
        })
        .collect()
}

/// Look up a built-in preset
pub fn builtin_preset(name: &str) -> Option<ProcessingOptions> {
    let name = name.to_lowercase();
    PRESET_TABLE
        .iter()
        .find(|(preset, _, _)| *preset == name)
        .map(|(_, width, height)| ProcessingOptions::new(Some(*width), Some(*height)))
}

/// File naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Prefix to add to filenames
    pub prefix: Option<String>,

    /// Suffix to add to filenames (before extension)
    pub suffix: Option<String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            suffix: Some("_resized".to_string()),
        }
    }
}

impl NamingConfig {
    /// Generate the sanitized output filename for an input name
    pub fn generate_filename(&self, input_name: &str, format: OutputFormat) -> String {
        let base = input_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(input_name);
        let stem = match base.rfind('.') {
            Some(dot) if dot > 0 => &base[..dot],
            _ => base,
        };

        let mut name = String::new();
        if let Some(prefix) = &self.prefix {
            name.push_str(prefix);
        }
        name.push_str(stem);
        if let Some(suffix) = &self.suffix {
            name.push_str(suffix);
        }

        let extension = format.extension();
        let mut stem = sanitize_filename(&name);
        if stem.is_empty() {
            stem.push_str("image");
        }
        let limit = MAX_FILENAME_LEN.saturating_sub(extension.len() + 1);
        let stem: String = stem.chars().take(limit).collect();

        format!("{}.{}", stem, extension)
    }

    /// Validate naming configuration
    pub fn validate(&self) -> Result<()> {
        for (label, part) in [("Prefix", &self.prefix), ("Suffix", &self.suffix)] {
            if let Some(part) = part {
                if part.contains(is_reserved) {
                    return Err(HybridResizeError::config(format!(
                        "{} contains invalid filename characters",
                        label
                    )));
                }
            }
        }
        Ok(())
    }
}

fn is_reserved(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_whitespace()
}

/// Replace reserved characters and whitespace with `_`, collapse runs, trim and truncate
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if is_reserved(c) { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    out.trim_matches('_').chars().take(MAX_FILENAME_LEN).collect()
}
