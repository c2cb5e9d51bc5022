//! Per-batch processing options

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HybridResizeError, Result};

/// Largest target dimension accepted for either side
pub const MAX_TARGET_DIMENSION: u32 = 8192;

/// Quality below this fraction counts as complex processing
pub const LOW_QUALITY_THRESHOLD: f32 = 0.7;

/// Lowest quality fraction accepted by validation
pub const MIN_QUALITY: f32 = 0.1;

/// Read-only option snapshot shared by every item of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingOptions {
    /// Target width in pixels
    pub width: Option<u32>,

    /// Target height in pixels
    pub height: Option<u32>,

    /// Encoder quality
    pub quality: Quality,

    /// Output format
    pub format: OutputFormat,

    /// Resampling algorithm
    pub algorithm: ResizeAlgorithm,

    /// Keep the source aspect ratio
    pub maintain_aspect_ratio: bool,

    /// Fill color for transparent areas
    pub background_color: Option<BackgroundColor>,

    /// Text watermark
    pub watermark: Option<Watermark>,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            quality: Quality::default(),
            format: OutputFormat::Jpeg,
            algorithm: ResizeAlgorithm::Lanczos,
            maintain_aspect_ratio: true,
            background_color: None,
            watermark: None,
        }
    }
}

impl ProcessingOptions {
    /// Options resizing to the given box
    pub fn new(width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the target width
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Set the target height
    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Set the quality
    pub fn quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Set the output format
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the resampling algorithm
    pub fn algorithm(mut self, algorithm: ResizeAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set whether the aspect ratio is kept
    pub fn maintain_aspect_ratio(mut self, maintain: bool) -> Self {
        self.maintain_aspect_ratio = maintain;
        self
    }

    /// Set the background color
    pub fn background(mut self, color: BackgroundColor) -> Self {
        self.background_color = Some(color);
        self
    }

    /// Set the watermark
    pub fn watermark(mut self, watermark: Watermark) -> Self {
        self.watermark = Some(watermark);
        self
    }

    /// Whether an enabled watermark with text is requested
    pub fn has_watermark(&self) -> bool {
        self.watermark
            .as_ref()
            .map_or(false, |w| w.enabled && !w.text.trim().is_empty())
    }

    /// Output format or algorithm that is expensive to produce
    pub fn is_size_costly(&self) -> bool {
        self.format.is_size_costly() || self.algorithm.is_high_cost()
    }

    /// Watermarking or aggressive quality reduction
    pub fn is_complex(&self) -> bool {
        self.has_watermark() || self.quality.as_fraction() < LOW_QUALITY_THRESHOLD
    }

    /// Validate the options, rejecting the whole batch on failure
    pub fn validate(&self) -> Result<()> {
        if self.width.is_none() && self.height.is_none() {
            return Err(HybridResizeError::invalid_options(
                "At least one dimension (width or height) must be specified",
            ));
        }

        for (name, value) in [("Width", self.width), ("Height", self.height)] {
            if let Some(value) = value {
                if value == 0 || value > MAX_TARGET_DIMENSION {
                    return Err(HybridResizeError::invalid_options(format!(
                        "{} must be between 1 and {} pixels, got {}",
                        name, MAX_TARGET_DIMENSION, value
                    )));
                }
            }
        }

        let quality = self.quality.as_fraction();
        if !(MIN_QUALITY..=1.0).contains(&quality) {
            return Err(HybridResizeError::invalid_options(format!(
                "Quality must be between {} and 1.0, got {}",
                MIN_QUALITY, quality
            )));
        }

        if let Some(watermark) = &self.watermark {
            watermark.validate()?;
        }

        Ok(())
    }
}

/// Encoder quality stored as a fraction in `(0, 1]`
///
/// Deserializes from either convention: `(0, 1]` is a fraction and
/// `(1, 100]` is a percentage.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Quality(f32);

impl Quality {
    /// Quality from a fraction in `(0, 1]`
    pub fn from_fraction(value: f32) -> Result<Self> {
        if value.is_finite() && value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(HybridResizeError::invalid_options(format!(
                "Quality fraction must be in (0, 1], got {}",
                value
            )))
        }
    }

    /// Quality from a percentage in `[1, 100]`
    pub fn from_percent(value: u8) -> Result<Self> {
        if (1..=100).contains(&value) {
            Ok(Self(f32::from(value) / 100.0))
        } else {
            Err(HybridResizeError::invalid_options(format!(
                "Quality must be between 1 and 100, got {}",
                value
            )))
        }
    }

    /// Fractional value
    pub fn as_fraction(self) -> f32 {
        self.0
    }

    /// Percentage value for encoders that use the 1-100 convention
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.9)
    }
}

impl TryFrom<f32> for Quality {
    type Error = HybridResizeError;

    fn try_from(value: f32) -> Result<Self> {
        if value > 1.0 && value <= 100.0 {
            Ok(Self(value / 100.0))
        } else {
            Self::from_fraction(value)
        }
    }
}

impl From<Quality> for f32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[serde(alias = "jpg", alias = "image/jpeg")]
    Jpeg,
    #[serde(alias = "image/png")]
    Png,
    #[serde(alias = "image/webp")]
    Webp,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    /// Get MIME type for this format
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// Name used on the remote wire (`jpeg`, `png`, `webp`)
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    /// Upper-case label used in format distributions
    pub fn label(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Webp => "WEBP",
        }
    }

    /// Lossless output tends to be large and slow to encode
    pub fn is_size_costly(self) -> bool {
        matches!(self, Self::Png)
    }

    /// Parse a format name, extension or MIME type
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" | "image/jpeg" => Some(Self::Jpeg),
            "png" | "image/png" => Some(Self::Png),
            "webp" | "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Available resampling algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeAlgorithm {
    /// Lanczos with radius 3 (high quality, slowest)
    #[default]
    #[serde(alias = "lanczos3")]
    Lanczos,
    /// Catmull-Rom cubic spline
    Bicubic,
    /// Linear interpolation
    Bilinear,
    /// Nearest neighbor (fastest, lowest quality)
    Nearest,
}

impl ResizeAlgorithm {
    /// Algorithms whose cost favours remote execution
    pub fn is_high_cost(self) -> bool {
        matches!(self, Self::Lanczos)
    }

    /// Name used on the remote wire
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Lanczos => "lanczos3",
            Self::Bicubic => "bicubic",
            Self::Bilinear => "bilinear",
            Self::Nearest => "nearest",
        }
    }

    /// Relative processing cost used by time estimates
    pub fn time_factor(self) -> f64 {
        match self {
            Self::Lanczos => 1.5,
            Self::Bicubic => 1.2,
            Self::Bilinear => 1.0,
            Self::Nearest => 0.8,
        }
    }
}

impl From<ResizeAlgorithm> for image::imageops::FilterType {
    fn from(algorithm: ResizeAlgorithm) -> Self {
        match algorithm {
            ResizeAlgorithm::Lanczos => image::imageops::FilterType::Lanczos3,
            ResizeAlgorithm::Bicubic => image::imageops::FilterType::CatmullRom,
            ResizeAlgorithm::Bilinear => image::imageops::FilterType::Triangle,
            ResizeAlgorithm::Nearest => image::imageops::FilterType::Nearest,
        }
    }
}

/// Background fill color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackgroundColor {
    Transparent,
    Rgb([u8; 3]),
}

impl BackgroundColor {
    /// White, used when JPEG output has no explicit background
    pub const WHITE: Self = Self::Rgb([255, 255, 255]);

    /// Parse `transparent`, `#rgb` or `#rrggbb`
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("transparent") {
            return Ok(Self::Transparent);
        }

        let hex = value.strip_prefix('#').unwrap_or(value);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HybridResizeError::invalid_options(format!(
                "Invalid background color: {}",
                value
            )));
        }

        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => {
                return Err(HybridResizeError::invalid_options(format!(
                    "Invalid background color: {}",
                    value
                )))
            }
        };

        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| {
                HybridResizeError::invalid_options(format!("Invalid background color: {}", value))
            })
        };

        Ok(Self::Rgb([channel(0)?, channel(2)?, channel(4)?]))
    }

    /// RGB fill, if any
    pub fn rgb(self) -> Option<[u8; 3]> {
        match self {
            Self::Transparent => None,
            Self::Rgb(rgb) => Some(rgb),
        }
    }
}

impl TryFrom<String> for BackgroundColor {
    type Error = HybridResizeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BackgroundColor> for String {
    fn from(color: BackgroundColor) -> Self {
        match color {
            BackgroundColor::Transparent => "transparent".to_string(),
            BackgroundColor::Rgb([r, g, b]) => format!("#{:02x}{:02x}{:02x}", r, g, b),
        }
    }
}

/// Text watermark descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Watermark {
    pub enabled: bool,
    pub text: String,
    pub position: WatermarkPosition,
    pub opacity: f32,
    pub font_size: u32,
    pub color: String,
}

impl Default for Watermark {
    fn default() -> Self {
        Self {
            enabled: true,
            text: String::new(),
            position: WatermarkPosition::BottomRight,
            opacity: 0.7,
            font_size: 24,
            color: "rgba(255,255,255,0.7)".to_string(),
        }
    }
}

impl Watermark {
    /// Enabled watermark with the given text
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.text.trim().is_empty() {
            return Err(HybridResizeError::invalid_options(
                "Watermark text must not be empty",
            ));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(HybridResizeError::invalid_options(format!(
                "Watermark opacity must be between 0 and 1, got {}",
                self.opacity
            )));
        }
        if self.font_size == 0 {
            return Err(HybridResizeError::invalid_options(
                "Watermark font size must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Watermark anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}
