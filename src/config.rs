//! Configuration types for background removal operations

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default tolerance (0-100)
pub const DEFAULT_TOLERANCE: u8 = 50;

/// Default quality for lossy output formats (1-100)
pub const DEFAULT_QUALITY: u8 = 90;

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG (no transparency, alpha channel is dropped)
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpg"),
            Self::WebP => write!(f, "webp"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::WebP),
            other => Err(BgRemovalError::invalid_parameter(format!(
                "Unsupported output format '{}' (expected png, jpg or webp)",
                other
            ))),
        }
    }
}

/// Knobs that drive pixel classification and mask construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassificationParams {
    /// Caller-facing sensitivity knob (0-100).
    ///
    /// Higher values require *more* background evidence before a pixel is
    /// removed, so raising the number makes removal less aggressive. The
    /// name suggests the opposite; the numeric behavior is kept as-is.
    pub tolerance: u8,

    /// Smooth the mask with a 5x5 box filter and boost contrast at soft edges
    pub feather_edges: bool,

    /// Exempt dark, non-uniform regions from the extreme-brightness heuristic
    pub preserve_shadows: bool,

    /// Accepted for interface compatibility; has no effect on the output
    pub auto_enhance: bool,
}

impl Default for ClassificationParams {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            feather_edges: true,
            preserve_shadows: false,
            auto_enhance: false,
        }
    }
}

impl ClassificationParams {
    /// Normalized decision threshold `t = tolerance / 100`
    #[must_use]
    pub fn threshold(&self) -> f32 {
        score_to_unit(self.tolerance)
    }

    /// Validate the tolerance range
    ///
    /// # Errors
    /// - Tolerance above 100
    pub fn validate(&self) -> Result<()> {
        if self.tolerance > 100 {
            return Err(BgRemovalError::param_value_error(
                "tolerance",
                self.tolerance,
                "0-100",
                Some(DEFAULT_TOLERANCE),
            ));
        }
        Ok(())
    }
}

/// Output encoding parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncodingParams {
    /// Target container format
    pub output_format: OutputFormat,
    /// Quality (1-100), only meaningful for lossy formats
    pub quality: u8,
}

impl Default for EncodingParams {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            quality: DEFAULT_QUALITY,
        }
    }
}

impl EncodingParams {
    /// Validate the quality range
    ///
    /// # Errors
    /// - Quality of 0 or above 100
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(BgRemovalError::param_value_error(
                "quality",
                self.quality,
                "1-100",
                Some(DEFAULT_QUALITY),
            ));
        }
        Ok(())
    }
}

/// Converts an integer percentage to the unit interval.
///
/// Confidence scores and the threshold both go through this function so
/// that equal percentages compare equal as floats.
#[must_use]
pub(crate) fn score_to_unit(percent: u8) -> f32 {
    f32::from(percent) / 100.0
}

/// Parameter object accepted from the hosting application
///
/// Serializes with the camelCase option names callers already send:
/// `tolerance`, `featherEdges`, `outputFormat`, `quality`,
/// `preserveShadows`, `autoEnhance`. Missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Classification and masking options
    #[serde(flatten)]
    pub classification: ClassificationParams,

    /// Output encoding options
    #[serde(flatten)]
    pub encoding: EncodingParams,
}

impl RemovalConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use heuristic_bgremove::{OutputFormat, RemovalConfig};
    ///
    /// let config = RemovalConfig::builder()
    ///     .tolerance(30)
    ///     .feather_edges(false)
    ///     .output_format(OutputFormat::WebP)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.classification.tolerance, 30);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Parse the parameter object from JSON
    ///
    /// # Errors
    /// - Malformed JSON or wrongly typed fields
    /// - Values outside their documented ranges
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            BgRemovalError::invalid_parameter(format!("Failed to parse options: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Validation Rules
    ///
    /// - Tolerance: 0-100 (inclusive)
    /// - Quality: 1-100 (inclusive)
    ///
    /// # Errors
    /// - Invalid tolerance value
    /// - Invalid quality value
    ///
    /// # Examples
    ///
    /// ```rust
    /// use heuristic_bgremove::RemovalConfig;
    ///
    /// let mut config = RemovalConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.encoding.quality = 0; // Invalid
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        self.classification.validate()?;
        self.encoding.validate()
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    /// Set tolerance (0-100)
    #[must_use]
    pub fn tolerance(mut self, tolerance: u8) -> Self {
        self.config.classification.tolerance = tolerance;
        self
    }

    /// Enable or disable edge feathering
    #[must_use]
    pub fn feather_edges(mut self, feather: bool) -> Self {
        self.config.classification.feather_edges = feather;
        self
    }

    /// Enable or disable shadow preservation
    #[must_use]
    pub fn preserve_shadows(mut self, preserve: bool) -> Self {
        self.config.classification.preserve_shadows = preserve;
        self
    }

    /// Set the auto-enhance flag (accepted, currently ignored)
    #[must_use]
    pub fn auto_enhance(mut self, enhance: bool) -> Self {
        self.config.classification.auto_enhance = enhance;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.encoding.output_format = format;
        self
    }

    /// Set quality (1-100)
    #[must_use]
    pub fn quality(mut self, quality: u8) -> Self {
        self.config.encoding.quality = quality;
        self
    }

    /// Build and validate the configuration
    ///
    /// Out-of-range values are rejected rather than clamped so that the
    /// caller learns about them before any image enters the pipeline.
    ///
    /// # Errors
    /// - Invalid tolerance value (must be 0-100)
    /// - Invalid quality value (must be 1-100)
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Options for the batch runner's worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum number of images processed concurrently (0 = one per CPU core)
    pub max_workers: usize,
    /// Split classification and feathering across rows
    pub row_parallel: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_workers: 0,
            row_parallel: false,
        }
    }
}

impl BatchOptions {
    /// Resolve `max_workers`, substituting the available core count for 0
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    }
}
