//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error taxonomy for the removal pipeline
///
/// Classification, masking and compositing never fail on a structurally
/// valid image, so every variant here belongs to the boundaries around them:
/// parameter validation, decoding, encoding and batch orchestration.
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Input bytes are not a valid or supported raster image
    #[error("Decode error: {0}")]
    Decode(String),

    /// The composited image could not be serialized to the requested format
    #[error("Encode error: {0}")]
    Encode(String),

    /// Tolerance, quality or another option is outside its documented range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input/output errors while reading sources or writing results
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Processing was cancelled before this item finished
    #[error("Processing cancelled")]
    Cancelled,

    /// Generic error for unexpected conditions (e.g. a worker task panicked)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create parameter error with valid range
    pub fn param_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidParameter(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create decode error with input context
    pub fn decode_with_context(details: &str, input_size: usize, hint: Option<&str>) -> Self {
        let hint_context = match hint {
            Some(h) => format!(", content-type hint: {}", h),
            None => String::new(),
        };

        Self::Decode(format!(
            "{} (input: {} bytes{}). Supported formats: PNG, JPEG, WebP",
            details, input_size, hint_context
        ))
    }

    /// Whether resubmitting the same input could succeed
    ///
    /// Decode and encode failures are properties of the input and the
    /// requested format; only a cancelled item is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short machine-readable name of the error class
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::Encode(_) => "encode_error",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::Io(_) => "io_error",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal_error",
        }
    }
}
