#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Heuristic Background Removal
//!
//! Separates foreground from background in raster images with a handful of
//! cheap local heuristics instead of a trained model. Every pixel is scored
//! by four binary flags (near the border, extreme brightness, low
//! saturation, uniform neighbourhood), the score is thresholded into a
//! keep/discard mask, the mask is optionally feathered, and the result is
//! composited into the image's alpha channel.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ─► RasterImage ─► PixelClassifier ─► ConfidenceMap
//!                                               │
//!                          MaskBuilder ◄────────┘
//!                               │
//!                          SegmentationMask ─► Compositor ─► RasterImage ─► encoded bytes
//! ```
//!
//! Each stage is a pure function of its inputs; nothing is shared between
//! images, so [`BatchRunner`] fans a batch out over a bounded worker pool.
//!
//! ## Tolerance
//!
//! `tolerance` (0-100) becomes the threshold `t = tolerance / 100`, and a
//! pixel is removed only when its confidence is strictly greater than `t`.
//! A *higher* tolerance therefore removes *less*. Pixels that trigger none
//! of the four heuristics are never removed, whatever the tolerance.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use heuristic_bgremove::{remove_background_from_bytes, OutputFormat, RemovalConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RemovalConfig::builder()
//!     .tolerance(40)
//!     .output_format(OutputFormat::Png)
//!     .build()?;
//!
//! let input = tokio::fs::read("photo.jpg").await?;
//! let result = remove_background_from_bytes(&input, Some("image/jpeg"), &config).await?;
//! result.save("photo_bg_removed.png")?;
//! println!("{}", serde_json::to_string(&result.summary())?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Batches
//!
//! ```rust,no_run
//! use heuristic_bgremove::{
//!     remove_background_batch, BatchItem, BatchJob, CallbackProgressReporter, RemovalConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(uploads: Vec<Vec<u8>>) -> anyhow::Result<()> {
//! let job: BatchJob = uploads
//!     .into_iter()
//!     .map(|bytes| BatchItem::new(bytes, RemovalConfig::default()))
//!     .collect();
//!
//! let reporter = Arc::new(CallbackProgressReporter::new(|message: &str, percent: u8| {
//!     println!("[{percent:>3}%] {message}");
//! }));
//! let batch = remove_background_batch(job, Some(reporter)).await?;
//! println!("{} of {} succeeded", batch.successful_files(), batch.total_files());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line binary, progress bar and tracing subscriber
//! - `webp-support` (default): WebP decoding and lossless WebP output
//! - `tracing-json`: JSON log output for the CLI
//!
//! To use only as a library without CLI dependencies:
//!
//! ```toml
//! [dependencies]
//! heuristic-bgremove = { version = "0.1", default-features = false, features = ["webp-support"] }
//! ```

pub mod batch;
pub mod classifier;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod mask;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

use std::sync::Arc;
use tokio::io::AsyncRead;

// Public API exports
pub use batch::{BatchItem, BatchJob, BatchRunner};
pub use classifier::{PixelClassifier, PixelFlags};
pub use compositor::Compositor;
pub use config::{
    BatchOptions, ClassificationParams, EncodingParams, OutputFormat, RemovalConfig,
    RemovalConfigBuilder,
};
pub use error::{BgRemovalError, Result};
pub use mask::MaskBuilder;
pub use processor::{BackgroundRemovalProcessor, ProcessedImage};
pub use services::{
    BatchItemEvent, BatchProgressUpdate, CallbackProgressReporter, ConsoleProgressReporter,
    ImageIOService, NoOpProgressReporter, OutputFormatHandler, ProcessingStage,
    ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use types::{
    BatchResult, BatchSummary, ConfidenceMap, Dimensions, ItemOutcome, MaskStatistics,
    OutcomeSummary, ProcessingTimings, RasterImage, RemovalMetadata, RemovalResult,
    SegmentationMask,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background from one encoded image
///
/// # Arguments
///
/// * `image_bytes` - Encoded PNG, JPEG or WebP data
/// * `content_type` - Optional MIME hint such as `image/png`; a wrong hint
///   falls back to content sniffing
/// * `config` - Classification and encoding parameters
///
/// # Errors
///
/// - `InvalidParameter` when `config` is out of range
/// - `Decode` / `Encode` for codec failures
///
/// # Examples
///
/// ```rust,no_run
/// use heuristic_bgremove::{remove_background_from_bytes, RemovalConfig};
///
/// # async fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let config = RemovalConfig::from_json(r#"{"tolerance": 30, "outputFormat": "webp"}"#)?;
/// let result = remove_background_from_bytes(&upload_bytes, None, &config).await?;
/// assert_eq!(result.metadata.tolerance, 30);
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    content_type: Option<&str>,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(*config)?;
    let bytes = image_bytes.to_vec();
    let content_type = content_type.map(str::to_owned);
    run_blocking(move || processor.process_bytes(&bytes, content_type.as_deref())).await
}

/// Remove the background from an already decoded image
///
/// `original_size` in the result is the raw RGBA buffer length.
pub async fn remove_background_from_image(
    image: RasterImage,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(*config)?;
    run_blocking(move || processor.process_image(image)).await
}

/// Remove the background from an async reader stream
///
/// The stream is buffered in memory before decoding.
///
/// # Examples
///
/// ```rust,no_run
/// use heuristic_bgremove::{remove_background_from_reader, RemovalConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("large_image.png").await?;
/// let result = remove_background_from_reader(file, Some("image/png"), &RemovalConfig::default()).await?;
/// result.save("output.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    content_type: Option<&str>,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(*config)?;
    let bytes = ImageIOService::read_all(&mut reader).await?;
    let content_type = content_type.map(str::to_owned);
    run_blocking(move || processor.process_bytes(&bytes, content_type.as_deref())).await
}

/// Pixel work runs on the blocking pool, off the async executor
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BgRemovalError::internal(format!("worker task failed: {}", e)))?
}

/// Process several images with one worker per CPU core
///
/// Results are returned in input order. A failing item is reported in its
/// own slot and does not affect the others; invalid parameters on any item
/// fail the whole call before anything runs.
pub async fn remove_background_batch(
    job: BatchJob,
    reporter: Option<Arc<dyn ProgressReporter>>,
) -> Result<BatchResult> {
    let mut runner = BatchRunner::new(BatchOptions::default());
    if let Some(reporter) = reporter {
        runner = runner.with_progress_reporter(reporter);
    }
    runner.run(job).await
}
