//! Single-image background removal processor
//!
//! `BackgroundRemovalProcessor` runs one image through
//! decode → classify → mask → composite → encode. The batch runner and the
//! convenience functions in the crate root are thin wrappers around it.

use crate::{
    classifier::PixelClassifier,
    compositor::Compositor,
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    mask::MaskBuilder,
    services::{ImageIOService, OutputFormatHandler, ProcessingStage, ProgressTracker},
    types::{ProcessingTimings, RasterImage, RemovalMetadata, RemovalResult, SegmentationMask},
};
use instant::Instant;
use log::debug;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug as trace_debug, info as trace_info, instrument, span, Level};

/// Composited image together with the mask that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    /// Source pixels with the mask applied
    pub image: RasterImage,
    /// Final (possibly feathered) mask
    pub mask: SegmentationMask,
}

/// Runs the pixel pipeline for one image at a time
///
/// Holds no per-image state; one processor can handle any number of
/// images sequentially.
pub struct BackgroundRemovalProcessor {
    config: RemovalConfig,
    row_parallel: bool,
    progress_tracker: Option<ProgressTracker>,
    cancellation: Option<CancellationToken>,
}

impl BackgroundRemovalProcessor {
    /// Create a processor for a validated configuration
    ///
    /// # Errors
    /// - Tolerance or quality outside their documented ranges
    pub fn new(config: RemovalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            row_parallel: false,
            progress_tracker: None,
            cancellation: None,
        })
    }

    /// Split classification and feathering across rayon worker threads
    #[must_use]
    pub fn with_row_parallelism(mut self, enabled: bool) -> Self {
        self.row_parallel = enabled;
        self
    }

    /// Report stage changes to `tracker`
    #[must_use]
    pub fn with_progress_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.progress_tracker = Some(tracker);
        self
    }

    /// Abort with [`BgRemovalError::Cancelled`] once `token` fires
    ///
    /// The token is checked between stages, never inside a stage.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Configuration this processor runs with
    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Classify, mask and composite an already decoded image
    ///
    /// Pure with respect to `image`: the input is never modified.
    #[must_use]
    pub fn remove_background(&self, image: &RasterImage) -> ProcessedImage {
        let params = &self.config.classification;
        let confidence = PixelClassifier::new(*params)
            .with_row_parallelism(self.row_parallel)
            .classify(image);
        let mask = MaskBuilder::from_params(params)
            .with_row_parallelism(self.row_parallel)
            .build(&confidence, image);
        let image = Compositor::new(params.feather_edges).composite(image, &mask);
        ProcessedImage { image, mask }
    }

    /// Decode, process and encode an in-memory image
    ///
    /// # Errors
    /// - `Decode` when the bytes are not a supported image
    /// - `Encode` when the output format rejects the result
    /// - `Cancelled` when the cancellation token fired between stages
    pub fn process_bytes(&mut self, bytes: &[u8], content_type: Option<&str>) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        let image = self.run_stage(ProcessingStage::Decoding, || {
            let decode_start = Instant::now();
            let image = ImageIOService::decode(bytes, content_type)?;
            timings.decode_ms = decode_start.elapsed().as_millis() as u64;
            Ok(image)
        })?;

        self.process_decoded(image, bytes.len(), timings, total_start)
    }

    /// Process an already decoded image and encode the result
    ///
    /// `original_size` is reported as the raw RGBA buffer length.
    ///
    /// # Errors
    /// - `Encode` when the output format rejects the result
    /// - `Cancelled` when the cancellation token fired between stages
    pub fn process_image(&mut self, image: RasterImage) -> Result<RemovalResult> {
        let original_size = image.as_raw().len();
        self.process_decoded(image, original_size, ProcessingTimings::default(), Instant::now())
    }

    /// Read an async stream to the end and process it
    ///
    /// # Errors
    /// - `Io` when reading the stream fails
    /// - Everything [`Self::process_bytes`] can return
    pub async fn process_reader<R: tokio::io::AsyncRead + Unpin>(
        &mut self,
        mut reader: R,
        content_type: Option<&str>,
    ) -> Result<RemovalResult> {
        let buffer = ImageIOService::read_all(&mut reader).await?;
        self.process_bytes(&buffer, content_type)
    }

    /// Read an image file and process it, hinting the decoder by extension
    ///
    /// # Errors
    /// - `Io` when the file cannot be read
    /// - Everything [`Self::process_bytes`] can return
    pub async fn process_file<P: AsRef<Path>>(&mut self, input_path: P) -> Result<RemovalResult> {
        let input_path = input_path.as_ref();
        let bytes = tokio::fs::read(input_path).await?;
        let content_type = ImageIOService::content_type_for_path(input_path);
        debug!(
            "Read {} bytes from {} (hint: {:?})",
            bytes.len(),
            input_path.display(),
            content_type
        );
        self.process_bytes(&bytes, content_type)
    }

    #[instrument(
        skip(self, image, timings, total_start),
        fields(
            dimensions = %format!("{}x{}", image.width(), image.height()),
            tolerance = self.config.classification.tolerance,
            format = %self.config.encoding.output_format
        )
    )]
    fn process_decoded(
        &mut self,
        image: RasterImage,
        original_size: usize,
        mut timings: ProcessingTimings,
        total_start: Instant,
    ) -> Result<RemovalResult> {
        let params = self.config.classification;
        let dimensions = image.dimensions();

        trace_info!(
            width = dimensions.0,
            height = dimensions.1,
            feather_edges = params.feather_edges,
            "Starting image processing"
        );
        if params.auto_enhance {
            trace_debug!("autoEnhance requested; accepted but no enhancement is applied");
        }

        let row_parallel = self.row_parallel;

        let confidence = self.run_stage(ProcessingStage::Classification, || {
            let _span = span!(Level::DEBUG, "classification", row_parallel).entered();
            let start = Instant::now();
            let confidence = PixelClassifier::new(params)
                .with_row_parallelism(row_parallel)
                .classify(&image);
            timings.classification_ms = start.elapsed().as_millis() as u64;
            Ok(confidence)
        })?;

        let mask = self.run_stage(ProcessingStage::MaskGeneration, || {
            let _span = span!(Level::DEBUG, "mask", threshold = params.threshold()).entered();
            let start = Instant::now();
            let mask = MaskBuilder::from_params(&params)
                .with_row_parallelism(row_parallel)
                .build(&confidence, &image);
            timings.mask_ms = start.elapsed().as_millis() as u64;
            Ok(mask)
        })?;
        drop(confidence);

        let mask_statistics = mask.statistics();
        trace_debug!(
            foreground = mask_statistics.foreground_pixels,
            background = mask_statistics.background_pixels,
            soft_edge = mask_statistics.soft_edge_pixels,
            "Mask generated"
        );

        let composited = self.run_stage(ProcessingStage::Compositing, || {
            let start = Instant::now();
            let composited = Compositor::new(params.feather_edges).composite(&image, &mask);
            timings.composite_ms = start.elapsed().as_millis() as u64;
            Ok(composited)
        })?;
        drop(image);

        let encoding = self.config.encoding;
        let encoded = self.run_stage(ProcessingStage::Encoding, || {
            let _span = span!(Level::DEBUG, "encode", format = %encoding.output_format).entered();
            let start = Instant::now();
            let encoded = OutputFormatHandler::encode(composited, &encoding)?;
            timings.encode_ms = start.elapsed().as_millis() as u64;
            Ok(encoded)
        })?;

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        trace_info!(
            total_ms = timings.total_ms,
            output_bytes = encoded.len(),
            "Image processing completed"
        );

        if let Some(ref tracker) = self.progress_tracker {
            tracker.report_completion(timings.clone());
        }

        Ok(RemovalResult {
            encoded,
            original_size,
            dimensions: dimensions.into(),
            metadata: RemovalMetadata::from(&self.config),
            timings,
            mask_statistics,
        })
    }

    /// Check cancellation, report the stage, run it and report any failure
    fn run_stage<T, F>(&mut self, stage: ProcessingStage, body: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            debug!("Cancelled before {}", stage.description());
            return Err(BgRemovalError::Cancelled);
        }

        if let Some(ref mut tracker) = self.progress_tracker {
            tracker.report_stage(stage);
        }

        body().map_err(|e| {
            if let Some(ref tracker) = self.progress_tracker {
                tracker.report_error(&e.to_string());
            }
            e
        })
    }
}
