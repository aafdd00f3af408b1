//! Core types for background removal operations

use crate::{
    config::{OutputFormat, RemovalConfig},
    error::{BgRemovalError, Result},
};
use base64::{engine::general_purpose, Engine as _};
use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of interleaved channels in a [`RasterImage`] buffer (R, G, B, A)
pub const CHANNELS: usize = 4;

/// Immutable RGBA8 raster
///
/// Row-major, four bytes per pixel. The buffer length always equals
/// `width * height * 4`; the constructors refuse anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterImage {
    /// Wrap an existing RGBA buffer
    ///
    /// # Errors
    /// - Buffer length does not match `width * height * 4`
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(BgRemovalError::invalid_parameter(format!(
                "Pixel buffer of {} bytes does not match {}x{} RGBA ({} bytes)",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wrap a buffer whose length is already known to be correct
    pub(crate) fn from_raw_parts(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * CHANNELS);
        Self {
            width,
            height,
            data,
        }
    }

    /// Create an image filled with a single RGBA value
    #[must_use]
    pub fn from_pixel(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba.repeat(width as usize * height as usize);
        Self {
            width,
            height,
            data,
        }
    }

    /// Build an image from a per-pixel function of `(x, y)`
    #[must_use]
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [u8; 4],
    {
        let mut data = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Image width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` pair
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Raw interleaved RGBA bytes
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Consume the image and return its buffer
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// RGBA value at `(x, y)`
    ///
    /// # Panics
    /// Panics if the coordinate lies outside the image.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.data[offset..offset + CHANNELS]);
        rgba
    }

    /// Bytes of row `y`
    pub(crate) fn row(&self, y: usize) -> &[u8] {
        let stride = self.width as usize * CHANNELS;
        &self.data[y * stride..(y + 1) * stride]
    }

    /// Convert to an `image` crate buffer for encoding
    #[must_use]
    pub fn into_rgba_image(self) -> RgbaImage {
        let (width, height) = (self.width, self.height);
        // Length invariant is upheld by every constructor
        RgbaImage::from_raw(width, height, self.data)
            .unwrap_or_else(|| RgbaImage::new(width, height))
    }
}

impl From<RgbaImage> for RasterImage {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

/// Per-pixel background evidence in `[0, 1]`
///
/// Produced by the classifier and consumed only by the mask builder; the
/// decision threshold is applied there, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl ConfidenceMap {
    pub(crate) fn new(width: u32, height: u32, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), width as usize * height as usize);
        Self {
            width,
            height,
            values,
        }
    }

    /// `(width, height)` pair
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Confidence at `(x, y)`, `None` outside the map
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Row-major confidence values
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Keep/discard weights: 0 discards, 255 keeps, anything between is a soft edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255)
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Mask value at `(x, y)`, `None` outside the mask
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        let (width, height) = self.dimensions;
        if x >= width || y >= height {
            return None;
        }
        self.data.get(y as usize * width as usize + x as usize).copied()
    }

    /// Convert mask to a grayscale image
    ///
    /// # Errors
    /// - Data length does not match the stored dimensions
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, self.data.clone()).ok_or_else(|| {
            BgRemovalError::internal("Failed to create image from mask data")
        })
    }

    /// Save mask as PNG
    ///
    /// # Errors
    /// - Invalid mask data
    /// - File I/O or PNG encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let image = self.to_image()?;
        image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| BgRemovalError::encode(format!("Failed to save mask: {}", e)))
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let background_pixels = self.data.iter().filter(|&&v| v == 0).count();
        let foreground_pixels = self.data.iter().filter(|&&v| v == 255).count();
        let soft_edge_pixels = total_pixels - background_pixels - foreground_pixels;

        let ratio = |count: usize| {
            if total_pixels == 0 {
                0.0
            } else {
                count as f32 / total_pixels as f32
            }
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            soft_edge_pixels,
            foreground_ratio: ratio(foreground_pixels),
            background_ratio: ratio(background_pixels),
        }
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskStatistics {
    pub total_pixels: usize,
    /// Pixels with mask value 255
    pub foreground_pixels: usize,
    /// Pixels with mask value 0
    pub background_pixels: usize,
    /// Pixels strictly between 0 and 255
    pub soft_edge_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

/// Width/height pair as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Echo of the parameters an item was processed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalMetadata {
    pub tolerance: u8,
    pub feather_edges: bool,
    pub output_format: OutputFormat,
    pub quality: u8,
}

impl From<&RemovalConfig> for RemovalMetadata {
    fn from(config: &RemovalConfig) -> Self {
        Self {
            tolerance: config.classification.tolerance,
            feather_edges: config.classification.feather_edges,
            output_format: config.encoding.output_format,
            quality: config.encoding.quality,
        }
    }
}

/// Detailed timing breakdown for one image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Decoding input bytes into a raster
    pub decode_ms: u64,
    /// Computing the confidence map
    pub classification_ms: u64,
    /// Thresholding and feathering
    pub mask_ms: u64,
    /// Applying the mask to the image
    pub composite_ms: u64,
    /// Serializing to the output format
    pub encode_ms: u64,
    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Get timing summary for display
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Decode: {}ms | Classify: {}ms | Mask: {}ms | Composite: {}ms | Encode: {}ms",
            self.total_ms,
            self.decode_ms,
            self.classification_ms,
            self.mask_ms,
            self.composite_ms,
            self.encode_ms
        )
    }
}

/// Successful result of processing one image
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// Encoded output image
    pub encoded: Vec<u8>,

    /// Size of the input byte stream
    pub original_size: usize,

    /// Image dimensions (unchanged by processing)
    pub dimensions: Dimensions,

    /// Parameters used
    pub metadata: RemovalMetadata,

    /// Stage timings
    pub timings: ProcessingTimings,

    /// Summary of the final mask
    pub mask_statistics: MaskStatistics,
}

impl RemovalResult {
    /// Size of the encoded output
    #[must_use]
    pub fn final_size(&self) -> usize {
        self.encoded.len()
    }

    /// Write the encoded bytes to disk
    ///
    /// # Errors
    /// - File I/O failures
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.encoded)?;
        Ok(())
    }

    /// Serializable view in the caller-facing output shape
    #[must_use]
    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary {
            success: true,
            error: None,
            error_kind: None,
            original_size: self.original_size,
            final_size: Some(self.final_size()),
            dimensions: Some(self.dimensions),
            encoded_bytes: Some(general_purpose::STANDARD.encode(&self.encoded)),
            metadata: self.metadata,
        }
    }
}

/// Outcome of one batch item, success or failure
#[derive(Debug)]
pub struct ItemOutcome {
    /// Position of the item in the submitted job
    pub index: usize,
    /// Size of the input byte stream
    pub original_size: usize,
    /// Parameters the item was submitted with
    pub metadata: RemovalMetadata,
    /// Processing result
    pub result: Result<RemovalResult>,
}

impl ItemOutcome {
    /// Whether this item produced encoded output
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Error of a failed item
    #[must_use]
    pub fn error(&self) -> Option<&BgRemovalError> {
        self.result.as_ref().err()
    }

    /// Serializable view in the caller-facing output shape
    #[must_use]
    pub fn summary(&self) -> OutcomeSummary {
        match &self.result {
            Ok(result) => result.summary(),
            Err(error) => OutcomeSummary {
                success: false,
                error: Some(error.to_string()),
                error_kind: Some(error.kind().to_string()),
                original_size: self.original_size,
                final_size: None,
                dimensions: None,
                encoded_bytes: None,
                metadata: self.metadata,
            },
        }
    }
}

/// Per-item output shape:
/// `{success, error?, originalSize, finalSize, dimensions, encodedBytes, metadata}`
///
/// `encodedBytes` carries the encoded image as standard base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub original_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_bytes: Option<String>,
    pub metadata: RemovalMetadata,
}

/// Ordered outcomes of a batch; `results[i]` belongs to input `i`
#[derive(Debug, Default)]
pub struct BatchResult {
    pub results: Vec<ItemOutcome>,
}

impl BatchResult {
    /// Number of submitted items
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.results.len()
    }

    /// Number of items that produced output
    #[must_use]
    pub fn successful_files(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of failed items
    #[must_use]
    pub fn failed_files(&self) -> usize {
        self.total_files() - self.successful_files()
    }

    /// True only when every item succeeded
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed_files() == 0
    }

    /// Serializable view: `{success, results, totalFiles, successfulFiles}`
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            success: self.success(),
            results: self.results.iter().map(ItemOutcome::summary).collect(),
            total_files: self.total_files(),
            successful_files: self.successful_files(),
        }
    }
}

/// Batch output shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub success: bool,
    pub results: Vec<OutcomeSummary>,
    pub total_files: usize,
    pub successful_files: usize,
}
