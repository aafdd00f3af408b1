//! Mask construction from classifier output

use crate::{
    config::ClassificationParams,
    types::{ConfidenceMap, RasterImage, SegmentationMask},
};
use rayon::prelude::*;

/// Half-width of the feathering window (5x5)
pub const FEATHER_RADIUS: usize = 2;

const DISCARD: u8 = 0;
const KEEP: u8 = 255;

/// Turns a [`ConfidenceMap`] into a full-resolution keep/discard mask
#[derive(Debug, Clone)]
pub struct MaskBuilder {
    threshold: f32,
    feather_edges: bool,
    row_parallel: bool,
}

impl MaskBuilder {
    /// Create a builder for threshold `t` in `[0, 1]`
    #[must_use]
    pub fn new(threshold: f32, feather_edges: bool) -> Self {
        Self {
            threshold,
            feather_edges,
            row_parallel: false,
        }
    }

    #[must_use]
    pub fn from_params(params: &ClassificationParams) -> Self {
        Self::new(params.threshold(), params.feather_edges)
    }

    /// Feather rows on the rayon pool instead of sequentially
    #[must_use]
    pub fn with_row_parallelism(mut self, enabled: bool) -> Self {
        self.row_parallel = enabled;
        self
    }

    /// Threshold, optionally feather, and return the final mask
    ///
    /// `confidence` and `image` must have the same dimensions.
    #[must_use]
    pub fn build(&self, confidence: &ConfidenceMap, image: &RasterImage) -> SegmentationMask {
        let base = self.threshold_mask(confidence, image);
        if !self.feather_edges {
            return base;
        }

        let mut feathered = self.feather(&base);
        // Transparent input pixels stay fully discarded after smoothing
        for (value, pixel) in feathered.data.iter_mut().zip(image.as_raw().chunks_exact(4)) {
            if pixel[3] == 0 {
                *value = DISCARD;
            }
        }
        feathered
    }

    /// Hard 0/255 mask: discard when `confidence > t`, keep otherwise
    ///
    /// The comparison is strict, so a confidence exactly equal to the
    /// threshold keeps the pixel.
    #[must_use]
    pub fn threshold_mask(&self, confidence: &ConfidenceMap, image: &RasterImage) -> SegmentationMask {
        debug_assert_eq!(confidence.dimensions(), image.dimensions());

        let data = confidence
            .values()
            .iter()
            .zip(image.as_raw().chunks_exact(4))
            .map(|(&value, pixel)| {
                if pixel[3] == 0 || value > self.threshold {
                    DISCARD
                } else {
                    KEEP
                }
            })
            .collect();

        SegmentationMask::new(data, image.dimensions())
    }

    /// Replace each value with the rounded mean of its in-bounds 5x5 window
    ///
    /// A box filter: every output lies between the minimum and maximum of
    /// its input window.
    #[must_use]
    pub fn feather(&self, mask: &SegmentationMask) -> SegmentationMask {
        let (width, height) = (mask.dimensions.0 as usize, mask.dimensions.1 as usize);
        let mut data = vec![0u8; mask.data.len()];
        if width == 0 || height == 0 {
            return SegmentationMask::new(data, mask.dimensions);
        }

        let source = &mask.data;
        if self.row_parallel {
            data.par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| box_filter_row(source, width, height, y, row));
        } else {
            data.chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| box_filter_row(source, width, height, y, row));
        }

        SegmentationMask::new(data, mask.dimensions)
    }
}

fn box_filter_row(source: &[u8], width: usize, height: usize, y: usize, out: &mut [u8]) {
    let y0 = y.saturating_sub(FEATHER_RADIUS);
    let y1 = (y + FEATHER_RADIUS).min(height - 1);

    for (x, value) in out.iter_mut().enumerate() {
        let x0 = x.saturating_sub(FEATHER_RADIUS);
        let x1 = (x + FEATHER_RADIUS).min(width - 1);

        let mut sum = 0u32;
        for ny in y0..=y1 {
            let row = &source[ny * width..(ny + 1) * width];
            sum += row[x0..=x1].iter().map(|&v| u32::from(v)).sum::<u32>();
        }
        let count = ((y1 - y0 + 1) * (x1 - x0 + 1)) as u32;
        *value = ((sum + count / 2) / count) as u8;
    }
}
