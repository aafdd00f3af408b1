//! Per-pixel background classification
//!
//! Every opaque pixel is checked against four local heuristics. Each one
//! that fires adds its weight to the pixel's background score:
//!
//! | heuristic              | weight |
//! |------------------------|--------|
//! | near image border      | 0.4    |
//! | extreme brightness     | 0.3    |
//! | low saturation         | 0.2    |
//! | uniform neighborhood   | 0.1    |
//!
//! A pixel matching no heuristic keeps a score of zero and can never be
//! removed, whatever the tolerance. Thresholding happens later in
//! [`MaskBuilder`](crate::mask::MaskBuilder).

use crate::{
    config::{score_to_unit, ClassificationParams},
    types::{ConfidenceMap, RasterImage, CHANNELS},
};
use rayon::prelude::*;

/// Pixels closer than this to any border count as edge pixels
pub const EDGE_MARGIN: u32 = 5;

/// Half-width of the square neighborhood window (7x7)
pub const NEIGHBORHOOD_RADIUS: i64 = 3;

/// Euclidean RGB distance below which a neighbor counts as similar
pub const SIMILAR_COLOR_DISTANCE: u32 = 30;

// Weights in hundredths so scores stay exact integers.
const EDGE_WEIGHT: u8 = 40;
const BRIGHTNESS_WEIGHT: u8 = 30;
const SATURATION_WEIGHT: u8 = 20;
const UNIFORMITY_WEIGHT: u8 = 10;

/// Score of a pixel that is already fully transparent
const TRANSPARENT_SCORE: u8 = 100;

// Channel sums equivalent to an RGB mean above 240 or below 15.
const BRIGHT_CHANNEL_SUM: u32 = 720;
const DARK_CHANNEL_SUM: u32 = 45;

/// Which heuristics fired for one pixel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelFlags {
    pub edge: bool,
    pub extreme_brightness: bool,
    pub low_saturation: bool,
    pub uniform_neighborhood: bool,
}

impl PixelFlags {
    /// Whether the pixel is a removal candidate at all
    #[must_use]
    pub fn any(&self) -> bool {
        self.edge || self.extreme_brightness || self.low_saturation || self.uniform_neighborhood
    }

    /// Weighted background score in hundredths (0-100)
    #[must_use]
    pub fn score(&self) -> u8 {
        if !self.any() {
            return 0;
        }
        let mut score = 0;
        if self.edge {
            score += EDGE_WEIGHT;
        }
        if self.extreme_brightness {
            score += BRIGHTNESS_WEIGHT;
        }
        if self.low_saturation {
            score += SATURATION_WEIGHT;
        }
        if self.uniform_neighborhood {
            score += UNIFORMITY_WEIGHT;
        }
        score
    }
}

/// Computes a [`ConfidenceMap`] from local image statistics
///
/// Pure: the input image is only read, and the same image and parameters
/// always produce the same map.
#[derive(Debug, Clone)]
pub struct PixelClassifier {
    params: ClassificationParams,
    row_parallel: bool,
}

impl PixelClassifier {
    #[must_use]
    pub fn new(params: ClassificationParams) -> Self {
        Self {
            params,
            row_parallel: false,
        }
    }

    /// Classify rows on the rayon pool instead of sequentially
    #[must_use]
    pub fn with_row_parallelism(mut self, enabled: bool) -> Self {
        self.row_parallel = enabled;
        self
    }

    /// Produce the raw (unthresholded) confidence for every pixel
    #[must_use]
    pub fn classify(&self, image: &RasterImage) -> ConfidenceMap {
        let (width, height) = image.dimensions();
        let mut values = vec![0.0f32; image.pixel_count()];

        if width > 0 && height > 0 {
            let row_width = width as usize;
            if self.row_parallel {
                values
                    .par_chunks_mut(row_width)
                    .enumerate()
                    .for_each(|(y, row)| self.classify_row(image, y as u32, row));
            } else {
                values
                    .chunks_mut(row_width)
                    .enumerate()
                    .for_each(|(y, row)| self.classify_row(image, y as u32, row));
            }
        }

        ConfidenceMap::new(width, height, values)
    }

    fn classify_row(&self, image: &RasterImage, y: u32, out: &mut [f32]) {
        for (x, value) in out.iter_mut().enumerate() {
            *value = score_to_unit(self.pixel_score(image, x as u32, y));
        }
    }

    /// Background score of one pixel in hundredths
    ///
    /// Fully transparent pixels short-circuit to the maximum score.
    #[must_use]
    pub fn pixel_score(&self, image: &RasterImage, x: u32, y: u32) -> u8 {
        let [_, _, _, alpha] = image.pixel(x, y);
        if alpha == 0 {
            return TRANSPARENT_SCORE;
        }
        self.pixel_flags(image, x, y).score()
    }

    /// Evaluate the four heuristics for one pixel
    #[must_use]
    pub fn pixel_flags(&self, image: &RasterImage, x: u32, y: u32) -> PixelFlags {
        let [r, g, b, _] = image.pixel(x, y);
        let uniform_neighborhood = self.is_uniform_neighborhood(image, x, y);

        let channel_sum = u32::from(r) + u32::from(g) + u32::from(b);
        let bright = channel_sum > BRIGHT_CHANNEL_SUM;
        let dark = channel_sum < DARK_CHANNEL_SUM;
        // Shadow preservation exempts dark detail, not flat dark backdrops.
        let shadow_exempt = self.params.preserve_shadows && dark && !uniform_neighborhood;

        PixelFlags {
            edge: is_edge(image.width(), image.height(), x, y),
            extreme_brightness: bright || (dark && !shadow_exempt),
            low_saturation: is_low_saturation(r, g, b),
            uniform_neighborhood,
        }
    }

    /// Fraction of similar neighbors in the 7x7 window exceeds `1 - t`
    fn is_uniform_neighborhood(&self, image: &RasterImage, x: u32, y: u32) -> bool {
        let [r, g, b, _] = image.pixel(x, y);
        let (width, height) = (i64::from(image.width()), i64::from(image.height()));
        let (cx, cy) = (i64::from(x), i64::from(y));

        let limit = SIMILAR_COLOR_DISTANCE * SIMILAR_COLOR_DISTANCE;
        let mut neighbors = 0u32;
        let mut similar = 0u32;

        for ny in (cy - NEIGHBORHOOD_RADIUS).max(0)..=(cy + NEIGHBORHOOD_RADIUS).min(height - 1) {
            let row = image.row(ny as usize);
            for nx in (cx - NEIGHBORHOOD_RADIUS).max(0)..=(cx + NEIGHBORHOOD_RADIUS).min(width - 1) {
                if nx == cx && ny == cy {
                    continue;
                }
                let offset = nx as usize * CHANNELS;
                let neighbor = [row[offset], row[offset + 1], row[offset + 2]];
                neighbors += 1;
                if squared_distance([r, g, b], neighbor) < limit {
                    similar += 1;
                }
            }
        }

        // similar / neighbors > 1 - tolerance / 100, kept in integers
        neighbors > 0
            && similar * 100 > neighbors * (100 - u32::from(self.params.tolerance.min(100)))
    }
}

fn is_edge(width: u32, height: u32, x: u32, y: u32) -> bool {
    x < EDGE_MARGIN
        || y < EDGE_MARGIN
        || x >= width.saturating_sub(EDGE_MARGIN)
        || y >= height.saturating_sub(EDGE_MARGIN)
}

/// `(max - min) / max < 0.1`, with black counting as unsaturated
fn is_low_saturation(r: u8, g: u8, b: u8) -> bool {
    let max = u32::from(r.max(g).max(b));
    let min = u32::from(r.min(g).min(b));
    if max == 0 {
        return true;
    }
    (max - min) * 10 < max
}

fn squared_distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&p, &q)| {
            let d = i32::from(p) - i32::from(q);
            (d * d) as u32
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(tolerance: u8) -> ClassificationParams {
        ClassificationParams {
            tolerance,
            ..ClassificationParams::default()
        }
    }

    /// Red/blue checkerboard: strongly saturated, mid brightness, half-similar window
    fn checkerboard(size: u32) -> RasterImage {
        RasterImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                [200, 30, 30, 255]
            } else {
                [30, 30, 200, 255]
            }
        })
    }

    #[test]
    fn test_edge_band() {
        assert!(is_edge(20, 20, 0, 10));
        assert!(is_edge(20, 20, 4, 10));
        assert!(!is_edge(20, 20, 5, 10));
        assert!(!is_edge(20, 20, 14, 10));
        assert!(is_edge(20, 20, 15, 10));
        assert!(is_edge(20, 20, 10, 19));
        // Every pixel of a 10x10 image is within 5 samples of a border
        assert!((0..10).all(|x| is_edge(10, 10, x, 5)));
    }

    #[test]
    fn test_low_saturation() {
        assert!(is_low_saturation(128, 128, 128));
        assert!(is_low_saturation(0, 0, 0));
        assert!(is_low_saturation(100, 95, 91)); // 9/100 < 0.1
        assert!(!is_low_saturation(100, 95, 90)); // 10/100 is not < 0.1
        assert!(!is_low_saturation(200, 30, 30));
    }

    #[test]
    fn test_flag_weights() {
        let all = PixelFlags {
            edge: true,
            extreme_brightness: true,
            low_saturation: true,
            uniform_neighborhood: true,
        };
        assert_eq!(all.score(), 100);
        assert_eq!(PixelFlags::default().score(), 0);
        assert!(!PixelFlags::default().any());

        let gray_interior = PixelFlags {
            low_saturation: true,
            uniform_neighborhood: true,
            ..PixelFlags::default()
        };
        assert_eq!(gray_interior.score(), 30);
    }

    #[test]
    fn test_uniform_gray_interior_scores_point_three() {
        let image = RasterImage::from_pixel(20, 20, [128, 128, 128, 255]);
        let classifier = PixelClassifier::new(params(50));

        let flags = classifier.pixel_flags(&image, 10, 10);
        assert!(!flags.edge);
        assert!(!flags.extreme_brightness);
        assert!(flags.low_saturation);
        assert!(flags.uniform_neighborhood);

        let map = classifier.classify(&image);
        assert_eq!(map.get(10, 10), Some(0.3));
        // Border pixels also pick up the edge weight
        assert_eq!(map.get(0, 0), Some(0.7));
    }

    #[test]
    fn test_white_interior_scores_point_six() {
        let image = RasterImage::from_pixel(20, 20, [255, 255, 255, 255]);
        let map = PixelClassifier::new(params(50)).classify(&image);
        assert_eq!(map.get(10, 10), Some(0.6));
        assert_eq!(map.get(19, 19), Some(1.0));
    }

    #[test]
    fn test_transparent_pixels_short_circuit() {
        let image = RasterImage::from_fn(12, 12, |x, _| {
            if x == 6 {
                [200, 30, 30, 0]
            } else {
                [200, 30, 30, 255]
            }
        });
        let map = PixelClassifier::new(params(100)).classify(&image);
        assert_eq!(map.get(6, 6), Some(1.0));
    }

    #[test]
    fn test_zero_flag_pixels_never_become_candidates() {
        let image = checkerboard(16);
        for tolerance in [0, 25, 50] {
            let classifier = PixelClassifier::new(params(tolerance));
            let flags = classifier.pixel_flags(&image, 8, 8);
            assert!(!flags.any(), "tolerance {tolerance}: {flags:?}");
            assert_eq!(classifier.classify(&image).get(8, 8), Some(0.0));
        }
    }

    #[test]
    fn test_uniformity_depends_on_tolerance() {
        // Half of the 48 neighbors match: 0.5 > 1 - t only when t > 0.5
        let image = checkerboard(16);
        let strict = PixelClassifier::new(params(50));
        let loose = PixelClassifier::new(params(51));
        assert!(!strict.pixel_flags(&image, 8, 8).uniform_neighborhood);
        assert!(loose.pixel_flags(&image, 8, 8).uniform_neighborhood);
    }

    #[test]
    fn test_preserve_shadows_exempts_dark_detail() {
        // Dark pixels alternating with a bright saturated color: non-uniform
        let image = RasterImage::from_fn(16, 16, |x, y| {
            if (x + y) % 2 == 0 {
                [5, 5, 5, 255]
            } else {
                [250, 40, 40, 255]
            }
        });
        let plain = PixelClassifier::new(params(50));
        let preserving = PixelClassifier::new(ClassificationParams {
            preserve_shadows: true,
            ..params(50)
        });
        assert!(plain.pixel_flags(&image, 8, 8).extreme_brightness);
        assert!(!preserving.pixel_flags(&image, 8, 8).extreme_brightness);

        // Flat dark areas still count as extreme
        let flat = RasterImage::from_pixel(16, 16, [5, 5, 5, 255]);
        assert!(preserving.pixel_flags(&flat, 8, 8).extreme_brightness);

        // Bright pixels are unaffected
        let white = RasterImage::from_pixel(16, 16, [255, 255, 255, 255]);
        assert!(preserving.pixel_flags(&white, 8, 8).extreme_brightness);
    }

    #[test]
    fn test_row_parallel_matches_sequential() {
        let image = RasterImage::from_fn(33, 17, |x, y| {
            [(x * 7) as u8, (y * 13) as u8, ((x + y) * 5) as u8, if x == y { 0 } else { 255 }]
        });
        let sequential = PixelClassifier::new(params(40)).classify(&image);
        let parallel = PixelClassifier::new(params(40))
            .with_row_parallelism(true)
            .classify(&image);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_degenerate_images() {
        let empty = RasterImage::new(0, 0, Vec::new()).unwrap();
        assert!(PixelClassifier::new(params(50)).classify(&empty).values().is_empty());

        // Single pixel: no neighbors, so never uniform
        let single = RasterImage::from_pixel(1, 1, [128, 128, 128, 255]);
        let flags = PixelClassifier::new(params(100)).pixel_flags(&single, 0, 0);
        assert!(!flags.uniform_neighborhood);
        assert!(flags.edge);
    }
}
