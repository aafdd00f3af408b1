//! Applies a segmentation mask to an image's alpha channel

use crate::types::{RasterImage, SegmentationMask, CHANNELS};

/// Soft-edge RGB gain is `1 + (1 - m/255) * 0.2`, kept as the exact
/// rational `(1530 - m) / 1275` so results are reproducible bit for bit.
const EDGE_GAIN_NUMERATOR_BASE: u32 = 1530;
const EDGE_GAIN_DENOMINATOR: u32 = 1275;

/// Mask compositor
///
/// Alpha becomes `round(alpha * mask / 255)`, so output opacity never
/// exceeds input opacity. With `feather_edges` on, soft-edge pixels
/// (`0 < mask < 255`) also get a small RGB lift to offset the washed-out
/// look feathering gives boundaries; fully kept or discarded pixels are
/// left photometrically unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    feather_edges: bool,
}

impl Compositor {
    #[must_use]
    pub fn new(feather_edges: bool) -> Self {
        Self { feather_edges }
    }

    /// Produce a new image with the mask applied
    ///
    /// `mask` must have the same dimensions as `image`.
    #[must_use]
    pub fn composite(&self, image: &RasterImage, mask: &SegmentationMask) -> RasterImage {
        debug_assert_eq!(mask.dimensions, image.dimensions());

        let mut data = image.as_raw().to_vec();
        for (pixel, &m) in data.chunks_exact_mut(CHANNELS).zip(mask.data.iter()) {
            let (rgb, alpha) = pixel.split_at_mut(3);
            alpha[0] = scale_alpha(alpha[0], m);

            if self.feather_edges && m > 0 && m < 255 {
                for channel in rgb {
                    *channel = lift_soft_edge(*channel, m);
                }
            }
        }

        RasterImage::from_raw_parts(image.width(), image.height(), data)
    }
}

/// `round(alpha * mask / 255)`; 255 is odd so there are no ties
fn scale_alpha(alpha: u8, mask: u8) -> u8 {
    ((u32::from(alpha) * u32::from(mask) + 127) / 255) as u8
}

fn lift_soft_edge(channel: u8, mask: u8) -> u8 {
    let numerator = EDGE_GAIN_NUMERATOR_BASE - u32::from(mask);
    let lifted = (u32::from(channel) * numerator + EDGE_GAIN_DENOMINATOR / 2) / EDGE_GAIN_DENOMINATOR;
    lifted.min(255) as u8
}
