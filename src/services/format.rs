//! Output format handling service
//!
//! Serializes composited rasters into the requested output format,
//! keeping codec details away from the pixel pipeline.

use crate::{
    config::{EncodingParams, OutputFormat},
    error::{BgRemovalError, Result},
    types::RasterImage,
};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert an RGBA image to the pixel layout the output format stores
    ///
    /// JPEG has no alpha channel, so it is dropped; every other format keeps RGBA.
    ///
    /// # Examples
    /// ```rust
    /// use heuristic_bgremove::{services::OutputFormatHandler, OutputFormat};
    /// use image::{DynamicImage, RgbaImage};
    ///
    /// let rgba_image = RgbaImage::new(4, 4);
    /// let converted = OutputFormatHandler::convert_format(rgba_image, OutputFormat::Jpeg);
    /// assert!(matches!(converted, DynamicImage::ImageRgb8(_)));
    /// ```
    #[must_use]
    pub fn convert_format(rgba_image: RgbaImage, format: OutputFormat) -> DynamicImage {
        let image = DynamicImage::ImageRgba8(rgba_image);
        match format {
            OutputFormat::Png | OutputFormat::WebP => image,
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        }
    }

    /// Encode a composited raster into bytes
    ///
    /// `quality` is applied to JPEG. WebP output is lossless, so quality is
    /// recorded in the metadata but does not change the bytes.
    ///
    /// # Errors
    /// - The codec rejects the image (e.g. zero-sized dimensions)
    /// - WebP was requested but the `webp-support` feature is disabled
    pub fn encode(image: RasterImage, params: &EncodingParams) -> Result<Vec<u8>> {
        let format = params.output_format;
        Self::validate_for_background_removal(format);

        let converted = Self::convert_format(image.into_rgba_image(), format);
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        match format {
            OutputFormat::Png => converted
                .write_to(&mut cursor, ImageFormat::Png)
                .map_err(|e| BgRemovalError::encode(format!("Failed to encode PNG: {}", e)))?,
            OutputFormat::Jpeg => {
                let rgb_image = converted.to_rgb8();
                let mut jpeg_encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, params.quality);
                jpeg_encoder
                    .encode_image(&rgb_image)
                    .map_err(|e| BgRemovalError::encode(format!("Failed to encode JPEG: {}", e)))?;
            },
            OutputFormat::WebP => Self::encode_webp(&converted, &mut cursor)?,
        }

        Ok(buffer)
    }

    #[cfg(feature = "webp-support")]
    fn encode_webp(image: &DynamicImage, cursor: &mut Cursor<&mut Vec<u8>>) -> Result<()> {
        image
            .write_to(cursor, ImageFormat::WebP)
            .map_err(|e| BgRemovalError::encode(format!("Failed to encode WebP: {}", e)))
    }

    #[cfg(not(feature = "webp-support"))]
    fn encode_webp(_image: &DynamicImage, _cursor: &mut Cursor<&mut Vec<u8>>) -> Result<()> {
        Err(BgRemovalError::encode(
            "WebP output requires the `webp-support` feature",
        ))
    }

    /// Get the appropriate file extension for a given output format
    ///
    /// # Examples
    /// ```rust
    /// use heuristic_bgremove::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::WebP => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Warn when the output format will flatten the removed background
    pub fn validate_for_background_removal(format: OutputFormat) {
        if !Self::supports_transparency(format) {
            log::warn!(
                "Output format {:?} does not support transparency. Background removal results will appear with a solid background.",
                format
            );
        }
    }

    /// `(default, min, max)` quality for formats where quality changes the output
    #[must_use]
    pub fn get_quality_range(format: OutputFormat) -> Option<(u8, u8, u8)> {
        match format {
            OutputFormat::Jpeg => Some((crate::config::DEFAULT_QUALITY, 1, 100)),
            OutputFormat::Png | OutputFormat::WebP => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_transparent() -> RasterImage {
        RasterImage::from_fn(8, 8, |x, _| {
            if x < 4 {
                [200, 40, 40, 0]
            } else {
                [200, 40, 40, 255]
            }
        })
    }

    #[test]
    fn test_convert_format_keeps_alpha_for_png() {
        let rgba_image = RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 128]));
        let converted = OutputFormatHandler::convert_format(rgba_image, OutputFormat::Png);
        assert!(matches!(converted, DynamicImage::ImageRgba8(_)));
        assert_eq!(converted.width(), 2);
    }

    #[test]
    fn test_encode_png_preserves_alpha() {
        let params = EncodingParams::default();
        let bytes = OutputFormatHandler::encode(half_transparent(), &params).unwrap();

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [200, 40, 40, 0]);
        assert_eq!(decoded.get_pixel(7, 7).0, [200, 40, 40, 255]);
    }

    #[test]
    fn test_encode_jpeg_drops_alpha() {
        let params = EncodingParams {
            output_format: OutputFormat::Jpeg,
            quality: 75,
        };
        let bytes = OutputFormatHandler::encode(half_transparent(), &params).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn test_jpeg_quality_changes_output() {
        let noisy = RasterImage::from_fn(32, 32, |x, y| {
            [(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) * 5 % 256) as u8, 255]
        });
        let low = EncodingParams {
            output_format: OutputFormat::Jpeg,
            quality: 10,
        };
        let high = EncodingParams {
            output_format: OutputFormat::Jpeg,
            quality: 100,
        };
        let low_bytes = OutputFormatHandler::encode(noisy.clone(), &low).unwrap();
        let high_bytes = OutputFormatHandler::encode(noisy, &high).unwrap();
        assert!(low_bytes.len() < high_bytes.len());
    }

    #[cfg(feature = "webp-support")]
    #[test]
    fn test_encode_webp_is_lossless() {
        let params = EncodingParams {
            output_format: OutputFormat::WebP,
            quality: 50,
        };
        let bytes = OutputFormatHandler::encode(half_transparent(), &params).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::WebP)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.get_pixel(7, 0).0, [200, 40, 40, 255]);
        assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_get_extension() {
        assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
        assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
        assert_eq!(OutputFormatHandler::get_extension(OutputFormat::WebP), "webp");
    }

    #[test]
    fn test_supports_transparency() {
        assert!(OutputFormatHandler::supports_transparency(OutputFormat::Png));
        assert!(OutputFormatHandler::supports_transparency(OutputFormat::WebP));
        assert!(!OutputFormatHandler::supports_transparency(OutputFormat::Jpeg));
    }

    #[test]
    fn test_get_quality_range() {
        assert_eq!(
            OutputFormatHandler::get_quality_range(OutputFormat::Jpeg),
            Some((90, 1, 100))
        );
        assert_eq!(OutputFormatHandler::get_quality_range(OutputFormat::Png), None);
        assert_eq!(OutputFormatHandler::get_quality_range(OutputFormat::WebP), None);
    }
}
