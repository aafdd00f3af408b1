//! Image I/O operations service
//!
//! Decodes caller-supplied byte streams into [`RasterImage`]s. Codec
//! selection lives here so the pixel pipeline never sees a file format.

use crate::{
    error::{BgRemovalError, Result},
    types::RasterImage,
};
use image::ImageFormat;
use std::path::Path;

/// Service for handling image input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Map a content-type hint such as `image/png` to a decoder format
    ///
    /// Parameters after `;` are ignored. Unknown types yield `None`.
    #[must_use]
    pub fn format_from_content_type(content_type: &str) -> Option<ImageFormat> {
        let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match mime.as_str() {
            "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
            other => ImageFormat::from_mime_type(other),
        }
    }

    /// Decode raw image bytes into an RGBA raster
    ///
    /// The content-type hint, when present and recognized, picks the decoder
    /// first; if that fails the format is sniffed from the bytes instead, so
    /// a wrong hint never rejects a valid image.
    ///
    /// # Errors
    /// - The bytes are not a supported raster image
    ///
    /// # Examples
    /// ```rust,no_run
    /// use heuristic_bgremove::services::ImageIOService;
    ///
    /// let image_data = std::fs::read("input.jpg")?;
    /// let image = ImageIOService::decode(&image_data, Some("image/jpeg"))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn decode(bytes: &[u8], content_type: Option<&str>) -> Result<RasterImage> {
        if bytes.is_empty() {
            return Err(BgRemovalError::decode_with_context(
                "Empty input",
                0,
                content_type,
            ));
        }

        if let Some(format) = content_type.and_then(Self::format_from_content_type) {
            match image::load_from_memory_with_format(bytes, format) {
                Ok(decoded) => return Ok(RasterImage::from(decoded.to_rgba8())),
                Err(e) => {
                    log::debug!(
                        "Decoding as {:?} failed: {}. Attempting content-based detection.",
                        format,
                        e
                    );
                },
            }
        }

        image::load_from_memory(bytes)
            .map(|decoded| RasterImage::from(decoded.to_rgba8()))
            .map_err(|e| {
                BgRemovalError::decode_with_context(
                    &format!("Failed to decode image: {}", e),
                    bytes.len(),
                    content_type,
                )
            })
    }

    /// Read an async stream to the end and decode it
    ///
    /// # Errors
    /// - Reading from the stream fails
    /// - The bytes are not a supported raster image
    ///
    /// # Examples
    /// ```rust,no_run
    /// use heuristic_bgremove::services::ImageIOService;
    /// use tokio::fs::File;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let file = File::open("image.png").await?;
    /// let image = ImageIOService::load_from_reader(file, Some("image/png")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(
        mut reader: R,
        content_type: Option<&str>,
    ) -> Result<RasterImage> {
        Self::decode(&Self::read_all(&mut reader).await?, content_type)
    }

    /// Buffer an async stream in memory
    ///
    /// # Errors
    /// - Reading from the stream fails
    pub async fn read_all<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        AsyncReadExt::read_to_end(reader, &mut buffer).await?;
        Ok(buffer)
    }

    /// Content-type hint implied by a file extension
    #[must_use]
    pub fn content_type_for_path<P: AsRef<Path>>(path: P) -> Option<&'static str> {
        ImageFormat::from_path(path).ok().map(|format| format.to_mime_type())
    }

    /// Check if a file path has a supported image extension
    #[must_use]
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "jpg" | "jpeg" | "png" | "webp"
                )
            })
    }
}
