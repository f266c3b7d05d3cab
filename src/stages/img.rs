//! Image compression stage.
//!
//! PNGs go through oxipng, JPEGs are re-encoded at a fixed quality via the
//! image crate. Other formats (GIF, SVG, ...) pass through unchanged. The
//! compressed bytes are only kept when they are actually smaller than the
//! input.

use super::{Stage, StageError};
use crate::pipeline::Artifact;
use image::codecs::jpeg::JpegEncoder;

/// JPEG re-encode quality
const JPEG_QUALITY: u8 = 80;

/// Lossless/lossy compression keyed on the file extension.
pub struct ImageCompress {
    png_options: oxipng::Options,
}

impl ImageCompress {
    /// Create a compress stage with the default optimization level.
    pub fn new() -> Self {
        Self { png_options: oxipng::Options::from_preset(2) }
    }

    fn compress_png(&self, bytes: &[u8]) -> Result<Vec<u8>, StageError> {
        oxipng::optimize_from_memory(bytes, &self.png_options)
            .map_err(|e| StageError::Transform(format!("png: {}", e)))
    }

    fn compress_jpeg(&self, bytes: &[u8]) -> Result<Vec<u8>, StageError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| StageError::Transform(format!("jpeg: {}", e)))?;
        let rgb = decoded.to_rgb8();

        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        encoder
            .encode_image(&rgb)
            .map_err(|e| StageError::Transform(format!("jpeg: {}", e)))?;
        Ok(out)
    }
}

impl Default for ImageCompress {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for ImageCompress {
    fn name(&self) -> &'static str {
        "image-compress"
    }

    fn apply(&self, artifact: Artifact) -> Result<Artifact, StageError> {
        let ext = artifact
            .rel_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let compressed = match ext.as_deref() {
            Some("png") => Some(self.compress_png(&artifact.bytes)?),
            Some("jpg") | Some("jpeg") => Some(self.compress_jpeg(&artifact.bytes)?),
            // gif, svg, ico, ... are copied through unchanged
            _ => None,
        };

        let mut artifact = artifact;
        if let Some(bytes) = compressed {
            if bytes.len() < artifact.bytes.len() {
                artifact.bytes = bytes;
            }
        }
        artifact.map = None;
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbImage};
    use std::path::PathBuf;

    fn sample_png() -> Vec<u8> {
        let img = RgbImage::from_fn(32, 32, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 8) as u8, 128])
        });
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, ImageOutputFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_png_compression_produces_valid_png() {
        let stage = ImageCompress::new();
        let input = sample_png();
        let artifact = Artifact::new(PathBuf::from("logo.png"), input.clone());

        let out = stage.apply(artifact).unwrap();
        assert!(out.bytes.len() <= input.len());
        assert!(image::load_from_memory(&out.bytes).is_ok());
    }

    #[test]
    fn test_jpeg_reencode() {
        let img = RgbImage::from_fn(64, 64, |x, _| image::Rgb([(x * 4) as u8, 0, 0]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, ImageOutputFormat::Jpeg(100))
            .unwrap();
        let input = bytes.into_inner();

        let stage = ImageCompress::new();
        let artifact = Artifact::new(PathBuf::from("photo.jpg"), input);
        let out = stage.apply(artifact).unwrap();
        assert!(image::load_from_memory(&out.bytes).is_ok());
    }

    #[test]
    fn test_unknown_format_passes_through() {
        let stage = ImageCompress::new();
        let svg = b"<svg xmlns='http://www.w3.org/2000/svg'/>".to_vec();
        let artifact = Artifact::new(PathBuf::from("icon.svg"), svg.clone());
        let out = stage.apply(artifact).unwrap();
        assert_eq!(out.bytes, svg);
    }

    #[test]
    fn test_corrupt_png_fails() {
        let stage = ImageCompress::new();
        let artifact = Artifact::new(PathBuf::from("bad.png"), b"not a png".to_vec());
        assert!(stage.apply(artifact).is_err());
    }
}
