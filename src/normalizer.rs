use image::imageops::FilterType;
use image::{GenericImageView, ImageError, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

use crate::models::UploadedImage;

pub const DEFAULT_WIDTH: u32 = 400;

#[derive(Error, Debug)]
pub enum NormalizeError {
    /// The bytes are not a raster image we can read.
    #[error("could not decode image: {0}")]
    Decode(#[source] ImageError),

    /// Readable, but there is no encoder to write the resized copy back.
    #[error("cannot re-encode {format:?} images")]
    UnsupportedFormat { format: ImageFormat },

    #[error("could not re-encode image: {0}")]
    Encode(#[source] ImageError),

    #[error("resize task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl NormalizeError {
    /// Whether the upload itself is at fault, as opposed to the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NormalizeError::Decode(_) | NormalizeError::UnsupportedFormat { .. }
        )
    }
}

/// Resize an upload down to `width` pixels, height scaled to keep the aspect ratio.
///
/// The output keeps the sniffed input format, the declared media type and the
/// file name. Images no wider than `width` are returned untouched, so the
/// output never holds more pixels than the decoded input.
pub fn normalize(upload: UploadedImage, width: u32) -> Result<UploadedImage, NormalizeError> {
    let format = image::guess_format(&upload.bytes).map_err(NormalizeError::Decode)?;
    let img = image::load_from_memory_with_format(&upload.bytes, format)
        .map_err(NormalizeError::Decode)?;

    let (src_w, src_h) = img.dimensions();
    if src_w <= width {
        tracing::debug!(from = ?(src_w, src_h), ?format, "upload already narrow enough");
        return Ok(upload);
    }
    if !format.writing_enabled() {
        return Err(NormalizeError::UnsupportedFormat { format });
    }

    // unbounded height lets the width decide the scale
    let resized = img.resize(width, u32::MAX, FilterType::Lanczos3);
    tracing::debug!(
        from = ?(src_w, src_h),
        to = ?resized.dimensions(),
        ?format,
        "resized upload"
    );

    let mut bytes = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(|e| match e {
            ImageError::Unsupported(_) => NormalizeError::UnsupportedFormat { format },
            e => NormalizeError::Encode(e),
        })?;

    Ok(UploadedImage { bytes, ..upload })
}

// Decoding and resampling are CPU bound, keep them off the async workers
pub async fn normalize_blocking(
    upload: UploadedImage,
    width: u32,
) -> Result<UploadedImage, NormalizeError> {
    tokio::task::spawn_blocking(move || normalize(upload, width)).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, RgbImage};

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn put(bytes: &mut Vec<u8>, value: u32) {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    // Minimal DXT1 surface: the decoder reads it, nothing can write it
    fn dds(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = b"DDS ".to_vec();
        put(&mut bytes, 124); // header size
        put(&mut bytes, 0x1 | 0x2 | 0x4 | 0x1000); // caps | height | width | pixel format
        put(&mut bytes, height);
        put(&mut bytes, width);
        for _ in 0..(3 + 11) {
            put(&mut bytes, 0); // pitch, depth, mipmaps, reserved
        }
        put(&mut bytes, 32); // pixel format size
        put(&mut bytes, 0x4); // fourcc present
        bytes.extend_from_slice(b"DXT1");
        for _ in 0..5 {
            put(&mut bytes, 0); // bit count and masks
        }
        put(&mut bytes, 0x1000); // caps
        for _ in 0..4 {
            put(&mut bytes, 0);
        }
        // 8 bytes per 4x4 block
        bytes.resize(bytes.len() + (width / 4 * height / 4 * 8) as usize, 0);
        bytes
    }

    fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    fn upload(bytes: Vec<u8>, content_type: &str) -> UploadedImage {
        UploadedImage {
            bytes,
            content_type: Some(content_type.to_string()),
            file_name: "beetle.img".to_string(),
        }
    }

    #[test]
    fn wide_png_is_scaled_down_to_width() {
        let out = normalize(upload(encoded(800, 600, ImageFormat::Png), "image/png"), 400).unwrap();

        let img = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(img.dimensions(), (400, 300));
        assert_eq!(sniff_format(&out.bytes), Some(ImageFormat::Png));
        assert_eq!(out.file_name, "beetle.img");
        assert_eq!(out.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn jpeg_stays_jpeg_and_keeps_aspect_ratio() {
        let out = normalize(upload(encoded(1000, 333, ImageFormat::Jpeg), "image/jpeg"), 400).unwrap();

        assert_eq!(sniff_format(&out.bytes), Some(ImageFormat::Jpeg));
        let (w, h) = image::load_from_memory(&out.bytes).unwrap().dimensions();
        assert_eq!(w, 400);
        // 333 * 0.4 = 133.2
        assert!((132..=134).contains(&h), "height was {h}");
    }

    #[test]
    fn narrow_image_passes_through() {
        let bytes = encoded(200, 100, ImageFormat::Png);
        let out = normalize(upload(bytes.clone(), "image/png"), 400).unwrap();
        assert_eq!(out.bytes, bytes);
    }

    #[test]
    fn tall_sliver_is_not_blown_up() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(1, 100_000));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();

        let out = normalize(upload(bytes.clone(), "image/png"), 400).unwrap();

        assert_eq!(out.bytes, bytes);
        let img = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(img.dimensions(), (1, 100_000));
    }

    #[test]
    fn image_at_target_width_passes_through() {
        let bytes = encoded(400, 250, ImageFormat::Png);
        let out = normalize(upload(bytes.clone(), "image/png"), 400).unwrap();
        assert_eq!(out.bytes, bytes);
    }

    #[test]
    fn decode_only_format_is_rejected_as_client_input() {
        let bytes = dds(800, 4);
        assert_eq!(sniff_format(&bytes), Some(ImageFormat::Dds));

        let err = normalize(upload(bytes, "image/vnd-ms.dds"), 400).unwrap_err();

        assert!(matches!(
            err,
            NormalizeError::UnsupportedFormat { format: ImageFormat::Dds }
        ));
        assert!(err.is_client_error());
    }

    #[test]
    fn narrow_decode_only_format_still_passes_through() {
        let bytes = dds(8, 8);
        let out = normalize(upload(bytes.clone(), "image/vnd-ms.dds"), 400).unwrap();
        assert_eq!(out.bytes, bytes);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = normalize(upload(b"definitely not pixels".to_vec(), "image/png"), 400).unwrap_err();
        assert!(matches!(err, NormalizeError::Decode(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let mut bytes = encoded(64, 64, ImageFormat::Png);
        bytes.truncate(40);
        let err = normalize(upload(bytes, "image/png"), 400).unwrap_err();
        assert!(matches!(err, NormalizeError::Decode(_)));
    }

    #[tokio::test]
    async fn blocking_variant_gives_same_result() {
        let out = normalize_blocking(upload(encoded(800, 400, ImageFormat::Png), "image/png"), 400)
            .await
            .unwrap();
        let img = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(img.dimensions(), (400, 200));
    }
}
