//! Image decoding and scaling for picture attachments.

use std::io::Cursor;

use image::{DynamicImage, ImageError, ImageFormat as ImageEncodingFormat, ImageReader, imageops::FilterType};

use crate::{errors::AttachmentError, room::Blob, timeline::content::MediaInfo};

/// A decoded image together with its encoded bytes.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub blob: Blob,
    pub width: u32,
    pub height: u32,
    format: ImageEncodingFormat,
    image: DynamicImage,
}

impl LoadedImage {
    /// Decodes an image, guessing its format from the leading bytes rather than the claimed MIME type.
    pub fn load(blob: Blob) -> Result<Self, AttachmentError> {
        let reader = ImageReader::new(Cursor::new(&blob.data))
            .with_guessed_format()
            .map_err(ImageError::from)?;
        let Some(format) = reader.format() else {
            return Err(AttachmentError::UnknownImageFormat);
        };
        let image = reader.decode()?;
        Ok(Self { width: image.width(), height: image.height(), blob, format, image })
    }

    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn file_size(&self) -> u64 {
        self.blob.size()
    }

    /// Shrinks the image (preserving its aspect ratio) so that neither side exceeds `max_dimension`.
    pub fn scale(&self, max_dimension: u32) -> Result<Self, AttachmentError> {
        if self.max_dimension() <= max_dimension {
            return Ok(self.clone());
        }
        self.encode(self.image.thumbnail(max_dimension, max_dimension))
    }

    /// Resizes both sides of the image by `ratio`.
    pub fn scale_by(&self, ratio: f64) -> Result<Self, AttachmentError> {
        let width = ((f64::from(self.width) * ratio).round() as u32).max(1);
        let height = ((f64::from(self.height) * ratio).round() as u32).max(1);
        self.encode(self.image.resize_exact(width, height, FilterType::Triangle))
    }

    /// Re-encodes a resized copy. JPEGs stay JPEGs; every other format becomes a PNG.
    fn encode(&self, image: DynamicImage) -> Result<Self, AttachmentError> {
        let (format, image) = match self.format {
            // The JPEG encoder doesn't support an alpha channel.
            ImageEncodingFormat::Jpeg => (ImageEncodingFormat::Jpeg, DynamicImage::ImageRgb8(image.to_rgb8())),
            _ => (ImageEncodingFormat::Png, image),
        };
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format)?;
        Ok(Self {
            blob: Blob::new(bytes, format.to_mime_type()),
            width: image.width(),
            height: image.height(),
            format,
            image,
        })
    }

    pub fn info(&self) -> MediaInfo {
        MediaInfo {
            mimetype: Some(self.blob.mime_type.clone()),
            size: Some(self.file_size()),
            w: Some(self.width),
            h: Some(self.height),
            ..Default::default()
        }
    }
}

/// The factor by which to scale both sides of an image of `size` bytes
/// so that it ends up at roughly `limit` bytes, rounded to two decimals.
pub fn compress_ratio(size: u64, limit: u64) -> f64 {
    let ratio = (limit as f64 / size as f64).sqrt();
    (ratio * 100.0).round() / 100.0
}

/// Whether `mime_type` names an image.
pub fn is_image(mime_type: &str) -> bool {
    mime_type.parse::<mime::Mime>().is_ok_and(|m| m.type_() == mime::IMAGE)
}

/// Whether `mime_type` names a video.
pub fn is_video(mime_type: &str) -> bool {
    mime_type.parse::<mime::Mime>().is_ok_and(|m| m.type_() == mime::VIDEO)
}




#[cfg(test)]
mod tests {
    use super::{test_images::{gif, png}, *};

    #[test]
    fn loads_and_scales_png() {
        let image = LoadedImage::load(png(1200, 600)).unwrap();
        assert_eq!(image.max_dimension(), 1200);

        let thumbnail = image.scale(400).unwrap();
        assert_eq!((thumbnail.width, thumbnail.height), (400, 200));
        assert_eq!(thumbnail.info().mimetype.as_deref(), Some("image/png"));

        let half = image.scale_by(0.5).unwrap();
        assert_eq!((half.width, half.height), (600, 300));
    }

    #[test]
    fn rejects_unknown_formats() {
        let blob = Blob::new(b"not an image".to_vec(), "image/png");
        assert!(matches!(LoadedImage::load(blob), Err(AttachmentError::UnknownImageFormat)));
    }

    #[test]
    fn blobs_shorter_than_any_signature_are_unknown() {
        for data in [&b""[..], b"GIF", b"garbage"] {
            let blob = Blob::new(data.to_vec(), "image/gif");
            assert!(matches!(LoadedImage::load(blob), Err(AttachmentError::UnknownImageFormat)));
        }
    }

    #[test]
    fn gifs_load_and_scale_to_png() {
        let image = LoadedImage::load(gif(1, 1)).unwrap();
        assert_eq!((image.width, image.height), (1, 1));
        assert_eq!(image.info().mimetype.as_deref(), Some("image/gif"));

        let image = LoadedImage::load(gif(800, 200)).unwrap();
        let thumbnail = image.scale(400).unwrap();
        assert_eq!((thumbnail.width, thumbnail.height), (400, 100));
        assert_eq!(thumbnail.info().mimetype.as_deref(), Some("image/png"));
        assert!(LoadedImage::load(thumbnail.blob).is_ok());
    }

    #[test]
    fn compress_ratio_rounds_to_two_decimals() {
        assert_eq!(compress_ratio(4 * 1024 * 1024, 1024 * 1024), 0.5);
        assert_eq!(compress_ratio(3 * 1024 * 1024, 1024 * 1024), 0.58);
    }

    #[test]
    fn classifies_mime_types() {
        assert!(is_image("image/jpeg"));
        assert!(is_video("video/mp4"));
        assert!(!is_image("application/pdf"));
    }
}
