//! Image compression and cropping before upload.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::{Error, Result};

/// Output encoding for processed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    const fn as_image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    /// Longest allowed edge in pixels. Smaller images are not upscaled.
    pub max_edge: u32,
    pub format: OutputFormat,
    /// Only used for [`OutputFormat::Jpeg`].
    pub jpeg_quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            max_edge: 1920,
            format: OutputFormat::Jpeg,
            jpeg_quality: 80,
        }
    }
}

/// Crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

impl ProcessedImage {
    pub const fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Downscale an image so its longest edge fits `max_edge` and re-encode it.
pub fn compress_image(source_bytes: &[u8], options: ImageOptions) -> Result<ProcessedImage> {
    if options.max_edge == 0 {
        return Err(Error::invalid_input(
            "Image max edge must be greater than zero",
        ));
    }
    let source = decode(source_bytes)?;

    let (width, height) = source.dimensions();
    let resized = if width.max(height) <= options.max_edge {
        source
    } else {
        source.thumbnail(options.max_edge, options.max_edge)
    };
    tracing::debug!(
        from_width = width,
        from_height = height,
        to_width = resized.width(),
        to_height = resized.height(),
        "Compressing image"
    );
    encode(&resized, options)
}

/// Cut `rect` out of an image, then compress the result.
pub fn crop_image(
    source_bytes: &[u8],
    rect: CropRect,
    options: ImageOptions,
) -> Result<ProcessedImage> {
    if rect.width == 0 || rect.height == 0 {
        return Err(Error::invalid_input("Crop area must not be empty"));
    }
    let source = decode(source_bytes)?;

    let (width, height) = source.dimensions();
    let fits = rect
        .x
        .checked_add(rect.width)
        .zip(rect.y.checked_add(rect.height))
        .is_some_and(|(right, bottom)| right <= width && bottom <= height);
    if !fits {
        return Err(Error::invalid_input(format!(
            "Crop area {}x{}+{}+{} exceeds the {width}x{height} image",
            rect.width, rect.height, rect.x, rect.y
        )));
    }

    let cropped = source.crop_imm(rect.x, rect.y, rect.width, rect.height);
    compress_decoded(cropped, options)
}

fn compress_decoded(image: DynamicImage, options: ImageOptions) -> Result<ProcessedImage> {
    let (width, height) = image.dimensions();
    let image = if options.max_edge == 0 || width.max(height) <= options.max_edge {
        image
    } else {
        image.thumbnail(options.max_edge, options.max_edge)
    };
    encode(&image, options)
}

fn decode(source_bytes: &[u8]) -> Result<DynamicImage> {
    if source_bytes.is_empty() {
        return Err(Error::invalid_input("Image bytes cannot be empty"));
    }
    image::load_from_memory(source_bytes)
        .map_err(|error| Error::InvalidInput(format!("Failed to decode image: {error}")))
}

fn encode(image: &DynamicImage, options: ImageOptions) -> Result<ProcessedImage> {
    let mut cursor = Cursor::new(Vec::new());

    match options.format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let mut encoder = JpegEncoder::new_with_quality(&mut cursor, options.jpeg_quality);
            encoder.encode_image(&rgb).map_err(|error| {
                Error::InvalidInput(format!("Failed to encode JPEG image: {error}"))
            })?;
        }
        OutputFormat::Png | OutputFormat::WebP => {
            image
                .write_to(&mut cursor, options.format.as_image_format())
                .map_err(|error| Error::InvalidInput(format!("Failed to encode image: {error}")))?;
        }
    }

    let (width, height) = image.dimensions();
    Ok(ProcessedImage {
        bytes: cursor.into_inner(),
        width,
        height,
        format: options.format,
    })
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgba};

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_fn(width, height, |x, _y| {
            Rgba([u8::try_from(x % 256).unwrap(), 90, 240, 255])
        });
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn compress_bounds_longest_edge_and_keeps_ratio() {
        let result = compress_image(
            &png(1600, 900),
            ImageOptions {
                max_edge: 800,
                ..ImageOptions::default()
            },
        )
        .unwrap();

        assert_eq!((result.width, result.height), (800, 450));
        assert_eq!(result.content_type(), "image/jpeg");
        assert!(image::load_from_memory(&result.bytes).is_ok());
    }

    #[test]
    fn compress_does_not_upscale() {
        let result = compress_image(
            &png(120, 80),
            ImageOptions {
                max_edge: 800,
                format: OutputFormat::Png,
                jpeg_quality: 80,
            },
        )
        .unwrap();
        assert_eq!((result.width, result.height), (120, 80));
    }

    #[test]
    fn crop_extracts_requested_area() {
        let rect = CropRect {
            x: 10,
            y: 20,
            width: 50,
            height: 30,
        };
        let result = crop_image(&png(200, 100), rect, ImageOptions::default()).unwrap();
        assert_eq!((result.width, result.height), (50, 30));
    }

    #[test]
    fn crop_outside_image_is_rejected() {
        let rect = CropRect {
            x: 150,
            y: 0,
            width: 100,
            height: 10,
        };
        let error = crop_image(&png(200, 100), rect, ImageOptions::default()).unwrap_err();
        assert!(matches!(error, Error::InvalidInput(message) if message.contains("exceeds")));
    }

    #[test]
    fn undecodable_bytes_are_invalid_input() {
        let error = compress_image(b"not-an-image", ImageOptions::default()).unwrap_err();
        assert!(matches!(error, Error::InvalidInput(message) if message.contains("decode")));
    }
}
