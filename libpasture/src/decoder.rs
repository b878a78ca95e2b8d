use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat, RgbImage};

use crate::error::{AnalysisError, Result};
use crate::metadata::ImageInfo;

/// Decoded RGB pixels within the pixel budget
#[derive(Debug, Clone)]
pub struct SampledImage {
    pub pixels: RgbImage,
    pub info: ImageInfo,
}

impl SampledImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.width() as usize * self.pixels.height() as usize
    }
}

/// Map a declared MIME type to a raster format. `None` means "sniff the bytes".
pub fn format_for_mime(mime: &str) -> Result<Option<ImageFormat>> {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let format = match essence.as_str() {
        "" | "application/octet-stream" => return Ok(None),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ImageFormat::Jpeg,
        "image/png" => ImageFormat::Png,
        "image/webp" => ImageFormat::WebP,
        "image/gif" => ImageFormat::Gif,
        "image/bmp" | "image/x-bmp" => ImageFormat::Bmp,
        "image/tiff" => ImageFormat::Tiff,
        _ => {
            return Err(AnalysisError::UnsupportedFormat {
                mime: mime.to_string(),
            })
        }
    };
    Ok(Some(format))
}

/// MIME type for a file extension, used when the caller declares none
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// Largest dimensions with the same aspect ratio that fit `max_pixels`
pub fn fit_to_budget(width: u32, height: u32, max_pixels: u64) -> (u32, u32) {
    let pixels = u64::from(width) * u64::from(height);
    if pixels <= max_pixels || pixels == 0 {
        return (width, height);
    }
    let scale = (max_pixels as f64 / pixels as f64).sqrt();
    let mut w = ((f64::from(width) * scale).floor() as u32).max(1);
    let mut h = ((f64::from(height) * scale).floor() as u32).max(1);
    // Rounding can leave us one row or column over
    while u64::from(w) * u64::from(h) > max_pixels {
        if w >= h && w > 1 {
            w -= 1;
        } else if h > 1 {
            h -= 1;
        } else {
            break;
        }
    }
    (w, h)
}

/// Image decoder with a fixed pixel budget
#[derive(Debug, Clone, Copy)]
pub struct ImageDecoder {
    max_pixels: u64,
}

impl ImageDecoder {
    pub const fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    pub const fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    /// Decode and, if needed, nearest-neighbour downsample. Deterministic for identical bytes.
    pub fn decode(&self, bytes: &[u8], mime: &str) -> Result<SampledImage> {
        if bytes.is_empty() {
            return Err(AnalysisError::Decode {
                message: "empty input".to_string(),
                source: None,
            });
        }

        let format = match format_for_mime(mime)? {
            Some(format) => format,
            None => image::guess_format(bytes)?,
        };

        let image = image::load_from_memory_with_format(bytes, format)?;
        let (original_width, original_height) = image.dimensions();
        let (width, height) = fit_to_budget(original_width, original_height, self.max_pixels);
        let downsampled = (width, height) != (original_width, original_height);

        let pixels = if downsampled {
            log::debug!(
                "downsampling {original_width}x{original_height} to {width}x{height} (budget {})",
                self.max_pixels
            );
            image.resize_exact(width, height, FilterType::Nearest).to_rgb8()
        } else {
            image.to_rgb8()
        };

        Ok(SampledImage {
            info: ImageInfo {
                original_width,
                original_height,
                sampled_width: pixels.width(),
                sampled_height: pixels.height(),
                downsampled,
                mime: format.to_mime_type().to_string(),
            },
            pixels,
        })
    }
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_PIXELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_mapping() {
        assert_eq!(format_for_mime("image/png").unwrap(), Some(ImageFormat::Png));
        assert_eq!(format_for_mime("IMAGE/JPEG; q=1").unwrap(), Some(ImageFormat::Jpeg));
        assert_eq!(format_for_mime("").unwrap(), None);
        assert!(matches!(
            format_for_mime("text/plain"),
            Err(AnalysisError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_budget_keeps_aspect() {
        assert_eq!(fit_to_budget(100, 50, 10_000), (100, 50));
        let (w, h) = fit_to_budget(2000, 1000, 20_000);
        assert!(u64::from(w) * u64::from(h) <= 20_000);
        assert!((199..=200).contains(&w) && (99..=100).contains(&h));
        assert_eq!(fit_to_budget(10_000, 1, 4), (4, 1));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let decoder = ImageDecoder::default();
        let err = decoder.decode(b"definitely not an image", "image/png").unwrap_err();
        assert!(matches!(err, AnalysisError::Decode { .. }));
        let err = decoder.decode(&[], "image/png").unwrap_err();
        assert!(err.is_client_error());
    }
}
