//! Decoding and normalization of input images.
//!
//! Pixels are kept as 8-bit sRGB with straight (non-premultiplied) alpha.

use std::io::Cursor;

use image::imageops::thumbnail;
use image::{ImageReader, Rgba, RgbaImage};

use crate::{VectorizeError, VectorizeResult};

/// Alpha at or above which a pixel counts as drawn.
pub const ALPHA_THRESHOLD: u8 = 128;

/// Immutable RGBA pixel grid with straight alpha.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Wrap raw row-major RGBA bytes.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> VectorizeResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(VectorizeError::InvalidBuffer(format!(
                "expected {expected} bytes for {width}x{height} RGBA, got {}",
                data.len()
            )));
        }
        let image = RgbaImage::from_raw(width, height, data).ok_or_else(|| {
            VectorizeError::InvalidBuffer(format!("cannot build a {width}x{height} image"))
        })?;
        Ok(Self { image })
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    /// Alpha of pixel `(x, y)` in `[0, 1]`; outside the canvas counts as transparent.
    pub fn alpha_at(&self, x: i64, y: i64) -> f64 {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return 0.0;
        }
        self.image.get_pixel(x as u32, y as u32)[3] as f64 / 255.0
    }

    /// Whether any pixel has an alpha strictly between fully transparent and fully opaque.
    pub fn has_partial_alpha(&self) -> bool {
        self.image.pixels().any(|p| p[3] != 0 && p[3] != 255)
    }
}

/// Decode encoded image bytes (PNG and the other formats `image` recognises).
pub fn decode(bytes: &[u8]) -> VectorizeResult<PixelBuffer> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .decode()?;
    Ok(PixelBuffer::from_image(img.to_rgba8()))
}

/// Area-average the buffer down so that `width * height <= max_pixels`.
///
/// Returns the buffer untouched when it is already within the ceiling.
pub fn downsample(buffer: PixelBuffer, max_pixels: u64) -> PixelBuffer {
    let (w, h) = buffer.dimensions();
    let (nw, nh) = fit_within(w, h, max_pixels);
    if (nw, nh) == (w, h) {
        return buffer;
    }
    tracing::warn!(
        from_width = w,
        from_height = h,
        to_width = nw,
        to_height = nh,
        "image exceeds pixel ceiling, downsampling"
    );
    PixelBuffer::from_image(thumbnail(buffer.image(), nw, nh))
}

/// Largest dimensions with the same aspect ratio whose area stays within `max_pixels`.
pub fn fit_within(width: u32, height: u32, max_pixels: u64) -> (u32, u32) {
    let area = width as u64 * height as u64;
    if area <= max_pixels || area == 0 {
        return (width, height);
    }
    let scale = (max_pixels as f64 / area as f64).sqrt();
    let mut nw = ((width as f64 * scale).floor() as u32).max(1);
    let mut nh = ((height as f64 * scale).floor() as u32).max(1);
    while nw as u64 * nh as u64 > max_pixels {
        if nw >= nh && nw > 1 {
            nw -= 1;
        } else if nh > 1 {
            nh -= 1;
        } else {
            break;
        }
    }
    (nw, nh)
}

/// Convert a pixel to its palette-space coordinates, or `None` when it is background.
pub(crate) fn drawn_rgb(pixel: &Rgba<u8>) -> Option<[u8; 3]> {
    if pixel[3] >= ALPHA_THRESHOLD {
        Some([pixel[0], pixel[1], pixel[2]])
    } else {
        None
    }
}
