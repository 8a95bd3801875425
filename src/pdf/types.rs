//! Core types for the page pipeline

use std::fmt;
use std::path::Path;

use image::{ImageFormat, ImageResult, Rgba, RgbaImage};

/// Background every page is rendered onto before rasterization.
pub const OPAQUE_WHITE: Rgba<u8> = Rgba([0xFF, 0xFF, 0xFF, 0xFF]);

/// Background of a composited spread before pages are drawn.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Largest raster the pipeline will allocate (RGBA bytes).
///
/// A request above this is reported as an allocation failure instead of
/// letting the allocator abort the process.
pub const MAX_RASTER_BYTES: u64 = 512 * 1024 * 1024;

/// Owned RGBA8 raster produced by the renderer.
///
/// Deliberately not `Clone`: a raster has exactly one owner at a time. It
/// moves renderer → composer → provider → view, and back into the buffer pool
/// when the view is recycled, so a buffer can never be handed to a new slot
/// while an old view still shows it.
pub struct RasterImage {
    buf: RgbaImage,
}

impl RasterImage {
    /// Allocate a zeroed (fully transparent) raster
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: RgbaImage::new(width, height),
        }
    }

    #[must_use]
    pub fn from_rgba(buf: RgbaImage) -> Self {
        Self { buf }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.buf.dimensions()
    }

    /// A raster with a zero dimension cannot be drawn or reused.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.buf.width() > 0 && self.buf.height() > 0
    }

    /// Overwrite every pixel with `color` (source mode, no blending)
    pub fn fill(&mut self, color: Rgba<u8>) {
        for px in self.buf.pixels_mut() {
            *px = color;
        }
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.buf.get_pixel(x, y)
    }

    /// Raw RGBA samples, row-major, 4 bytes per pixel
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.buf.as_raw()
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    #[must_use]
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.buf
    }

    pub fn as_rgba_mut(&mut self) -> &mut RgbaImage {
        &mut self.buf
    }

    #[must_use]
    pub fn into_rgba(self) -> RgbaImage {
        self.buf
    }

    /// Write the raster as a PNG file
    pub fn save_png(&self, path: &Path) -> ImageResult<()> {
        self.buf.save_with_format(path, ImageFormat::Png)
    }
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

/// Page dimensions in document units (points)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scale both sides by an integer upscale factor.
    ///
    /// Returns `None` when the result overflows or exceeds [`MAX_RASTER_BYTES`].
    #[must_use]
    pub fn scaled(self, factor: u32) -> Option<(u32, u32)> {
        let width = self.width.checked_mul(factor)?;
        let height = self.height.checked_mul(factor)?;
        raster_fits(width, height).then_some((width, height))
    }
}

/// Whether a `width`×`height` RGBA raster is within the allocation limit
#[must_use]
pub fn raster_fits(width: u32, height: u32) -> bool {
    u64::from(width) * u64::from(height) * 4 <= MAX_RASTER_BYTES
}
