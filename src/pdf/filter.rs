//! Post-render color filters
//!
//! Filters run in a fixed order: grayscale → invert → sepia → sharpen.
//! Color filters rewrite the raster in place, one pass per enabled filter, so
//! no intermediate buffers are allocated and the raster keeps its identity
//! for the buffer pool.

use image::imageops;

use super::types::RasterImage;

/// Which filters to apply to every rendered page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FilterSet {
    pub grayscale: bool,
    pub invert: bool,
    pub sepia: bool,
    pub sharpen: bool,
}

impl FilterSet {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            grayscale: false,
            invert: false,
            sepia: false,
            sharpen: false,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.grayscale || self.invert || self.sepia || self.sharpen)
    }
}

/// Apply the enabled filters. With no filters the input is returned as is.
#[must_use]
pub fn apply(mut image: RasterImage, filters: &FilterSet) -> RasterImage {
    if filters.is_empty() {
        return image;
    }

    if filters.grayscale {
        simd_luma::grayscale_rgba(image.pixels_mut());
    }
    if filters.invert {
        invert_rgba(image.pixels_mut());
    }
    if filters.sepia {
        sepia_rgba(image.pixels_mut());
    }
    if filters.sharpen {
        sharpen(&mut image);
    }

    image
}

/// `255 - c` on color channels; alpha is kept
fn invert_rgba(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
    }
}

fn sepia_rgba(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let r = f32::from(px[0]);
        let g = f32::from(px[1]);
        let b = f32::from(px[2]);
        px[0] = (0.393 * r + 0.769 * g + 0.189 * b).min(255.0) as u8;
        px[1] = (0.349 * r + 0.686 * g + 0.168 * b).min(255.0) as u8;
        px[2] = (0.272 * r + 0.534 * g + 0.131 * b).min(255.0) as u8;
    }
}

const SHARPEN_SIGMA: f32 = 1.0;
const SHARPEN_THRESHOLD: i32 = 2;

fn sharpen(image: &mut RasterImage) {
    let sharpened = imageops::unsharpen(image.as_rgba(), SHARPEN_SIGMA, SHARPEN_THRESHOLD);
    image.pixels_mut().copy_from_slice(sharpened.as_raw());
}

mod simd_luma {
    use wide::u16x8;

    // 8-bit Rec.709 weights, sum to 256
    const LUMA_R: u16 = 54;
    const LUMA_G: u16 = 183;
    const LUMA_B: u16 = 19;

    #[inline]
    fn luma(r: u8, g: u8, b: u8) -> u8 {
        ((u16::from(r) * LUMA_R + u16::from(g) * LUMA_G + u16::from(b) * LUMA_B) >> 8) as u8
    }

    /// Replace every pixel's color with its luma, eight pixels at a time
    pub fn grayscale_rgba(pixels: &mut [u8]) {
        let simd_end = pixels.len() / 32 * 32;
        let (simd_part, remainder) = pixels.split_at_mut(simd_end);

        for chunk in simd_part.chunks_exact_mut(32) {
            let lane = |offset: usize| {
                u16x8::new([
                    u16::from(chunk[offset]),
                    u16::from(chunk[offset + 4]),
                    u16::from(chunk[offset + 8]),
                    u16::from(chunk[offset + 12]),
                    u16::from(chunk[offset + 16]),
                    u16::from(chunk[offset + 20]),
                    u16::from(chunk[offset + 24]),
                    u16::from(chunk[offset + 28]),
                ])
            };
            let r = lane(0);
            let g = lane(1);
            let b = lane(2);

            let luma: u16x8 =
                (r * u16x8::splat(LUMA_R) + g * u16x8::splat(LUMA_G) + b * u16x8::splat(LUMA_B))
                    >> 8;

            for (i, &l) in luma.to_array().iter().enumerate() {
                let l = l as u8;
                chunk[i * 4] = l;
                chunk[i * 4 + 1] = l;
                chunk[i * 4 + 2] = l;
            }
        }

        for px in remainder.chunks_exact_mut(4) {
            let l = luma(px[0], px[1], px[2]);
            px[0] = l;
            px[1] = l;
            px[2] = l;
        }
    }

}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn sample_image() -> RasterImage {
        let mut img = RasterImage::new(5, 3);
        for (i, px) in img.as_rgba_mut().pixels_mut().enumerate() {
            let i = i as u8;
            *px = Rgba([i * 13, 200 - i * 9, i * 5 + 40, 255]);
        }
        img
    }

    #[test]
    fn no_filters_returns_same_buffer() {
        let img = sample_image();
        let addr = img.pixels().as_ptr();
        let out = apply(img, &FilterSet::none());
        assert_eq!(out.pixels().as_ptr(), addr);
    }

    #[test]
    fn invert_twice_is_identity() {
        let original = sample_image();
        let invert = FilterSet {
            invert: true,
            ..FilterSet::none()
        };

        let twice = apply(apply(sample_image(), &invert), &invert);
        assert_eq!(twice.pixels(), original.pixels());
    }

    #[test]
    fn invert_keeps_alpha() {
        let mut img = RasterImage::new(1, 1);
        img.as_rgba_mut().put_pixel(0, 0, Rgba([0, 100, 255, 128]));
        let out = apply(
            img,
            &FilterSet {
                invert: true,
                ..FilterSet::none()
            },
        );
        assert_eq!(out.pixel(0, 0), Rgba([255, 155, 0, 128]));
    }

    #[test]
    fn grayscale_equalizes_channels_and_preserves_white() {
        let mut img = sample_image();
        img.as_rgba_mut().put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        let out = apply(
            img,
            &FilterSet {
                grayscale: true,
                ..FilterSet::none()
            },
        );

        assert_eq!(out.pixel(0, 0), Rgba([255, 255, 255, 255]));
        for px in out.as_rgba().pixels() {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }

    #[test]
    fn sepia_tints_white_warm() {
        let mut img = RasterImage::new(1, 1);
        img.fill(Rgba([255, 255, 255, 255]));
        let out = apply(
            img,
            &FilterSet {
                sepia: true,
                ..FilterSet::none()
            },
        );
        let px = out.pixel(0, 0);
        assert_eq!(px[0], 255);
        assert!(px[0] >= px[1] && px[1] >= px[2]);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn filters_keep_buffer_identity() {
        let img = sample_image();
        let addr = img.pixels().as_ptr();
        let all = FilterSet {
            grayscale: true,
            invert: true,
            sepia: true,
            sharpen: true,
        };
        let out = apply(img, &all);
        assert_eq!(out.pixels().as_ptr(), addr);
        assert_eq!(out.dimensions(), (5, 3));
    }

    #[test]
    fn grayscale_runs_before_invert() {
        let mut img = RasterImage::new(1, 1);
        img.fill(Rgba([200, 100, 50, 255]));
        let out = apply(
            img,
            &FilterSet {
                grayscale: true,
                invert: true,
                ..FilterSet::none()
            },
        );
        let gray = ((200u16 * 54 + 100 * 183 + 50 * 19) >> 8) as u8;
        assert_eq!(out.pixel(0, 0), Rgba([255 - gray, 255 - gray, 255 - gray, 255]));
    }
}
