//! MuPDF-backed document source

use std::path::{Path, PathBuf};

use log::debug;
use mupdf::{Colorspace, Document, Matrix, MetadataName, Page};

use super::source::{DocumentOpener, DocumentSource, PageHandle, SourceError};
use super::types::{PageSize, RasterImage};

/// Opens a PDF (or any format MuPDF understands) from a file path
#[derive(Clone, Debug)]
pub struct MupdfOpener {
    path: PathBuf,
}

impl MupdfOpener {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentOpener for MupdfOpener {
    fn open(&self) -> Result<Box<dyn DocumentSource>, SourceError> {
        let doc = Document::open(self.path.to_string_lossy().as_ref())
            .map_err(|e| SourceError::Open(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| SourceError::Open(e.to_string()))?;
        debug!("Opened {:?} with {page_count} pages", self.path);

        Ok(Box::new(MupdfSource {
            doc,
            page_count: page_count.max(0) as usize,
        }))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub struct MupdfSource {
    doc: Document,
    page_count: usize,
}

impl DocumentSource for MupdfSource {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn open_page(&self, index: usize) -> Result<Box<dyn PageHandle + '_>, SourceError> {
        if index >= self.page_count {
            return Err(SourceError::OutOfRange {
                index,
                page_count: self.page_count,
            });
        }

        let page = self
            .doc
            .load_page(index as i32)
            .map_err(|e| SourceError::Render(e.to_string()))?;
        let bounds = page
            .bounds()
            .map_err(|e| SourceError::Render(e.to_string()))?;
        let width_pt = (bounds.x1 - bounds.x0).max(1.0);
        let height_pt = (bounds.y1 - bounds.y0).max(1.0);

        Ok(Box::new(MupdfPage {
            page,
            width_pt,
            height_pt,
        }))
    }

    fn title(&self) -> Option<String> {
        self.doc
            .metadata(MetadataName::Title)
            .ok()
            .filter(|t| !t.is_empty())
    }
}

struct MupdfPage {
    page: Page,
    width_pt: f32,
    height_pt: f32,
}

impl PageHandle for MupdfPage {
    fn size(&self) -> PageSize {
        PageSize::new(
            self.width_pt.round() as u32,
            self.height_pt.round() as u32,
        )
    }

    fn render_into(&self, target: &mut RasterImage) -> Result<(), SourceError> {
        let sx = target.width() as f32 / self.width_pt;
        let sy = target.height() as f32 / self.height_pt;
        let transform = Matrix::new_scale(sx, sy);

        // Render with alpha so blank regions keep the target's background
        let pixmap = self
            .page
            .to_pixmap(&transform, &Colorspace::device_rgb(), true, false)
            .map_err(|e| SourceError::Render(e.to_string()))?;

        let n = pixmap.n() as usize;
        if n != 4 {
            return Err(SourceError::Render(format!(
                "unsupported pixmap format: {n} channels"
            )));
        }

        let src_width = pixmap.width() as usize;
        let src_height = pixmap.height() as usize;
        let stride = pixmap.stride() as usize;
        let samples = pixmap.samples();
        if samples.len() < stride.saturating_mul(src_height) || src_width * n > stride {
            return Err(SourceError::Render("pixmap buffer size mismatch".into()));
        }

        let dst_width = target.width() as usize;
        let width = src_width.min(dst_width);
        let height = src_height.min(target.height() as usize);
        let dst = target.pixels_mut();

        for y in 0..height {
            let src_row = &samples[y * stride..y * stride + width * 4];
            let dst_row = &mut dst[y * dst_width * 4..(y * dst_width + width) * 4];
            blend_premultiplied_row(dst_row, src_row);
        }

        Ok(())
    }
}

/// Source-over blend of premultiplied RGBA onto straight RGBA
fn blend_premultiplied_row(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let inv = 255 - u16::from(s[3]);
        for c in 0..3 {
            let blended = u16::from(s[c]) + (u16::from(d[c]) * inv + 127) / 255;
            d[c] = blended.min(255) as u8;
        }
        d[3] = (u16::from(s[3]) + (u16::from(d[3]) * inv + 127) / 255).min(255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_source_keeps_background() {
        let mut dst = [255u8, 255, 255, 255];
        blend_premultiplied_row(&mut dst, &[0, 0, 0, 0]);
        assert_eq!(dst, [255, 255, 255, 255]);
    }

    #[test]
    fn opaque_source_replaces_background() {
        let mut dst = [255u8, 255, 255, 255];
        blend_premultiplied_row(&mut dst, &[10, 20, 30, 255]);
        assert_eq!(dst, [10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_an_open_failure() {
        let opener = MupdfOpener::new("/nonexistent/definitely-missing.pdf");
        assert!(matches!(opener.open(), Err(SourceError::Open(_))));
    }
}
