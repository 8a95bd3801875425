//! Document source abstraction
//!
//! The pipeline never parses documents itself. It consumes anything that can
//! report a page count, open a page by index and rasterize that page into a
//! caller-provided buffer.

use super::types::{PageSize, RasterImage};

/// Errors reported by a document source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot open document: {0}")]
    Open(String),

    #[error("page {index} out of range (document has {page_count} pages)")]
    OutOfRange { index: usize, page_count: usize },

    #[error("rasterization failed: {0}")]
    Render(String),
}

/// An open page. Dropping the handle closes the page.
pub trait PageHandle {
    /// Intrinsic page size in document units
    fn size(&self) -> PageSize;

    /// Rasterize the page so it covers the whole of `target`.
    ///
    /// The target is already cleared to its background; page content is
    /// composited over it, so transparent regions keep the background.
    fn render_into(&self, target: &mut RasterImage) -> Result<(), SourceError>;
}

/// An open document
pub trait DocumentSource {
    fn page_count(&self) -> usize;

    /// Open page `index` (0-based)
    fn open_page(&self, index: usize) -> Result<Box<dyn PageHandle + '_>, SourceError>;

    /// Document title from metadata, if any
    fn title(&self) -> Option<String> {
        None
    }
}

/// Opens a [`DocumentSource`] on the thread that will use it.
///
/// Rendering backends are usually not thread-safe, so the opener travels to
/// the render worker and the document is opened there. The worker holds the
/// only open instance of the document.
pub trait DocumentOpener: Send + 'static {
    fn open(&self) -> Result<Box<dyn DocumentSource>, SourceError>;

    /// Human-readable name for logs
    fn describe(&self) -> String;
}
