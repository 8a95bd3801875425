//! Render request and response types

use super::layout::LayoutMode;
use super::source::SourceError;
use super::types::RasterImage;

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Request sent to the render worker
#[derive(Debug)]
pub enum RenderRequest {
    /// Composite one slot
    Slot {
        id: RequestId,
        slot: usize,
        mode: LayoutMode,
    },

    /// Release the document and stop the worker
    Shutdown,
}

/// Per-slot rendering failures
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[error("page {page} out of range (document has {page_count} pages)")]
    OutOfRange { page: usize, page_count: usize },

    #[error("render failed: {0}")]
    Render(String),

    #[error("raster of {width}x{height} exceeds the allocation limit")]
    Allocation { width: u32, height: u32 },

    #[error("slot {slot} has no pages")]
    EmptySlot { slot: usize },
}

impl From<SourceError> for RenderFault {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::OutOfRange { index, page_count } => Self::OutOfRange {
                page: index,
                page_count,
            },
            other => Self::Render(other.to_string()),
        }
    }
}

/// Response from the render worker
#[derive(Debug)]
pub enum RenderResponse {
    /// Document opened (sent once, before any slot response)
    DocumentInfo {
        page_count: usize,
        title: Option<String>,
    },

    /// The document could not be opened; the worker has exited
    OpenFailed(SourceError),

    /// Composited slot
    Slot {
        id: RequestId,
        slot: usize,
        image: RasterImage,
    },

    /// Error while compositing a slot
    Error {
        id: RequestId,
        slot: usize,
        error: RenderFault,
    },
}
