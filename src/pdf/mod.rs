//! Page pipeline: document source to composited, filtered slot rasters

mod filter;
mod layout;
mod memory;
#[cfg(feature = "pdf")]
mod mupdf_source;
mod pool;
mod provider;
mod renderer;
mod request;
mod resolution;
mod source;
mod types;
mod worker;
mod zoom;

pub use filter::{FilterSet, apply as apply_filters};
pub use layout::{
    CoverPage, LayoutComposer, LayoutMode, PageLayout, ReadingDirection, ScrollAxis, SlotPages,
    page_indicator, pages_for_slot, representative_page, seek_position, slot_count,
    slot_for_page, slot_for_seek_position, visible_pages,
};
pub use memory::{MEMORY_WARNING_THRESHOLD, MemoryMonitor, TrimLevel};
#[cfg(feature = "pdf")]
pub use mupdf_source::{MupdfOpener, MupdfSource};
pub use pool::{BufferPool, DEFAULT_POOL_CAPACITY};
pub use provider::{BindingState, PageProvider, ProviderError, ProviderEvent, ViewId};
pub use renderer::PageRenderer;
pub use request::{RenderFault, RenderRequest, RenderResponse, RequestId};
pub use resolution::{MemoryPressure, ParseTierError, ResolutionTier, resolve};
pub use source::{DocumentOpener, DocumentSource, PageHandle, SourceError};
pub use types::*;
pub use zoom::*;
