//! Single-page rasterization

use std::sync::Arc;

use super::filter::{self, FilterSet};
use super::layout::LayoutMode;
use super::memory::MemoryMonitor;
use super::pool::BufferPool;
use super::request::RenderFault;
use super::resolution::resolve;
use super::source::DocumentSource;
use super::types::{OPAQUE_WHITE, RasterImage};

/// Renders document pages into pooled rasters at the policy resolution
pub struct PageRenderer {
    pool: Arc<BufferPool>,
    monitor: Arc<MemoryMonitor>,
}

impl PageRenderer {
    #[must_use]
    pub fn new(pool: Arc<BufferPool>, monitor: Arc<MemoryMonitor>) -> Self {
        Self { pool, monitor }
    }

    /// Upscale factor for `mode` under the current memory pressure
    #[must_use]
    pub fn upscale_factor(&self, mode: &LayoutMode) -> u32 {
        resolve(mode.tier, self.monitor.pressure()).upscale_factor()
    }

    /// Render page `page_index` with the mode's tier and filters
    pub fn render_page(
        &self,
        source: &dyn DocumentSource,
        page_index: usize,
        mode: &LayoutMode,
    ) -> Result<RasterImage, RenderFault> {
        self.render_page_at(source, page_index, self.upscale_factor(mode), &mode.filters)
    }

    /// Render page `page_index` at an explicit upscale factor.
    ///
    /// The page index is not clamped: callers map slots to valid pages.
    pub fn render_page_at(
        &self,
        source: &dyn DocumentSource,
        page_index: usize,
        factor: u32,
        filters: &FilterSet,
    ) -> Result<RasterImage, RenderFault> {
        let page_count = source.page_count();
        if page_index >= page_count {
            return Err(RenderFault::OutOfRange {
                page: page_index,
                page_count,
            });
        }

        let page = source.open_page(page_index)?;
        let size = page.size();
        let (width, height) = size.scaled(factor).ok_or(RenderFault::Allocation {
            width: size.width.saturating_mul(factor),
            height: size.height.saturating_mul(factor),
        })?;

        let mut buffer = self.pool.acquire_or_allocate(width, height);
        // Page content may be transparent; readers expect paper white
        buffer.fill(OPAQUE_WHITE);

        if let Err(e) = page.render_into(&mut buffer) {
            self.pool.release(buffer);
            return Err(e.into());
        }
        drop(page);

        Ok(filter::apply(buffer, filters))
    }
}
