//! Slot layout: which pages go into which list slot, and compositing of
//! two-page spreads.
//!
//! A *slot* is one position in the virtualized page list. In single-page
//! layout every slot holds one page. In spread layout a slot holds a pair,
//! optionally with the cover page alone in slot 0. Reading direction only
//! decides which page of a pair is drawn on the left; it never changes the
//! pairing itself.

use std::sync::Arc;

use image::imageops;
use log::error;

use super::filter::FilterSet;
use super::memory::MemoryMonitor;
use super::pool::BufferPool;
use super::renderer::PageRenderer;
use super::request::RenderFault;
use super::resolution::ResolutionTier;
use super::source::DocumentSource;
use super::types::{RasterImage, TRANSPARENT, raster_fits};

/// Placement of the first page in spread layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverPage {
    /// Page 0 alone in slot 0, pairs start at page 1
    Separate,
    /// Pairs start at page 0
    Paired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageLayout {
    Single,
    Spread(CoverPage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadingDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScrollAxis {
    #[default]
    Horizontal,
    Vertical,
}

/// Everything that shapes a composited slot.
///
/// Immutable for the duration of a render cycle; a different mode
/// invalidates every previously composited slot image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutMode {
    pub layout: PageLayout,
    pub direction: ReadingDirection,
    pub scroll: ScrollAxis,
    pub tier: ResolutionTier,
    pub filters: FilterSet,
    /// The page list is shown rotated by 90° (landscape reading)
    pub landscape_rotated: bool,
}

impl Default for LayoutMode {
    fn default() -> Self {
        Self {
            layout: PageLayout::Single,
            direction: ReadingDirection::LeftToRight,
            scroll: ScrollAxis::Horizontal,
            tier: ResolutionTier::Low,
            filters: FilterSet::none(),
            landscape_rotated: false,
        }
    }
}

impl LayoutMode {
    #[must_use]
    pub const fn pages_per_slot(&self) -> usize {
        match self.layout {
            PageLayout::Single => 1,
            PageLayout::Spread(_) => 2,
        }
    }
}

/// Page indices assigned to a slot, in document order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPages {
    pub first: usize,
    pub second: Option<usize>,
}

/// Number of slots needed to show `page_count` pages
#[must_use]
pub fn slot_count(mode: &LayoutMode, page_count: usize) -> usize {
    if page_count == 0 {
        return 0;
    }
    match mode.layout {
        PageLayout::Single => page_count,
        PageLayout::Spread(CoverPage::Separate) => 1 + (page_count - 1).div_ceil(2),
        PageLayout::Spread(CoverPage::Paired) => page_count.div_ceil(2),
    }
}

/// Pages belonging to `slot`. The second page may lie past the end of the
/// document; see [`visible_pages`].
#[must_use]
pub fn pages_for_slot(slot: usize, mode: &LayoutMode) -> SlotPages {
    let pair = |start: usize| SlotPages {
        first: start,
        second: Some(start + 1),
    };

    match mode.layout {
        PageLayout::Single => SlotPages {
            first: slot,
            second: None,
        },
        PageLayout::Spread(CoverPage::Separate) if slot == 0 => SlotPages {
            first: 0,
            second: None,
        },
        PageLayout::Spread(CoverPage::Separate) => pair(1 + (slot - 1) * 2),
        PageLayout::Spread(CoverPage::Paired) => pair(slot * 2),
    }
}

/// Pages of `slot` that exist, as `(left, right)` screen positions.
///
/// Pages past the end are omitted. Right-to-left reading puts the second
/// page of a pair on the left.
#[must_use]
pub fn visible_pages(
    slot: usize,
    mode: &LayoutMode,
    page_count: usize,
) -> (Option<usize>, Option<usize>) {
    let pages = pages_for_slot(slot, mode);
    let first = (pages.first < page_count).then_some(pages.first);
    let second = pages.second.filter(|&p| p < page_count);

    match mode.direction {
        ReadingDirection::LeftToRight => (first, second),
        ReadingDirection::RightToLeft => (second, first),
    }
}

/// Slot containing the 1-based `page_number`, clamped to the valid range
#[must_use]
pub fn slot_for_page(page_number: usize, mode: &LayoutMode, page_count: usize) -> usize {
    let count = slot_count(mode, page_count);
    if count == 0 {
        return 0;
    }

    let index = page_number.clamp(1, page_count) - 1;
    let slot = match mode.layout {
        PageLayout::Single => index,
        PageLayout::Spread(CoverPage::Separate) if index == 0 => 0,
        PageLayout::Spread(CoverPage::Separate) => (index - 1) / 2 + 1,
        PageLayout::Spread(CoverPage::Paired) => index / 2,
    };
    slot.min(count - 1)
}

/// 1-based page number that stands for `slot` (its first page).
///
/// `slot_for_page(representative_page(s)) == s` for every valid slot, so
/// this is what gets persisted across layout changes.
#[must_use]
pub fn representative_page(slot: usize, mode: &LayoutMode, page_count: usize) -> usize {
    if page_count == 0 {
        return 0;
    }
    (pages_for_slot(slot, mode).first + 1).min(page_count)
}

/// Page indicator text, e.g. `"4 - 5 / 12"`, mirrored for right-to-left
#[must_use]
pub fn page_indicator(slot: usize, mode: &LayoutMode, page_count: usize) -> String {
    let pages = pages_for_slot(slot, mode);
    let first = (pages.first + 1).min(page_count);
    let shown = match pages.second.filter(|&p| p < page_count) {
        Some(second) => format!("{first} - {}", second + 1),
        None => first.to_string(),
    };

    match mode.direction {
        ReadingDirection::LeftToRight => format!("{shown} / {page_count}"),
        ReadingDirection::RightToLeft => format!("{page_count} / {shown}"),
    }
}

/// Seek bar position (0-based page index) for `slot`
#[must_use]
pub fn seek_position(slot: usize, mode: &LayoutMode, page_count: usize) -> usize {
    pages_for_slot(slot, mode)
        .first
        .min(page_count.saturating_sub(1))
}

/// Slot to show when the seek bar is moved to `position` (0-based page)
#[must_use]
pub fn slot_for_seek_position(position: usize, mode: &LayoutMode, page_count: usize) -> usize {
    slot_for_page(position + 1, mode, page_count)
}

/// Renders the pages of a slot and joins spreads into one raster
pub struct LayoutComposer {
    renderer: PageRenderer,
    pool: Arc<BufferPool>,
}

impl LayoutComposer {
    #[must_use]
    pub fn new(pool: Arc<BufferPool>, monitor: Arc<MemoryMonitor>) -> Self {
        Self {
            renderer: PageRenderer::new(Arc::clone(&pool), monitor),
            pool,
        }
    }

    #[must_use]
    pub fn renderer(&self) -> &PageRenderer {
        &self.renderer
    }

    /// Render `slot` into a single raster.
    ///
    /// Returns `Ok(None)` only when the slot has no page at all, which for
    /// a slot below [`slot_count`] is an internal error.
    pub fn composite(
        &self,
        source: &dyn DocumentSource,
        slot: usize,
        mode: &LayoutMode,
    ) -> Result<Option<RasterImage>, RenderFault> {
        let page_count = source.page_count();
        let (left, right) = visible_pages(slot, mode, page_count);

        // One factor for both halves, so a pressure change mid-slot cannot
        // produce a spread with mismatched page scales
        let factor = self.renderer.upscale_factor(mode);
        let render = |page: usize| {
            self.renderer
                .render_page_at(source, page, factor, &mode.filters)
        };

        let left_img = left.map(render).transpose()?;
        let right_img = match right.map(render).transpose() {
            Ok(img) => img,
            Err(e) => {
                if let Some(img) = left_img {
                    self.pool.release(img);
                }
                return Err(e);
            }
        };

        match (left_img, right_img) {
            (None, None) => {
                if slot < slot_count(mode, page_count) {
                    error!("Slot {slot} maps to no page ({page_count} pages, {mode:?})");
                }
                Ok(None)
            }
            (Some(img), None) | (None, Some(img)) => Ok(Some(img)),
            (Some(left), Some(right)) => self.join(left, right).map(Some),
        }
    }

    /// Draw two pages side by side, top-aligned, on a transparent raster.
    /// The page rasters go back to the pool.
    fn join(&self, left: RasterImage, right: RasterImage) -> Result<RasterImage, RenderFault> {
        let width = left.width().checked_add(right.width());
        let height = left.height().max(right.height());
        let Some(width) = width.filter(|&w| raster_fits(w, height)) else {
            let (lw, rw) = (left.width(), right.width());
            self.pool.release(left);
            self.pool.release(right);
            return Err(RenderFault::Allocation {
                width: lw.saturating_add(rw),
                height,
            });
        };

        let mut combined = self.pool.acquire_or_allocate(width, height);
        combined.fill(TRANSPARENT);
        imageops::replace(combined.as_rgba_mut(), left.as_rgba(), 0, 0);
        imageops::replace(
            combined.as_rgba_mut(),
            right.as_rgba(),
            i64::from(left.width()),
            0,
        );

        self.pool.release(left);
        self.pool.release(right);
        Ok(combined)
    }
}
