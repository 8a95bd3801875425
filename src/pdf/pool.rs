//! Bounded pool of reusable raster buffers
//!
//! Large page rasters are expensive to allocate, and consecutive pages of a
//! document almost always share dimensions. Released buffers are kept and
//! handed back on an exact (width, height) match. There is no reuse across
//! differing sizes.

use std::sync::{Mutex, PoisonError};

use log::debug;

use super::types::RasterImage;

/// Default maximum number of pooled buffers.
pub const DEFAULT_POOL_CAPACITY: usize = 15;

/// Thread-safe bounded multiset of free rasters keyed by dimensions
pub struct BufferPool {
    free: Mutex<Vec<RasterImage>>,
    capacity: usize,
}

impl BufferPool {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Take a pooled raster with exactly these dimensions, if one is free
    #[must_use]
    pub fn acquire(&self, width: u32, height: u32) -> Option<RasterImage> {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        let index = free
            .iter()
            .position(|img| img.dimensions() == (width, height))?;
        Some(free.swap_remove(index))
    }

    /// Take a pooled raster or allocate a fresh one.
    ///
    /// The contents of a reused raster are whatever its last owner left;
    /// callers clear it before drawing.
    #[must_use]
    pub fn acquire_or_allocate(&self, width: u32, height: u32) -> RasterImage {
        self.acquire(width, height)
            .unwrap_or_else(|| RasterImage::new(width, height))
    }

    /// Return a raster to the pool.
    ///
    /// Returns `false` when the raster was dropped instead (pool full or
    /// zero-sized raster).
    pub fn release(&self, image: RasterImage) -> bool {
        if !image.is_valid() {
            return false;
        }

        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() >= self.capacity {
            return false;
        }
        free.push(image);
        true
    }

    /// Drop every pooled raster, returning how many were evicted
    pub fn clear(&self) -> usize {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        let evicted = free.len();
        free.clear();
        if evicted > 0 {
            debug!("Cleared buffer pool ({evicted} buffers)");
        }
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}
