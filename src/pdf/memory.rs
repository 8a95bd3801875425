//! Process-wide memory pressure tracking
//!
//! Shared between the interaction thread (which receives OS low-memory
//! signals) and render workers (which read the pressure level to choose a
//! resolution). All state is atomic, so signals can arrive while workers are
//! acquiring and releasing buffers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use super::pool::BufferPool;
use super::resolution::MemoryPressure;

/// Used-memory ratio above which the system counts as under pressure.
pub const MEMORY_WARNING_THRESHOLD: f32 = 0.85;

/// Memory trim notifications, from mildest to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrimLevel {
    /// The UI went to the background
    UiHidden,
    /// The process is running but the system is getting low
    RunningModerate,
    RunningLow,
    RunningCritical,
}

pub struct MemoryMonitor {
    high_pressure: AtomicBool,
    pool: Arc<BufferPool>,
}

impl MemoryMonitor {
    #[must_use]
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self {
            high_pressure: AtomicBool::new(false),
            pool,
        }
    }

    #[must_use]
    pub fn pressure(&self) -> MemoryPressure {
        if self.high_pressure.load(Ordering::Acquire) {
            MemoryPressure::High
        } else {
            MemoryPressure::Normal
        }
    }

    /// Update pressure from a memory usage sample
    pub fn report_usage(&self, used_bytes: u64, total_bytes: u64) -> MemoryPressure {
        let high = total_bytes > 0
            && (used_bytes as f64 / total_bytes as f64) > f64::from(MEMORY_WARNING_THRESHOLD);
        self.high_pressure.store(high, Ordering::Release);
        self.pressure()
    }

    /// OS low-memory notification: flag pressure and drop pooled buffers
    pub fn on_low_memory(&self) {
        self.high_pressure.store(true, Ordering::Release);
        let evicted = self.pool.clear();
        warn!("Low memory: released {evicted} pooled buffers");
    }

    /// OS trim notification
    pub fn on_trim(&self, level: TrimLevel) {
        if level < TrimLevel::RunningModerate {
            return;
        }
        if level >= TrimLevel::RunningLow {
            self.high_pressure.store(true, Ordering::Release);
        }
        let evicted = self.pool.clear();
        warn!("Memory trim {level:?}: released {evicted} pooled buffers");
    }

    /// Pressure went away
    pub fn relieve(&self) {
        self.high_pressure.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::RasterImage;

    fn monitor_with_buffers(count: usize) -> MemoryMonitor {
        let pool = Arc::new(BufferPool::new(8));
        for _ in 0..count {
            pool.release(RasterImage::new(2, 2));
        }
        MemoryMonitor::new(pool)
    }

    #[test]
    fn usage_above_threshold_is_high_pressure() {
        let monitor = monitor_with_buffers(0);
        assert_eq!(monitor.report_usage(90, 100), MemoryPressure::High);
        assert_eq!(monitor.report_usage(50, 100), MemoryPressure::Normal);
        assert_eq!(monitor.report_usage(0, 0), MemoryPressure::Normal);
    }

    #[test]
    fn low_memory_clears_pool_and_flags_pressure() {
        let monitor = monitor_with_buffers(3);
        monitor.on_low_memory();
        assert!(monitor.pool().is_empty());
        assert_eq!(monitor.pressure(), MemoryPressure::High);

        monitor.relieve();
        assert_eq!(monitor.pressure(), MemoryPressure::Normal);
    }

    #[test]
    fn mild_trim_keeps_pool() {
        let monitor = monitor_with_buffers(2);
        monitor.on_trim(TrimLevel::UiHidden);
        assert_eq!(monitor.pool().len(), 2);

        monitor.on_trim(TrimLevel::RunningModerate);
        assert!(monitor.pool().is_empty());
        assert_eq!(monitor.pressure(), MemoryPressure::Normal);

        monitor.on_trim(TrimLevel::RunningCritical);
        assert_eq!(monitor.pressure(), MemoryPressure::High);
    }
}
