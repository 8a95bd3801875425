//! Reader session: settings, the open document and the reading position
//!
//! Ties the persisted settings to a [`PageProvider`]. The current position is
//! tracked as a slot and persisted as the 1-based page that stands for it,
//! so it survives switching between single and spread layouts.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::fingerprint::DocumentFingerprint;
use crate::pdf::{
    BufferPool, DEFAULT_POOL_CAPACITY, DocumentOpener, LayoutMode, MemoryMonitor, MemoryPressure,
    PageProvider, TrimLevel, page_indicator, representative_page, slot_for_page,
};
use crate::settings::{Settings, SettingsStore};

pub struct ReaderSession {
    store: SettingsStore,
    settings: Settings,
    pool: Arc<BufferPool>,
    monitor: Arc<MemoryMonitor>,
    provider: Option<PageProvider>,
    current_slot: usize,
}

impl ReaderSession {
    /// Load settings from `store` and start without a document
    pub fn new(store: SettingsStore) -> Result<Self> {
        let settings = store
            .load()
            .with_context(|| format!("Failed to load settings from {:?}", store.path()))?;
        Ok(Self::with_settings(store, settings))
    }

    #[must_use]
    pub fn with_settings(store: SettingsStore, settings: Settings) -> Self {
        let pool = Arc::new(BufferPool::new(DEFAULT_POOL_CAPACITY));
        let monitor = Arc::new(MemoryMonitor::new(Arc::clone(&pool)));
        Self {
            store,
            settings,
            pool,
            monitor,
            provider: None,
            current_slot: 0,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn mode(&self) -> LayoutMode {
        self.settings.layout_mode()
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<MemoryMonitor> {
        &self.monitor
    }

    #[must_use]
    pub fn provider(&self) -> Option<&PageProvider> {
        self.provider.as_ref()
    }

    pub fn provider_mut(&mut self) -> Option<&mut PageProvider> {
        self.provider.as_mut()
    }

    /// Open a document, replacing the current one.
    ///
    /// A document with a fingerprint other than the last one starts from
    /// the per-document defaults; the last one resumes at its saved page.
    /// Settings are left untouched when the document cannot be opened.
    pub fn open_document(
        &mut self,
        opener: impl DocumentOpener,
        fingerprint: &DocumentFingerprint,
    ) -> Result<&mut PageProvider> {
        self.close_document()?;

        let is_new = self.settings.last_document.as_deref() != Some(fingerprint.as_str());
        let mut settings = self.settings.clone();
        if is_new {
            settings.reset_document_defaults();
            settings.last_document = Some(fingerprint.to_string());
        }

        let mode = settings.layout_mode();
        let provider = PageProvider::open(
            opener,
            mode,
            Arc::clone(&self.pool),
            Arc::clone(&self.monitor),
        )
        .context("Failed to open document")?;

        if is_new {
            info!("New document {fingerprint}, resetting per-document settings");
            self.settings = settings;
            self.save()?;
        }

        self.current_slot = slot_for_page(
            self.settings.last_page_number,
            &mode,
            provider.page_count(),
        );
        debug!(
            "Resuming at page {} (slot {})",
            self.settings.last_page_number, self.current_slot
        );

        Ok(self.provider.insert(provider))
    }

    /// Persist the position and release the document
    pub fn close_document(&mut self) -> Result<()> {
        self.remember_position()?;
        if let Some(provider) = self.provider.take() {
            provider.close();
        }
        Ok(())
    }

    /// Store the page that stands for the current slot
    pub fn remember_position(&mut self) -> Result<()> {
        let Some(page) = self.current_page() else {
            return Ok(());
        };
        self.settings.last_page_number = page;
        self.save()
    }

    #[must_use]
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Move to `slot`, clamped to the document
    pub fn set_current_slot(&mut self, slot: usize) -> usize {
        let count = self.provider.as_ref().map_or(0, PageProvider::slot_count);
        self.current_slot = slot.min(count.saturating_sub(1));
        self.current_slot
    }

    /// Move to the slot containing 1-based `page_number`
    pub fn jump_to_page(&mut self, page_number: usize) -> usize {
        let page_count = self.page_count();
        self.current_slot = slot_for_page(page_number, &self.mode(), page_count);
        self.current_slot
    }

    /// 1-based page standing for the current slot
    #[must_use]
    pub fn current_page(&self) -> Option<usize> {
        let provider = self.provider.as_ref()?;
        Some(representative_page(
            self.current_slot,
            provider.mode(),
            provider.page_count(),
        ))
    }

    #[must_use]
    pub fn page_indicator(&self) -> Option<String> {
        let provider = self.provider.as_ref()?;
        Some(page_indicator(
            self.current_slot,
            provider.mode(),
            provider.page_count(),
        ))
    }

    /// Change settings, persist them and re-layout the open document,
    /// keeping the same page in view
    pub fn update_settings(&mut self, update: impl FnOnce(&mut Settings)) -> Result<()> {
        let page = self.current_page();
        update(&mut self.settings);

        let mode = self.settings.layout_mode();
        if let Some(provider) = self.provider.as_mut() {
            if provider.set_mode(mode) {
                if let Some(page) = page {
                    self.current_slot = slot_for_page(page, &mode, provider.page_count());
                }
            }
        }
        if let Some(page) = page {
            self.settings.last_page_number = page;
        }
        self.save()
    }

    /// OS low-memory signal
    pub fn handle_low_memory(&self) {
        self.monitor.on_low_memory();
    }

    /// Memory is available again; renders go back to the preferred tier
    pub fn handle_memory_relief(&self) {
        self.monitor.relieve();
    }

    /// Feed a memory usage sample; pressure follows the used ratio
    pub fn report_memory_usage(&self, used_bytes: u64, total_bytes: u64) -> MemoryPressure {
        self.monitor.report_usage(used_bytes, total_bytes)
    }

    pub fn handle_trim(&self, level: TrimLevel) {
        self.monitor.on_trim(level);
    }

    fn page_count(&self) -> usize {
        self.provider.as_ref().map_or(0, PageProvider::page_count)
    }

    fn save(&self) -> Result<()> {
        self.store
            .save(&self.settings)
            .with_context(|| format!("Failed to save settings to {:?}", self.store.path()))
    }
}
