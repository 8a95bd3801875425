//! Page provider - binds slots to recyclable views
//!
//! Views are the reusable display surfaces of a virtualized list. Binding a
//! view to a slot dispatches a render to the worker; the view becomes
//! `Bound` only when the matching response arrives. A response for a view
//! that was recycled or rebound in the meantime is stale: its raster goes
//! straight back to the pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use kurbo::{Point, Size};
use log::{debug, error, info, warn};

use super::layout::{LayoutComposer, LayoutMode, slot_count};
use super::memory::{MemoryMonitor, TrimLevel};
use super::pool::BufferPool;
use super::request::{RenderFault, RenderRequest, RenderResponse, RequestId};
use super::source::{DocumentOpener, SourceError};
use super::types::RasterImage;
use super::worker::render_worker;
use super::zoom::{Gesture, TransformEngine, TransformEvent, ZoomLimits};

/// Identifier of a reusable display view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub usize);

/// Observable binding state of a view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingState {
    Unbound,
    Rendering { slot: usize },
    Bound { slot: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    Open(#[from] SourceError),

    #[error("render worker exited unexpectedly")]
    WorkerGone,
}

/// Events surfaced to the presentation shell
#[derive(Debug)]
pub enum ProviderEvent {
    /// A view received its raster
    Bound { view: ViewId, slot: usize },
    /// Rendering a slot failed; the view stays blank
    Failed {
        view: ViewId,
        slot: usize,
        error: RenderFault,
    },
    ZoomChanged { view: ViewId, zoomed: bool },
    ChromeToggled { visible: bool },
    LongPress { view: ViewId, at: Point },
}

enum Binding {
    Unbound,
    Rendering { slot: usize, request: RequestId },
    Bound { slot: usize, image: RasterImage },
}

struct ViewState {
    binding: Binding,
    transform: TransformEngine,
}

/// Drives the render worker on behalf of a set of views
pub struct PageProvider {
    mode: LayoutMode,
    page_count: usize,
    title: Option<String>,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    next_request_id: u64,
    views: HashMap<ViewId, ViewState>,
    zoom_limits: ZoomLimits,
    chrome_visible: bool,
    pool: Arc<BufferPool>,
    monitor: Arc<MemoryMonitor>,
    worker: Option<JoinHandle<()>>,
}

impl PageProvider {
    /// Spawn the render worker and open the document on it.
    ///
    /// Blocks until the worker reports the page count or the open failure.
    pub fn open(
        opener: impl DocumentOpener,
        mode: LayoutMode,
        pool: Arc<BufferPool>,
        monitor: Arc<MemoryMonitor>,
    ) -> Result<Self, ProviderError> {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let composer = LayoutComposer::new(Arc::clone(&pool), Arc::clone(&monitor));
        let opener: Box<dyn DocumentOpener> = Box::new(opener);
        let worker = std::thread::Builder::new()
            .name("duopage-render".into())
            .spawn(move || render_worker(opener, composer, request_rx, response_tx))
            .map_err(|e| {
                error!("Failed to spawn render worker: {e}");
                ProviderError::WorkerGone
            })?;

        let (page_count, title) = match response_rx.recv() {
            Ok(RenderResponse::DocumentInfo { page_count, title }) => (page_count, title),
            Ok(RenderResponse::OpenFailed(e)) => {
                let _ = worker.join();
                return Err(ProviderError::Open(e));
            }
            Ok(other) => {
                error!("Unexpected first worker response: {other:?}");
                stop_worker(&request_tx, worker);
                return Err(ProviderError::WorkerGone);
            }
            Err(_) => {
                stop_worker(&request_tx, worker);
                return Err(ProviderError::WorkerGone);
            }
        };
        info!("Document ready: {page_count} pages, {mode:?}");

        Ok(Self {
            mode,
            page_count,
            title,
            request_tx,
            response_rx,
            next_request_id: 1,
            views: HashMap::new(),
            zoom_limits: ZoomLimits::default(),
            chrome_visible: true,
            pool,
            monitor,
            worker: Some(worker),
        })
    }

    #[must_use]
    pub fn with_zoom_limits(mut self, limits: ZoomLimits) -> Self {
        self.zoom_limits = limits;
        self
    }

    #[must_use]
    pub fn mode(&self) -> &LayoutMode {
        &self.mode
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        slot_count(&self.mode, self.page_count)
    }

    #[must_use]
    pub fn chrome_visible(&self) -> bool {
        self.chrome_visible
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Switch layout mode. Every binding is recycled because composited
    /// rasters of the old mode are invalid. Returns whether the mode changed.
    pub fn set_mode(&mut self, mode: LayoutMode) -> bool {
        if mode == self.mode {
            return false;
        }

        let views: Vec<ViewId> = self.views.keys().copied().collect();
        for view in views {
            self.recycle(view);
        }
        debug!("Layout mode changed to {mode:?}");
        self.mode = mode;
        true
    }

    /// Start rendering `slot` for `view`, dropping whatever the view showed
    pub fn bind(&mut self, view: ViewId, slot: usize) -> Result<RequestId, ProviderError> {
        self.recycle(view);

        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;

        self.request_tx
            .send(RenderRequest::Slot {
                id,
                slot,
                mode: self.mode,
            })
            .map_err(|_| ProviderError::WorkerGone)?;

        self.view_mut(view).binding = Binding::Rendering { slot, request: id };
        Ok(id)
    }

    /// Release the view's raster to the pool and mark it unbound.
    ///
    /// A render still in flight for this view is discarded on arrival.
    pub fn recycle(&mut self, view: ViewId) {
        let Some(state) = self.views.get_mut(&view) else {
            return;
        };

        match std::mem::replace(&mut state.binding, Binding::Unbound) {
            Binding::Bound { slot, image } => {
                debug!("Recycling view {view:?} (slot {slot})");
                self.pool.release(image);
            }
            Binding::Rendering { slot, .. } => {
                debug!("View {view:?} recycled while slot {slot} was rendering");
            }
            Binding::Unbound => {}
        }
    }

    /// Forget a view for good. Its raster goes back to the pool and a
    /// render still in flight is discarded on arrival.
    pub fn remove_view(&mut self, view: ViewId) {
        self.recycle(view);
        self.views.remove(&view);
    }

    /// Number of views the provider tracks
    #[must_use]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Process every response that already arrived
    pub fn poll(&mut self) -> Vec<ProviderEvent> {
        let mut events = vec![];
        while let Ok(response) = self.response_rx.try_recv() {
            self.handle_response(response, &mut events);
        }
        events
    }

    /// Wait up to `timeout` for at least one response, then drain the rest
    pub fn poll_blocking(&mut self, timeout: Duration) -> Result<Vec<ProviderEvent>, ProviderError> {
        let mut events = vec![];
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => self.handle_response(response, &mut events),
            Err(RecvTimeoutError::Timeout) => return Ok(events),
            Err(RecvTimeoutError::Disconnected) => return Err(ProviderError::WorkerGone),
        }
        events.extend(self.poll());
        Ok(events)
    }

    /// Number of views waiting for a render
    #[must_use]
    pub fn pending(&self) -> usize {
        self.views
            .values()
            .filter(|v| matches!(v.binding, Binding::Rendering { .. }))
            .count()
    }

    #[must_use]
    pub fn state(&self, view: ViewId) -> BindingState {
        match self.views.get(&view).map(|v| &v.binding) {
            None | Some(Binding::Unbound) => BindingState::Unbound,
            Some(Binding::Rendering { slot, .. }) => BindingState::Rendering { slot: *slot },
            Some(Binding::Bound { slot, .. }) => BindingState::Bound { slot: *slot },
        }
    }

    /// Raster currently shown by `view`
    #[must_use]
    pub fn image(&self, view: ViewId) -> Option<&RasterImage> {
        match self.views.get(&view).map(|v| &v.binding) {
            Some(Binding::Bound { image, .. }) => Some(image),
            _ => None,
        }
    }

    #[must_use]
    pub fn transform(&self, view: ViewId) -> Option<&TransformEngine> {
        self.views.get(&view).map(|v| &v.transform)
    }

    /// The view was measured
    pub fn set_view_size(&mut self, view: ViewId, size: Size) -> Vec<ProviderEvent> {
        let events = self.view_mut(view).transform.set_view_size(size);
        self.translate_events(view, events)
    }

    /// Reset the view's zoom to identity
    pub fn reset_zoom(&mut self, view: ViewId) -> Vec<ProviderEvent> {
        let events = self.view_mut(view).transform.reset();
        self.translate_events(view, events)
    }

    /// Forward a gesture to the view's transform engine
    pub fn handle_gesture(&mut self, view: ViewId, gesture: Gesture) -> Vec<ProviderEvent> {
        let events = self.view_mut(view).transform.apply(gesture);
        self.translate_events(view, events)
    }

    /// OS low-memory signal
    pub fn on_low_memory(&self) {
        self.monitor.on_low_memory();
    }

    pub fn on_trim(&self, level: TrimLevel) {
        self.monitor.on_trim(level);
    }

    /// Memory is available again; later renders use the preferred tier
    pub fn relieve_memory(&self) {
        self.monitor.relieve();
    }

    /// Stop the worker and release the document
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let views: Vec<ViewId> = self.views.keys().copied().collect();
        for view in views {
            self.recycle(view);
        }

        if let Some(worker) = self.worker.take() {
            stop_worker(&self.request_tx, worker);
        }
        // Rasters rendered after the last poll are stale now
        while let Ok(response) = self.response_rx.try_recv() {
            if let RenderResponse::Slot { image, .. } = response {
                self.pool.release(image);
            }
        }
    }

    fn view_mut(&mut self, view: ViewId) -> &mut ViewState {
        let limits = self.zoom_limits;
        self.views.entry(view).or_insert_with(|| ViewState {
            binding: Binding::Unbound,
            transform: TransformEngine::new(limits),
        })
    }

    fn owner_of(&self, request: RequestId) -> Option<ViewId> {
        self.views.iter().find_map(|(view, state)| match state.binding {
            Binding::Rendering { request: r, .. } if r == request => Some(*view),
            _ => None,
        })
    }

    fn handle_response(&mut self, response: RenderResponse, events: &mut Vec<ProviderEvent>) {
        match response {
            RenderResponse::Slot { id, slot, image } => {
                let Some(view) = self.owner_of(id) else {
                    debug!("Discarding stale render of slot {slot}");
                    self.pool.release(image);
                    return;
                };

                let size = Size::new(f64::from(image.width()), f64::from(image.height()));
                let state = self.view_mut(view);
                let zoom_events = state.transform.set_image_size(size);
                state.binding = Binding::Bound { slot, image };

                events.push(ProviderEvent::Bound { view, slot });
                events.extend(self.translate_events(view, zoom_events));
            }

            RenderResponse::Error { id, slot, error } => {
                let Some(view) = self.owner_of(id) else {
                    debug!("Ignoring failure of stale render for slot {slot}: {error}");
                    return;
                };

                error!("Slot {slot} left blank on view {view:?}: {error}");
                self.view_mut(view).binding = Binding::Unbound;
                events.push(ProviderEvent::Failed { view, slot, error });
            }

            RenderResponse::DocumentInfo { .. } | RenderResponse::OpenFailed(_) => {
                warn!("Unexpected document response after open");
            }
        }
    }

    fn translate_events(&mut self, view: ViewId, events: Vec<TransformEvent>) -> Vec<ProviderEvent> {
        events
            .into_iter()
            .map(|event| match event {
                TransformEvent::ZoomChanged(zoomed) => ProviderEvent::ZoomChanged { view, zoomed },
                TransformEvent::ToggleChrome => {
                    self.chrome_visible = !self.chrome_visible;
                    ProviderEvent::ChromeToggled {
                        visible: self.chrome_visible,
                    }
                }
                TransformEvent::LongPress(at) => ProviderEvent::LongPress { view, at },
            })
            .collect()
    }
}

fn stop_worker(requests: &Sender<RenderRequest>, worker: JoinHandle<()>) {
    let _ = requests.send(RenderRequest::Shutdown);
    if worker.join().is_err() {
        error!("Render worker panicked");
    }
}

impl Drop for PageProvider {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}
