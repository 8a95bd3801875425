use std::sync::Arc;
use std::time::Duration;

use duopage::pdf::{
    BindingState, BufferPool, CoverPage, FilterSet, LayoutMode, MemoryMonitor, PageLayout,
    PageProvider, ProviderEvent, ReadingDirection, ResolutionTier, ViewId,
};
use duopage::test_utils::test_helpers::{SolidOpener, SolidPageSource, page_color};
use duopage::{DocumentFingerprint, ReaderSession, SettingsStore};

const TIMEOUT: Duration = Duration::from_secs(5);

fn open(opener: SolidOpener, mode: LayoutMode) -> PageProvider {
    let pool = Arc::new(BufferPool::new(8));
    let monitor = Arc::new(MemoryMonitor::new(Arc::clone(&pool)));
    PageProvider::open(opener, mode, pool, monitor).expect("open")
}

fn drain(provider: &mut PageProvider) -> Vec<ProviderEvent> {
    let mut events = vec![];
    while provider.pending() > 0 {
        events.extend(provider.poll_blocking(TIMEOUT).expect("worker alive"));
    }
    events
}

#[test]
fn virtualized_list_scroll_through_spread_document() {
    let mode = LayoutMode {
        layout: PageLayout::Spread(CoverPage::Separate),
        direction: ReadingDirection::RightToLeft,
        ..LayoutMode::default()
    };
    let mut provider = open(SolidOpener::uniform(7, 10, 20), mode);
    assert_eq!(provider.slot_count(), 4);

    // Three views cycle through the slots the way a list recycles rows
    let views = [ViewId(0), ViewId(1), ViewId(2)];
    for slot in 0..provider.slot_count() {
        let view = views[slot % views.len()];
        provider.bind(view, slot).expect("bind");
    }
    drain(&mut provider);

    // Slot 3 reuses view 0, so slot 0's raster is gone
    assert_eq!(provider.state(ViewId(0)), BindingState::Bound { slot: 3 });
    let cover = provider.image(ViewId(1)).expect("slot 1 bound");
    // Pages 1 and 2 side by side, right-to-left: page 2 on the left
    assert_eq!(cover.dimensions(), (40, 40));
    assert_eq!(cover.pixel(0, 0), page_color(2));
    assert_eq!(cover.pixel(20, 0), page_color(1));

    let last = provider.image(ViewId(0)).expect("slot 3 bound");
    assert_eq!(last.dimensions(), (40, 40));
    assert_eq!(last.pixel(0, 0), page_color(6));
}

#[test]
fn filters_and_tier_flow_through_the_worker() {
    let mode = LayoutMode {
        tier: ResolutionTier::High,
        filters: FilterSet {
            invert: true,
            ..FilterSet::none()
        },
        ..LayoutMode::default()
    };
    let mut provider = open(SolidOpener::uniform(2, 5, 5), mode);
    provider.bind(ViewId(0), 1).expect("bind");
    drain(&mut provider);

    let image = provider.image(ViewId(0)).expect("bound");
    assert_eq!(image.dimensions(), (20, 20));
    let original = page_color(1);
    let px = image.pixel(0, 0);
    assert_eq!(px[0], 255 - original[0]);
    assert_eq!(px[3], 255);
    // Last row was left white by the page, inverted to black
    assert_eq!(image.pixel(0, 19)[0], 0);
}

#[test]
fn low_memory_mid_session_downgrades_next_render() {
    let mode = LayoutMode {
        tier: ResolutionTier::Medium,
        ..LayoutMode::default()
    };
    let mut provider = open(SolidOpener::uniform(3, 10, 10), mode);
    provider.bind(ViewId(0), 0).expect("bind");
    drain(&mut provider);
    assert_eq!(
        provider.image(ViewId(0)).expect("bound").dimensions(),
        (30, 30)
    );

    provider.on_low_memory();
    assert!(provider.pool().is_empty());
    provider.bind(ViewId(1), 1).expect("bind");
    drain(&mut provider);
    assert_eq!(
        provider.image(ViewId(1)).expect("bound").dimensions(),
        (20, 20)
    );
}

#[test]
fn session_reopens_at_saved_page_in_spread_mode() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = SettingsStore::new(dir.path().join("config.yaml"));
    let fingerprint = DocumentFingerprint::from_bytes(b"book");
    let opener = || SolidOpener::new(SolidPageSource::uniform(12, 10, 10).with_title("Book"));

    let mut session = ReaderSession::new(store.clone()).expect("session");
    let provider = session.open_document(opener(), &fingerprint).expect("open");
    assert_eq!(provider.title(), Some("Book"));
    session
        .update_settings(|s| s.one_page_mode = false)
        .expect("spread");
    session.jump_to_page(9);
    assert_eq!(session.page_indicator().as_deref(), Some("8 - 9 / 12"));
    session.close_document().expect("close");

    let mut session = ReaderSession::new(store).expect("session");
    session.open_document(opener(), &fingerprint).expect("reopen");
    assert_eq!(session.current_slot(), 4);

    let provider = session.provider_mut().expect("open");
    provider.bind(ViewId(0), 4).expect("bind");
    while matches!(provider.state(ViewId(0)), BindingState::Rendering { .. }) {
        provider.poll_blocking(TIMEOUT).expect("worker alive");
    }
    let image = provider.image(ViewId(0)).expect("bound");
    assert_eq!(image.pixel(0, 0), page_color(7));
    assert_eq!(image.pixel(20, 0), page_color(8));
}
