//! Zoom and pan state for one displayed page image
//!
//! The engine is a plain state machine: gestures go in, events come out.
//! Nothing here depends on a windowing system, so every transition can be
//! tested directly.
//!
//! Coordinates: the image is first fitted into the view (uniform scale,
//! centered), then zoomed by `scale` relative to that fit. `translation` is
//! the position of the image's top-left corner in view coordinates.

use kurbo::{Affine, Point, Size, Vec2};
use log::warn;

/// Zoom bounds relative to the fitted image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom reached by a double tap from the unzoomed state
    pub double_tap_zoom: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min_zoom: 1.0,
            max_zoom: 10.0,
            double_tap_zoom: 3.0,
        }
    }
}

impl ZoomLimits {
    /// Checked constructor: `0 < min <= double_tap <= max`, all finite
    #[must_use]
    pub fn new(min_zoom: f64, max_zoom: f64, double_tap_zoom: f64) -> Option<Self> {
        let limits = Self {
            min_zoom,
            max_zoom,
            double_tap_zoom,
        };
        limits.is_valid().then_some(limits)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.min_zoom, self.max_zoom, self.double_tap_zoom]
            .iter()
            .all(|z| z.is_finite())
            && self.min_zoom > 0.0
            && self.min_zoom <= self.double_tap_zoom
            && self.double_tap_zoom <= self.max_zoom
    }
}

/// Active gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    Dragging,
    Scaling,
}

/// Input gestures, already recognized by the host toolkit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    ScaleBegin { focus: Point },
    /// Incremental pinch: multiply the zoom by `factor` around `focus`
    Scale { focus: Point, factor: f64 },
    ScaleEnd,
    DragBegin,
    Drag { delta: Vec2 },
    DragEnd,
    DoubleTap { at: Point },
    SingleTapConfirmed,
    LongPress { at: Point },
}

/// Notifications produced by gestures
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformEvent {
    /// The zoomed / unzoomed state flipped (or was reset)
    ZoomChanged(bool),
    /// Show or hide the surrounding UI chrome
    ToggleChrome,
    LongPress(Point),
}

/// Affine zoom/pan transform bound to one view
#[derive(Debug, Clone)]
pub struct TransformEngine {
    limits: ZoomLimits,
    scale: f64,
    translation: Vec2,
    view: Size,
    image: Size,
    /// View-fit scale of the image at `scale == 1`
    fit: f64,
    phase: GesturePhase,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new(ZoomLimits::default())
    }
}

impl TransformEngine {
    #[must_use]
    pub fn new(limits: ZoomLimits) -> Self {
        let limits = if limits.is_valid() {
            limits
        } else {
            warn!("Invalid zoom limits {limits:?}, using defaults");
            ZoomLimits::default()
        };
        Self {
            limits,
            scale: limits.min_zoom,
            translation: Vec2::ZERO,
            view: Size::ZERO,
            image: Size::ZERO,
            fit: 1.0,
            phase: GesturePhase::Idle,
        }
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn translation(&self) -> Vec2 {
        self.translation
    }

    #[must_use]
    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    #[must_use]
    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    #[must_use]
    pub fn view_size(&self) -> Size {
        self.view
    }

    #[must_use]
    pub fn is_zoomed(&self) -> bool {
        self.scale > self.limits.min_zoom + f64::EPSILON
    }

    /// Size of the image on screen at the current zoom
    #[must_use]
    pub fn content_size(&self) -> Size {
        let s = self.fit * self.scale;
        Size::new(self.image.width * s, self.image.height * s)
    }

    /// Full image → view transform
    #[must_use]
    pub fn affine(&self) -> Affine {
        Affine::translate(self.translation) * Affine::scale(self.fit * self.scale)
    }

    /// Map a view point to image pixel coordinates
    #[must_use]
    pub fn view_to_image(&self, point: Point) -> Point {
        self.affine().inverse() * point
    }

    /// The view was measured; refit and reset
    pub fn set_view_size(&mut self, size: Size) -> Vec<TransformEvent> {
        self.view = size;
        self.refit();
        self.reset()
    }

    /// A new image was bound; refit and reset
    pub fn set_image_size(&mut self, size: Size) -> Vec<TransformEvent> {
        self.image = size;
        self.refit();
        self.reset()
    }

    /// Back to the unzoomed, centered state
    pub fn reset(&mut self) -> Vec<TransformEvent> {
        self.scale = self.limits.min_zoom;
        self.phase = GesturePhase::Idle;
        let content = self.content_size();
        self.translation = Vec2::new(
            (self.view.width - content.width) / 2.0,
            (self.view.height - content.height) / 2.0,
        );
        self.clamp_translation();
        vec![TransformEvent::ZoomChanged(false)]
    }

    /// Apply one gesture and return the resulting events
    pub fn apply(&mut self, gesture: Gesture) -> Vec<TransformEvent> {
        match gesture {
            Gesture::ScaleBegin { .. } => {
                // Pinching preempts an ongoing drag
                self.phase = GesturePhase::Scaling;
                vec![]
            }
            Gesture::Scale { focus, factor } => self.scale_by(focus, factor),
            Gesture::ScaleEnd => {
                if self.phase == GesturePhase::Scaling {
                    self.phase = GesturePhase::Idle;
                }
                vec![]
            }
            Gesture::DragBegin => {
                if self.phase == GesturePhase::Idle {
                    self.phase = GesturePhase::Dragging;
                }
                vec![]
            }
            Gesture::Drag { delta } => self.drag(delta),
            Gesture::DragEnd => {
                if self.phase == GesturePhase::Dragging {
                    self.phase = GesturePhase::Idle;
                }
                vec![]
            }
            Gesture::DoubleTap { at } => self.double_tap(at),
            Gesture::SingleTapConfirmed => vec![TransformEvent::ToggleChrome],
            Gesture::LongPress { at } => vec![TransformEvent::LongPress(at)],
        }
    }

    fn refit(&mut self) {
        self.fit = if self.image.width > 0.0
            && self.image.height > 0.0
            && self.view.width > 0.0
            && self.view.height > 0.0
        {
            (self.view.width / self.image.width).min(self.view.height / self.image.height)
        } else {
            1.0
        };
    }

    fn scale_by(&mut self, focus: Point, factor: f64) -> Vec<TransformEvent> {
        if !factor.is_finite() || factor <= 0.0 {
            return vec![];
        }

        let was_zoomed = self.is_zoomed();
        let target = (self.scale * factor).clamp(self.limits.min_zoom, self.limits.max_zoom);
        // At a bound the step shrinks proportionally instead of snapping
        let effective = target / self.scale;
        self.scale = target;
        self.translation = anchored(focus, self.translation, effective);
        self.clamp_translation();

        self.zoom_transition(was_zoomed)
    }

    fn drag(&mut self, delta: Vec2) -> Vec<TransformEvent> {
        if self.phase == GesturePhase::Scaling || !self.is_zoomed() {
            return vec![];
        }

        self.phase = GesturePhase::Dragging;
        self.translation += delta;
        self.clamp_translation();
        vec![]
    }

    fn double_tap(&mut self, at: Point) -> Vec<TransformEvent> {
        if self.is_zoomed() {
            return self.reset();
        }

        let target = self
            .limits
            .double_tap_zoom
            .clamp(self.limits.min_zoom, self.limits.max_zoom);
        let effective = target / self.scale;
        self.scale = target;
        self.phase = GesturePhase::Idle;
        self.translation = anchored(at, self.translation, effective);
        self.clamp_translation();

        self.zoom_transition(false)
    }

    fn zoom_transition(&self, was_zoomed: bool) -> Vec<TransformEvent> {
        let zoomed = self.is_zoomed();
        if zoomed == was_zoomed {
            vec![]
        } else {
            vec![TransformEvent::ZoomChanged(zoomed)]
        }
    }

    fn clamp_translation(&mut self) {
        let content = self.content_size();
        self.translation = Vec2::new(
            clamp_axis(self.translation.x, self.view.width, content.width),
            clamp_axis(self.translation.y, self.view.height, content.height),
        );
    }
}

/// Translation that keeps `focus` fixed while zooming by `factor`
fn anchored(focus: Point, translation: Vec2, factor: f64) -> Vec2 {
    let focus = focus.to_vec2();
    focus - (focus - translation) * factor
}

/// Valid translation on one axis.
///
/// Content no larger than the view is always centered; larger content may
/// pan within `[view - content, 0]`, so no gap opens at either edge.
fn clamp_axis(translation: f64, view: f64, content: f64) -> f64 {
    if content <= view {
        (view - content) / 2.0
    } else {
        translation.clamp(view - content, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn engine(view: (f64, f64), image: (f64, f64)) -> TransformEngine {
        let mut engine = TransformEngine::default();
        engine.set_view_size(Size::new(view.0, view.1));
        engine.set_image_size(Size::new(image.0, image.1));
        engine
    }

    #[test]
    fn invalid_limits_fall_back_to_defaults() {
        assert!(ZoomLimits::new(0.0, 10.0, 3.0).is_none());
        assert!(ZoomLimits::new(2.0, 1.0, 1.5).is_none());
        assert!(ZoomLimits::new(1.0, f64::NAN, 3.0).is_none());
        assert!(ZoomLimits::new(1.0, 4.0, 2.0).is_some());

        let broken = ZoomLimits {
            min_zoom: 0.0,
            ..ZoomLimits::default()
        };
        let mut e = TransformEngine::new(broken);
        assert_eq!(e.limits(), ZoomLimits::default());

        e.set_view_size(Size::new(100.0, 100.0));
        e.set_image_size(Size::new(100.0, 100.0));
        e.apply(Gesture::Scale {
            focus: Point::new(30.0, 30.0),
            factor: 0.5,
        });
        e.apply(Gesture::DoubleTap {
            at: Point::new(30.0, 30.0),
        });
        assert!(e.translation().x.is_finite() && e.translation().y.is_finite());
        assert!(e.is_zoomed());
    }

    fn assert_vec_eq(a: Vec2, b: Vec2) {
        assert!((a - b).hypot() < 1e-6, "{a:?} != {b:?}");
    }

    fn assert_within_bounds(e: &TransformEngine) {
        let content = e.content_size();
        let view = e.view_size();
        for (t, v, c) in [
            (e.translation().x, view.width, content.width),
            (e.translation().y, view.height, content.height),
        ] {
            if c <= v {
                assert!((t - (v - c) / 2.0).abs() < 1e-6);
            } else {
                assert!(t <= EPS && t >= v - c - EPS, "t={t} v={v} c={c}");
            }
        }
    }

    #[test]
    fn reset_centers_fitted_content() {
        let e = engine((200.0, 400.0), (100.0, 100.0));
        assert_eq!(e.scale(), 1.0);
        assert_eq!(e.content_size(), Size::new(200.0, 200.0));
        assert_vec_eq(e.translation(), Vec2::new(0.0, 100.0));
        assert!(!e.is_zoomed());
    }

    #[test]
    fn unit_scale_changes_nothing() {
        let mut e = engine((200.0, 400.0), (100.0, 100.0));
        let before = e.translation();
        let events = e.apply(Gesture::Scale {
            focus: Point::new(50.0, 60.0),
            factor: 1.0,
        });
        assert!(events.is_empty());
        assert_eq!(e.scale(), 1.0);
        assert_vec_eq(e.translation(), before);
    }

    #[test]
    fn repeated_scaling_stays_within_limits() {
        let mut e = engine((100.0, 100.0), (100.0, 100.0));
        let focus = Point::new(30.0, 70.0);
        for _ in 0..50 {
            e.apply(Gesture::Scale { focus, factor: 1.7 });
            assert!(e.scale() <= e.limits().max_zoom + EPS);
            assert_within_bounds(&e);
        }
        assert!((e.scale() - 10.0).abs() < EPS);

        for _ in 0..50 {
            e.apply(Gesture::Scale { focus, factor: 0.6 });
            assert!(e.scale() >= e.limits().min_zoom - EPS);
            assert_within_bounds(&e);
        }
        assert!((e.scale() - 1.0).abs() < EPS);
    }

    #[test]
    fn scaling_keeps_focus_point_stationary() {
        let mut e = engine((100.0, 100.0), (100.0, 100.0));
        let focus = Point::new(40.0, 60.0);
        let before = e.view_to_image(focus);
        e.apply(Gesture::Scale { focus, factor: 2.0 });
        let after = e.view_to_image(focus);
        assert!((before - after).hypot() < 1e-6);
    }

    #[test]
    fn zoom_state_events_fire_on_transitions_only() {
        let mut e = engine((100.0, 100.0), (100.0, 100.0));
        let focus = Point::new(50.0, 50.0);

        assert_eq!(
            e.apply(Gesture::Scale { focus, factor: 1.5 }),
            vec![TransformEvent::ZoomChanged(true)]
        );
        assert!(e.apply(Gesture::Scale { focus, factor: 1.5 }).is_empty());
        assert_eq!(
            e.apply(Gesture::Scale { focus, factor: 0.1 }),
            vec![TransformEvent::ZoomChanged(false)]
        );
    }

    #[test]
    fn drag_is_ignored_when_not_zoomed() {
        let mut e = engine((100.0, 100.0), (100.0, 50.0));
        let before = e.translation();
        e.apply(Gesture::DragBegin);
        e.apply(Gesture::Drag {
            delta: Vec2::new(30.0, 30.0),
        });
        assert_vec_eq(e.translation(), before);
    }

    #[test]
    fn drag_pans_and_clamps_when_zoomed() {
        let mut e = engine((100.0, 100.0), (100.0, 100.0));
        e.apply(Gesture::DoubleTap {
            at: Point::new(50.0, 50.0),
        });
        let start = e.translation();

        e.apply(Gesture::DragBegin);
        e.apply(Gesture::Drag {
            delta: Vec2::new(10.0, -5.0),
        });
        assert_vec_eq(e.translation(), start + Vec2::new(10.0, -5.0));

        e.apply(Gesture::Drag {
            delta: Vec2::new(1000.0, -1000.0),
        });
        // Content is 300x300 in a 100x100 view
        assert_vec_eq(e.translation(), Vec2::new(0.0, -200.0));
        e.apply(Gesture::DragEnd);
        assert_eq!(e.phase(), GesturePhase::Idle);
    }

    #[test]
    fn pinch_preempts_drag() {
        let mut e = engine((100.0, 100.0), (100.0, 100.0));
        e.apply(Gesture::DoubleTap {
            at: Point::new(50.0, 50.0),
        });
        e.apply(Gesture::DragBegin);
        e.apply(Gesture::ScaleBegin {
            focus: Point::new(50.0, 50.0),
        });
        assert_eq!(e.phase(), GesturePhase::Scaling);

        let before = e.translation();
        e.apply(Gesture::Drag {
            delta: Vec2::new(10.0, 10.0),
        });
        assert_vec_eq(e.translation(), before);

        e.apply(Gesture::ScaleEnd);
        assert_eq!(e.phase(), GesturePhase::Idle);
    }

    #[test]
    fn double_tap_toggles_and_anchors() {
        let mut e = engine((100.0, 200.0), (100.0, 200.0));
        let at = Point::new(50.0, 100.0);
        let under = e.view_to_image(at);

        assert_eq!(
            e.apply(Gesture::DoubleTap { at }),
            vec![TransformEvent::ZoomChanged(true)]
        );
        assert!((e.scale() - 3.0).abs() < EPS);
        assert!((e.view_to_image(at) - under).hypot() < 1e-6);

        assert_eq!(
            e.apply(Gesture::DoubleTap { at }),
            vec![TransformEvent::ZoomChanged(false)]
        );
        assert_eq!(e.scale(), 1.0);
        assert_vec_eq(e.translation(), Vec2::ZERO);
    }

    #[test]
    fn double_tap_near_edge_is_clamped() {
        let mut e = engine((100.0, 100.0), (100.0, 100.0));
        e.apply(Gesture::DoubleTap {
            at: Point::new(0.0, 0.0),
        });
        assert_vec_eq(e.translation(), Vec2::ZERO);
        assert_within_bounds(&e);
    }

    #[test]
    fn narrow_content_stays_centered_on_its_short_axis() {
        // 50x100 image in a 100x100 view: content is narrower than the view
        let mut e = engine((100.0, 100.0), (50.0, 100.0));
        e.apply(Gesture::Scale {
            focus: Point::new(10.0, 10.0),
            factor: 1.5,
        });
        // 75 wide: still centered horizontally
        assert!((e.translation().x - 12.5).abs() < 1e-6);
        assert_within_bounds(&e);
    }

    #[test]
    fn taps_produce_ui_events() {
        let mut e = TransformEngine::default();
        assert_eq!(
            e.apply(Gesture::SingleTapConfirmed),
            vec![TransformEvent::ToggleChrome]
        );
        let at = Point::new(3.0, 4.0);
        assert_eq!(
            e.apply(Gesture::LongPress { at }),
            vec![TransformEvent::LongPress(at)]
        );
    }

    #[test]
    fn reset_reports_unzoomed_and_fits_content() {
        let mut e = engine((120.0, 80.0), (300.0, 100.0));
        e.apply(Gesture::Scale {
            focus: Point::new(60.0, 40.0),
            factor: 4.0,
        });
        assert_eq!(e.reset(), vec![TransformEvent::ZoomChanged(false)]);

        let content = e.content_size();
        assert!(content.width <= 120.0 + EPS && content.height <= 80.0 + EPS);
        assert_within_bounds(&e);
    }

    #[test]
    fn invalid_factors_are_ignored() {
        let mut e = engine((100.0, 100.0), (100.0, 100.0));
        for factor in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            e.apply(Gesture::Scale {
                focus: Point::new(1.0, 1.0),
                factor,
            });
            assert_eq!(e.scale(), 1.0);
        }
    }
}
