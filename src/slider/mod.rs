//! Cyclic slide engine.
//!
//! The engine owns all scroll and overlay state of one slider. It never
//! schedules anything itself, instead input handlers report whether a frame
//! must be drawn immediately and frame callbacks drive [`Engine::frame`].
//!
//! Every drawn frame is followed by exactly one compositor frame callback.
//! Requests made while that callback is outstanding are deferred until
//! [`Engine::callback_done`], so input never draws faster than the display.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::geometry::Size;
use crate::slider::layout::{Halo, LayoutGeometry};
use crate::slider::overlay::{Fades, OverlaySynchronizer};
use crate::slider::scroll::{PointerId, ScrollPhysics};

pub mod layout;
pub mod overlay;
pub mod scene;
pub mod scroll;
pub mod texture;
pub mod tween;

/// Input device class.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum InputDevice {
    Pointer,
    Wheel,
    Touch,
}

impl From<PointerId> for InputDevice {
    fn from(pointer: PointerId) -> Self {
        match pointer {
            PointerId::Pointer => Self::Pointer,
            PointerId::Touch(_) => Self::Touch,
        }
    }
}

/// Offset per input pixel for each device class.
#[derive(PartialEq, Copy, Clone, Debug)]
pub struct Sensitivity {
    pub pointer: f64,
    pub wheel: f64,
    pub touch: f64,
}

impl Sensitivity {
    fn get(&self, device: InputDevice) -> f64 {
        match device {
            InputDevice::Pointer => self.pointer,
            InputDevice::Wheel => self.wheel,
            InputDevice::Touch => self.touch,
        }
    }
}

/// Engine tuning.
#[derive(Copy, Clone, Debug)]
pub struct Tuning {
    pub mobile: Sensitivity,
    pub desktop: Sensitivity,
    /// Fraction of the remaining distance covered per interval.
    pub damping: f64,
    pub interval: Duration,
    /// Multiplier of the last drag step continued after release.
    pub fling: f64,
    pub halo: Halo,
    pub fades: Fades,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            mobile: Sensitivity { pointer: 0.002, wheel: 0.0005, touch: 0.002 },
            desktop: Sensitivity { pointer: 0.0012, wheel: 0.0003, touch: 0.0015 },
            damping: 0.1,
            interval: Duration::from_millis(16),
            fling: 4.,
            halo: Default::default(),
            fades: Default::default(),
        }
    }
}

/// Engine lifecycle.
#[derive(PartialEq, Eq, Copy, Clone, Default, Debug)]
pub enum Lifecycle {
    /// State is updated, but no frames are requested.
    #[default]
    Stopped,
    Running,
    /// Resources are released and all input is ignored.
    Disposed,
}

/// Per-frame render input.
#[derive(PartialEq, Copy, Clone, Debug)]
pub struct Frame {
    pub offset: f64,
    /// Slide nearest to the centerline, shared by texture and overlay.
    pub centered: Option<usize>,
    /// Texture content changed since the last frame.
    pub texture_dirty: bool,
    /// Geometry was rebuilt since the last frame.
    pub geometry_dirty: bool,
}

/// Slider engine.
#[derive(Debug)]
pub struct Engine {
    lifecycle: Lifecycle,
    scroll: ScrollPhysics,
    layout: LayoutGeometry,
    overlays: OverlaySynchronizer,
    tuning: Tuning,

    centered: Option<usize>,
    rendered_offset: Option<f64>,
    last_tick: Option<Instant>,
    frame_pending: bool,
    callback_pending: bool,
    geometry_dirty: bool,
}

impl Engine {
    pub fn new(viewport: Size, slide_count: usize, tuning: Tuning) -> Self {
        let layout = LayoutGeometry::new(viewport, slide_count, tuning.halo);
        let overlays = OverlaySynchronizer::new(slide_count, tuning.fades);

        Self {
            overlays,
            layout,
            tuning,
            geometry_dirty: true,
            lifecycle: Default::default(),
            scroll: Default::default(),
            centered: Default::default(),
            rendered_offset: Default::default(),
            last_tick: Default::default(),
            frame_pending: Default::default(),
            callback_pending: Default::default(),
        }
    }

    /// Start requesting frames.
    ///
    /// Returns `true` if a frame should be requested.
    pub fn start(&mut self) -> bool {
        if self.lifecycle == Lifecycle::Disposed {
            return false;
        }

        self.lifecycle = Lifecycle::Running;
        self.request_frame()
    }

    /// Stop requesting frames.
    ///
    /// Any already requested frame is cancelled. An outstanding frame callback
    /// is still awaited, so restarting never forks a second callback chain.
    pub fn stop(&mut self) {
        if self.lifecycle == Lifecycle::Running {
            self.lifecycle = Lifecycle::Stopped;
        }
        self.frame_pending = false;
        self.last_tick = None;
    }

    /// Permanently shut down the engine.
    pub fn dispose(&mut self) {
        self.stop();
        self.lifecycle = Lifecycle::Disposed;
        debug!("Slider engine disposed");
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn layout(&self) -> &LayoutGeometry {
        &self.layout
    }

    pub fn overlays(&self) -> &OverlaySynchronizer {
        &self.overlays
    }

    /// Slide centered during the last frame.
    pub fn centered(&self) -> Option<usize> {
        self.centered
    }

    /// Update tuning parameters.
    pub fn set_tuning(&mut self, tuning: Tuning) -> bool {
        if self.lifecycle == Lifecycle::Disposed {
            return false;
        }

        self.tuning = tuning;
        self.overlays.set_fades(tuning.fades);
        self.rebuild(self.layout.viewport, self.layout.slide_count);

        self.request_frame()
    }

    /// Replace the slide set.
    pub fn set_slide_count(&mut self, slide_count: usize) -> bool {
        if self.lifecycle == Lifecycle::Disposed || slide_count == self.layout.slide_count {
            return false;
        }

        self.overlays = OverlaySynchronizer::new(slide_count, self.tuning.fades);
        self.centered = None;
        self.rebuild(self.layout.viewport, slide_count);

        self.request_frame()
    }

    /// Rebuild geometry for a new viewport.
    ///
    /// The scroll offset is preserved.
    pub fn resize(&mut self, viewport: Size) -> bool {
        if self.lifecycle == Lifecycle::Disposed || viewport == self.layout.viewport {
            return false;
        }

        self.rebuild(viewport, self.layout.slide_count);

        self.request_frame()
    }

    /// Handle wheel or other relative scroll input.
    pub fn scroll_by(&mut self, device: InputDevice, delta: f64) -> bool {
        if self.lifecycle == Lifecycle::Disposed || delta == 0. {
            return false;
        }

        let sensitivity = self.sensitivity(device);
        self.scroll.apply_delta(delta, sensitivity);

        self.request_frame()
    }

    /// Capture the offset for direct manipulation.
    pub fn press(&mut self, pointer: PointerId) -> bool {
        if self.lifecycle == Lifecycle::Disposed {
            return false;
        }

        self.scroll.begin_drag(pointer);
        self.last_tick = None;

        false
    }

    /// Move a captured offset.
    pub fn drag(&mut self, pointer: PointerId, delta: f64) -> bool {
        if self.lifecycle == Lifecycle::Disposed {
            return false;
        }

        let sensitivity = self.sensitivity(pointer.into());
        if !self.scroll.drag(pointer, delta, sensitivity) {
            return false;
        }

        self.request_frame()
    }

    /// Release a captured offset.
    pub fn release(&mut self, pointer: PointerId) -> bool {
        if self.lifecycle == Lifecycle::Disposed {
            return false;
        }

        if !self.scroll.end_drag(pointer, self.tuning.fling) {
            return false;
        }

        self.request_frame()
    }

    /// Mark a frame as requested.
    ///
    /// Returns `true` if the caller has to draw immediately, which is the
    /// case while running without any frame or frame callback pending.
    pub fn request_frame(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Running || self.frame_pending {
            return false;
        }

        self.frame_pending = true;
        !self.callback_pending
    }

    /// Handle the compositor's frame callback.
    ///
    /// Returns `true` if a frame was requested since the last one.
    pub fn callback_done(&mut self) -> bool {
        self.callback_pending = false;
        self.lifecycle == Lifecycle::Running && self.frame_pending
    }

    /// Advance the engine for a new frame.
    ///
    /// The caller must request a frame callback for every returned frame.
    ///
    /// Returns `None` if the engine is not running.
    pub fn frame(&mut self, now: Instant) -> Option<Frame> {
        if self.lifecycle != Lifecycle::Running {
            return None;
        }
        self.callback_pending = true;

        // Ease scroll offset towards its target.
        if self.scroll.is_moving() {
            let intervals = match self.last_tick {
                Some(last_tick) => {
                    now.saturating_duration_since(last_tick).as_secs_f64()
                        / self.tuning.interval.as_secs_f64().max(f64::EPSILON)
                },
                None => 1.,
            };
            let damping = scroll::frame_damping(self.tuning.damping, intervals);
            if !self.scroll.tick(damping) {
                let (offset, velocity) = (self.scroll.current(), self.scroll.velocity());
                debug!("Scroll settled at {offset:.3}, last step {velocity:.4}");
            }
        }
        self.last_tick = self.scroll.is_moving().then_some(now);

        let offset = self.scroll.current();
        let texture_dirty = self.geometry_dirty || self.rendered_offset != Some(offset);
        let geometry_dirty = std::mem::take(&mut self.geometry_dirty);
        self.rendered_offset = Some(offset);

        // Compute the centered slide once for all consumers.
        self.centered = self.layout.centered_slide(offset);
        self.overlays.sync(self.centered, now);
        let overlays_animating = self.overlays.update(now);

        // Keep drawing on frame callbacks while anything is moving.
        self.frame_pending = self.scroll.is_moving() || overlays_animating;

        Some(Frame { offset, centered: self.centered, texture_dirty, geometry_dirty })
    }

    fn sensitivity(&self, device: InputDevice) -> f64 {
        match self.layout.device {
            layout::DeviceClass::Mobile => self.tuning.mobile.get(device),
            layout::DeviceClass::Desktop => self.tuning.desktop.get(device),
        }
    }

    fn rebuild(&mut self, viewport: Size, slide_count: usize) {
        self.layout = LayoutGeometry::new(viewport, slide_count, self.tuning.halo);
        self.geometry_dirty = true;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::slider::layout::DeviceClass;

    fn engine() -> Engine {
        Engine::new(Size::new(1280, 800), 7, Tuning::default())
    }

    /// Draw frames on every callback until the engine goes idle.
    fn settle(engine: &mut Engine, mut now: Instant) -> Instant {
        for _ in 0..10_000 {
            if !engine.callback_done() {
                break;
            }
            now += Duration::from_millis(16);
            engine.frame(now);
        }
        now
    }

    #[test]
    fn start_requests_single_frame() {
        let mut engine = engine();
        assert!(engine.start());
        assert!(!engine.request_frame());
        assert!(!engine.scroll_by(InputDevice::Wheel, 100.));

        let frame = engine.frame(Instant::now()).unwrap();
        assert!(frame.texture_dirty);
        assert!(frame.geometry_dirty);
        assert_eq!(frame.centered, Some(0));
    }

    #[test]
    fn idle_engine_goes_quiet() {
        let mut engine = engine();
        engine.start();

        let now = Instant::now();
        engine.frame(now);
        assert!(!engine.callback_done());

        // Nothing pending, so new input has to draw immediately.
        assert!(engine.scroll_by(InputDevice::Wheel, 120.));
        engine.frame(now);

        let now = settle(&mut engine, now);
        assert!(!engine.scroll.is_moving());

        assert!(engine.request_frame());
        let frame = engine.frame(now).unwrap();
        assert!(!engine.callback_done());
        assert!(!frame.texture_dirty);
        assert!((frame.offset - 120. * 0.0003).abs() < 1e-12);
    }

    #[test]
    fn input_is_paced_by_frame_callbacks() {
        let mut engine = engine();
        engine.start();
        let now = Instant::now();
        engine.frame(now);
        assert!(!engine.callback_done());

        // The first motion after going idle draws immediately.
        engine.press(PointerId::Touch(0));
        assert!(engine.drag(PointerId::Touch(0), 10.));
        engine.frame(now);

        // Further motion waits for the compositor.
        assert!(!engine.drag(PointerId::Touch(0), 10.));
        assert!(!engine.drag(PointerId::Touch(0), 10.));
        assert!(!engine.request_frame());

        assert!(engine.callback_done());
        let frame = engine.frame(now + Duration::from_millis(16)).unwrap();
        assert!((frame.offset - 30. * 0.0015).abs() < 1e-12);

        // Without new input the callback chain ends.
        assert!(!engine.callback_done());
        assert!(engine.drag(PointerId::Touch(0), 10.));
    }

    #[test]
    fn restart_waits_for_outstanding_callback() {
        let mut engine = engine();
        engine.start();
        let now = Instant::now();
        engine.frame(now);
        engine.callback_done();

        assert!(engine.scroll_by(InputDevice::Wheel, 500.));
        engine.frame(now);

        // Suspended with a callback in flight.
        engine.stop();
        assert!(!engine.start());

        // The old callback continues the single chain.
        assert!(engine.callback_done());
        engine.frame(now + Duration::from_millis(16));
        assert!(!engine.request_frame());
        assert!(engine.callback_done());
    }

    #[test]
    fn callback_while_stopped_ends_chain() {
        let mut engine = engine();
        engine.start();
        engine.scroll_by(InputDevice::Wheel, 500.);
        engine.frame(Instant::now());

        engine.stop();
        assert!(!engine.callback_done());

        assert!(engine.start());
    }

    #[test]
    fn wheel_scroll_changes_center() {
        let mut engine = engine();
        engine.start();
        let now = Instant::now();
        engine.frame(now);

        // One slide is 1/7 of the cycle.
        let delta = 1. / 7. / Tuning::default().desktop.wheel;
        engine.scroll_by(InputDevice::Wheel, delta * 2.);
        settle(&mut engine, now);

        assert_eq!(engine.centered(), Some(2));
        assert_eq!(engine.overlays().active(), Some(2));
    }

    #[test]
    fn drag_moves_offset_directly() {
        let mut engine = engine();
        engine.start();
        engine.frame(Instant::now());
        engine.callback_done();

        engine.press(PointerId::Touch(0));
        assert!(engine.drag(PointerId::Touch(0), 20.));
        let frame = engine.frame(Instant::now()).unwrap();
        assert!((frame.offset - 20. * 0.0015).abs() < 1e-12);
        assert!(!engine.callback_done());
    }

    #[test]
    fn press_cancels_smoothing() {
        let mut engine = engine();
        engine.start();
        let now = Instant::now();
        engine.frame(now);

        engine.scroll_by(InputDevice::Wheel, 1000.);
        engine.frame(now + Duration::from_millis(16));
        let offset = engine.scroll.current();

        engine.press(PointerId::Pointer);
        assert!(!engine.scroll.is_moving());
        assert_eq!(engine.scroll.target(), offset);
    }

    #[test]
    fn dispose_stops_all_mutation() {
        let mut engine = engine();
        engine.start();
        engine.scroll_by(InputDevice::Wheel, 500.);
        engine.frame(Instant::now());
        let offset = engine.scroll.current();
        let target = engine.scroll.target();

        engine.dispose();

        assert!(!engine.scroll_by(InputDevice::Wheel, 500.));
        assert!(!engine.press(PointerId::Pointer));
        assert!(!engine.drag(PointerId::Pointer, 100.));
        assert!(!engine.release(PointerId::Pointer));
        assert!(!engine.resize(Size::new(400, 800)));
        assert!(!engine.start());
        assert!(!engine.request_frame());
        assert!(!engine.callback_done());
        assert_eq!(engine.frame(Instant::now() + Duration::from_secs(1)), None);

        assert_eq!(engine.scroll.current(), offset);
        assert_eq!(engine.scroll.target(), target);
        assert_eq!(engine.layout().device, DeviceClass::Desktop);
        assert_eq!(engine.lifecycle(), Lifecycle::Disposed);
    }

    #[test]
    fn stopped_engine_requests_no_frames() {
        let mut engine = engine();
        engine.start();
        engine.stop();

        assert!(!engine.scroll_by(InputDevice::Wheel, 100.));
        assert!(engine.scroll.is_moving());
        assert_eq!(engine.frame(Instant::now()), None);

        // Restarting picks up the pending motion.
        assert!(engine.start());
        engine.frame(Instant::now());
        assert!(engine.callback_done());
    }

    #[test]
    fn resize_to_mobile_preserves_offset() {
        let mut engine = engine();
        engine.start();
        let now = Instant::now();
        engine.frame(now);

        engine.scroll_by(InputDevice::Wheel, 2000.);
        let now = now + Duration::from_millis(16);
        engine.frame(now);
        let offset = engine.scroll.current();
        let target = engine.scroll.target();

        // A frame is still pending from the ongoing motion.
        assert!(!engine.resize(Size::new(768, 1024)));
        assert_eq!(engine.layout().device, DeviceClass::Mobile);
        assert_eq!(engine.scroll.current(), offset);
        assert_eq!(engine.scroll.target(), target);

        let frame = engine.frame(now).unwrap();
        assert!(frame.geometry_dirty);
        assert_eq!(frame.offset, offset);
        assert_eq!(frame.centered, engine.layout().centered_slide(offset));
    }

    #[test]
    fn slide_count_change_resets_overlays() {
        let mut engine = engine();
        engine.start();
        engine.frame(Instant::now());
        assert_eq!(engine.overlays().active(), Some(0));

        assert!(!engine.set_slide_count(7));
        engine.set_slide_count(3);
        assert_eq!(engine.overlays().active(), None);

        engine.frame(Instant::now());
        assert_eq!(engine.layout().slide_count, 3);
        assert_eq!(engine.overlays().active(), Some(0));
    }
}
