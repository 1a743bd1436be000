//! Wayland window rendering.

use std::process::Command;
use std::ptr::NonNull;
use std::time::{Duration, Instant};
use std::{mem, thread};

use calloop::timer::{TimeoutAction, Timer};
use calloop::{LoopHandle, RegistrationToken};
use glutin::display::{Display, DisplayApiPreference};
use raw_window_handle::{RawDisplayHandle, WaylandDisplayHandle};
use smithay_client_toolkit::compositor::{CompositorState, Region};
use smithay_client_toolkit::reexports::client::{Connection, QueueHandle};
use smithay_client_toolkit::shell::WaylandSurface;
use smithay_client_toolkit::shell::xdg::window::{Window as XdgWindow, WindowDecorations};
use tracing::{error, info};

use crate::config::Config;
use crate::geometry::{Point, Size};
use crate::slider::scene::Scene;
use crate::slider::scroll::PointerId;
use crate::slider::texture::{SlideTexture, TextureStyle};
use crate::slider::{Engine, InputDevice, Lifecycle};
use crate::slides::{self, SlideDescriptor};
use crate::ui::overlay::OverlayPainter;
use crate::ui::renderer::Renderer;
use crate::ui::skia::Canvas;
use crate::wayland::ProtocolStates;
use crate::{Error, State};

/// Wayland window.
pub struct Window {
    pub queue: QueueHandle<State>,
    pub initial_draw_done: bool,

    engine: Engine,
    slides: Vec<SlideDescriptor>,
    config: Config,

    touch_state: TouchState,

    event_loop: LoopHandle<'static, State>,
    resize: ResizeDebounce,

    connection: Connection,
    xdg_window: XdgWindow,

    texture: SlideTexture,
    scene: Option<Scene>,
    painter: OverlayPainter,
    renderer: Renderer,
    canvas: Canvas,

    dirty: bool,
    size: Size,
    scale: i32,
}

impl Window {
    pub fn new(
        protocol_states: &ProtocolStates,
        event_loop: LoopHandle<'static, State>,
        connection: Connection,
        queue: QueueHandle<State>,
        config: Config,
    ) -> Result<Self, Error> {
        // Get EGL display.
        let display = NonNull::new(connection.backend().display_ptr().cast())
            .ok_or(Error::NullDisplay)?;
        let wayland_display = WaylandDisplayHandle::new(display);
        let raw_display = RawDisplayHandle::Wayland(wayland_display);
        let egl_display = unsafe { Display::new(raw_display, DisplayApiPreference::Egl)? };

        // Create surface's Wayland global handles.
        let surface = protocol_states.compositor.create_surface(&queue);

        // Create the XDG shell window.
        let xdg_window = protocol_states.xdg_shell.create_window(
            surface.clone(),
            WindowDecorations::RequestClient,
            &queue,
        );
        xdg_window.set_title("Slidereel");
        xdg_window.set_app_id("Slidereel");
        xdg_window.commit();

        // Create OpenGL renderer.
        let renderer = Renderer::new(egl_display, surface);

        // Default to a reasonable default size.
        let size = Size { width: 360, height: 720 };

        // Decode all slide images before the first frame.
        let slides = slides::load(&config.slides.0);

        let engine = Engine::new(size, slides.len(), config.tuning());
        let painter = OverlayPainter::new(&config, 1.);

        Ok(Self {
            event_loop,
            connection,
            xdg_window,
            renderer,
            painter,
            engine,
            slides,
            config,
            queue,
            size,
            dirty: true,
            scale: 1,
            initial_draw_done: Default::default(),
            resize: Default::default(),
            touch_state: Default::default(),
            texture: Default::default(),
            canvas: Default::default(),
            scene: Default::default(),
        })
    }

    /// Start rendering.
    pub fn start(&mut self) {
        let requested = self.engine.start();
        self.redraw_if(requested);
    }

    /// Stop rendering until the next [`Self::start`].
    pub fn stop(&mut self) {
        self.engine.stop();
    }

    /// Release all rendering resources.
    ///
    /// The window ignores all further input and frame callbacks.
    pub fn dispose(&mut self) {
        if self.engine.lifecycle() == Lifecycle::Disposed {
            return;
        }
        self.engine.dispose();

        self.resize.cancel(&self.event_loop);

        // Skia resources must be freed while the EGL context is still alive.
        self.painter.clear();
        self.texture.release();
        self.scene = None;
        self.canvas.release();
        self.renderer.release();

        info!("Released slider resources");
    }

    /// Handle the compositor's frame callback.
    pub fn frame_done(&mut self) {
        if self.engine.callback_done() {
            self.draw();
        }
    }

    /// Redraw the window.
    pub fn draw(&mut self) {
        // Frames are only produced while the engine is running.
        let frame = match self.engine.frame(Instant::now()) {
            Some(frame) => frame,
            None => return,
        };
        self.initial_draw_done = true;

        let physical_size = self.size * self.scale as f64;

        // Mark entire window as damaged.
        let wl_surface = self.xdg_window.wl_surface();
        wl_surface.set_buffer_scale(self.scale);
        wl_surface.damage(0, 0, self.size.width as i32, self.size.height as i32);

        // Render the window content.
        let dirty = mem::take(&mut self.dirty);
        let result = self.renderer.draw(physical_size, |renderer| {
            let drawn = self.canvas.draw(renderer.skia_config(), physical_size, |canvas| {
                canvas.clear(self.config.colors.background.as_color4f());

                let viewport = physical_size.into();
                let layout = self.engine.layout();

                // Update the texture before the surface samples it.
                let texture_dirty = frame.texture_dirty || dirty;
                if texture_dirty {
                    let style = TextureStyle {
                        background: self.config.colors.background.as_color4f(),
                        dim: self.config.slider.dim.clamp(0., 1.) as f32,
                    };
                    let offset = frame.offset;
                    let slides = &self.slides;
                    self.texture.compose(canvas, layout, slides, offset, frame.centered, style);
                }

                // Project the surface again after geometry changes.
                if frame.geometry_dirty || dirty || self.scene.is_none() {
                    self.scene = Some(Scene::new(layout, viewport));
                }

                if let Some(scene) = &mut self.scene {
                    if let Some(image) = self.texture.image().filter(|_| texture_dirty) {
                        scene.set_texture(image);
                    }
                    scene.draw(canvas, viewport);
                }

                self.painter.draw(canvas, viewport, &self.slides, self.engine.overlays());
            });

            if !drawn {
                error!("Skipped frame without Skia surface");
            }
        });

        if let Err(err) = result {
            error!("Failed to render frame: {err}");
        }

        // Request a new frame.
        wl_surface.frame(&self.queue, wl_surface.clone());

        // Apply surface changes.
        wl_surface.commit();
    }

    /// Unstall the renderer.
    ///
    /// This will render a new frame if there currently is no frame request
    /// pending.
    pub fn unstall(&mut self) {
        let requested = self.engine.request_frame();
        self.redraw_if(requested);
    }

    /// Update the window's logical size.
    ///
    /// Geometry is only rebuilt once the size stopped changing, until then
    /// the existing surface is stretched.
    pub fn set_size(&mut self, compositor: &CompositorState, size: Size) {
        if self.size == size && self.initial_draw_done {
            return;
        }

        self.size = size;

        // Update the window's opaque region.
        //
        // This is done here since it can only change on resize, but the commit happens
        // atomically on redraw.
        if let Ok(region) = Region::new(compositor) {
            region.add(0, 0, size.width as i32, size.height as i32);
            self.xdg_window.wl_surface().set_opaque_region(Some(region.wl_region()));
        }

        // Apply the initial size immediately.
        if !self.initial_draw_done {
            self.engine.resize(size);
            return;
        }

        if self.engine.lifecycle() == Lifecycle::Disposed {
            return;
        }

        let delay = self.config.slider.resize_debounce();
        let apply = |state: &mut State| state.window.apply_resize();
        if !self.resize.schedule(&self.event_loop, delay, size, apply) {
            self.apply_resize();
        }

        self.unstall();
    }

    /// Update the window's DPI factor.
    pub fn set_scale_factor(&mut self, scale: i32) {
        let scale = scale.max(1);
        if self.scale == scale {
            return;
        }

        self.painter.set_scale_factor(scale as f64);

        self.scale = scale;
        self.dirty = true;

        if self.initial_draw_done {
            self.unstall();
        }
    }

    /// Handle config updates.
    pub fn update_config(&mut self, config: Config) {
        if self.engine.lifecycle() == Lifecycle::Disposed {
            return;
        }

        if config.slides != self.config.slides {
            self.slides = slides::load(&config.slides.0);
            self.engine.set_slide_count(self.slides.len());
        }

        self.engine.set_tuning(config.tuning());
        self.painter.update_config(&config);

        self.config = config;
        self.dirty = true;

        self.unstall();
    }

    /// Handle wheel and touchpad scrolling.
    pub fn scroll(&mut self, delta: f64) {
        // Scrolling down moves the slides up, like touch dragging.
        let requested = self.engine.scroll_by(InputDevice::Wheel, -delta);
        self.redraw_if(requested);
    }

    /// Handle touch or button press.
    pub fn press(&mut self, pointer: PointerId, logical_point: Point<f64>) {
        // Ignore additional touch points.
        if self.touch_state.pointer.is_some_and(|active| active != pointer) {
            return;
        }

        // Stop any smoothing and follow the input directly.
        self.engine.press(pointer);

        self.touch_state.pointer = Some(pointer);
        self.touch_state.point = logical_point;
        self.touch_state.start = logical_point;

        // Convert position to physical space for hit testing.
        let physical_point = logical_point * self.scale as f64;
        self.touch_state.action = match self.painter.button_at(physical_point) {
            Some(index) => TouchAction::Tap(index),
            None => TouchAction::None,
        };
    }

    /// Handle touch or pointer motion.
    pub fn motion(&mut self, pointer: PointerId, logical_point: Point<f64>) {
        if self.touch_state.pointer != Some(pointer) {
            return;
        }

        // Update touch position.
        let old_point = mem::replace(&mut self.touch_state.point, logical_point);

        // Ignore dragging until tap distance limit is exceeded.
        if !matches!(self.touch_state.action, TouchAction::Drag) {
            if !self.touch_state.exceeds_tap_distance(self.config.input.max_tap_distance) {
                return;
            }
            self.touch_state.action = TouchAction::Drag;
        }

        // Immediately move the slides with the input.
        let delta = self.touch_state.point.y - old_point.y;
        let requested = self.engine.drag(pointer, delta);
        self.redraw_if(requested);
    }

    /// Handle touch or button release.
    pub fn release(&mut self, pointer: PointerId) {
        if self.touch_state.pointer != Some(pointer) {
            return;
        }
        let touch_state = mem::take(&mut self.touch_state);

        let requested = self.engine.release(pointer);
        self.redraw_if(requested);

        // Only navigate if the button is still under the pointer.
        let button = self.painter.button_at(touch_state.point * self.scale as f64);
        if let Some(index) = touch_state.tap_target(self.engine.centered(), button) {
            self.navigate(index);
        }
    }

    /// Handle input sequence cancellation.
    pub fn cancel(&mut self, device: InputDevice) {
        let pointer = match self.touch_state.pointer {
            Some(pointer) if InputDevice::from(pointer) == device => pointer,
            _ => return,
        };
        self.touch_state = TouchState::default();

        let requested = self.engine.release(pointer);
        self.redraw_if(requested);
    }

    /// Open the route of a slide.
    fn navigate(&self, index: usize) {
        let route = match self.slides.get(index) {
            Some(slide) if !slide.route.is_empty() => &slide.route,
            _ => return,
        };

        let url = self.config.navigation.url(route);
        info!("Navigating to {url}");

        match Command::new(&self.config.navigation.command).arg(&url).spawn() {
            // Reap the opener once it exits.
            Ok(mut child) => {
                thread::spawn(move || {
                    let _ = child.wait();
                });
            },
            Err(err) => error!("Failed to run {:?}: {err}", self.config.navigation.command),
        }
    }

    /// Apply the last debounced size to the slider geometry.
    fn apply_resize(&mut self) {
        if let Some(size) = self.resize.take() {
            let requested = self.engine.resize(size);
            self.redraw_if(requested);
        }
    }

    /// Redraw immediately if a new frame was requested.
    fn redraw_if(&mut self, requested: bool) {
        if requested {
            self.draw();
            let _ = self.connection.flush();
        }
    }
}

/// Touch event tracking.
#[derive(Default)]
struct TouchState {
    pointer: Option<PointerId>,
    action: TouchAction,
    start: Point<f64>,
    point: Point<f64>,
}

impl TouchState {
    /// Check if the touch moved too far to still be a tap.
    ///
    /// The limit is a squared distance in logical pixels.
    fn exceeds_tap_distance(&self, max_tap_distance: f64) -> bool {
        let delta = self.point - self.start;
        delta.x.powi(2) + delta.y.powi(2) > max_tap_distance
    }

    /// Slide to navigate to when this touch sequence ends.
    ///
    /// A tap only navigates if its slide is still centered and its button is
    /// still under the pointer.
    fn tap_target(&self, centered: Option<usize>, button: Option<usize>) -> Option<usize> {
        match self.action {
            TouchAction::Tap(index) if centered == Some(index) && button == Some(index) => {
                Some(index)
            },
            _ => None,
        }
    }
}

/// Intention of a touch sequence.
#[derive(Default)]
enum TouchAction {
    #[default]
    None,
    Tap(usize),
    Drag,
}

/// Viewport size waiting for resizing to settle.
#[derive(Default)]
struct ResizeDebounce {
    timer: Option<RegistrationToken>,
    pending: Option<Size>,
}

impl ResizeDebounce {
    /// Delay applying `size` until no other size arrived for `delay`.
    ///
    /// Returns `false` if no timer could be registered.
    fn schedule<D, F>(
        &mut self,
        event_loop: &LoopHandle<'static, D>,
        delay: Duration,
        size: Size,
        mut apply: F,
    ) -> bool
    where
        F: FnMut(&mut D) + 'static,
    {
        self.cancel(event_loop);
        self.pending = Some(size);

        let timer = Timer::from_duration(delay);
        let token = event_loop.insert_source(timer, move |_, _, data| {
            apply(data);
            TimeoutAction::Drop
        });

        match token {
            Ok(token) => {
                self.timer = Some(token);
                true
            },
            Err(err) => {
                error!("Failed to schedule resize: {err}");
                false
            },
        }
    }

    /// Take the pending size.
    fn take(&mut self) -> Option<Size> {
        self.timer = None;
        self.pending.take()
    }

    /// Remove the pending timer.
    fn cancel<D>(&mut self, event_loop: &LoopHandle<'static, D>) {
        if let Some(token) = self.timer.take() {
            event_loop.remove(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use calloop::EventLoop;

    use super::*;

    fn touch(action: TouchAction, start: Point<f64>, point: Point<f64>) -> TouchState {
        TouchState { pointer: Some(PointerId::Touch(0)), action, start, point }
    }

    #[test]
    fn tap_distance_is_squared() {
        let start = Point::new(100., 100.);

        // A 20 pixel move stays within a squared limit of 400.
        let state = touch(TouchAction::Tap(1), start, Point::new(112., 116.));
        assert!(!state.exceeds_tap_distance(400.));

        let state = touch(TouchAction::Tap(1), start, Point::new(100., 121.));
        assert!(state.exceeds_tap_distance(400.));
    }

    #[test]
    fn tap_needs_centered_slide_and_button() {
        let point = Point::new(10., 10.);
        let state = touch(TouchAction::Tap(2), point, point);

        assert_eq!(state.tap_target(Some(2), Some(2)), Some(2));

        // Slider moved to another slide during the press.
        assert_eq!(state.tap_target(Some(3), Some(2)), None);

        // Button no longer under the pointer.
        assert_eq!(state.tap_target(Some(2), None), None);
        assert_eq!(state.tap_target(Some(2), Some(3)), None);

        let state = touch(TouchAction::Drag, point, point);
        assert_eq!(state.tap_target(Some(2), Some(2)), None);

        let state = touch(TouchAction::None, point, point);
        assert_eq!(state.tap_target(Some(2), Some(2)), None);
    }

    #[derive(Default)]
    struct ResizeState {
        resize: ResizeDebounce,
        applied: Vec<Size>,
    }

    impl ResizeState {
        fn apply(&mut self) {
            if let Some(size) = self.resize.take() {
                self.applied.push(size);
            }
        }
    }

    #[test]
    fn resize_applies_last_size_once() {
        let mut event_loop: EventLoop<'static, ResizeState> = EventLoop::try_new().unwrap();
        let handle = event_loop.handle();
        let mut state = ResizeState::default();

        let delay = Duration::from_millis(20);
        for width in [400, 500, 600] {
            let size = Size::new(width, 800);
            assert!(state.resize.schedule(&handle, delay, size, ResizeState::apply));
        }

        for _ in 0..10 {
            event_loop.dispatch(Duration::from_millis(50), &mut state).unwrap();
        }

        assert_eq!(state.applied, vec![Size::new(600, 800)]);
        assert!(state.resize.take().is_none());
    }

    #[test]
    fn cancelled_resize_is_dropped() {
        let mut event_loop: EventLoop<'static, ResizeState> = EventLoop::try_new().unwrap();
        let handle = event_loop.handle();
        let mut state = ResizeState::default();

        let size = Size::new(400, 800);
        let delay = Duration::from_millis(5);
        assert!(state.resize.schedule(&handle, delay, size, ResizeState::apply));
        state.resize.cancel(&handle);

        for _ in 0..4 {
            event_loop.dispatch(Duration::from_millis(10), &mut state).unwrap();
        }

        assert!(state.applied.is_empty());
    }
}
