//! Smoothed wrap-around scroll offset.
//!
//! The offset is measured in full slide cycles: `1.0` moves every slide
//! through the viewport exactly once. Input may push it anywhere on the real
//! line; it is only folded back into `[0, 1)` at safe points, since folding
//! `current` and `target` while they are apart would reverse the smoothing
//! direction.

/// Distance between current and target considered settled.
pub const EPSILON: f64 = 0.001;

/// Magnitude at which both ends of the offset are shifted back towards zero.
const REBASE_THRESHOLD: f64 = 4.;

/// Identifier of the pointer or touch point owning a drag.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum PointerId {
    Pointer,
    Touch(i32),
}

/// Who is currently in control of the offset.
#[derive(PartialEq, Copy, Clone, Default, Debug)]
pub enum ScrollMode {
    /// Nothing is moving, target equals current.
    #[default]
    Idle,
    /// Current is easing towards the target.
    Smoothing { target: f64 },
    /// A captured pointer moves current directly.
    Dragging { pointer: PointerId, last_delta: f64 },
}

/// Scroll offset state.
#[derive(Default, Debug)]
pub struct ScrollPhysics {
    current: f64,
    velocity: f64,
    mode: ScrollMode,
}

impl ScrollPhysics {
    /// Offset which should be rendered.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Offset the smoothing is heading towards.
    pub fn target(&self) -> f64 {
        match self.mode {
            ScrollMode::Smoothing { target } => target,
            ScrollMode::Idle | ScrollMode::Dragging { .. } => self.current,
        }
    }

    /// Absolute offset change of the last tick.
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Check if the offset is still changing without further input.
    pub fn is_moving(&self) -> bool {
        matches!(self.mode, ScrollMode::Smoothing { .. })
    }

    /// Check if a pointer currently owns the offset.
    pub fn is_dragging(&self) -> bool {
        matches!(self.mode, ScrollMode::Dragging { .. })
    }

    /// Move the smoothing target.
    ///
    /// Deltas arriving during a drag are ignored, the captured pointer owns
    /// the offset until it is released.
    pub fn apply_delta(&mut self, delta: f64, sensitivity: f64) {
        if self.is_dragging() {
            return;
        }

        let target = self.target() + delta * sensitivity;
        self.mode = ScrollMode::Smoothing { target };
        self.rebase();
    }

    /// Advance current towards target.
    ///
    /// Returns `true` while more ticks are required.
    pub fn tick(&mut self, damping: f64) -> bool {
        let target = match self.mode {
            ScrollMode::Smoothing { target } => target,
            ScrollMode::Idle | ScrollMode::Dragging { .. } => {
                self.velocity = 0.;
                return false;
            },
        };

        let previous = self.current;
        self.current += (target - self.current) * damping;
        self.velocity = (self.current - previous).abs();

        if (target - self.current).abs() > EPSILON {
            self.rebase();
            return true;
        }

        // Settling is a safe point for normalization.
        self.current = target;
        self.mode = ScrollMode::Idle;
        self.normalize();

        false
    }

    /// Fold current and target into `[0, 1)`.
    pub fn normalize(&mut self) {
        self.current = wrap_unit(self.current);
        if let ScrollMode::Smoothing { target } = &mut self.mode {
            *target = wrap_unit(*target);
        }
    }

    /// Capture the offset for direct manipulation.
    ///
    /// This cancels any smoothing in progress.
    pub fn begin_drag(&mut self, pointer: PointerId) {
        self.mode = ScrollMode::Dragging { pointer, last_delta: 0. };
        self.velocity = 0.;
    }

    /// Move the offset 1:1 with a captured pointer.
    ///
    /// Returns `false` if the pointer does not own the current drag.
    pub fn drag(&mut self, pointer: PointerId, delta: f64, sensitivity: f64) -> bool {
        match &mut self.mode {
            ScrollMode::Dragging { pointer: owner, last_delta } if *owner == pointer => {
                let delta = delta * sensitivity;
                *last_delta = delta;
                self.current += delta;
                self.velocity = delta.abs();
            },
            _ => return false,
        }

        self.rebase();

        true
    }

    /// Release a captured pointer.
    ///
    /// The last drag step multiplied by `fling` continues as smoothing target.
    pub fn end_drag(&mut self, pointer: PointerId, fling: f64) -> bool {
        let last_delta = match self.mode {
            ScrollMode::Dragging { pointer: owner, last_delta } if owner == pointer => last_delta,
            _ => return false,
        };

        self.mode = ScrollMode::Idle;
        self.normalize();

        let fling = last_delta * fling;
        if fling.abs() > EPSILON {
            self.mode = ScrollMode::Smoothing { target: self.current + fling };
        }

        true
    }

    /// Shift current and target by the same integer to keep magnitudes small.
    fn rebase(&mut self) {
        if self.current.abs() <= REBASE_THRESHOLD {
            return;
        }

        let shift = self.current.trunc();
        self.current -= shift;
        if let ScrollMode::Smoothing { target } = &mut self.mode {
            *target -= shift;
        }
    }
}

/// Wrap a value into `[0, 1)`.
///
/// Values already in range are returned untouched.
pub fn wrap_unit(value: f64) -> f64 {
    if (0.0..1.).contains(&value) {
        return value;
    }

    ((value % 1.) + 1.) % 1.
}

/// Convert per-interval damping to the elapsed frame time.
pub fn frame_damping(damping: f64, intervals: f64) -> f64 {
    1. - (1. - damping).powf(intervals)
}
