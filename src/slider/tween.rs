//! Time bounded eased transitions.

use std::time::{Duration, Instant};

/// Easing curve.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Easing {
    /// Quadratic acceleration.
    EaseIn,
    /// Quadratic deceleration.
    EaseOut,
}

impl Easing {
    /// Map linear progress in `[0, 1]` onto the curve.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0., 1.);
        match self {
            Self::EaseIn => t * t,
            Self::EaseOut => 1. - (1. - t) * (1. - t),
        }
    }
}

/// Eased transition of a scalar.
#[derive(Copy, Clone, Debug)]
pub struct Tween {
    from: f64,
    to: f64,
    start: Instant,
    duration: Duration,
    easing: Easing,
}

impl Tween {
    pub fn new(from: f64, to: f64, start: Instant, duration: Duration, easing: Easing) -> Self {
        Self { from, to, start, duration, easing }
    }

    /// Value at a point in time.
    pub fn value(&self, now: Instant) -> f64 {
        let progress = self.easing.apply(self.progress(now));
        self.from + (self.to - self.from) * progress
    }

    /// Final value.
    pub fn end(&self) -> f64 {
        self.to
    }

    /// Check if the transition has reached its final value.
    pub fn is_done(&self, now: Instant) -> bool {
        self.progress(now) >= 1.
    }

    fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.;
        }

        let elapsed = now.saturating_duration_since(self.start);
        elapsed.as_secs_f64() / self.duration.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_endpoints() {
        for easing in [Easing::EaseIn, Easing::EaseOut] {
            assert_eq!(easing.apply(0.), 0.);
            assert_eq!(easing.apply(1.), 1.);
            assert_eq!(easing.apply(7.), 1.);
        }

        assert!(Easing::EaseIn.apply(0.5) < 0.5);
        assert!(Easing::EaseOut.apply(0.5) > 0.5);
    }

    #[test]
    fn tween_progress() {
        let start = Instant::now();
        let tween = Tween::new(1., 0., start, Duration::from_millis(300), Easing::EaseOut);

        assert_eq!(tween.value(start), 1.);
        assert!((tween.value(start + Duration::from_millis(150)) - 0.25).abs() < 1e-9);
        assert!(!tween.is_done(start + Duration::from_millis(299)));
        assert!(tween.is_done(start + Duration::from_millis(300)));
        assert_eq!(tween.value(start + Duration::from_secs(5)), 0.);
    }

    #[test]
    fn zero_duration_is_instant() {
        let start = Instant::now();
        let tween = Tween::new(0., 1., start, Duration::ZERO, Easing::EaseOut);
        assert!(tween.is_done(start));
        assert_eq!(tween.value(start), 1.);
    }
}
