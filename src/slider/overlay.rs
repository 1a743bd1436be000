//! Text overlay visibility.
//!
//! Exactly one overlay is shown at rest: the one belonging to the centered
//! slide. Changing the centered slide crossfades the old and new overlay.

use std::time::{Duration, Instant};

use crate::slider::tween::{Easing, Tween};

/// Scale of a hidden overlay.
pub const HIDDEN_SCALE: f64 = 0.95;

/// Overlay state of one slide.
#[derive(Debug)]
pub struct OverlayBinding {
    pub index: usize,
    opacity: f64,
    scale: f64,
    transition: Option<Transition>,
}

impl OverlayBinding {
    fn new(index: usize) -> Self {
        Self { index, opacity: 0., scale: HIDDEN_SCALE, transition: None }
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Scale around the overlay's anchor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn is_visible(&self) -> bool {
        self.opacity > 0.
    }

    /// Start transitioning towards a new opacity and scale.
    fn transition(&mut self, to: (f64, f64), now: Instant, duration: Duration, easing: Easing) {
        let opacity = Tween::new(self.opacity, to.0, now, duration, easing);
        let scale = Tween::new(self.scale, to.1, now, duration, easing);
        self.transition = Some(Transition { opacity, scale });
    }

    /// Jump to a state, discarding any transition.
    fn set(&mut self, opacity: f64, scale: f64) {
        self.transition = None;
        self.opacity = opacity;
        self.scale = scale;
    }

    /// Advance the transition.
    ///
    /// Returns `true` while the transition is still running.
    fn update(&mut self, now: Instant) -> bool {
        let transition = match &self.transition {
            Some(transition) => transition,
            None => return false,
        };

        if transition.opacity.is_done(now) {
            // Clear interpolation residue so the anchor is exact at rest.
            let (opacity, scale) = (transition.opacity.end(), transition.scale.end());
            self.set(opacity, scale);
            return false;
        }

        self.opacity = transition.opacity.value(now);
        self.scale = transition.scale.value(now);

        true
    }
}

#[derive(Copy, Clone, Debug)]
struct Transition {
    opacity: Tween,
    scale: Tween,
}

/// Overlay crossfade timing.
#[derive(Copy, Clone, Debug)]
pub struct Fades {
    pub fade_in: Duration,
    pub fade_out: Duration,
}

impl Default for Fades {
    fn default() -> Self {
        Self { fade_in: Duration::from_millis(600), fade_out: Duration::from_millis(300) }
    }
}

/// Keeps the centered slide's overlay visible.
#[derive(Debug)]
pub struct OverlaySynchronizer {
    bindings: Vec<OverlayBinding>,
    active: Option<usize>,
    mounted: bool,
    fades: Fades,
}

impl OverlaySynchronizer {
    pub fn new(slide_count: usize, fades: Fades) -> Self {
        let bindings = (0..slide_count).map(OverlayBinding::new).collect();
        Self { bindings, fades, active: None, mounted: false }
    }

    /// Overlay of the centered slide.
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn set_fades(&mut self, fades: Fades) {
        self.fades = fades;
    }

    /// Switch to the overlay of a newly centered slide.
    ///
    /// Returns `true` if the active overlay changed.
    pub fn sync(&mut self, centered: Option<usize>, now: Instant) -> bool {
        let centered = centered.filter(|index| *index < self.bindings.len());
        if centered == self.active {
            return false;
        }
        let previous = std::mem::replace(&mut self.active, centered);

        // First overlay is shown without transition.
        if !self.mounted {
            self.mounted = true;
            if let Some(index) = centered {
                self.bindings[index].set(1., 1.);
            }
            return true;
        }

        for binding in &mut self.bindings {
            if Some(binding.index) == centered {
                binding.transition((1., 1.), now, self.fades.fade_in, Easing::EaseOut);
            } else if Some(binding.index) == previous {
                binding.transition((0., HIDDEN_SCALE), now, self.fades.fade_out, Easing::EaseIn);
            } else if binding.is_visible() {
                // Cut leftovers of an interrupted crossfade.
                binding.set(0., HIDDEN_SCALE);
            }
        }

        true
    }

    /// Advance all running transitions.
    ///
    /// Returns `true` while any transition is still running.
    pub fn update(&mut self, now: Instant) -> bool {
        let mut animating = false;
        for binding in &mut self.bindings {
            animating |= binding.update(now);
        }
        animating
    }

    /// Overlays currently above zero opacity.
    pub fn visible(&self) -> impl Iterator<Item = &OverlayBinding> {
        self.bindings.iter().filter(|binding| binding.is_visible())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn initial_mount_is_immediate() {
        let start = Instant::now();
        let mut overlays = OverlaySynchronizer::new(7, Fades::default());

        assert!(overlays.sync(Some(0), start));
        assert!(!overlays.bindings.iter().any(|binding| binding.transition.is_some()));

        let visible: Vec<_> = overlays.visible().collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].index, 0);
        assert_eq!(visible[0].opacity(), 1.);
        assert_eq!(visible[0].scale(), 1.);
    }

    #[test]
    fn unchanged_center_is_noop() {
        let start = Instant::now();
        let mut overlays = OverlaySynchronizer::new(7, Fades::default());
        overlays.sync(Some(2), start);

        assert!(!overlays.sync(Some(2), ms(start, 16)));
        assert!(!overlays.bindings.iter().any(|binding| binding.transition.is_some()));
    }

    #[test]
    fn crossfade() {
        let start = Instant::now();
        let mut overlays = OverlaySynchronizer::new(7, Fades::default());
        overlays.sync(Some(0), start);

        assert!(overlays.sync(Some(1), start));
        assert_eq!(overlays.active(), Some(1));

        // Both overlays are visible halfway through the fade out.
        assert!(overlays.update(ms(start, 150)));
        let visible: Vec<_> = overlays.visible().map(|binding| binding.index).collect();
        assert_eq!(visible, [0, 1]);

        // Outgoing overlay is gone after its shorter fade.
        assert!(overlays.update(ms(start, 300)));
        let visible: Vec<_> = overlays.visible().map(|binding| binding.index).collect();
        assert_eq!(visible, [1]);

        // Incoming overlay settles at the exact resting transform.
        assert!(!overlays.update(ms(start, 600)));
        let binding = overlays.visible().next().unwrap();
        assert_eq!((binding.opacity(), binding.scale()), (1., 1.));
    }

    #[test]
    fn at_most_two_visible() {
        let start = Instant::now();
        let mut overlays = OverlaySynchronizer::new(7, Fades::default());
        overlays.sync(Some(0), start);

        let mut now = start;
        for center in [1, 2, 3, 2, 6, 5, 0, 4] {
            overlays.sync(Some(center), now);
            for _ in 0..5 {
                now += Duration::from_millis(40);
                overlays.update(now);
                assert!(overlays.visible().count() <= 2);
            }
        }
    }

    #[test]
    fn interrupted_fade_in_reverses_from_current_state() {
        let start = Instant::now();
        let mut overlays = OverlaySynchronizer::new(3, Fades::default());
        overlays.sync(Some(0), start);
        overlays.sync(Some(1), start);
        overlays.update(ms(start, 100));

        let opacity = overlays.bindings[1].opacity();
        assert!(opacity > 0. && opacity < 1.);

        overlays.sync(Some(0), ms(start, 100));
        overlays.update(ms(start, 100));
        assert!((overlays.bindings[1].opacity() - opacity).abs() < 1e-9);
        assert!(overlays.bindings[1].opacity() > 0.);
    }

    #[test]
    fn out_of_range_center_is_ignored() {
        let start = Instant::now();
        let mut overlays = OverlaySynchronizer::new(2, Fades::default());
        assert!(!overlays.sync(Some(5), start));
        assert_eq!(overlays.active(), None);
    }
}
