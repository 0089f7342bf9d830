//! Decorative pulse for highlighted notes.
//!
//! Each renderer owns its own phase and advances it from `tick`. The pulse
//! never feeds back into timing or hit-testing.

use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    phase: f64,
    /// Radians per second.
    rate: f64,
}

impl Pulse {
    pub fn new(rate: f64) -> Self {
        Self { phase: 0.0, rate }
    }

    /// Advances the phase by `rate * delta_seconds`, wrapping at 2*PI.
    /// Non-positive or non-finite deltas are ignored.
    pub fn tick(&mut self, delta_seconds: f64) {
        if !(delta_seconds.is_finite() && delta_seconds > 0.0) {
            return;
        }
        self.phase = (self.phase + self.rate * delta_seconds).rem_euclid(TAU);
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Pulse amount in `[0, 1]`.
    pub fn value(&self) -> f64 {
        0.5 + 0.5 * self.phase.sin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wraps() {
        let mut pulse = Pulse::new(9.0);
        for _ in 0..600 {
            pulse.tick(1.0 / 60.0);
            assert!(pulse.phase() >= 0.0 && pulse.phase() < TAU);
        }
        assert!((0.0..=1.0).contains(&pulse.value()));
    }

    #[test]
    fn test_ignores_bad_deltas() {
        let mut pulse = Pulse::new(3.0);
        pulse.tick(-1.0);
        pulse.tick(f64::NAN);
        assert_eq!(pulse.phase(), 0.0);
        assert_eq!(pulse.value(), 0.5);
    }

    #[test]
    fn test_instances_are_independent() {
        let mut a = Pulse::new(3.0);
        let b = Pulse::new(3.0);
        a.tick(0.5);
        assert!(a.phase() > 0.0);
        assert_eq!(b.phase(), 0.0);
    }
}
