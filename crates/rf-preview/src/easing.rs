//! Easing curves for fades and reel motion

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Overshoot amount for `BackOut` (standard "back" easing constant)
const BACK_OVERSHOOT: f32 = 1.70158;

/// Easing curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum Easing {
    /// Linear interpolation (constant rate)
    #[default]
    Linear = 0,
    /// Quadratic ease-in (slow start) - reel acceleration
    QuadIn = 1,
    /// Quadratic ease-out (slow end)
    QuadOut = 2,
    /// Sine quarter period (smooth end) - fades
    Sine = 3,
    /// S-curve (slow start/end, fast middle)
    SCurve = 4,
    /// Ease-out that passes the target and settles back - reel landing
    BackOut = 5,
}

impl Easing {
    /// Evaluate curve at position t (0.0 - 1.0)
    ///
    /// Returns 0.0 at t=0 and 1.0 at t=1. `BackOut` exceeds 1.0 in between.
    #[inline]
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::Sine => (t * FRAC_PI_2).sin(),
            Easing::SCurve => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::BackOut => {
                let c3 = BACK_OVERSHOOT + 1.0;
                let u = t - 1.0;
                1.0 + c3 * u * u * u + BACK_OVERSHOOT * u * u
            }
        }
    }

    /// Progress of `elapsed` through `duration`, eased
    ///
    /// A zero duration is already complete.
    #[inline]
    pub fn progress(&self, elapsed_ms: f64, duration_ms: f64) -> f32 {
        if duration_ms <= 0.0 {
            return 1.0;
        }
        self.evaluate((elapsed_ms / duration_ms) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 6] = [
        Easing::Linear,
        Easing::QuadIn,
        Easing::QuadOut,
        Easing::Sine,
        Easing::SCurve,
        Easing::BackOut,
    ];

    #[test]
    fn test_curve_boundaries() {
        for curve in ALL {
            assert!((curve.evaluate(0.0) - 0.0).abs() < 0.001, "{:?} at 0.0", curve);
            assert!((curve.evaluate(1.0) - 1.0).abs() < 0.001, "{:?} at 1.0", curve);
        }
    }

    #[test]
    fn test_back_out_overshoots() {
        let peak = (1..100)
            .map(|i| Easing::BackOut.evaluate(i as f32 / 100.0))
            .fold(f32::MIN, f32::max);
        assert!(peak > 1.05, "peak {}", peak);
    }

    #[test]
    fn test_zero_duration_is_complete() {
        assert_eq!(Easing::Sine.progress(0.0, 0.0), 1.0);
        assert_eq!(Easing::Linear.progress(50.0, 100.0), 0.5);
    }
}
