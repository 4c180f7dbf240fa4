//! Attention/grade scales
//!
//! Every score is held internally as a [`Percent`] on the 0..100 scale.
//! The 0..1 fraction and the 0..20 local grading scale only exist at the
//! HTTP boundary, produced by the adapters below.
//!
//! Rounding rule: half away from zero (`f64::round`), applied once per
//! conversion. Percent and 0..20 values keep 2 decimals, fractions keep 4.

use serde::Serialize;

/// Round to `decimals` places, half away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

/// Canonical score: clamped into [0, 100], rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct Percent(f64);

impl Percent {
    pub const ZERO: Percent = Percent(0.0);
    pub const MAX: Percent = Percent(100.0);

    /// Clamp and round a raw 0..100 value. NaN becomes 0.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(round2(value.clamp(0.0, 100.0)))
    }

    /// From a 0..1 attention fraction
    pub fn from_fraction(fraction: f64) -> Self {
        Self::new(fraction * 100.0)
    }

    /// `part / total` as a percentage; zero when `total` is not positive.
    pub fn ratio(part: f64, total: f64) -> Self {
        if total <= 0.0 || !total.is_finite() {
            return Self::ZERO;
        }
        Self::new(part / total * 100.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// 0..1 view, 4 decimals
    pub fn as_fraction(self) -> f64 {
        round_to(self.0 / 100.0, 4)
    }

    /// 0..20 view, 2 decimals
    pub fn as_twenty(self) -> f64 {
        round2(self.0 / 5.0)
    }
}

impl From<Percent> for f64 {
    fn from(p: Percent) -> f64 {
        p.0
    }
}

/// The same score rendered on every scale a client may expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleView {
    pub percent: f64,
    pub fraction: f64,
    pub twenty: f64,
}

impl From<Percent> for ScaleView {
    fn from(p: Percent) -> Self {
        Self {
            percent: p.value(),
            fraction: p.as_fraction(),
            twenty: p.as_twenty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_out_of_range() {
        assert_eq!(Percent::new(150.0).value(), 100.0);
        assert_eq!(Percent::new(-10.0).value(), 0.0);
        assert_eq!(Percent::new(f64::NAN).value(), 0.0);
    }

    #[test]
    fn test_fraction_to_other_scales() {
        let p = Percent::from_fraction(0.75);
        assert_eq!(p.value(), 75.0);
        assert_eq!(p.as_twenty(), 15.0);
        assert_eq!(p.as_fraction(), 0.75);
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        assert_eq!(round2(68.125), 68.13);
        assert_eq!(Percent::new(33.333_333).value(), 33.33);
        assert_eq!(Percent::new(100.0 / 3.0).as_twenty(), 6.67);
    }

    #[test]
    fn test_ratio_handles_zero_total() {
        assert_eq!(Percent::ratio(5.0, 0.0), Percent::ZERO);
        assert_eq!(Percent::ratio(1.0, 2.0).value(), 50.0);
        assert_eq!(Percent::ratio(120.0, 100.0), Percent::MAX);
    }

    #[test]
    fn test_scale_view() {
        let view = ScaleView::from(Percent::new(42.5));
        assert_eq!(view.percent, 42.5);
        assert_eq!(view.fraction, 0.425);
        assert_eq!(view.twenty, 8.5);
    }
}
