//! Small vector math and frame-rate independent easing

use std::ops::{Add, AddAssign, Mul, Sub};
use std::time::Duration;

/// 2D vector used for look targets and uniforms
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    #[inline]
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    /// Manhattan distance, used for cheap change detection
    #[inline]
    pub fn l1_distance(self, other: Vec2) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Move towards `target` by fraction `t` (0 = stay, 1 = arrive)
    #[inline]
    pub fn lerp(self, target: Vec2, t: f32) -> Vec2 {
        self + (target - self) * t
    }

    /// Clamp both components to `[-range, range]`
    #[inline]
    pub fn clamp_symmetric(self, range: f32) -> Vec2 {
        Vec2::new(self.x.clamp(-range, range), self.y.clamp(-range, range))
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    #[inline]
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Convert an approach rate (per second) into a lerp factor for `dt`.
///
/// `1 - exp(-dt * rate)`: two steps of `dt/2` land where one step of `dt`
/// does, so easing speed does not depend on frame rate.
#[inline]
pub fn ease_factor(dt: Duration, rate: f32) -> f32 {
    1.0 - (-dt.as_secs_f32() * rate).exp()
}

/// Same curve expressed with a time constant τ instead of a rate
#[inline]
pub fn smoothing_factor(dt: Duration, time_constant: Duration) -> f32 {
    if time_constant.is_zero() {
        return 1.0;
    }
    1.0 - (-dt.as_secs_f32() / time_constant.as_secs_f32()).exp()
}

/// Suppress `|value| <= deadzone` and rescale the rest so the output is
/// continuous at the deadzone edge and still reaches ±1.
#[inline]
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() <= deadzone {
        return 0.0;
    }
    let sign = if value < 0.0 { -1.0 } else { 1.0 };
    sign * (value.abs() - deadzone) / (1.0 - deadzone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ease_factor_bounds() {
        assert_eq!(ease_factor(Duration::ZERO, 3.2), 0.0);

        let f = ease_factor(Duration::from_millis(16), 3.2);
        assert!(f > 0.0 && f < 1.0);

        let long = ease_factor(Duration::from_secs(60), 3.2);
        assert!((long - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ease_factor_frame_rate_independent() {
        let rate = 6.0;
        let single = ease_factor(Duration::from_millis(32), rate);

        // Two half steps applied to the remaining distance
        let half = ease_factor(Duration::from_millis(16), rate);
        let double = 1.0 - (1.0 - half) * (1.0 - half);

        assert!((single - double).abs() < 1e-5);
    }

    #[test]
    fn test_deadzone_edge_is_continuous() {
        let dz = 0.06;
        assert_eq!(apply_deadzone(0.06, dz), 0.0);
        assert_eq!(apply_deadzone(-0.06, dz), 0.0);
        assert!(apply_deadzone(0.0601, dz) < 0.001);
        assert!((apply_deadzone(1.0, dz) - 1.0).abs() < 1e-6);
        assert!((apply_deadzone(-1.0, dz) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_smoothing_zero_time_constant_snaps() {
        assert_eq!(smoothing_factor(Duration::from_millis(5), Duration::ZERO), 1.0);
    }

    #[test]
    fn test_vec2_ops() {
        let a = Vec2::new(0.5, -0.5);
        let b = Vec2::new(1.0, 1.0);

        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.l1_distance(b), 2.0);
        assert_eq!(Vec2::new(0.9, -0.9).clamp_symmetric(0.28), Vec2::new(0.28, -0.28));
    }

    proptest! {
        #[test]
        fn prop_deadzone_suppresses_small_values(v in -0.06f32..=0.06f32) {
            prop_assert_eq!(apply_deadzone(v, 0.06), 0.0);
        }

        #[test]
        fn prop_deadzone_preserves_sign_and_range(v in -1.0f32..=1.0f32) {
            let out = apply_deadzone(v, 0.06);
            prop_assert!(out.abs() <= 1.0 + 1e-6);
            prop_assert!(out == 0.0 || out.signum() == v.signum());
        }
    }
}
