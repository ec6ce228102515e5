//! Frame time primitives
//!
//! Frame callbacks deliver monotonic timestamps. They are the only clock the
//! subsystem reads: easing, the error flash and the FPS probe all measure in
//! delivered frame time, so nothing advances while frames are withheld.

use std::ops::{Add, Sub};
use std::time::Duration;

/// Frame timestamp - monotonic, host-delivered
/// Represented as microseconds since an arbitrary host origin
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FrameTime(pub u64);

impl FrameTime {
    pub const ZERO: FrameTime = FrameTime(0);

    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        FrameTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        FrameTime(millis * 1000)
    }

    /// From a fractional millisecond timestamp, the unit browsers and most
    /// vsync callbacks use. Negative or non-finite input maps to zero.
    #[inline]
    pub fn from_millis_f64(millis: f64) -> Self {
        if millis.is_finite() && millis > 0.0 {
            FrameTime((millis * 1000.0) as u64)
        } else {
            FrameTime::ZERO
        }
    }

    #[inline]
    pub fn as_micros(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0 / 1000
    }

    #[inline]
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        FrameTime(self.0.saturating_add(duration.as_micros() as u64))
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future
    #[inline]
    pub fn since(self, earlier: FrameTime) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for FrameTime {
    type Output = FrameTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<FrameTime> for FrameTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: FrameTime) -> Self::Output {
        self.since(rhs)
    }
}

impl std::fmt::Debug for FrameTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}ms)", self.as_millis_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_time_sub_saturates() {
        let a = FrameTime::from_millis(100);
        let b = FrameTime::from_millis(250);

        assert_eq!(b - a, Duration::from_millis(150));
        assert_eq!(a - b, Duration::ZERO);
    }

    #[test]
    fn test_from_fractional_millis() {
        let t = FrameTime::from_millis_f64(16.667);
        assert_eq!(t.as_micros(), 16_667);

        assert_eq!(FrameTime::from_millis_f64(-4.0), FrameTime::ZERO);
        assert_eq!(FrameTime::from_millis_f64(f64::NAN), FrameTime::ZERO);
    }

    #[test]
    fn test_add_duration() {
        let t = FrameTime::from_millis(10) + Duration::from_millis(33);
        assert_eq!(t.as_millis(), 43);
    }
}
