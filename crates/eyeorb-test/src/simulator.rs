//! Simulated frame host - a virtual clock that delivers frame callbacks at a
//! configurable rate with seeded jitter
//!
//! Simulates:
//! - Devices of any refresh rate, steady or jittery
//! - Timers that fire after their exact delay
//! - Cancellation of outstanding requests
//! - Idle time with nothing scheduled

use std::time::Duration;

use eyeorb_core::FrameTime;
use eyeorb_runtime::{FrameHandle, FrameHost, TimerHandle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shortest interval a jittered frame can take
const MIN_FRAME_INTERVAL_US: u64 = 1_000;

/// Frame delivery model
#[derive(Clone, Debug, PartialEq)]
pub struct FrameTiming {
    /// Nominal delivery rate
    pub fps: f64,
    /// Uniform jitter added to every interval (microseconds, either sign)
    pub jitter_us: u32,
}

impl FrameTiming {
    pub fn steady(fps: f64) -> Self {
        FrameTiming { fps, jitter_us: 0 }
    }

    pub fn jittery(fps: f64, jitter_us: u32) -> Self {
        FrameTiming { fps, jitter_us }
    }

    /// 60Hz panel
    pub fn desktop() -> Self {
        Self::steady(60.0)
    }

    /// Throttled phone GPU
    pub fn struggling_mobile() -> Self {
        Self::jittery(38.0, 2_000)
    }

    /// Nominal interval between frames
    pub fn interval(&self) -> Duration {
        if self.fps.is_finite() && self.fps > 0.0 {
            Duration::from_secs_f64(1.0 / self.fps)
        } else {
            Duration::from_millis(16)
        }
    }

    fn sample(&self, rng: &mut StdRng) -> Duration {
        let base = self.interval().as_micros() as i64;
        let jitter = if self.jitter_us > 0 {
            let j = self.jitter_us as i64;
            rng.gen_range(-j..=j)
        } else {
            0
        };
        let us = (base + jitter).max(MIN_FRAME_INTERVAL_US as i64) as u64;
        Duration::from_micros(us)
    }
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::desktop()
    }
}

/// A callback the host is about to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Frame(FrameHandle, FrameTime),
    Timer(TimerHandle, FrameTime),
}

impl HostEvent {
    pub fn at(&self) -> FrameTime {
        match self {
            Self::Frame(_, at) | Self::Timer(_, at) => *at,
        }
    }
}

/// Host counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub frames_requested: u64,
    pub frames_delivered: u64,
    pub timers_armed: u64,
    pub timers_fired: u64,
    pub cancellations: u64,
    /// Largest number of requests outstanding at once
    pub peak_outstanding: usize,
}

/// Frame host on a virtual clock
#[derive(Debug)]
pub struct SimulatedHost {
    now: FrameTime,
    timing: FrameTiming,
    rng: StdRng,
    next_id: u64,
    frames: Vec<(FrameHandle, FrameTime)>,
    timers: Vec<(TimerHandle, FrameTime)>,
    stats: HostStats,
}

impl SimulatedHost {
    pub fn new(timing: FrameTiming, seed: u64) -> Self {
        SimulatedHost {
            now: FrameTime::from_millis(1_000),
            timing,
            rng: StdRng::seed_from_u64(seed),
            next_id: 0,
            frames: Vec::new(),
            timers: Vec::new(),
            stats: HostStats::default(),
        }
    }

    pub fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn outstanding(&self) -> usize {
        self.frames.len() + self.timers.len()
    }

    /// Due time of the earliest outstanding callback
    pub fn next_due(&self) -> Option<FrameTime> {
        let frame = self.frames.iter().map(|(_, at)| *at).min();
        let timer = self.timers.iter().map(|(_, at)| *at).min();
        match (frame, timer) {
            (Some(f), Some(t)) => Some(f.min(t)),
            (f, t) => f.or(t),
        }
    }

    /// Remove the earliest outstanding callback and move the clock to it.
    /// Timers win ties.
    pub fn next_event(&mut self) -> Option<HostEvent> {
        let due = self.next_due()?;

        let event = if let Some(index) = self.timers.iter().position(|(_, at)| *at == due) {
            let (handle, at) = self.timers.remove(index);
            self.stats.timers_fired += 1;
            HostEvent::Timer(handle, at)
        } else {
            let index = self.frames.iter().position(|(_, at)| *at == due)?;
            let (handle, at) = self.frames.remove(index);
            self.stats.frames_delivered += 1;
            HostEvent::Frame(handle, at)
        };
        self.now = self.now.max(event.at());
        Some(event)
    }

    /// Let time pass without delivering anything
    pub fn advance(&mut self, by: Duration) {
        self.now = self.now.saturating_add(by);
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn track_peak(&mut self) {
        self.stats.peak_outstanding = self.stats.peak_outstanding.max(self.outstanding());
    }
}

impl FrameHost for SimulatedHost {
    fn now(&self) -> FrameTime {
        self.now
    }

    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next());
        let interval = self.timing.sample(&mut self.rng);
        self.frames.push((handle, self.now.saturating_add(interval)));
        self.stats.frames_requested += 1;
        self.track_peak();
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let before = self.frames.len();
        self.frames.retain(|(h, _)| *h != handle);
        if self.frames.len() != before {
            self.stats.cancellations += 1;
        }
    }

    fn set_timer(&mut self, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next());
        self.timers.push((handle, self.now.saturating_add(delay)));
        self.stats.timers_armed += 1;
        self.track_peak();
        handle
    }

    fn cancel_timer(&mut self, handle: TimerHandle) {
        let before = self.timers.len();
        self.timers.retain(|(h, _)| *h != handle);
        if self.timers.len() != before {
            self.stats.cancellations += 1;
        }
    }
}
