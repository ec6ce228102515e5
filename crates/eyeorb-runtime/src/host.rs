//! Frame host - the platform's frame callback and timer queue
//!
//! The controller never blocks or sleeps. It asks the host for a frame or a
//! timer, and the host later calls back into the controller with the handle
//! it issued. Handles are never reused.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use eyeorb_core::FrameTime;

/// Identifies one requested frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(pub u64);

/// Identifies one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Vsync-aligned frame callbacks plus one-shot timers
pub trait FrameHost {
    /// Current time on the clock frame timestamps are taken from
    fn now(&self) -> FrameTime;

    /// Request one frame callback
    fn request_frame(&mut self) -> FrameHandle;

    /// Withdraw a frame request. Unknown handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// Arm a one-shot timer
    fn set_timer(&mut self, delay: Duration) -> TimerHandle;

    /// Disarm a timer. Unknown handles are ignored.
    fn cancel_timer(&mut self, handle: TimerHandle);
}

/// Host that queues requests for the embedder to deliver
///
/// Useful for hosts that poll (a game loop, a test) rather than push.
#[derive(Debug, Default)]
pub struct QueuedHost {
    next_id: u64,
    frames: VecDeque<FrameHandle>,
    timers: Vec<(TimerHandle, Duration)>,
    cancelled: u64,
    clock: FrameTime,
}

impl QueuedHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Move the host clock. The embedder keeps it in step with the
    /// timestamps it delivers.
    pub fn set_now(&mut self, now: FrameTime) {
        self.clock = now;
    }

    /// Oldest outstanding frame request
    pub fn pop_frame(&mut self) -> Option<FrameHandle> {
        self.frames.pop_front()
    }

    /// Outstanding timer with the shortest delay
    pub fn pop_timer(&mut self) -> Option<(TimerHandle, Duration)> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .min_by_key(|(_, (handle, delay))| (*delay, *handle))
            .map(|(index, _)| index)?;
        Some(self.timers.remove(index))
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Total outstanding requests of either kind
    pub fn outstanding(&self) -> usize {
        self.frames.len() + self.timers.len()
    }

    /// Number of requests withdrawn while outstanding
    pub fn cancellations(&self) -> u64 {
        self.cancelled
    }
}

impl FrameHost for QueuedHost {
    fn now(&self) -> FrameTime {
        self.clock
    }

    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next());
        self.frames.push_back(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let before = self.frames.len();
        self.frames.retain(|h| *h != handle);
        if self.frames.len() != before {
            self.cancelled += 1;
        }
    }

    fn set_timer(&mut self, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next());
        self.timers.push((handle, delay));
        handle
    }

    fn cancel_timer(&mut self, handle: TimerHandle) {
        let before = self.timers.len();
        self.timers.retain(|(h, _)| *h != handle);
        if self.timers.len() != before {
            self.cancelled += 1;
        }
    }
}
