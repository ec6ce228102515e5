//! Frame scheduler - at most one pending render request
//!
//! ```text
//!            schedule(0)                      frame delivered
//!   Idle ───────────────────▶ Frame(h) ─────────────────────────▶ Idle
//!     │                          ▲
//!     │ schedule(d > 0)          │ timer fires
//!     └────────────────▶ Timer(t)┘
//! ```
//!
//! A delivered frame or timer whose handle does not match the pending ticket
//! is stale (cancelled after the host already queued it) and is dropped.

use std::fmt;
use std::time::Duration;

use crate::host::{FrameHandle, FrameHost, TimerHandle};

/// The single outstanding request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Frame(FrameHandle),
    Timer(TimerHandle),
}

/// Conditions that make scheduling a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Hidden,
    Probing,
    AlreadyPending,
    NoRenderer,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Probing => "probing",
            Self::AlreadyPending => "already_pending",
            Self::NoRenderer => "no_renderer",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a `schedule` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Requested(FrameHandle),
    Delayed(TimerHandle),
    Skipped(SkipReason),
}

/// Controller state the scheduler checks before requesting work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleGate {
    pub visible: bool,
    pub probing: bool,
    pub has_renderer: bool,
}

/// Request counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_requested: u64,
    pub timers_armed: u64,
    pub frames_accepted: u64,
    pub stale_dropped: u64,
    pub cancellations: u64,
}

/// Single-ticket frame scheduler
#[derive(Debug, Default)]
pub struct FrameScheduler {
    pending: Option<Pending>,
    stats: SchedulerStats,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<Pending> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Request a render, directly or after `delay`
    pub fn schedule<H: FrameHost + ?Sized>(
        &mut self,
        host: &mut H,
        gate: ScheduleGate,
        delay: Duration,
    ) -> ScheduleOutcome {
        let skip = if !gate.visible {
            Some(SkipReason::Hidden)
        } else if gate.probing {
            Some(SkipReason::Probing)
        } else if self.pending.is_some() {
            Some(SkipReason::AlreadyPending)
        } else if !gate.has_renderer {
            Some(SkipReason::NoRenderer)
        } else {
            None
        };
        if let Some(reason) = skip {
            tracing::trace!(%reason, "render not scheduled");
            return ScheduleOutcome::Skipped(reason);
        }

        if delay.is_zero() {
            ScheduleOutcome::Requested(self.request(host))
        } else {
            let timer = host.set_timer(delay);
            self.pending = Some(Pending::Timer(timer));
            self.stats.timers_armed += 1;
            tracing::trace!(%timer, ?delay, "render delayed");
            ScheduleOutcome::Delayed(timer)
        }
    }

    /// Request a frame for the FPS probe, bypassing the render gate. Still
    /// at most one pending request.
    pub fn request_probe_frame<H: FrameHost + ?Sized>(&mut self, host: &mut H) -> Option<FrameHandle> {
        if self.pending.is_some() {
            return None;
        }
        Some(self.request(host))
    }

    fn request<H: FrameHost + ?Sized>(&mut self, host: &mut H) -> FrameHandle {
        let frame = host.request_frame();
        self.pending = Some(Pending::Frame(frame));
        self.stats.frames_requested += 1;
        frame
    }

    /// Withdraw whatever is pending
    pub fn cancel<H: FrameHost + ?Sized>(&mut self, host: &mut H) {
        match self.pending.take() {
            Some(Pending::Frame(frame)) => host.cancel_frame(frame),
            Some(Pending::Timer(timer)) => host.cancel_timer(timer),
            None => return,
        }
        self.stats.cancellations += 1;
    }

    /// A timer fired. Issues the frame request when it is the pending one.
    pub fn on_timer<H: FrameHost + ?Sized>(&mut self, host: &mut H, timer: TimerHandle) -> Option<FrameHandle> {
        if self.pending != Some(Pending::Timer(timer)) {
            self.stats.stale_dropped += 1;
            tracing::trace!(%timer, "stale timer dropped");
            return None;
        }
        self.pending = None;
        Some(self.request(host))
    }

    /// A frame was delivered. True when it is the pending one and should run.
    pub fn accept_frame(&mut self, frame: FrameHandle) -> bool {
        if self.pending != Some(Pending::Frame(frame)) {
            self.stats.stale_dropped += 1;
            tracing::trace!(%frame, "stale frame dropped");
            return false;
        }
        self.pending = None;
        self.stats.frames_accepted += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::QueuedHost;
    use proptest::prelude::*;

    const OPEN: ScheduleGate = ScheduleGate {
        visible: true,
        probing: false,
        has_renderer: true,
    };

    #[test]
    fn test_immediate_request() {
        let mut host = QueuedHost::new();
        let mut scheduler = FrameScheduler::new();

        let outcome = scheduler.schedule(&mut host, OPEN, Duration::ZERO);
        let ScheduleOutcome::Requested(frame) = outcome else {
            panic!("expected a frame request, got {outcome:?}");
        };
        assert_eq!(host.pending_frames(), 1);
        assert!(scheduler.accept_frame(frame));
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn test_at_most_one_pending() {
        let mut host = QueuedHost::new();
        let mut scheduler = FrameScheduler::new();

        scheduler.schedule(&mut host, OPEN, Duration::ZERO);
        let second = scheduler.schedule(&mut host, OPEN, Duration::from_millis(33));

        assert_eq!(second, ScheduleOutcome::Skipped(SkipReason::AlreadyPending));
        assert_eq!(host.outstanding(), 1);
    }

    #[test]
    fn test_gate_reasons() {
        let mut host = QueuedHost::new();
        let mut scheduler = FrameScheduler::new();

        let hidden = ScheduleGate { visible: false, ..OPEN };
        let probing = ScheduleGate { probing: true, ..OPEN };
        let bare = ScheduleGate { has_renderer: false, ..OPEN };

        assert_eq!(
            scheduler.schedule(&mut host, hidden, Duration::ZERO),
            ScheduleOutcome::Skipped(SkipReason::Hidden)
        );
        assert_eq!(
            scheduler.schedule(&mut host, probing, Duration::ZERO),
            ScheduleOutcome::Skipped(SkipReason::Probing)
        );
        assert_eq!(
            scheduler.schedule(&mut host, bare, Duration::ZERO),
            ScheduleOutcome::Skipped(SkipReason::NoRenderer)
        );
        assert_eq!(host.outstanding(), 0);
    }

    #[test]
    fn test_delay_goes_through_timer() {
        let mut host = QueuedHost::new();
        let mut scheduler = FrameScheduler::new();

        let ScheduleOutcome::Delayed(timer) =
            scheduler.schedule(&mut host, OPEN, Duration::from_millis(40))
        else {
            panic!("expected a timer");
        };
        assert_eq!(host.pending_frames(), 0);

        let frame = scheduler.on_timer(&mut host, timer).unwrap();
        assert_eq!(scheduler.pending(), Some(Pending::Frame(frame)));
        assert_eq!(host.pending_frames(), 1);
    }

    #[test]
    fn test_cancel_then_stale_delivery() {
        let mut host = QueuedHost::new();
        let mut scheduler = FrameScheduler::new();

        let ScheduleOutcome::Requested(frame) = scheduler.schedule(&mut host, OPEN, Duration::ZERO) else {
            panic!("expected a frame request");
        };
        scheduler.cancel(&mut host);
        assert_eq!(host.outstanding(), 0);

        // The host had already queued the callback
        assert!(!scheduler.accept_frame(frame));
        assert_eq!(scheduler.stats().stale_dropped, 1);
        assert_eq!(scheduler.stats().cancellations, 1);
    }

    #[test]
    fn test_stale_timer_is_dropped() {
        let mut host = QueuedHost::new();
        let mut scheduler = FrameScheduler::new();

        let ScheduleOutcome::Delayed(old) =
            scheduler.schedule(&mut host, OPEN, Duration::from_millis(33))
        else {
            panic!("expected a timer");
        };
        scheduler.cancel(&mut host);
        scheduler.schedule(&mut host, OPEN, Duration::ZERO);

        assert_eq!(scheduler.on_timer(&mut host, old), None);
        assert_eq!(host.pending_frames(), 1);
    }

    #[test]
    fn test_probe_frames_bypass_gate_but_not_ticket() {
        let mut host = QueuedHost::new();
        let mut scheduler = FrameScheduler::new();

        let frame = scheduler.request_probe_frame(&mut host).unwrap();
        assert_eq!(scheduler.request_probe_frame(&mut host), None);
        assert!(scheduler.accept_frame(frame));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Schedule { delay_ms: u8, visible: bool, probing: bool },
        Probe,
        Cancel,
        DeliverFrame,
        FireTimer,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..50, any::<bool>(), any::<bool>()).prop_map(|(delay_ms, visible, probing)| Op::Schedule {
                delay_ms,
                visible,
                probing
            }),
            Just(Op::Probe),
            Just(Op::Cancel),
            Just(Op::DeliverFrame),
            Just(Op::FireTimer),
        ]
    }

    proptest! {
        #[test]
        fn prop_never_more_than_one_outstanding(ops in proptest::collection::vec(op(), 1..64)) {
            let mut host = QueuedHost::new();
            let mut scheduler = FrameScheduler::new();

            for op in ops {
                match op {
                    Op::Schedule { delay_ms, visible, probing } => {
                        let gate = ScheduleGate { visible, probing, has_renderer: true };
                        scheduler.schedule(&mut host, gate, Duration::from_millis(delay_ms as u64));
                    }
                    Op::Probe => {
                        scheduler.request_probe_frame(&mut host);
                    }
                    Op::Cancel => scheduler.cancel(&mut host),
                    Op::DeliverFrame => {
                        if let Some(frame) = host.pop_frame() {
                            scheduler.accept_frame(frame);
                        }
                    }
                    Op::FireTimer => {
                        if let Some((timer, _)) = host.pop_timer() {
                            scheduler.on_timer(&mut host, timer);
                        }
                    }
                }
                prop_assert!(host.outstanding() <= 1);
                prop_assert_eq!(scheduler.is_pending(), host.outstanding() == 1);
            }
        }
    }
}
