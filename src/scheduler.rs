//! Frame scheduler: a ticker armed once and polled by the host event loop.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schedule {
    Cancelled,
    /// Armed; `None` means the next poll fires immediately.
    Armed(Option<Instant>),
}

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Duration,
    schedule: Schedule,
}

impl FrameScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            schedule: Schedule::Cancelled,
        }
    }

    /// Arms the ticker. The first frame is due right away.
    pub fn arm(&mut self) {
        self.schedule = Schedule::Armed(None);
    }

    pub fn cancel(&mut self) {
        self.schedule = Schedule::Cancelled;
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        matches!(self.schedule, Schedule::Armed(_))
    }

    /// True when a frame is due at `now`; books the next one an interval later.
    /// Missed frames are dropped, never replayed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.schedule {
            Schedule::Armed(due) if due.is_none_or(|d| now >= d) => {
                self.schedule = Schedule::Armed(Some(now + self.interval));
                true
            }
            _ => false,
        }
    }

    /// Time left until the next frame, or `None` while cancelled.
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        match self.schedule {
            Schedule::Cancelled => None,
            Schedule::Armed(None) => Some(Duration::ZERO),
            Schedule::Armed(Some(due)) => Some(due.saturating_duration_since(now)),
        }
    }
}
