// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! BeginFrame arguments and deadline handles.
//!
//! A tick source delivers one [`BeginFrameArgs`] per frame interval. The
//! [`Scheduler`](crate::scheduler::Scheduler) answers each tick by posting a
//! [`DeadlineRequest`]; the embedder fires it later by calling
//! [`Scheduler::on_begin_frame_deadline`] with the request's
//! [`DeadlineToken`]. Tokens are generation counters, so a deadline that was
//! superseded or cancelled is recognised as stale and ignored.
//!
//! [`Scheduler::on_begin_frame_deadline`]: crate::scheduler::Scheduler::on_begin_frame_deadline

use crate::time::{Duration, HostTime};

/// Timing for one BeginFrame tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct BeginFrameArgs {
    /// When the frame started (usually the vsync timestamp).
    pub frame_time: HostTime,
    /// Latest time at which a swap still makes this frame's display.
    pub deadline: HostTime,
    /// Nominal spacing between ticks.
    pub interval: Duration,
}

impl BeginFrameArgs {
    /// Nominal 60 Hz interval at nanosecond tick resolution.
    pub const DEFAULT_INTERVAL: Duration = Duration(16_666_667);

    /// Creates args from explicit timestamps.
    #[must_use]
    pub const fn new(frame_time: HostTime, deadline: HostTime, interval: Duration) -> Self {
        Self {
            frame_time,
            deadline,
            interval,
        }
    }

    /// Args for a tick source that only knows its own period: the deadline
    /// is one full interval after the frame time.
    #[must_use]
    pub const fn from_interval(frame_time: HostTime, interval: Duration) -> Self {
        Self {
            frame_time,
            deadline: frame_time.saturating_add(interval),
            interval,
        }
    }

    /// Returns `true` if the args carry a usable (non-zero) interval.
    #[must_use]
    pub const fn has_interval(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Start of the frame following this one.
    #[must_use]
    pub const fn next_frame_time(&self) -> HostTime {
        self.frame_time.saturating_add(self.interval)
    }
}

/// Identifies one posted deadline (or poll) callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeadlineToken(pub u64);

/// When the posted deadline should fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeadlineTarget {
    /// Run as soon as the embedder's task queue allows.
    Immediate,
    /// Run at the given host time (or immediately if it has passed).
    At(HostTime),
}

impl DeadlineTarget {
    /// Resolves the target to a concrete time given "now".
    #[must_use]
    pub fn resolve(self, now: HostTime) -> HostTime {
        match self {
            Self::Immediate => now,
            Self::At(t) => t.max(now),
        }
    }
}

/// A request from the scheduler to run the BeginFrame deadline once.
///
/// Posting a new request implicitly cancels the previous one: only the
/// newest token is honoured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeadlineRequest {
    /// Token to hand back to the scheduler when the deadline fires.
    pub token: DeadlineToken,
    /// When to fire.
    pub target: DeadlineTarget,
}
