// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::rc::Rc;
use core::cell::Cell;

use cadence_core::client::TimeSource;
use cadence_core::time::{Duration, HostTime, Timebase};

/// A clock that only moves when told to.
///
/// Clones share one reading: hand a clone (or a reference) to the scheduler
/// and keep the original to advance it between calls.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<HostTime>>,
    timebase: Timebase,
}

impl ManualClock {
    /// Creates a nanosecond clock reading `start`.
    #[must_use]
    pub fn new(start: HostTime) -> Self {
        Self::with_timebase(start, Timebase::NANOS)
    }

    /// Creates a clock reading `start` in the given timebase.
    #[must_use]
    pub fn with_timebase(start: HostTime, timebase: Timebase) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
            timebase,
        }
    }

    /// Moves the clock to `t`. Time never goes backwards; earlier values
    /// are ignored.
    pub fn set(&self, t: HostTime) {
        self.now.set(self.now.get().max(t));
    }

    /// Moves the clock forward by `d`.
    pub fn advance(&self, d: Duration) {
        self.now.set(self.now.get().saturating_add(d));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(HostTime(0))
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> HostTime {
        self.now.get()
    }

    fn timebase(&self) -> Timebase {
        self.timebase
    }
}
