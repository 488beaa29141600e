// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host clock reads for the threaded runtime.

use rustix::time::{ClockId, Timespec, clock_gettime};

use cadence_core::client::TimeSource;
use cadence_core::time::{Duration, HostTime, Timebase};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// `CLOCK_MONOTONIC` as a [`TimeSource`]. Host ticks are nanoseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct MonotonicClock;

impl TimeSource for MonotonicClock {
    fn now(&self) -> HostTime {
        now()
    }

    fn timebase(&self) -> Timebase {
        timebase()
    }
}

/// Returns the runtime [`Timebase`]: host ticks are nanoseconds.
#[must_use]
pub const fn timebase() -> Timebase {
    Timebase::NANOS
}

/// Returns the current monotonic host time in nanoseconds.
#[must_use]
pub fn now() -> HostTime {
    timespec_to_host_time(clock_gettime(ClockId::Monotonic))
}

/// Converts a host-tick duration into a [`std::time::Duration`].
#[must_use]
pub fn to_std(duration: Duration) -> std::time::Duration {
    std::time::Duration::from_nanos(timebase().ticks_to_nanos(duration.ticks()))
}

/// Time left until `target`, zero if it has passed.
#[must_use]
pub fn until(target: HostTime) -> std::time::Duration {
    to_std(target.saturating_duration_since(now()))
}

fn timespec_to_host_time(timespec: Timespec) -> HostTime {
    let seconds = u64::try_from(timespec.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(timespec.tv_nsec)
        .unwrap_or(0)
        .min(999_999_999);

    let ticks = u128::from(seconds)
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(u128::from(nanos));
    HostTime(u64::try_from(ticks).unwrap_or(u64::MAX))
}
