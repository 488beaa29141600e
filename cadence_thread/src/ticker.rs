// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Synthetic BeginFrame source.
//!
//! [`Ticker`] owns a thread that emits [`BeginFrameArgs`] on a fixed phase
//! while enabled. It parks while disabled, so an idle compositor costs no
//! wakeups. Frame times stay aligned to the phase the ticker started with,
//! so re-enabling does not shift the cadence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use cadence_core::begin_frame::BeginFrameArgs;
use cadence_core::time::{Duration, HostTime};

use crate::error::LoopError;
use crate::time;

#[derive(Debug, Default)]
struct Shared {
    enabled: AtomicBool,
    shutdown: AtomicBool,
}

/// Handle to the ticker thread. Dropping it stops and joins the thread.
#[derive(Debug)]
pub struct Ticker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl Ticker {
    /// Spawns a disabled ticker that will send one tick per `interval` to
    /// `sender` once enabled.
    ///
    /// # Errors
    ///
    /// Returns [`LoopError::TickerSpawn`] if the OS refuses the thread.
    pub fn spawn(interval: Duration, sender: Sender<BeginFrameArgs>) -> Result<Self, LoopError> {
        let interval = if interval.is_zero() {
            BeginFrameArgs::DEFAULT_INTERVAL
        } else {
            interval
        };
        let shared = Arc::new(Shared::default());
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("cadence-ticker".into())
            .spawn(move || run(&thread_shared, interval, &sender))
            .map_err(LoopError::TickerSpawn)?;
        Ok(Self {
            shared,
            handle: Some(handle),
            interval,
        })
    }

    /// Starts or stops tick delivery.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.shared.enabled.swap(enabled, Ordering::AcqRel);
        if enabled && !was {
            self.wake();
        }
    }

    /// Returns `true` while ticks are being delivered.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// The tick period.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn wake(&self) {
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.wake();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::warn!("BeginFrame ticker thread panicked");
        }
    }
}

fn run(shared: &Shared, interval: Duration, sender: &Sender<BeginFrameArgs>) {
    let phase = time::now();
    let mut next = phase;
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        if !shared.enabled.load(Ordering::Acquire) {
            thread::park();
            next = next_tick_at_or_after(phase, interval, time::now());
            continue;
        }

        let wait = time::until(next);
        if !wait.is_zero() {
            // Re-check the flags after every wakeup, spurious or not.
            thread::park_timeout(wait);
            continue;
        }

        if sender.send(BeginFrameArgs::from_interval(next, interval)).is_err() {
            log::debug!("tick receiver dropped; ticker exiting");
            break;
        }
        // Ticks missed while the thread was descheduled are skipped.
        let earliest = next.saturating_add(interval).max(time::now());
        next = next_tick_at_or_after(phase, interval, earliest);
    }
}

/// First phase-aligned frame time at or after `now`.
fn next_tick_at_or_after(phase: HostTime, interval: Duration, now: HostTime) -> HostTime {
    if now <= phase {
        return phase;
    }
    let elapsed = now.saturating_duration_since(phase);
    let mut intervals = elapsed.whole_intervals(interval);
    if interval.saturating_mul(intervals) < elapsed {
        intervals += 1;
    }
    phase.saturating_add(interval.saturating_mul(intervals))
}
