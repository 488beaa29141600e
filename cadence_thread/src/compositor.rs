// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositor-thread run loop.
//!
//! [`CompositorLoop`] owns the [`Scheduler`] and multiplexes three inputs
//! onto it: producer events from the [`Mailbox`], ticks from the
//! [`Ticker`], and expiry of the posted deadline or poll. It never blocks on
//! another thread's work; between inputs it sleeps until the earliest timer.
//!
//! ```text
//!   MainThreadHandle ──► Mailbox ──┐
//!   Ticker ──► TickQueue ──────────┼──► select ──► Scheduler ──► client
//!   deadline / poll timer ─────────┘                  │
//!          ▲                                          │
//!          └──── pending_deadline() / pending_poll() ◄┘
//! ```

use crossbeam_channel::{Receiver, after, never, select, unbounded};

use cadence_core::begin_frame::{BeginFrameArgs, DeadlineToken};
use cadence_core::client::SchedulerClient;
use cadence_core::scheduler::Scheduler;
use cadence_core::settings::SchedulerSettings;
use cadence_core::time::{Duration, HostTime};
use cadence_core::trace::TraceSink;

use crate::error::LoopError;
use crate::mailbox::{Mailbox, Message};
use crate::queue::TickQueue;
use crate::ticker::Ticker;
use crate::time::{self, MonotonicClock};

/// Runtime knobs for a [`CompositorLoop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositorConfig {
    /// Period of the synthetic BeginFrame source.
    pub interval: Duration,
    /// Ticks kept when the loop falls behind; older ones are dropped.
    pub tick_queue_capacity: usize,
    /// Undelivered messages a [`Mailbox`] holds before posting fails.
    pub channel_capacity: usize,
}

impl CompositorConfig {
    /// 60 Hz ticks, one buffered tick, 256 buffered messages.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            interval: BeginFrameArgs::DEFAULT_INTERVAL,
            tick_queue_capacity: 1,
            channel_capacity: 256,
        }
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one [`CompositorLoop::run_once`] step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopStatus {
    /// More input is expected.
    Running,
    /// Shutdown was requested, or every handle was dropped.
    Shutdown,
}

/// Runs a [`Scheduler`] on the current thread.
pub struct CompositorLoop<C> {
    scheduler: Scheduler<C, MonotonicClock>,
    mailbox: Mailbox,
    ticks: Receiver<BeginFrameArgs>,
    tick_queue: TickQueue,
    ticker: Ticker,
    poll: Option<(DeadlineToken, HostTime)>,
    reported_dropped_ticks: u64,
}

impl<C> std::fmt::Debug for CompositorLoop<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositorLoop")
            .field("scheduler", &self.scheduler)
            .field("ticker", &self.ticker)
            .field("poll", &self.poll)
            .field("dropped_ticks", &self.tick_queue.dropped_count())
            .finish_non_exhaustive()
    }
}

impl<C: SchedulerClient> CompositorLoop<C> {
    /// Creates a loop around a new scheduler and spawns its ticker.
    ///
    /// # Errors
    ///
    /// Returns [`LoopError::TickerSpawn`] if the ticker thread cannot start.
    pub fn new(
        settings: SchedulerSettings,
        client: C,
        mailbox: Mailbox,
        config: CompositorConfig,
    ) -> Result<Self, LoopError> {
        let (tick_sender, ticks) = unbounded();
        let ticker = Ticker::spawn(config.interval, tick_sender)?;
        Ok(Self {
            scheduler: Scheduler::new(settings, client, MonotonicClock),
            mailbox,
            ticks,
            tick_queue: TickQueue::with_capacity(config.tick_queue_capacity),
            ticker,
            poll: None,
            reported_dropped_ticks: 0,
        })
    }

    /// Installs a trace sink on the scheduler.
    #[must_use]
    pub fn with_trace_sink(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.scheduler.set_trace_sink(Some(sink));
        self
    }

    /// The scheduler driven by this loop.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<C, MonotonicClock> {
        &self.scheduler
    }

    /// Mutable access to the scheduler, for events raised on this thread.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler<C, MonotonicClock> {
        &mut self.scheduler
    }

    /// Runs until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`LoopError::TickerStopped`] if the ticker thread dies.
    pub fn run(&mut self) -> Result<(), LoopError> {
        while self.run_once()? == LoopStatus::Running {}
        Ok(())
    }

    /// Handles due timers, then waits for and handles one input.
    ///
    /// # Errors
    ///
    /// As for [`run`](Self::run).
    pub fn run_once(&mut self) -> Result<LoopStatus, LoopError> {
        self.sync_with_scheduler();
        if self.fire_due_timers() {
            self.sync_with_scheduler();
        }

        let timer = match self.next_wakeup() {
            Some(at) => after(time::until(at)),
            None => never(),
        };

        select! {
            recv(self.mailbox.receiver) -> message => match message {
                Ok(Message::Event(event)) => event.apply(&mut self.scheduler),
                Ok(Message::Shutdown) => {
                    log::debug!("compositor loop shutting down");
                    return Ok(LoopStatus::Shutdown);
                }
                Err(_) => {
                    log::warn!("every main-thread handle was dropped; stopping compositor loop");
                    return Ok(LoopStatus::Shutdown);
                }
            },
            recv(self.ticks) -> args => match args {
                Ok(args) => self.deliver_ticks(args),
                Err(_) => return Err(LoopError::TickerStopped),
            },
            recv(timer) -> _ => {
                self.fire_due_timers();
            },
        }
        Ok(LoopStatus::Running)
    }

    /// Mirrors the scheduler's requests onto the ticker and the poll timer.
    fn sync_with_scheduler(&mut self) {
        self.ticker.set_enabled(self.scheduler.needs_begin_frame());

        match self.scheduler.pending_poll() {
            None => self.poll = None,
            Some(token) if self.poll.is_some_and(|(t, _)| t == token) => {}
            Some(token) => {
                let args = self.scheduler.last_begin_frame_args();
                let delay = if args.has_interval() {
                    args.interval
                } else {
                    BeginFrameArgs::DEFAULT_INTERVAL
                };
                self.poll = Some((token, time::now().saturating_add(delay)));
            }
        }
    }

    fn next_wakeup(&self) -> Option<HostTime> {
        let now = time::now();
        let deadline = self
            .scheduler
            .pending_deadline()
            .map(|request| request.target.resolve(now));
        let poll = self.poll.map(|(_, at)| at);
        match (deadline, poll) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Runs the deadline and poll if their time has come. Returns `true` if
    /// either ran.
    fn fire_due_timers(&mut self) -> bool {
        let now = time::now();
        let mut fired = false;
        if let Some(request) = self.scheduler.pending_deadline()
            && request.target.resolve(now) <= now
        {
            fired |= self.scheduler.on_begin_frame_deadline(request.token);
        }
        if let Some((token, at)) = self.poll
            && at <= now
        {
            self.poll = None;
            fired |= self.scheduler.poll_for_anticipated_draw_triggers(token);
        }
        fired
    }

    fn deliver_ticks(&mut self, first: BeginFrameArgs) {
        self.tick_queue.push(first);
        for args in self.ticks.try_iter() {
            self.tick_queue.push(args);
        }

        let dropped = self.tick_queue.dropped_count();
        if dropped > self.reported_dropped_ticks {
            log::debug!(
                "compositor fell behind; dropped {} stale ticks",
                dropped - self.reported_dropped_ticks
            );
            self.reported_dropped_ticks = dropped;
        }

        while let Some(args) = self.tick_queue.pop() {
            self.scheduler.begin_frame(args);
        }
    }
}
