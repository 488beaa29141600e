// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Threaded runtime for `cadence_core`.
//!
//! The core scheduler is single-threaded and never reads a clock. This crate
//! supplies what a real compositor thread needs around it:
//!
//! - [`MonotonicClock`]: `CLOCK_MONOTONIC` as a
//!   [`TimeSource`](cadence_core::client::TimeSource).
//! - [`Ticker`]: a synthetic BeginFrame source thread, enabled and disabled
//!   by the scheduler's BeginFrame subscription.
//! - [`MainThreadHandle`] / [`Mailbox`]: the message boundary producers post
//!   scheduler events through.
//! - [`CompositorLoop`]: owns the scheduler, waits on events, ticks and the
//!   posted deadline, and dispatches each to the scheduler.
//!
//! ```no_run
//! use cadence_core::settings::SchedulerSettings;
//! use cadence_thread::{CompositorConfig, CompositorLoop, MainThreadEvent, mailbox};
//! # fn run<C: cadence_core::client::SchedulerClient>(client: C) -> Result<(), cadence_thread::LoopError> {
//! let config = CompositorConfig::default();
//! let (handle, mailbox) = mailbox(config.channel_capacity);
//! let mut compositor = CompositorLoop::new(SchedulerSettings::threaded(), client, mailbox, config)?;
//! handle.post(MainThreadEvent::SetCanStart)?;
//! handle.post(MainThreadEvent::SetVisible(true))?;
//! handle.post(MainThreadEvent::SetCanDraw(true))?;
//! compositor.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! Operational problems (dropped handles, stale ticks, a panicking ticker)
//! are reported through the [`log`] facade.

mod compositor;
mod error;
mod mailbox;
mod queue;
mod ticker;
mod time;

pub use compositor::{CompositorConfig, CompositorLoop, LoopStatus};
pub use error::LoopError;
pub use mailbox::{Mailbox, MainThreadEvent, MainThreadHandle, mailbox};
pub use ticker::Ticker;
pub use time::{MonotonicClock, now, timebase, to_std, until};
