// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! BeginFrame-driven scheduling for two-thread compositors.
//!
//! `cadence_core` decides, tick by tick, when a compositor should ask its
//! producer (main) thread for a new frame, commit it, activate it, draw it,
//! read pixels back, and recreate a lost output surface. It is `no_std`
//! compatible (with `alloc`), never reads a clock on its own, and never
//! blocks: time comes in through [`TimeSource`](client::TimeSource) and every
//! action goes out through [`SchedulerClient`](client::SchedulerClient).
//!
//! # Architecture
//!
//! ```text
//!   BeginFrame tick ──► Scheduler::begin_frame() ──► post deadline
//!                            │                           │
//!                            ▼                           ▼
//!                  StateMachine::next_action()   on_begin_frame_deadline()
//!                            │                           │
//!                            ▼                           │
//!                  SchedulerClient::<action>() ◄─────────┘
//!                            │
//!                            ▼
//!   producer events (finish_commit, set_needs_commit, ...) ──► Scheduler
//! ```
//!
//! **[`state_machine`]**: the pure decision engine. Six sub-states, per-tick
//! counters and flags; `next_action` picks the highest-priority action and
//! `update_state` records that it happened.
//!
//! **[`scheduler`]**: the driver. Feeds ticks and events into the state
//! machine, drains its actions into the client, posts deadlines and polls,
//! and manages the BeginFrame subscription.
//!
//! **[`state`]**: the sub-state enums and the [`Action`](state::Action) set.
//!
//! **[`settings`]**: construction-time policy knobs.
//!
//! **[`begin_frame`]**: tick arguments and deadline requests.
//!
//! **[`client`]**: the embedder seams and draw results.
//!
//! **[`estimate`]**: smoothed duration estimates for the deadline
//! heuristics.
//!
//! **[`time`]**: monotonic host ticks and durations.
//!
//! **[`snapshot`]**: plain-value state captures for diagnostics.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) and event types for
//! scheduler instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies
//!   (`std::error::Error` for [`InvariantViolation`]).
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod begin_frame;
pub mod client;
mod error;
pub mod estimate;
pub mod scheduler;
pub mod settings;
pub mod snapshot;
pub mod state;
pub mod state_machine;
pub mod time;
pub mod trace;

pub use error::InvariantViolation;
