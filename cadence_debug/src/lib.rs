// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pretty-printing, recording, Chrome trace export and JSON snapshots for
//! cadence diagnostics.
//!
//! This crate provides [`TraceSink`](cadence_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from recorded
//!   bytes.
//! - [`snapshot::to_json`]: renders a
//!   [`SchedulerSnapshot`](cadence_core::snapshot::SchedulerSnapshot) as JSON.

pub mod chrome;
pub mod pretty;
pub mod recorder;
pub mod snapshot;
