// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Each tick becomes a complete (`X`) slice from its frame time to its
//! deadline, actions and deadlines are instant events on the compositor
//! track, and the BeginFrame subscription is a counter.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use cadence_core::begin_frame::DeadlineTarget;
use cadence_core::time::Timebase;

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
///
/// # Errors
///
/// Returns any error from writing to `writer`.
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let us = |ticks: u64| timebase.ticks_to_nanos(ticks) as f64 / 1000.0;
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::BeginFrame(e) => {
                let start = e.frame_time.ticks();
                events.push(json!({
                    "ph": "X",
                    "name": "BeginFrame",
                    "cat": "Scheduler",
                    "ts": us(start),
                    "dur": us(e.deadline.ticks().saturating_sub(start)),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_number": e.frame_number,
                        "interval_us": us(e.interval.ticks()),
                        "skip_begin_main_frame": e.skip_begin_main_frame,
                    }
                }));
            }
            RecordedEvent::Action(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": e.action.as_str(),
                    "cat": "Action",
                    "ts": us(e.timestamp.ticks()),
                    "pid": 0,
                    "tid": 1,
                    "s": "t",
                    "args": {
                        "frame_number": e.frame_number,
                        "begin_frame_state": e.begin_frame_state.as_str(),
                    }
                }));
            }
            RecordedEvent::DeadlinePosted(e) => {
                let target = match e.target {
                    DeadlineTarget::Immediate => Value::from("immediate"),
                    DeadlineTarget::At(t) => Value::from(us(t.ticks())),
                };
                events.push(json!({
                    "ph": "i",
                    "name": "DeadlinePosted",
                    "cat": "Deadline",
                    "ts": us(e.timestamp.ticks()),
                    "pid": 0,
                    "tid": 1,
                    "s": "t",
                    "args": {
                        "frame_number": e.frame_number,
                        "token": e.token.0,
                        "target_us": target,
                        "reason": e.reason.as_str(),
                    }
                }));
            }
            RecordedEvent::Deadline(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Deadline",
                    "cat": "Deadline",
                    "ts": us(e.timestamp.ticks()),
                    "pid": 0,
                    "tid": 1,
                    "s": "t",
                    "args": {
                        "frame_number": e.frame_number,
                        "token": e.token.0,
                    }
                }));
            }
            RecordedEvent::NeedsBeginFrame(e) => {
                events.push(json!({
                    "ph": "C",
                    "name": "NeedsBeginFrame",
                    "cat": "Scheduler",
                    "ts": us(e.timestamp.ticks()),
                    "pid": 0,
                    "args": {
                        "needs": u8::from(e.needs),
                    }
                }));
            }
            RecordedEvent::DrawResult(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "DrawResult",
                    "cat": "Draw",
                    "ts": us(e.timestamp.ticks()),
                    "pid": 0,
                    "tid": 1,
                    "s": "t",
                    "args": {
                        "frame_number": e.frame_number,
                        "action": e.action.as_str(),
                        "did_draw": e.result.did_draw,
                        "did_swap": e.result.did_swap,
                        "did_readback": e.result.did_readback,
                    }
                }));
            }
            RecordedEvent::OutputSurface(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "OutputSurface",
                    "cat": "Surface",
                    "ts": us(e.timestamp.ticks()),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "kind": e.kind.as_str(),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}
