// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to microseconds using a [`Timebase`].

use std::io::Write;

use cadence_core::begin_frame::DeadlineTarget;
use cadence_core::time::{HostTime, Timebase};
use cadence_core::trace::{
    ActionEvent, BeginFrameEvent, DeadlineEvent, DeadlinePostedEvent, DrawResultEvent,
    NeedsBeginFrameEvent, OutputSurfaceEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn ticks_to_us(&self, ticks: u64) -> f64 {
        self.timebase.ticks_to_nanos(ticks) as f64 / 1000.0
    }

    fn host_us(&self, t: HostTime) -> f64 {
        self.ticks_to_us(t.ticks())
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        let _ = writeln!(
            self.writer,
            "[begin_frame] frame={} time={:.1}µs deadline={:.1}µs interval={:.1}µs{}",
            e.frame_number,
            self.host_us(e.frame_time),
            self.host_us(e.deadline),
            self.ticks_to_us(e.interval.ticks()),
            if e.skip_begin_main_frame {
                " skip_main_frame"
            } else {
                ""
            },
        );
    }

    fn on_action(&mut self, e: &ActionEvent) {
        let _ = writeln!(
            self.writer,
            "[action] frame={} {} in {} at {:.1}µs",
            e.frame_number,
            e.action.as_str(),
            e.begin_frame_state.as_str(),
            self.host_us(e.timestamp),
        );
    }

    fn on_deadline_posted(&mut self, e: &DeadlinePostedEvent) {
        let target = match e.target {
            DeadlineTarget::Immediate => "now".to_owned(),
            DeadlineTarget::At(t) => format!("{:.1}µs", self.host_us(t)),
        };
        let _ = writeln!(
            self.writer,
            "[deadline:post] frame={} token={} at={target} reason={}",
            e.frame_number,
            e.token.0,
            e.reason.as_str(),
        );
    }

    fn on_deadline(&mut self, e: &DeadlineEvent) {
        let _ = writeln!(
            self.writer,
            "[deadline] frame={} token={} at {:.1}µs",
            e.frame_number,
            e.token.0,
            self.host_us(e.timestamp),
        );
    }

    fn on_needs_begin_frame(&mut self, e: &NeedsBeginFrameEvent) {
        let _ = writeln!(
            self.writer,
            "[needs_begin_frame] {} at {:.1}µs",
            if e.needs { "on" } else { "off" },
            self.host_us(e.timestamp),
        );
    }

    fn on_draw_result(&mut self, e: &DrawResultEvent) {
        let outcome = if e.result.did_readback {
            "READBACK"
        } else if e.result.did_swap {
            "swapped"
        } else if e.result.did_draw {
            "drawn"
        } else {
            "FAILED"
        };
        let _ = writeln!(
            self.writer,
            "[draw] frame={} {} {outcome}",
            e.frame_number,
            e.action.as_str(),
        );
    }

    fn on_output_surface(&mut self, e: &OutputSurfaceEvent) {
        let _ = writeln!(
            self.writer,
            "[output_surface] {} at {:.1}µs",
            e.kind.as_str(),
            self.host_us(e.timestamp),
        );
    }
}
