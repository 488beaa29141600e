// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as tagged little-endian records. [`decode`] reads them back as an
//! iterator of [`RecordedEvent`]. Decoding stops at the first unknown tag or
//! truncated record.

use cadence_core::begin_frame::{DeadlineTarget, DeadlineToken};
use cadence_core::client::DrawResult;
use cadence_core::state::{Action, BeginFrameState};
use cadence_core::time::{Duration, HostTime};
use cadence_core::trace::{
    ActionEvent, BeginFrameEvent, DeadlineEvent, DeadlinePostedEvent, DeadlineReason,
    DrawResultEvent, NeedsBeginFrameEvent, OutputSurfaceEvent, OutputSurfaceEventKind, TraceSink,
};

const TAG_BEGIN_FRAME: u8 = 1;
const TAG_ACTION: u8 = 2;
const TAG_DEADLINE_POSTED: u8 = 3;
const TAG_DEADLINE: u8 = 4;
const TAG_NEEDS_BEGIN_FRAME: u8 = 5;
const TAG_DRAW_RESULT: u8 = 6;
const TAG_OUTPUT_SURFACE: u8 = 7;

const DRAW_FLAG_DID_DRAW: u8 = 1 << 0;
const DRAW_FLAG_DID_SWAP: u8 = 1 << 1;
const DRAW_FLAG_DID_READBACK: u8 = 1 << 2;

fn begin_frame_state_code(state: BeginFrameState) -> u8 {
    match state {
        BeginFrameState::Idle => 0,
        BeginFrameState::FrameStarting => 1,
        BeginFrameState::InsideFrame => 2,
        BeginFrameState::InsideDeadline => 3,
    }
}

fn begin_frame_state_from_code(code: u8) -> Option<BeginFrameState> {
    Some(match code {
        0 => BeginFrameState::Idle,
        1 => BeginFrameState::FrameStarting,
        2 => BeginFrameState::InsideFrame,
        3 => BeginFrameState::InsideDeadline,
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_time(&mut self, t: HostTime) {
        self.write_u64(t.ticks());
    }
}

impl TraceSink for RecorderSink {
    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        self.write_u8(TAG_BEGIN_FRAME);
        self.write_u64(e.frame_number);
        self.write_time(e.frame_time);
        self.write_time(e.deadline);
        self.write_u64(e.interval.ticks());
        self.write_u8(u8::from(e.skip_begin_main_frame));
    }

    fn on_action(&mut self, e: &ActionEvent) {
        self.write_u8(TAG_ACTION);
        self.write_u64(e.frame_number);
        self.write_u8(e.action.code());
        self.write_u8(begin_frame_state_code(e.begin_frame_state));
        self.write_time(e.timestamp);
    }

    fn on_deadline_posted(&mut self, e: &DeadlinePostedEvent) {
        self.write_u8(TAG_DEADLINE_POSTED);
        self.write_u64(e.frame_number);
        self.write_u64(e.token.0);
        match e.target {
            DeadlineTarget::Immediate => {
                self.write_u8(0);
                self.write_u64(0);
            }
            DeadlineTarget::At(t) => {
                self.write_u8(1);
                self.write_time(t);
            }
        }
        self.write_u8(e.reason.code());
        self.write_time(e.timestamp);
    }

    fn on_deadline(&mut self, e: &DeadlineEvent) {
        self.write_u8(TAG_DEADLINE);
        self.write_u64(e.frame_number);
        self.write_u64(e.token.0);
        self.write_time(e.timestamp);
    }

    fn on_needs_begin_frame(&mut self, e: &NeedsBeginFrameEvent) {
        self.write_u8(TAG_NEEDS_BEGIN_FRAME);
        self.write_u8(u8::from(e.needs));
        self.write_time(e.timestamp);
    }

    fn on_draw_result(&mut self, e: &DrawResultEvent) {
        self.write_u8(TAG_DRAW_RESULT);
        self.write_u64(e.frame_number);
        self.write_u8(e.action.code());
        let mut flags = 0;
        if e.result.did_draw {
            flags |= DRAW_FLAG_DID_DRAW;
        }
        if e.result.did_swap {
            flags |= DRAW_FLAG_DID_SWAP;
        }
        if e.result.did_readback {
            flags |= DRAW_FLAG_DID_READBACK;
        }
        self.write_u8(flags);
        self.write_time(e.timestamp);
    }

    fn on_output_surface(&mut self, e: &OutputSurfaceEvent) {
        self.write_u8(TAG_OUTPUT_SURFACE);
        self.write_u8(match e.kind {
            OutputSurfaceEventKind::Lost => 0,
            OutputSurfaceEventKind::Initialized => 1,
        });
        self.write_time(e.timestamp);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// A [`BeginFrameEvent`].
    BeginFrame(BeginFrameEvent),
    /// An [`ActionEvent`].
    Action(ActionEvent),
    /// A [`DeadlinePostedEvent`].
    DeadlinePosted(DeadlinePostedEvent),
    /// A [`DeadlineEvent`].
    Deadline(DeadlineEvent),
    /// A [`NeedsBeginFrameEvent`].
    NeedsBeginFrame(NeedsBeginFrameEvent),
    /// A [`DrawResultEvent`].
    DrawResult(DrawResultEvent),
    /// An [`OutputSurfaceEvent`].
    OutputSurface(OutputSurfaceEvent),
}

impl RecordedEvent {
    /// Time the event was reported at (the frame time for ticks).
    #[must_use]
    pub fn timestamp(&self) -> HostTime {
        match self {
            Self::BeginFrame(e) => e.frame_time,
            Self::Action(e) => e.timestamp,
            Self::DeadlinePosted(e) => e.timestamp,
            Self::Deadline(e) => e.timestamp,
            Self::NeedsBeginFrame(e) => e.timestamp,
            Self::DrawResult(e) => e.timestamp,
            Self::OutputSurface(e) => e.timestamp,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn read_u8(&mut self) -> Option<u8> {
        let v = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        let bytes = self.data.get(self.pos..self.pos + 8)?;
        let v = u64::from_le_bytes(bytes.try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_action(&mut self) -> Option<Action> {
        Action::from_code(self.read_u8()?)
    }

    fn decode_begin_frame(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::BeginFrame(BeginFrameEvent {
            frame_number: self.read_u64()?,
            frame_time: self.read_time()?,
            deadline: self.read_time()?,
            interval: Duration(self.read_u64()?),
            skip_begin_main_frame: self.read_u8()? != 0,
        }))
    }

    fn decode_action(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Action(ActionEvent {
            frame_number: self.read_u64()?,
            action: self.read_action()?,
            begin_frame_state: begin_frame_state_from_code(self.read_u8()?)?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_deadline_posted(&mut self) -> Option<RecordedEvent> {
        let frame_number = self.read_u64()?;
        let token = DeadlineToken(self.read_u64()?);
        let immediate = self.read_u8()? == 0;
        let at = self.read_time()?;
        let target = if immediate {
            DeadlineTarget::Immediate
        } else {
            DeadlineTarget::At(at)
        };
        Some(RecordedEvent::DeadlinePosted(DeadlinePostedEvent {
            frame_number,
            token,
            target,
            reason: DeadlineReason::from_code(self.read_u8()?)?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_deadline(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Deadline(DeadlineEvent {
            frame_number: self.read_u64()?,
            token: DeadlineToken(self.read_u64()?),
            timestamp: self.read_time()?,
        }))
    }

    fn decode_needs_begin_frame(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::NeedsBeginFrame(NeedsBeginFrameEvent {
            needs: self.read_u8()? != 0,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_draw_result(&mut self) -> Option<RecordedEvent> {
        let frame_number = self.read_u64()?;
        let action = self.read_action()?;
        let flags = self.read_u8()?;
        Some(RecordedEvent::DrawResult(DrawResultEvent {
            frame_number,
            action,
            result: DrawResult {
                did_draw: flags & DRAW_FLAG_DID_DRAW != 0,
                did_swap: flags & DRAW_FLAG_DID_SWAP != 0,
                did_readback: flags & DRAW_FLAG_DID_READBACK != 0,
            },
            timestamp: self.read_time()?,
        }))
    }

    fn decode_output_surface(&mut self) -> Option<RecordedEvent> {
        let kind = match self.read_u8()? {
            0 => OutputSurfaceEventKind::Lost,
            1 => OutputSurfaceEventKind::Initialized,
            _ => return None,
        };
        Some(RecordedEvent::OutputSurface(OutputSurfaceEvent {
            kind,
            timestamp: self.read_time()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_BEGIN_FRAME => self.decode_begin_frame(),
            TAG_ACTION => self.decode_action(),
            TAG_DEADLINE_POSTED => self.decode_deadline_posted(),
            TAG_DEADLINE => self.decode_deadline(),
            TAG_NEEDS_BEGIN_FRAME => self.decode_needs_begin_frame(),
            TAG_DRAW_RESULT => self.decode_draw_result(),
            TAG_OUTPUT_SURFACE => self.decode_output_surface(),
            _ => None,
        }
    }
}
