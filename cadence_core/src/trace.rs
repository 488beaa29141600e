// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing hooks for the scheduler.
//!
//! [`TraceSink`] has one method per scheduler event, all defaulting to
//! no-ops. The [`Scheduler`](crate::scheduler::Scheduler) owns an optional
//! boxed sink and emits events through a [`Tracer`].
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. With the `trace`
//! feature **off**, every `Tracer` method compiles to nothing. With it **on**,
//! each method costs one `Option` branch.
//!
//! To read a sink back after handing it to the scheduler, share it through
//! `Rc<RefCell<_>>`, which implements [`TraceSink`] by forwarding.

use alloc::rc::Rc;
use core::cell::RefCell;

use crate::begin_frame::{DeadlineTarget, DeadlineToken};
use crate::client::DrawResult;
use crate::state::{Action, BeginFrameState};
use crate::time::{Duration, HostTime};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why the deadline was posted where it was.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeadlineReason {
    /// Synchronous compositor: the deadline ran inside the tick.
    Synchronous,
    /// Deadline scheduling is disabled.
    SchedulingDisabled,
    /// A draw is ready and nothing else is expected this tick.
    Early,
    /// Impl-thread work wants to draw; wait until the tick's deadline.
    Deadline,
    /// Waiting for a new active tree; give it until the next tick.
    NextFrame,
}

impl DeadlineReason {
    /// Compact numeric code for binary trace records.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Synchronous => 0,
            Self::SchedulingDisabled => 1,
            Self::Early => 2,
            Self::Deadline => 3,
            Self::NextFrame => 4,
        }
    }

    /// Inverse of [`DeadlineReason::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Synchronous,
            1 => Self::SchedulingDisabled,
            2 => Self::Early,
            3 => Self::Deadline,
            4 => Self::NextFrame,
            _ => return None,
        })
    }

    /// Stable diagnostic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synchronous => "synchronous",
            Self::SchedulingDisabled => "scheduling_disabled",
            Self::Early => "early",
            Self::Deadline => "deadline",
            Self::NextFrame => "next_frame",
        }
    }
}

/// Output surface lifecycle transitions reported by the embedder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputSurfaceEventKind {
    /// The surface was lost.
    Lost,
    /// A new surface was created and initialized.
    Initialized,
}

impl OutputSurfaceEventKind {
    /// Stable diagnostic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lost => "lost",
            Self::Initialized => "initialized",
        }
    }
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a BeginFrame tick is accepted.
#[derive(Clone, Copy, Debug)]
pub struct BeginFrameEvent {
    /// Tick counter after the tick started.
    pub frame_number: u64,
    /// Frame time of the tick.
    pub frame_time: HostTime,
    /// Deadline after subtracting the draw estimate.
    pub deadline: HostTime,
    /// Tick interval.
    pub interval: Duration,
    /// Whether begin-main-frame is skipped this tick to reduce latency.
    pub skip_begin_main_frame: bool,
}

/// Emitted for every action dispatched to the client.
#[derive(Clone, Copy, Debug)]
pub struct ActionEvent {
    /// Tick counter.
    pub frame_number: u64,
    /// The action.
    pub action: Action,
    /// Tick phase at dispatch.
    pub begin_frame_state: BeginFrameState,
    /// Dispatch time.
    pub timestamp: HostTime,
}

/// Emitted when a deadline is posted.
#[derive(Clone, Copy, Debug)]
pub struct DeadlinePostedEvent {
    /// Tick counter.
    pub frame_number: u64,
    /// Token of the posted deadline.
    pub token: DeadlineToken,
    /// When it should fire.
    pub target: DeadlineTarget,
    /// Why it fires then.
    pub reason: DeadlineReason,
    /// Posting time.
    pub timestamp: HostTime,
}

/// Emitted when a deadline fires.
#[derive(Clone, Copy, Debug)]
pub struct DeadlineEvent {
    /// Tick counter.
    pub frame_number: u64,
    /// Token of the fired deadline.
    pub token: DeadlineToken,
    /// Firing time.
    pub timestamp: HostTime,
}

/// Emitted when the scheduler changes its BeginFrame subscription.
#[derive(Clone, Copy, Debug)]
pub struct NeedsBeginFrameEvent {
    /// Whether ticks are wanted.
    pub needs: bool,
    /// Change time.
    pub timestamp: HostTime,
}

/// Emitted after a draw action returns.
#[derive(Clone, Copy, Debug)]
pub struct DrawResultEvent {
    /// Tick counter.
    pub frame_number: u64,
    /// Which draw action.
    pub action: Action,
    /// What the client reported.
    pub result: DrawResult,
    /// Completion time.
    pub timestamp: HostTime,
}

/// Emitted on output surface loss and initialization.
#[derive(Clone, Copy, Debug)]
pub struct OutputSurfaceEvent {
    /// What happened.
    pub kind: OutputSurfaceEventKind,
    /// Report time.
    pub timestamp: HostTime,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives scheduler trace events.
///
/// All methods default to no-ops.
pub trait TraceSink {
    /// A tick was accepted.
    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        _ = e;
    }

    /// An action is being dispatched.
    fn on_action(&mut self, e: &ActionEvent) {
        _ = e;
    }

    /// A deadline was posted.
    fn on_deadline_posted(&mut self, e: &DeadlinePostedEvent) {
        _ = e;
    }

    /// A deadline fired.
    fn on_deadline(&mut self, e: &DeadlineEvent) {
        _ = e;
    }

    /// The BeginFrame subscription changed.
    fn on_needs_begin_frame(&mut self, e: &NeedsBeginFrameEvent) {
        _ = e;
    }

    /// A draw action returned.
    fn on_draw_result(&mut self, e: &DrawResultEvent) {
        _ = e;
    }

    /// The output surface was lost or initialized.
    fn on_output_surface(&mut self, e: &OutputSurfaceEvent) {
        _ = e;
    }
}

impl<S: TraceSink + ?Sized> TraceSink for Rc<RefCell<S>> {
    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        self.borrow_mut().on_begin_frame(e);
    }

    fn on_action(&mut self, e: &ActionEvent) {
        self.borrow_mut().on_action(e);
    }

    fn on_deadline_posted(&mut self, e: &DeadlinePostedEvent) {
        self.borrow_mut().on_deadline_posted(e);
    }

    fn on_deadline(&mut self, e: &DeadlineEvent) {
        self.borrow_mut().on_deadline(e);
    }

    fn on_needs_begin_frame(&mut self, e: &NeedsBeginFrameEvent) {
        self.borrow_mut().on_needs_begin_frame(e);
    }

    fn on_draw_result(&mut self, e: &DrawResultEvent) {
        self.borrow_mut().on_draw_result(e);
    }

    fn on_output_surface(&mut self, e: &OutputSurfaceEvent) {
        self.borrow_mut().on_output_surface(e);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! tracer_event {
    ($(#[$doc:meta])* $name:ident, $event:ty, $sink_method:ident) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, e: &$event) {
            #[cfg(feature = "trace")]
            if let Some(s) = &mut self.sink {
                s.$sink_method(e);
            }
            #[cfg(not(feature = "trace"))]
            {
                _ = e;
            }
        }
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    tracer_event!(
        /// Emits a [`BeginFrameEvent`].
        begin_frame, BeginFrameEvent, on_begin_frame
    );
    tracer_event!(
        /// Emits an [`ActionEvent`].
        action, ActionEvent, on_action
    );
    tracer_event!(
        /// Emits a [`DeadlinePostedEvent`].
        deadline_posted, DeadlinePostedEvent, on_deadline_posted
    );
    tracer_event!(
        /// Emits a [`DeadlineEvent`].
        deadline, DeadlineEvent, on_deadline
    );
    tracer_event!(
        /// Emits a [`NeedsBeginFrameEvent`].
        needs_begin_frame, NeedsBeginFrameEvent, on_needs_begin_frame
    );
    tracer_event!(
        /// Emits a [`DrawResultEvent`].
        draw_result, DrawResultEvent, on_draw_result
    );
    tracer_event!(
        /// Emits an [`OutputSurfaceEvent`].
        output_surface, OutputSurfaceEvent, on_output_surface
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_action() -> ActionEvent {
        ActionEvent {
            frame_number: 42,
            action: Action::Commit,
            begin_frame_state: BeginFrameState::FrameStarting,
            timestamp: HostTime(1_000),
        }
    }

    #[test]
    fn deadline_reason_codes_round_trip() {
        for code in 0..5 {
            let reason = DeadlineReason::from_code(code).expect("valid code");
            assert_eq!(reason.code(), code);
        }
        assert_eq!(DeadlineReason::from_code(5), None);
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let mut sink = NoopSink;
        sink.on_action(&sample_action());
        sink.on_needs_begin_frame(&NeedsBeginFrameEvent {
            needs: true,
            timestamp: HostTime(0),
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.action(&sample_action());
    }

    #[cfg(feature = "trace")]
    #[test]
    fn shared_sink_sees_forwarded_events() {
        use alloc::vec::Vec;

        #[derive(Default)]
        struct Actions(Vec<Action>);
        impl TraceSink for Actions {
            fn on_action(&mut self, e: &ActionEvent) {
                self.0.push(e.action);
            }
        }

        let shared = Rc::new(RefCell::new(Actions::default()));
        let mut handle = Rc::clone(&shared);
        let mut tracer = Tracer::new(&mut handle);
        tracer.action(&sample_action());
        drop(tracer);
        assert_eq!(shared.borrow().0, [Action::Commit]);
    }
}
