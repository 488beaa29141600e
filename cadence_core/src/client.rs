// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The seams between the scheduler and its embedder.
//!
//! [`SchedulerClient`] performs the work behind each
//! [`Action`](crate::state::Action) and supplies the timing primitives and
//! duration estimates. [`TimeSource`] is the injected clock.
//!
//! Timing primitives have no-op defaults: an embedder that polls
//! [`Scheduler::pending_deadline`](crate::scheduler::Scheduler::pending_deadline)
//! and [`Scheduler::needs_begin_frame`](crate::scheduler::Scheduler::needs_begin_frame)
//! instead of receiving callbacks only has to implement the actions and
//! estimates.

use crate::begin_frame::{DeadlineRequest, DeadlineToken};
use crate::time::{Duration, HostTime, Timebase};

/// Outcome of one of the draw actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct DrawResult {
    /// Something was drawn.
    pub did_draw: bool,
    /// The drawn frame was swapped to the display.
    pub did_swap: bool,
    /// Pixels were read back for the producer.
    pub did_readback: bool,
}

impl DrawResult {
    /// A draw that reached the display.
    pub const SWAPPED: Self = Self {
        did_draw: true,
        did_swap: true,
        did_readback: false,
    };

    /// A draw that could not complete (e.g. checkerboarding on an animation).
    pub const FAILED: Self = Self {
        did_draw: false,
        did_swap: false,
        did_readback: false,
    };

    /// A completed readback. Readbacks never swap.
    pub const READ_BACK: Self = Self {
        did_draw: true,
        did_swap: false,
        did_readback: true,
    };
}

/// Performs scheduled actions on behalf of the
/// [`Scheduler`](crate::scheduler::Scheduler).
///
/// Action methods are called at most once per action the state machine
/// emits, in emission order. None of them may call back into the scheduler;
/// results flow back through return values and the scheduler's setters.
pub trait SchedulerClient {
    /// Ask the producer thread to start a new frame.
    fn send_begin_main_frame(&mut self);

    /// Draw and swap if the content allows it. Report `did_draw = false` on
    /// failure (e.g. missing tiles during an animation).
    fn draw_and_swap_if_possible(&mut self) -> DrawResult;

    /// Draw and swap regardless of content completeness.
    fn draw_and_swap_forced(&mut self) -> DrawResult;

    /// Draw and read the pixels back for the producer.
    fn draw_and_readback(&mut self) -> DrawResult;

    /// Move the producer's finished frame to the consumer.
    fn commit(&mut self);

    /// Re-check tiles that were missing at the last swap.
    fn update_visible_tiles(&mut self);

    /// Promote the pending tree to active.
    fn activate_pending_tree(&mut self);

    /// Start creating a new output surface. Completion is reported through
    /// `did_create_and_initialize_output_surface`.
    fn begin_output_surface_creation(&mut self);

    /// Hand the texture token to the producer thread.
    fn acquire_layer_textures_for_main_thread(&mut self);

    /// Reprioritize tile work.
    fn manage_tiles(&mut self);

    /// Start or stop delivering BeginFrame ticks.
    fn set_needs_begin_frame(&mut self, enable: bool) {
        _ = enable;
    }

    /// Run `on_begin_frame_deadline(request.token)` at `request.target`.
    /// A newer request replaces any earlier one.
    fn post_begin_frame_deadline(&mut self, request: DeadlineRequest) {
        _ = request;
    }

    /// Run `poll_for_anticipated_draw_triggers(token)` after `delay`.
    fn post_poll_for_anticipated_draw_triggers(&mut self, token: DeadlineToken, delay: Duration) {
        _ = (token, delay);
    }

    /// The deadline for the current tick finished running.
    fn did_begin_frame_deadline(&mut self) {}

    /// The predicted next draw time changed (or ticks stopped: `None`).
    fn did_anticipated_draw_time_change(&mut self, time: Option<HostTime>) {
        _ = time;
    }

    /// Expected time from deadline to swap.
    fn draw_duration_estimate(&self) -> Duration;

    /// Expected time from begin-main-frame to the producer finishing.
    fn begin_main_frame_to_commit_duration_estimate(&self) -> Duration;

    /// Expected time from commit to activation.
    fn commit_to_activate_duration_estimate(&self) -> Duration;
}

/// A monotonic clock.
pub trait TimeSource {
    /// Current time.
    fn now(&self) -> HostTime;

    /// Tick-to-nanosecond conversion for diagnostics.
    fn timebase(&self) -> Timebase {
        Timebase::NANOS
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> HostTime {
        (**self).now()
    }

    fn timebase(&self) -> Timebase {
        (**self).timebase()
    }
}
