// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostic snapshots.
//!
//! Snapshots are plain values copied out of the state machine and the
//! scheduler. They are meant for trace output and assertion messages, not for
//! driving behavior. `Display` renders a compact single line; the
//! `cadence_debug` crate renders them as JSON.

use core::fmt;

use crate::begin_frame::DeadlineRequest;
use crate::state::{
    Action, BeginFrameState, CommitState, ForcedRedrawState, OutputSurfaceState, ReadbackState,
    TextureState,
};
use crate::time::{Duration, HostTime, Timebase};

/// Every sub-state, counter and flag of a
/// [`StateMachine`](crate::state_machine::StateMachine).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateMachineSnapshot {
    /// What `next_action` returned at capture time.
    pub next_action: Action,
    /// Output surface lifecycle.
    pub output_surface_state: OutputSurfaceState,
    /// Position within the tick.
    pub begin_frame_state: BeginFrameState,
    /// Commit handoff.
    pub commit_state: CommitState,
    /// Texture token owner.
    pub texture_state: TextureState,
    /// Forced-redraw recovery.
    pub forced_redraw_state: ForcedRedrawState,
    /// Readback request.
    pub readback_state: ReadbackState,
    /// Commits so far.
    pub commit_count: u64,
    /// Tick counter.
    pub current_frame_number: u64,
    /// Tick of the last swap.
    pub last_frame_number_swap_performed: Option<u64>,
    /// Tick of the last begin-main-frame.
    pub last_frame_number_begin_main_frame_sent: Option<u64>,
    /// Tick of the last visible-tile update.
    pub last_frame_number_update_visible_tiles_was_called: Option<u64>,
    /// Tick of the last manage-tiles.
    pub last_frame_number_manage_tiles_called: Option<u64>,
    /// Consecutive failed draws.
    pub consecutive_failed_draws: u32,
    /// A redraw is requested.
    pub needs_redraw: bool,
    /// Tile management is requested.
    pub needs_manage_tiles: bool,
    /// The last swap showed incomplete tiles.
    pub swap_used_incomplete_tile: bool,
    /// A commit is requested.
    pub needs_commit: bool,
    /// The producer wants the texture token.
    pub producer_needs_textures: bool,
    /// Inside a poll for draw triggers.
    pub inside_poll_for_anticipated_draw_triggers: bool,
    /// Content is visible.
    pub visible: bool,
    /// Surface creation may start.
    pub can_start: bool,
    /// Drawing is possible.
    pub can_draw: bool,
    /// A pending tree exists.
    pub has_pending_tree: bool,
    /// The pending tree may activate.
    pub pending_tree_is_ready_for_activation: bool,
    /// The active tree is owed its first draw.
    pub active_tree_needs_first_draw: bool,
    /// The last draw-if-possible failed.
    pub draw_if_possible_failed: bool,
    /// At least one surface was ever initialized.
    pub did_create_and_initialize_first_output_surface: bool,
    /// Impl-thread smoothness wins over producer latency.
    pub smoothness_takes_priority: bool,
    /// The skip-begin-main-frame heuristic is engaged.
    pub skip_begin_main_frame_to_reduce_latency: bool,
}

impl fmt::Display for StateMachineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame={} next={} surface={} begin_frame={} commit={} texture={} forced={} readback={} \
             commits={} redraw={} commit_req={} pending={} ready={} first_draw={} visible={} can_draw={}",
            self.current_frame_number,
            self.next_action.as_str(),
            self.output_surface_state.as_str(),
            self.begin_frame_state.as_str(),
            self.commit_state.as_str(),
            self.texture_state.as_str(),
            self.forced_redraw_state.as_str(),
            self.readback_state.as_str(),
            self.commit_count,
            self.needs_redraw,
            self.needs_commit,
            self.has_pending_tree,
            self.pending_tree_is_ready_for_activation,
            self.active_tree_needs_first_draw,
            self.visible,
            self.can_draw,
        )
    }
}

/// Timing of the last BeginFrame relative to "now".
///
/// Relative fields are signed nanoseconds; a deadline already in the past
/// yields a negative `now_to_deadline`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingSnapshot {
    /// Capture time.
    pub now: HostTime,
    /// Frame time of the last tick.
    pub frame_time: HostTime,
    /// Draw-adjusted deadline of the last tick.
    pub deadline: HostTime,
    /// Interval of the last tick.
    pub interval: Duration,
    /// Interval in nanoseconds.
    pub interval_nanos: i64,
    /// `deadline - now` in nanoseconds.
    pub now_to_deadline_nanos: i64,
    /// `now - frame_time` in nanoseconds.
    pub frame_time_to_now_nanos: i64,
    /// `deadline - frame_time` in nanoseconds.
    pub frame_time_to_deadline_nanos: i64,
}

impl TimingSnapshot {
    /// Computes the relative fields from absolute times.
    #[must_use]
    pub fn new(
        now: HostTime,
        frame_time: HostTime,
        deadline: HostTime,
        interval: Duration,
        timebase: Timebase,
    ) -> Self {
        let nanos = |ticks: i64| -> i64 {
            let magnitude = timebase.ticks_to_nanos(ticks.unsigned_abs());
            let magnitude = i64::try_from(magnitude).unwrap_or(i64::MAX);
            if ticks < 0 { -magnitude } else { magnitude }
        };
        Self {
            now,
            frame_time,
            deadline,
            interval,
            interval_nanos: nanos(i64::try_from(interval.ticks()).unwrap_or(i64::MAX)),
            now_to_deadline_nanos: nanos(deadline.signed_ticks_since(now)),
            frame_time_to_now_nanos: nanos(now.signed_ticks_since(frame_time)),
            frame_time_to_deadline_nanos: nanos(deadline.signed_ticks_since(frame_time)),
        }
    }
}

/// A [`Scheduler`](crate::scheduler::Scheduler) snapshot: the state machine
/// plus the driver's timing and requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    /// State machine contents.
    pub state_machine: StateMachineSnapshot,
    /// Timing of the last tick.
    pub timing: TimingSnapshot,
    /// The deadline currently posted, if any.
    pub pending_deadline: Option<DeadlineRequest>,
    /// What the client was last told about BeginFrame ticks.
    pub needs_begin_frame: bool,
    /// Predicted time of the next draw, if ticks are flowing.
    pub anticipated_draw_time: Option<HostTime>,
}

impl fmt::Display for SchedulerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | needs_begin_frame={} deadline_in={}ns frame_age={}ns",
            self.state_machine,
            self.needs_begin_frame,
            self.timing.now_to_deadline_nanos,
            self.timing.frame_time_to_now_nanos,
        )?;
        if let Some(request) = self.pending_deadline {
            write!(f, " pending_deadline={:?}", request.target)?;
        }
        Ok(())
    }
}
