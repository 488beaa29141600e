// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured JSON views of scheduler snapshots.
//!
//! The layout mirrors the nested dictionary Chromium's scheduler emits for
//! `about:tracing`: `major_state`, `major_timestamps_in_ms` and
//! `minor_state` groups under `state_machine`, plus the driver's own fields.

use serde_json::{Value, json};

use cadence_core::begin_frame::DeadlineTarget;
use cadence_core::snapshot::{SchedulerSnapshot, StateMachineSnapshot, TimingSnapshot};

fn opt_frame(n: Option<u64>) -> Value {
    n.map_or(Value::Null, Value::from)
}

/// Converts a state machine snapshot into a JSON object.
#[must_use]
pub fn state_machine_to_json(s: &StateMachineSnapshot) -> Value {
    json!({
        "major_state": {
            "next_action": s.next_action.as_str(),
            "begin_frame_state": s.begin_frame_state.as_str(),
            "commit_state": s.commit_state.as_str(),
            "texture_state": s.texture_state.as_str(),
            "output_surface_state": s.output_surface_state.as_str(),
            "forced_redraw_state": s.forced_redraw_state.as_str(),
            "readback_state": s.readback_state.as_str(),
        },
        "minor_state": {
            "commit_count": s.commit_count,
            "current_frame_number": s.current_frame_number,
            "last_frame_number_swap_performed": opt_frame(s.last_frame_number_swap_performed),
            "last_frame_number_begin_main_frame_sent":
                opt_frame(s.last_frame_number_begin_main_frame_sent),
            "last_frame_number_update_visible_tiles_was_called":
                opt_frame(s.last_frame_number_update_visible_tiles_was_called),
            "last_frame_number_manage_tiles_called":
                opt_frame(s.last_frame_number_manage_tiles_called),
            "consecutive_failed_draws": s.consecutive_failed_draws,
            "needs_redraw": s.needs_redraw,
            "needs_manage_tiles": s.needs_manage_tiles,
            "swap_used_incomplete_tile": s.swap_used_incomplete_tile,
            "needs_commit": s.needs_commit,
            "main_thread_needs_layer_textures": s.producer_needs_textures,
            "inside_poll_for_anticipated_draw_triggers":
                s.inside_poll_for_anticipated_draw_triggers,
            "visible": s.visible,
            "can_start": s.can_start,
            "can_draw": s.can_draw,
            "has_pending_tree": s.has_pending_tree,
            "pending_tree_is_ready_for_activation": s.pending_tree_is_ready_for_activation,
            "active_tree_needs_first_draw": s.active_tree_needs_first_draw,
            "draw_if_possible_failed": s.draw_if_possible_failed,
            "did_create_and_initialize_first_output_surface":
                s.did_create_and_initialize_first_output_surface,
            "smoothness_takes_priority": s.smoothness_takes_priority,
            "skip_begin_main_frame_to_reduce_latency": s.skip_begin_main_frame_to_reduce_latency,
        },
    })
}

fn nanos_to_ms(nanos: i64) -> f64 {
    nanos as f64 / 1_000_000.0
}

fn timing_to_json(t: &TimingSnapshot) -> Value {
    json!({
        "now_to_deadline": nanos_to_ms(t.now_to_deadline_nanos),
        "frame_time_to_now": nanos_to_ms(t.frame_time_to_now_nanos),
        "frame_time_to_deadline": nanos_to_ms(t.frame_time_to_deadline_nanos),
        "interval": nanos_to_ms(t.interval_nanos),
    })
}

/// Converts a full scheduler snapshot into a JSON object.
///
/// Durations are reported in fractional milliseconds. Absolute host times
/// are reported as raw ticks, since their epoch is platform-defined.
#[must_use]
pub fn to_json(s: &SchedulerSnapshot) -> Value {
    let mut state_machine = state_machine_to_json(&s.state_machine);
    state_machine["major_timestamps_in_ms"] = timing_to_json(&s.timing);

    let pending_deadline = match s.pending_deadline {
        None => Value::Null,
        Some(request) => json!({
            "token": request.token.0,
            "target": match request.target {
                DeadlineTarget::Immediate => Value::from("immediate"),
                DeadlineTarget::At(t) => Value::from(t.ticks()),
            },
        }),
    };

    json!({
        "state_machine": state_machine,
        "scheduler_state": {
            "last_set_needs_begin_frame": s.needs_begin_frame,
            "pending_deadline": pending_deadline,
            "anticipated_draw_time_ticks": s.anticipated_draw_time.map(|t| t.ticks()),
            "last_frame_time_ticks": s.timing.frame_time.ticks(),
            "last_deadline_ticks": s.timing.deadline.ticks(),
        },
    })
}
