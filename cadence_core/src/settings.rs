// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scheduler configuration.

use crate::time::Duration;

/// Configuration shared by the [`StateMachine`](crate::state_machine::StateMachine)
/// and the [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Commits land in a pending tree that must be activated before it is
    /// drawn. When off, commits go straight to the active tree.
    pub impl_side_painting: bool,
    /// Split each tick into a BeginFrame and a later deadline. When off, the
    /// deadline is posted immediately after every tick.
    pub deadline_scheduling_enabled: bool,
    /// Escalate repeated draw failures into a forced redraw.
    pub timeout_and_draw_when_animation_checkerboards: bool,
    /// Consecutive failed draws before a forced redraw is scheduled.
    pub maximum_number_of_failed_draws_before_draw_is_forced: u32,
    /// The embedder draws synchronously inside the tick and polls for draw
    /// triggers instead of receiving proactive ticks.
    pub using_synchronous_renderer_compositor: bool,
    /// Frame production is paced by vsync. Proactive ticks are only
    /// requested when throttled.
    pub throttle_frame_production: bool,
    /// Skip sending begin-main-frame while the main thread is a frame
    /// behind and could catch up by skipping one.
    pub switch_to_low_latency_if_possible: bool,
    /// Slack required between the estimated commit-and-activate finish and
    /// the draw deadline before the main thread counts as able to catch up.
    pub low_latency_safety_margin: Duration,
}

impl SchedulerSettings {
    /// Settings for a threaded compositor with impl-side painting.
    #[must_use]
    pub const fn threaded() -> Self {
        Self {
            impl_side_painting: true,
            deadline_scheduling_enabled: true,
            timeout_and_draw_when_animation_checkerboards: true,
            maximum_number_of_failed_draws_before_draw_is_forced: 3,
            using_synchronous_renderer_compositor: false,
            throttle_frame_production: true,
            switch_to_low_latency_if_possible: false,
            // ~1ms at 1ns tick resolution.
            low_latency_safety_margin: Duration(1_000_000),
        }
    }

    /// Settings for an embedder that draws synchronously within each tick
    /// and commits straight to the active tree.
    #[must_use]
    pub const fn synchronous() -> Self {
        Self {
            impl_side_painting: false,
            deadline_scheduling_enabled: false,
            using_synchronous_renderer_compositor: true,
            ..Self::threaded()
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::threaded()
    }
}
