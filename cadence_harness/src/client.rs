// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A [`SchedulerClient`] that records everything the scheduler asks of it.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use cadence_core::begin_frame::{DeadlineRequest, DeadlineToken};
use cadence_core::client::{DrawResult, SchedulerClient};
use cadence_core::estimate::{DurationEstimator, EstimatorConfig};
use cadence_core::state::Action;
use cadence_core::time::{Duration, HostTime};

/// Records actions and timing requests; draw outcomes can be scripted.
///
/// Draws succeed by default. [`script_draw`](Self::script_draw) queues
/// outcomes for upcoming `DrawAndSwapIfPossible` calls, and
/// [`fail_draws`](Self::fail_draws) makes every unscripted one fail. Forced
/// draws always swap and readbacks always read back, as they must.
///
/// The three duration estimates come from [`DurationEstimator`]s that tests
/// feed with [`observe_draw`](Self::observe_draw) and friends.
#[derive(Debug)]
pub struct RecordingClient {
    actions: Vec<Action>,
    scripted_draws: VecDeque<DrawResult>,
    fail_draws: bool,
    swaps: u64,
    needs_begin_frame: Vec<bool>,
    deadlines: Vec<DeadlineRequest>,
    polls: Vec<(DeadlineToken, Duration)>,
    deadlines_run: u32,
    anticipated_draw_time: Option<HostTime>,
    draw: DurationEstimator,
    begin_main_frame_to_commit: DurationEstimator,
    commit_to_activate: DurationEstimator,
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingClient {
    /// Creates a client with zero duration estimates.
    #[must_use]
    pub fn new() -> Self {
        Self::with_estimators(EstimatorConfig::compositor(), EstimatorConfig::main_thread())
    }

    /// Creates a client whose draw estimate uses `compositor` and whose
    /// main-thread estimates use `main_thread`.
    #[must_use]
    pub fn with_estimators(compositor: EstimatorConfig, main_thread: EstimatorConfig) -> Self {
        Self {
            actions: Vec::new(),
            scripted_draws: VecDeque::new(),
            fail_draws: false,
            swaps: 0,
            needs_begin_frame: Vec::new(),
            deadlines: Vec::new(),
            polls: Vec::new(),
            deadlines_run: 0,
            anticipated_draw_time: None,
            draw: DurationEstimator::new(compositor),
            begin_main_frame_to_commit: DurationEstimator::new(main_thread),
            commit_to_activate: DurationEstimator::new(compositor),
        }
    }

    /// Every action performed so far, in order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Returns and clears the recorded actions.
    pub fn take_actions(&mut self) -> Vec<Action> {
        core::mem::take(&mut self.actions)
    }

    /// Number of times `action` was performed.
    #[must_use]
    pub fn count(&self, action: Action) -> usize {
        self.actions.iter().filter(|a| **a == action).count()
    }

    /// Queues the outcome of the next unscripted `DrawAndSwapIfPossible`.
    pub fn script_draw(&mut self, result: DrawResult) {
        self.scripted_draws.push_back(result);
    }

    /// Makes every unscripted `DrawAndSwapIfPossible` fail (or succeed again).
    pub fn fail_draws(&mut self, fail: bool) {
        self.fail_draws = fail;
    }

    /// Number of draws that reached the screen, readbacks excluded.
    #[must_use]
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Every BeginFrame subscription change, in order.
    #[must_use]
    pub fn needs_begin_frame_history(&self) -> &[bool] {
        &self.needs_begin_frame
    }

    /// The current BeginFrame subscription.
    #[must_use]
    pub fn needs_begin_frame(&self) -> bool {
        self.needs_begin_frame.last().copied().unwrap_or(false)
    }

    /// Every deadline posted so far.
    #[must_use]
    pub fn deadlines(&self) -> &[DeadlineRequest] {
        &self.deadlines
    }

    /// Every poll posted so far, with its delay.
    #[must_use]
    pub fn polls(&self) -> &[(DeadlineToken, Duration)] {
        &self.polls
    }

    /// Number of deadlines that ran to completion.
    #[must_use]
    pub fn deadlines_run(&self) -> u32 {
        self.deadlines_run
    }

    /// The last anticipated draw time reported.
    #[must_use]
    pub fn anticipated_draw_time(&self) -> Option<HostTime> {
        self.anticipated_draw_time
    }

    /// Feeds an observed draw duration into the draw estimate.
    pub fn observe_draw(&mut self, d: Duration) {
        self.draw.observe(d);
    }

    /// Feeds an observed begin-main-frame-to-commit duration.
    pub fn observe_begin_main_frame_to_commit(&mut self, d: Duration) {
        self.begin_main_frame_to_commit.observe(d);
    }

    /// Feeds an observed commit-to-activate duration.
    pub fn observe_commit_to_activate(&mut self, d: Duration) {
        self.commit_to_activate.observe(d);
    }
}

impl SchedulerClient for RecordingClient {
    fn send_begin_main_frame(&mut self) {
        self.actions.push(Action::SendBeginMainFrame);
    }

    fn draw_and_swap_if_possible(&mut self) -> DrawResult {
        self.actions.push(Action::DrawAndSwapIfPossible);
        let result = match self.scripted_draws.pop_front() {
            Some(result) => result,
            None if self.fail_draws => DrawResult::FAILED,
            None => DrawResult::SWAPPED,
        };
        if result.did_swap {
            self.swaps += 1;
        }
        result
    }

    fn draw_and_swap_forced(&mut self) -> DrawResult {
        self.actions.push(Action::DrawAndSwapForced);
        self.swaps += 1;
        DrawResult::SWAPPED
    }

    fn draw_and_readback(&mut self) -> DrawResult {
        self.actions.push(Action::DrawAndReadback);
        DrawResult::READ_BACK
    }

    fn commit(&mut self) {
        self.actions.push(Action::Commit);
    }

    fn update_visible_tiles(&mut self) {
        self.actions.push(Action::UpdateVisibleTiles);
    }

    fn activate_pending_tree(&mut self) {
        self.actions.push(Action::ActivatePendingTree);
    }

    fn begin_output_surface_creation(&mut self) {
        self.actions.push(Action::BeginOutputSurfaceCreation);
    }

    fn acquire_layer_textures_for_main_thread(&mut self) {
        self.actions.push(Action::AcquireLayerTexturesForMainThread);
    }

    fn manage_tiles(&mut self) {
        self.actions.push(Action::ManageTiles);
    }

    fn set_needs_begin_frame(&mut self, enable: bool) {
        self.needs_begin_frame.push(enable);
    }

    fn post_begin_frame_deadline(&mut self, request: DeadlineRequest) {
        self.deadlines.push(request);
    }

    fn post_poll_for_anticipated_draw_triggers(&mut self, token: DeadlineToken, delay: Duration) {
        self.polls.push((token, delay));
    }

    fn did_begin_frame_deadline(&mut self) {
        self.deadlines_run += 1;
    }

    fn did_anticipated_draw_time_change(&mut self, time: Option<HostTime>) {
        self.anticipated_draw_time = time;
    }

    fn draw_duration_estimate(&self) -> Duration {
        self.draw.estimate()
    }

    fn begin_main_frame_to_commit_duration_estimate(&self) -> Duration {
        self.begin_main_frame_to_commit.estimate()
    }

    fn commit_to_activate_duration_estimate(&self) -> Duration {
        self.commit_to_activate.estimate()
    }
}
