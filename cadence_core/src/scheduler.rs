// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The driver: ticks, deadlines and action dispatch.
//!
//! [`Scheduler`] owns a [`StateMachine`], the embedder's [`SchedulerClient`]
//! and an injected [`TimeSource`]. Every event setter mutates the state
//! machine and then drains actions: it asks for the next action, records it,
//! dispatches it to the client, and repeats until [`Action::None`]. After
//! draining it updates the BeginFrame subscription, the poll timer and the
//! anticipated draw time.
//!
//! # Tick lifecycle
//!
//! ```text
//!   begin_frame(args) ──► drain ──► post deadline (token)
//!                                        │
//!        ┌───────────────────────────────┘
//!        ▼
//!   on_begin_frame_deadline(token) ──► drain (draws allowed) ──► idle
//! ```
//!
//! The deadline is posted at one of:
//!
//! - inline, for the synchronous compositor;
//! - immediately, when deadline scheduling is disabled or a draw is ready and
//!   nothing else is coming this tick;
//! - the tick's deadline minus the draw estimate, when impl-thread work wants
//!   to draw;
//! - the next tick's frame time, while waiting for a new active tree.
//!
//! Posting a deadline cancels the previous one. A deadline fired with a stale
//! token is ignored.
//!
//! # Low latency mode
//!
//! With [`SchedulerSettings::switch_to_low_latency_if_possible`], each tick
//! checks whether the producer is a frame behind but could commit and
//! activate before the deadline:
//!
//! ```text
//!   frame_time + bmf_to_commit + commit_to_activate + safety_margin < deadline
//! ```
//!
//! If so, begin-main-frame is skipped for that tick so the producer can catch
//! up. The check reruns every tick.

use alloc::boxed::Box;
use core::fmt;

use crate::begin_frame::{BeginFrameArgs, DeadlineRequest, DeadlineTarget, DeadlineToken};
use crate::client::{DrawResult, SchedulerClient, TimeSource};
use crate::settings::SchedulerSettings;
use crate::snapshot::{SchedulerSnapshot, TimingSnapshot};
use crate::state::{Action, BeginFrameState};
use crate::state_machine::StateMachine;
use crate::time::HostTime;
use crate::trace::{
    ActionEvent, BeginFrameEvent, DeadlineEvent, DeadlinePostedEvent, DeadlineReason,
    DrawResultEvent, NeedsBeginFrameEvent, OutputSurfaceEvent, OutputSurfaceEventKind, TraceSink,
    Tracer,
};

/// Drives a [`StateMachine`] from ticks and events, dispatching its actions
/// to a [`SchedulerClient`].
///
/// Single-threaded: all calls must come from the thread that owns the
/// compositor. Producer-thread events are marshalled onto that thread by the
/// embedder.
pub struct Scheduler<C, T> {
    settings: SchedulerSettings,
    client: C,
    time: T,
    state_machine: StateMachine,
    last_begin_frame_args: BeginFrameArgs,
    last_set_needs_begin_frame: bool,
    inside_process_scheduled_actions: bool,
    next_token: u64,
    pending_deadline: Option<DeadlineRequest>,
    pending_poll: Option<DeadlineToken>,
    sink: Option<Box<dyn TraceSink>>,
}

impl<C, T> fmt::Debug for Scheduler<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("settings", &self.settings)
            .field("state_machine", &self.state_machine)
            .field("last_begin_frame_args", &self.last_begin_frame_args)
            .field("last_set_needs_begin_frame", &self.last_set_needs_begin_frame)
            .field("pending_deadline", &self.pending_deadline)
            .field("pending_poll", &self.pending_poll)
            .finish_non_exhaustive()
    }
}

impl<C: SchedulerClient, T: TimeSource> Scheduler<C, T> {
    /// Creates a scheduler. Nothing happens until
    /// [`set_can_start`](Self::set_can_start) is called.
    #[must_use]
    pub fn new(settings: SchedulerSettings, client: C, time: T) -> Self {
        Self {
            settings,
            client,
            time,
            state_machine: StateMachine::new(settings),
            last_begin_frame_args: BeginFrameArgs::default(),
            last_set_needs_begin_frame: false,
            inside_process_scheduled_actions: false,
            next_token: 0,
            pending_deadline: None,
            pending_poll: None,
            sink: None,
        }
    }

    /// Installs a trace sink. Events are only emitted with the `trace`
    /// feature.
    #[must_use]
    pub fn with_trace_sink(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replaces (or removes) the trace sink.
    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.sink = sink;
    }

    /// The settings this scheduler was built with.
    #[must_use]
    pub const fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// The client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Mutable access to the client, e.g. to drain queued work between
    /// scheduler calls.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// The time source.
    #[must_use]
    pub const fn time(&self) -> &T {
        &self.time
    }

    /// The state machine, for inspection.
    #[must_use]
    pub const fn state_machine(&self) -> &StateMachine {
        &self.state_machine
    }

    // -----------------------------------------------------------------------
    // Event setters
    // -----------------------------------------------------------------------

    /// The embedder is ready for output surface creation.
    pub fn set_can_start(&mut self) {
        self.state_machine.set_can_start();
        self.process_scheduled_actions();
    }

    /// Content visibility changed.
    pub fn set_visible(&mut self, visible: bool) {
        self.state_machine.set_visible(visible);
        self.process_scheduled_actions();
    }

    /// Whether drawing is possible at all.
    pub fn set_can_draw(&mut self, can_draw: bool) {
        self.state_machine.set_can_draw(can_draw);
        self.process_scheduled_actions();
    }

    /// The pending tree finished rasterizing.
    pub fn notify_ready_to_activate(&mut self) {
        self.state_machine.notify_ready_to_activate();
        self.process_scheduled_actions();
    }

    /// The producer wants a new frame.
    pub fn set_needs_commit(&mut self) {
        self.state_machine.set_needs_commit();
        self.process_scheduled_actions();
    }

    /// The producer needs a forced commit to read pixels back.
    pub fn set_needs_forced_commit_for_readback(&mut self) {
        self.state_machine.set_needs_commit();
        self.state_machine.set_needs_forced_commit_for_readback();
        self.process_scheduled_actions();
    }

    /// The active tree must be drawn again.
    pub fn set_needs_redraw(&mut self) {
        self.state_machine.set_needs_redraw();
        self.process_scheduled_actions();
    }

    /// Tile priorities changed.
    pub fn set_needs_manage_tiles(&mut self) {
        self.state_machine.set_needs_manage_tiles();
        self.process_scheduled_actions();
    }

    /// Whether the last swap showed incomplete tiles.
    pub fn set_swap_used_incomplete_tile(&mut self, used_incomplete_tile: bool) {
        self.state_machine
            .set_swap_used_incomplete_tile(used_incomplete_tile);
        self.process_scheduled_actions();
    }

    /// Prefer presenting impl-thread work over waiting for the producer.
    pub fn set_smoothness_takes_priority(&mut self, smoothness_takes_priority: bool) {
        self.state_machine
            .set_smoothness_takes_priority(smoothness_takes_priority);
        self.process_scheduled_actions();
    }

    /// The producer wants the texture token.
    pub fn set_main_thread_needs_layer_textures(&mut self) {
        self.state_machine.set_main_thread_needs_layer_textures();
        self.process_scheduled_actions();
    }

    /// The producer finished the frame requested by the last
    /// begin-main-frame.
    pub fn finish_commit(&mut self) {
        self.state_machine.finish_commit();
        self.process_scheduled_actions();
    }

    /// The producer gave up on the frame requested by the last
    /// begin-main-frame.
    pub fn begin_main_frame_aborted(&mut self, did_handle: bool) {
        self.state_machine.begin_main_frame_aborted(did_handle);
        self.process_scheduled_actions();
    }

    /// The output surface was lost.
    ///
    /// Ticks stop immediately. If a tick is in flight its deadline is pulled
    /// in so the frame ends and surface creation can start.
    pub fn did_lose_output_surface(&mut self) {
        let e = OutputSurfaceEvent {
            kind: OutputSurfaceEventKind::Lost,
            timestamp: self.time.now(),
        };
        self.trace(|t| t.output_surface(&e));
        self.state_machine.did_lose_output_surface();
        if self.last_set_needs_begin_frame {
            self.set_needs_begin_frame(false);
        }
        self.process_scheduled_actions();
    }

    /// The surface requested by `begin_output_surface_creation` is ready.
    pub fn did_create_and_initialize_output_surface(&mut self) {
        debug_assert!(
            !self.last_set_needs_begin_frame,
            "ticks requested while no surface existed"
        );
        let e = OutputSurfaceEvent {
            kind: OutputSurfaceEventKind::Initialized,
            timestamp: self.time.now(),
        };
        self.trace(|t| t.output_surface(&e));
        self.state_machine.did_create_and_initialize_output_surface();
        self.process_scheduled_actions();
    }

    // -----------------------------------------------------------------------
    // Ticks and deadlines
    // -----------------------------------------------------------------------

    /// Handles a BeginFrame tick.
    ///
    /// Ticks arriving without an initialized output surface are dropped; tick
    /// delivery can race surface loss. If the previous tick's deadline has
    /// not fired yet, it runs first.
    pub fn begin_frame(&mut self, args: BeginFrameArgs) {
        if !self.state_machine.has_initialized_output_surface() {
            return;
        }
        if self.state_machine.begin_frame_state() == BeginFrameState::InsideFrame {
            self.run_begin_frame_deadline();
        }
        if self.state_machine.begin_frame_state() != BeginFrameState::Idle {
            return;
        }

        let mut adjusted = args;
        adjusted.deadline = args
            .deadline
            .saturating_sub(self.client.draw_duration_estimate());
        self.last_begin_frame_args = adjusted;
        self.state_machine.on_begin_frame(&adjusted);

        if self.settings.switch_to_low_latency_if_possible {
            let skip = self.state_machine.main_thread_is_in_high_latency_mode()
                && self.can_commit_and_activate_before_deadline();
            self.state_machine
                .set_skip_begin_main_frame_to_reduce_latency(skip);
        }

        let e = BeginFrameEvent {
            frame_number: self.state_machine.current_frame_number(),
            frame_time: adjusted.frame_time,
            deadline: adjusted.deadline,
            interval: adjusted.interval,
            skip_begin_main_frame: self.state_machine.skip_begin_main_frame_to_reduce_latency(),
        };
        self.trace(|t| t.begin_frame(&e));

        self.process_scheduled_actions();

        self.state_machine.on_begin_frame_deadline_pending();

        if self.settings.using_synchronous_renderer_compositor {
            // The synchronous compositor must draw inside the tick.
            self.run_begin_frame_deadline();
        } else if !self.settings.deadline_scheduling_enabled {
            self.post_begin_frame_deadline(
                DeadlineTarget::Immediate,
                DeadlineReason::SchedulingDisabled,
            );
        } else if self.state_machine.should_trigger_begin_frame_deadline_early() {
            self.post_begin_frame_deadline(DeadlineTarget::Immediate, DeadlineReason::Early);
        } else if self.state_machine.needs_redraw() {
            self.post_begin_frame_deadline(
                DeadlineTarget::At(adjusted.deadline),
                DeadlineReason::Deadline,
            );
        } else {
            self.post_begin_frame_deadline(
                DeadlineTarget::At(adjusted.next_frame_time()),
                DeadlineReason::NextFrame,
            );
        }
    }

    /// Runs the posted deadline identified by `token`.
    ///
    /// Returns `false` (and does nothing) if the token is stale.
    pub fn on_begin_frame_deadline(&mut self, token: DeadlineToken) -> bool {
        match self.pending_deadline {
            Some(request) if request.token == token => {}
            _ => return false,
        }
        if self.state_machine.begin_frame_state() != BeginFrameState::InsideFrame {
            self.pending_deadline = None;
            return false;
        }
        self.run_begin_frame_deadline();
        true
    }

    /// Runs the poll identified by `token`.
    ///
    /// Returns `false` (and does nothing) if the token is stale.
    pub fn poll_for_anticipated_draw_triggers(&mut self, token: DeadlineToken) -> bool {
        if self.pending_poll != Some(token) {
            return false;
        }
        self.pending_poll = None;
        self.state_machine
            .did_enter_poll_for_anticipated_draw_triggers();
        self.process_scheduled_actions();
        self.state_machine
            .did_leave_poll_for_anticipated_draw_triggers();
        true
    }

    fn run_begin_frame_deadline(&mut self) {
        let token = self
            .pending_deadline
            .take()
            .map_or(DeadlineToken(self.next_token), |r| r.token);
        let e = DeadlineEvent {
            frame_number: self.state_machine.current_frame_number(),
            token,
            timestamp: self.time.now(),
        };
        self.trace(|t| t.deadline(&e));

        self.state_machine.on_begin_frame_deadline();
        self.process_scheduled_actions();
        // Leaving the deadline only after the drain lets begin-main-frame go
        // out before the state machine returns to idle.
        self.state_machine.on_begin_frame_idle();
        self.client.did_begin_frame_deadline();
    }

    fn post_begin_frame_deadline(&mut self, target: DeadlineTarget, reason: DeadlineReason) {
        let token = self.mint_token();
        let request = DeadlineRequest { token, target };
        self.pending_deadline = Some(request);
        let e = DeadlinePostedEvent {
            frame_number: self.state_machine.current_frame_number(),
            token,
            target,
            reason,
            timestamp: self.time.now(),
        };
        self.trace(|t| t.deadline_posted(&e));
        self.client.post_begin_frame_deadline(request);
    }

    fn mint_token(&mut self) -> DeadlineToken {
        self.next_token += 1;
        DeadlineToken(self.next_token)
    }

    // -----------------------------------------------------------------------
    // Action drain
    // -----------------------------------------------------------------------

    fn process_scheduled_actions(&mut self) {
        // The outermost call drains everything; nested calls would only
        // reorder it.
        if self.inside_process_scheduled_actions {
            return;
        }
        self.inside_process_scheduled_actions = true;

        loop {
            let invariants = self.state_machine.check_invariants();
            debug_assert!(
                invariants.is_ok(),
                "{invariants:?}: {}",
                self.state_machine.snapshot()
            );

            let action = self.state_machine.next_action();
            if action != Action::None {
                let e = ActionEvent {
                    frame_number: self.state_machine.current_frame_number(),
                    action,
                    begin_frame_state: self.state_machine.begin_frame_state(),
                    timestamp: self.time.now(),
                };
                self.trace(|t| t.action(&e));
            }
            self.state_machine.update_state(action);

            match action {
                Action::None => break,
                Action::SendBeginMainFrame => self.client.send_begin_main_frame(),
                Action::Commit => self.client.commit(),
                Action::UpdateVisibleTiles => self.client.update_visible_tiles(),
                Action::ActivatePendingTree => self.client.activate_pending_tree(),
                Action::DrawAndSwapIfPossible => {
                    let result = self.client.draw_and_swap_if_possible();
                    self.state_machine
                        .did_draw_if_possible_completed(result.did_draw);
                    self.trace_draw_result(action, result);
                }
                Action::DrawAndSwapForced => {
                    let result = self.client.draw_and_swap_forced();
                    self.trace_draw_result(action, result);
                }
                // Nothing to perform; the state machine just leaves its
                // waiting-to-draw state.
                Action::DrawAndSwapAbort => {}
                Action::DrawAndReadback => {
                    let result = self.client.draw_and_readback();
                    debug_assert!(!result.did_swap, "readback draws never swap");
                    self.trace_draw_result(action, result);
                }
                Action::BeginOutputSurfaceCreation => self.client.begin_output_surface_creation(),
                Action::AcquireLayerTexturesForMainThread => {
                    self.client.acquire_layer_textures_for_main_thread();
                }
                Action::ManageTiles => self.client.manage_tiles(),
            }
        }

        self.setup_next_begin_frame_if_needed();
        let anticipated = self.anticipated_draw_time();
        self.client.did_anticipated_draw_time_change(anticipated);

        if self.state_machine.should_trigger_begin_frame_deadline_early()
            && self.pending_deadline.map(|r| r.target) != Some(DeadlineTarget::Immediate)
        {
            debug_assert!(
                !self.settings.using_synchronous_renderer_compositor,
                "synchronous compositor runs its deadline inline"
            );
            self.post_begin_frame_deadline(DeadlineTarget::Immediate, DeadlineReason::Early);
        }

        self.inside_process_scheduled_actions = false;
    }

    fn setup_next_begin_frame_if_needed(&mut self) {
        let needs = self.state_machine.begin_frame_needed_by_impl_thread();
        let at_end_of_deadline =
            self.state_machine.begin_frame_state() == BeginFrameState::InsideDeadline;

        // Start ticks as soon as they are needed; stop them only at the end of
        // a deadline so a brief lull does not bounce the tick source.
        if (needs && !self.last_set_needs_begin_frame) || at_end_of_deadline {
            self.set_needs_begin_frame(needs);
        }

        if self.state_machine.should_poll_for_anticipated_draw_triggers() {
            if self.pending_poll.is_none() {
                let token = self.mint_token();
                self.pending_poll = Some(token);
                let interval = if self.last_begin_frame_args.has_interval() {
                    self.last_begin_frame_args.interval
                } else {
                    BeginFrameArgs::DEFAULT_INTERVAL
                };
                self.client
                    .post_poll_for_anticipated_draw_triggers(token, interval);
            }
        } else {
            self.pending_poll = None;
        }
    }

    fn set_needs_begin_frame(&mut self, needs: bool) {
        self.client.set_needs_begin_frame(needs);
        self.last_set_needs_begin_frame = needs;
        let e = NeedsBeginFrameEvent {
            needs,
            timestamp: self.time.now(),
        };
        self.trace(|t| t.needs_begin_frame(&e));
    }

    fn can_commit_and_activate_before_deadline(&self) -> bool {
        let estimated_activation = self
            .last_begin_frame_args
            .frame_time
            .saturating_add(self.client.begin_main_frame_to_commit_duration_estimate())
            .saturating_add(self.client.commit_to_activate_duration_estimate())
            .saturating_add(self.settings.low_latency_safety_margin);
        estimated_activation < self.last_begin_frame_args.deadline
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Predicted time of the next draw, or `None` while ticks are off or the
    /// tick interval is unknown.
    #[must_use]
    pub fn anticipated_draw_time(&self) -> Option<HostTime> {
        let args = &self.last_begin_frame_args;
        if !self.last_set_needs_begin_frame || !args.has_interval() {
            return None;
        }
        let now = self.time.now();
        let timebase = args.frame_time.max(args.deadline);
        let intervals = 1 + now
            .saturating_duration_since(timebase)
            .whole_intervals(args.interval);
        Some(timebase.saturating_add(args.interval.saturating_mul(intervals)))
    }

    /// Frame time of the last accepted tick.
    #[must_use]
    pub fn last_begin_frame_time(&self) -> HostTime {
        self.last_begin_frame_args.frame_time
    }

    /// Arguments of the last accepted tick, with the draw-adjusted deadline.
    #[must_use]
    pub fn last_begin_frame_args(&self) -> BeginFrameArgs {
        self.last_begin_frame_args
    }

    /// Whether a draw requested now would actually be attempted.
    #[must_use]
    pub fn will_draw_if_needed(&self) -> bool {
        !self.state_machine.pending_draws_should_be_aborted()
    }

    /// The deadline currently posted, if any.
    #[must_use]
    pub fn pending_deadline(&self) -> Option<DeadlineRequest> {
        self.pending_deadline
    }

    /// The poll currently posted, if any.
    #[must_use]
    pub fn pending_poll(&self) -> Option<DeadlineToken> {
        self.pending_poll
    }

    /// What the client was last told about BeginFrame ticks.
    #[must_use]
    pub fn needs_begin_frame(&self) -> bool {
        self.last_set_needs_begin_frame
    }

    /// Captures the full scheduler state.
    #[must_use]
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let args = &self.last_begin_frame_args;
        SchedulerSnapshot {
            state_machine: self.state_machine.snapshot(),
            timing: TimingSnapshot::new(
                self.time.now(),
                args.frame_time,
                args.deadline,
                args.interval,
                self.time.timebase(),
            ),
            pending_deadline: self.pending_deadline,
            needs_begin_frame: self.last_set_needs_begin_frame,
            anticipated_draw_time: self.anticipated_draw_time(),
        }
    }

    // -----------------------------------------------------------------------
    // Tracing
    // -----------------------------------------------------------------------

    fn trace(&mut self, f: impl FnOnce(&mut Tracer<'_>)) {
        if let Some(sink) = self.sink.as_deref_mut() {
            f(&mut Tracer::new(sink));
        }
    }

    fn trace_draw_result(&mut self, action: Action, result: DrawResult) {
        let e = DrawResultEvent {
            frame_number: self.state_machine.current_frame_number(),
            action,
            result,
            timestamp: self.time.now(),
        };
        self.trace(|t| t.draw_result(&e));
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use core::cell::Cell;

    use super::*;
    use crate::time::Duration;

    const INTERVAL: Duration = Duration(16_000);

    #[derive(Debug, Default)]
    struct FakeClient {
        actions: Vec<Action>,
        fail_draws: bool,
        needs_begin_frame: Vec<bool>,
        deadlines: Vec<DeadlineRequest>,
        polls: Vec<(DeadlineToken, Duration)>,
        deadlines_run: u32,
        anticipated: Option<HostTime>,
        draw_estimate: Duration,
        commit_estimate: Duration,
        activate_estimate: Duration,
    }

    impl SchedulerClient for FakeClient {
        fn send_begin_main_frame(&mut self) {
            self.actions.push(Action::SendBeginMainFrame);
        }

        fn draw_and_swap_if_possible(&mut self) -> DrawResult {
            self.actions.push(Action::DrawAndSwapIfPossible);
            if self.fail_draws {
                DrawResult::FAILED
            } else {
                DrawResult::SWAPPED
            }
        }

        fn draw_and_swap_forced(&mut self) -> DrawResult {
            self.actions.push(Action::DrawAndSwapForced);
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
            self.anticipated = time;
        }

        fn draw_duration_estimate(&self) -> Duration {
            self.draw_estimate
        }

        fn begin_main_frame_to_commit_duration_estimate(&self) -> Duration {
            self.commit_estimate
        }

        fn commit_to_activate_duration_estimate(&self) -> Duration {
            self.activate_estimate
        }
    }

    #[derive(Debug, Default)]
    struct FakeClock(Cell<u64>);

    impl TimeSource for FakeClock {
        fn now(&self) -> HostTime {
            HostTime(self.0.get())
        }
    }

    type TestScheduler = Scheduler<FakeClient, FakeClock>;

    fn args(frame_time: u64) -> BeginFrameArgs {
        BeginFrameArgs::new(
            HostTime(frame_time),
            HostTime(frame_time + INTERVAL.ticks()),
            INTERVAL,
        )
    }

    fn tick(s: &mut TestScheduler, frame_time: u64) {
        s.time().0.set(frame_time);
        s.begin_frame(args(frame_time));
    }

    fn fire_deadline(s: &mut TestScheduler) -> bool {
        let request = s.pending_deadline().expect("deadline posted");
        s.on_begin_frame_deadline(request.token)
    }

    /// Surface created and the first commit activated, not yet drawn.
    fn committed(settings: SchedulerSettings) -> TestScheduler {
        let mut s = Scheduler::new(settings, FakeClient::default(), FakeClock::default());
        s.set_can_start();
        s.set_visible(true);
        s.set_can_draw(true);
        s.did_create_and_initialize_output_surface();
        s.set_needs_commit();
        s.finish_commit();
        if settings.impl_side_painting {
            s.notify_ready_to_activate();
        }
        s
    }

    /// [`committed`], then one tick drawing the first frame at t=1000.
    fn initialized(settings: SchedulerSettings) -> TestScheduler {
        let mut s = committed(settings);
        tick(&mut s, 1_000);
        if s.pending_deadline().is_some() {
            assert!(fire_deadline(&mut s));
        }
        s
    }

    #[test]
    fn initialization_creates_surface_commits_and_draws() {
        let s = initialized(SchedulerSettings::threaded());
        assert_eq!(
            s.client().actions,
            [
                Action::BeginOutputSurfaceCreation,
                Action::SendBeginMainFrame,
                Action::Commit,
                Action::ActivatePendingTree,
                Action::DrawAndSwapIfPossible,
            ]
        );
        assert!(s.needs_begin_frame());
        assert_eq!(s.client().deadlines_run, 1);
        assert_eq!(
            s.state_machine().begin_frame_state(),
            BeginFrameState::Idle
        );
    }

    #[test]
    fn first_draw_triggers_deadline_early() {
        let mut s = committed(SchedulerSettings::threaded());
        assert_eq!(s.client().needs_begin_frame, [true]);
        tick(&mut s, 1_000);
        let request = s.pending_deadline().expect("deadline posted");
        assert_eq!(request.target, DeadlineTarget::Immediate);
        assert_eq!(s.client().deadlines.last(), Some(&request));
    }

    #[test]
    fn commit_waits_for_tick_and_early_deadline_replaces_posted_one() {
        let mut s = initialized(SchedulerSettings::threaded());
        s.client_mut().actions.clear();

        s.set_needs_commit();
        assert!(s.client().actions.is_empty());

        tick(&mut s, 17_000);
        assert_eq!(s.client().actions, [Action::SendBeginMainFrame]);
        let waiting = s.pending_deadline().expect("deadline posted");
        // Nothing to draw yet: wait until the next tick's frame time.
        assert_eq!(waiting.target, DeadlineTarget::At(HostTime(33_000)));

        s.finish_commit();
        s.notify_ready_to_activate();
        let early = s.pending_deadline().expect("deadline reposted");
        assert_eq!(early.target, DeadlineTarget::Immediate);
        assert_ne!(early.token, waiting.token);

        assert!(!s.on_begin_frame_deadline(waiting.token));
        assert!(s.on_begin_frame_deadline(early.token));
        assert_eq!(
            s.client().actions,
            [
                Action::SendBeginMainFrame,
                Action::Commit,
                Action::ActivatePendingTree,
                Action::DrawAndSwapIfPossible,
            ]
        );
        assert_eq!(s.pending_deadline(), None);
        assert!(!s.on_begin_frame_deadline(early.token));
    }

    #[test]
    fn deadline_is_pulled_in_by_draw_estimate() {
        let mut s = initialized(SchedulerSettings::threaded());
        s.client_mut().draw_estimate = Duration(2_000);
        s.set_needs_commit();
        s.set_needs_redraw();
        tick(&mut s, 17_000);

        assert_eq!(s.last_begin_frame_args().deadline, HostTime(31_000));
        let request = s.pending_deadline().expect("deadline posted");
        assert_eq!(request.target, DeadlineTarget::At(HostTime(31_000)));
    }

    #[test]
    fn deadline_is_immediate_when_scheduling_disabled() {
        let settings = SchedulerSettings {
            deadline_scheduling_enabled: false,
            ..SchedulerSettings::threaded()
        };
        let mut s = initialized(settings);
        s.set_needs_commit();
        tick(&mut s, 17_000);
        let request = s.pending_deadline().expect("deadline posted");
        assert_eq!(request.target, DeadlineTarget::Immediate);
    }

    #[test]
    fn tick_without_surface_is_ignored() {
        let mut s = Scheduler::new(
            SchedulerSettings::threaded(),
            FakeClient::default(),
            FakeClock::default(),
        );
        s.set_can_start();
        tick(&mut s, 1_000);
        assert_eq!(s.state_machine().current_frame_number(), 0);
        assert_eq!(s.pending_deadline(), None);
        assert_eq!(s.last_begin_frame_time(), HostTime(0));
    }

    #[test]
    fn pending_deadline_runs_before_next_tick() {
        let mut s = initialized(SchedulerSettings::threaded());
        s.set_needs_commit();
        tick(&mut s, 17_000);
        assert!(s.pending_deadline().is_some());
        let frame = s.state_machine().current_frame_number();

        tick(&mut s, 33_000);
        assert_eq!(s.client().deadlines_run, 2);
        assert_eq!(s.state_machine().current_frame_number(), frame + 1);
        assert_eq!(s.last_begin_frame_time(), HostTime(33_000));
    }

    #[test]
    fn lost_surface_stops_ticks_and_ends_frame_early() {
        let mut s = initialized(SchedulerSettings::threaded());
        s.client_mut().actions.clear();
        s.set_needs_commit();
        tick(&mut s, 17_000);

        s.did_lose_output_surface();
        assert_eq!(s.client().needs_begin_frame.last(), Some(&false));
        assert!(!s.will_draw_if_needed());
        let request = s.pending_deadline().expect("deadline posted");
        assert_eq!(request.target, DeadlineTarget::Immediate);
        assert!(fire_deadline(&mut s));

        s.finish_commit();
        assert_eq!(
            s.client().actions,
            [
                Action::SendBeginMainFrame,
                Action::Commit,
                Action::ActivatePendingTree,
                Action::BeginOutputSurfaceCreation,
            ]
        );
        assert!(!s.needs_begin_frame());
        assert_eq!(s.anticipated_draw_time(), None);

        s.did_create_and_initialize_output_surface();
        assert_eq!(
            s.client().actions.last(),
            Some(&Action::SendBeginMainFrame)
        );
    }

    #[test]
    fn anticipated_draw_time_follows_tick_grid() {
        let s = initialized(SchedulerSettings::threaded());
        // Deadline 17_000 is the timebase; the next draw is one interval on.
        assert_eq!(s.anticipated_draw_time(), Some(HostTime(33_000)));
        assert_eq!(s.client().anticipated, Some(HostTime(33_000)));

        s.time().0.set(50_000);
        assert_eq!(s.anticipated_draw_time(), Some(HostTime(65_000)));
    }

    #[test]
    fn low_latency_mode_engages_when_producer_can_catch_up() {
        // The whole frame here is 16_000 ticks, far below the default margin.
        let settings = SchedulerSettings {
            switch_to_low_latency_if_possible: true,
            low_latency_safety_margin: Duration::ZERO,
            ..SchedulerSettings::threaded()
        };
        let mut s = initialized(settings);
        s.set_needs_commit();
        tick(&mut s, 17_000);
        assert!(fire_deadline(&mut s));
        assert!(!s.state_machine().skip_begin_main_frame_to_reduce_latency());

        // The begin-main-frame from the last tick is still outstanding.
        tick(&mut s, 33_000);
        assert!(s.state_machine().skip_begin_main_frame_to_reduce_latency());
    }

    #[test]
    fn hidden_scheduler_still_grants_textures() {
        use crate::state::TextureState;

        let mut s = initialized(SchedulerSettings::threaded());
        s.set_needs_commit();
        tick(&mut s, 17_000);
        assert_eq!(s.client().actions.last(), Some(&Action::SendBeginMainFrame));
        s.set_needs_redraw();
        s.begin_main_frame_aborted(true);

        s.set_visible(false);
        assert!(!s.needs_begin_frame(), "no ticks while hidden");
        s.set_main_thread_needs_layer_textures();
        assert_eq!(
            s.client().actions.last(),
            Some(&Action::AcquireLayerTexturesForMainThread)
        );
        assert_eq!(
            s.state_machine().texture_state(),
            TextureState::AcquiredByProducer
        );

        assert!(fire_deadline(&mut s));
        assert_eq!(
            s.state_machine().texture_state(),
            TextureState::AcquiredByProducer,
            "the producer keeps the token until it commits"
        );
    }

    #[test]
    fn low_latency_mode_stays_off_when_producer_is_too_slow() {
        let settings = SchedulerSettings {
            switch_to_low_latency_if_possible: true,
            ..SchedulerSettings::threaded()
        };
        let mut s = initialized(settings);
        s.client_mut().commit_estimate = Duration(20_000);
        s.set_needs_commit();
        tick(&mut s, 17_000);
        assert!(fire_deadline(&mut s));
        tick(&mut s, 33_000);
        assert!(!s.state_machine().skip_begin_main_frame_to_reduce_latency());
    }

    #[test]
    fn synchronous_compositor_draws_inside_the_tick() {
        let s = initialized(SchedulerSettings::synchronous());
        assert_eq!(
            s.client().actions,
            [
                Action::BeginOutputSurfaceCreation,
                Action::SendBeginMainFrame,
                Action::Commit,
                Action::DrawAndSwapIfPossible,
            ]
        );
        assert_eq!(s.pending_deadline(), None);
        assert!(s.client().deadlines.is_empty());
        assert_eq!(s.client().deadlines_run, 1);
        // Nothing left to draw: the synchronous compositor stops ticking.
        assert!(!s.needs_begin_frame());
    }

    #[test]
    fn synchronous_compositor_polls_while_commit_is_outstanding() {
        let mut s = initialized(SchedulerSettings::synchronous());
        s.set_needs_commit();
        assert_eq!(
            s.client().actions.last(),
            Some(&Action::SendBeginMainFrame)
        );
        let (token, delay) = *s.client().polls.last().expect("poll posted");
        assert_eq!(delay, INTERVAL);
        assert_eq!(s.pending_poll(), Some(token));

        assert!(!s.poll_for_anticipated_draw_triggers(DeadlineToken(token.0 + 100)));
        assert!(s.poll_for_anticipated_draw_triggers(token));
        // Still outstanding, so another poll follows.
        assert_eq!(s.client().polls.len(), 2);

        s.finish_commit();
        assert_eq!(s.pending_poll(), None);
        assert!(s.needs_begin_frame());
    }

    #[test]
    fn failed_draw_requests_commit_in_same_deadline() {
        let mut s = initialized(SchedulerSettings::threaded());
        s.client_mut().actions.clear();
        s.client_mut().fail_draws = true;
        s.set_needs_redraw();
        tick(&mut s, 17_000);
        assert!(fire_deadline(&mut s));
        assert_eq!(
            s.client().actions,
            [Action::DrawAndSwapIfPossible, Action::SendBeginMainFrame]
        );
        assert_eq!(s.state_machine().consecutive_failed_draws(), 1);
    }

    #[test]
    fn forced_readback_runs_without_waiting_for_ticks() {
        let mut s = initialized(SchedulerSettings::threaded());
        s.client_mut().actions.clear();
        s.set_needs_forced_commit_for_readback();
        s.finish_commit();
        s.notify_ready_to_activate();
        assert_eq!(
            s.client().actions,
            [
                Action::SendBeginMainFrame,
                Action::Commit,
                Action::ActivatePendingTree,
                Action::DrawAndReadback,
            ]
        );
    }

    #[test]
    fn snapshot_reflects_driver_state() {
        let mut s = initialized(SchedulerSettings::threaded());
        s.set_needs_commit();
        tick(&mut s, 17_000);
        s.time().0.set(20_000);

        let snapshot = s.snapshot();
        assert!(snapshot.needs_begin_frame);
        assert_eq!(snapshot.pending_deadline, s.pending_deadline());
        assert_eq!(snapshot.timing.frame_time_to_now_nanos, 3_000);
        assert_eq!(snapshot.timing.now_to_deadline_nanos, 13_000);
        assert_eq!(snapshot.state_machine.commit_state, crate::state::CommitState::FrameInProgress);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn trace_sink_sees_actions_and_deadlines() {
        use alloc::rc::Rc;
        use core::cell::RefCell;

        #[derive(Default)]
        struct Counts {
            actions: Vec<Action>,
            posted: Vec<DeadlineReason>,
            deadlines: u32,
            begin_frames: u32,
        }

        impl TraceSink for Counts {
            fn on_action(&mut self, e: &ActionEvent) {
                self.actions.push(e.action);
            }

            fn on_deadline_posted(&mut self, e: &DeadlinePostedEvent) {
                self.posted.push(e.reason);
            }

            fn on_deadline(&mut self, _: &DeadlineEvent) {
                self.deadlines += 1;
            }

            fn on_begin_frame(&mut self, _: &BeginFrameEvent) {
                self.begin_frames += 1;
            }
        }

        let counts = Rc::new(RefCell::new(Counts::default()));
        let mut s = committed(SchedulerSettings::threaded());
        s.set_trace_sink(Some(Box::new(Rc::clone(&counts))));
        tick(&mut s, 1_000);
        assert!(fire_deadline(&mut s));

        let counts = counts.borrow();
        assert_eq!(counts.begin_frames, 1);
        assert_eq!(counts.deadlines, 1);
        assert_eq!(counts.posted, [DeadlineReason::Early]);
        assert_eq!(counts.actions, [Action::DrawAndSwapIfPossible]);
    }
}
