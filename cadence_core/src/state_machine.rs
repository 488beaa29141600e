// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scheduling decision engine.
//!
//! [`StateMachine`] is pure and synchronous. It never reads a clock, never
//! calls out, and never blocks. The [`Scheduler`](crate::scheduler::Scheduler)
//! asks it for the [`next_action`](StateMachine::next_action), performs that
//! action through the client, and reports back with
//! [`update_state`](StateMachine::update_state). External events flow in
//! through the `set_*` / `did_*` mutators.
//!
//! # Ordering
//!
//! Within one tick (one value of
//! [`current_frame_number`](StateMachine::current_frame_number)) at most one
//! swap, one begin-main-frame, one visible-tile update and one manage-tiles
//! happen. Forced-redraw and readback commits are exempt from the
//! begin-main-frame limit; both exist to guarantee progress.

use crate::begin_frame::BeginFrameArgs;
use crate::error::InvariantViolation;
use crate::settings::SchedulerSettings;
use crate::snapshot::StateMachineSnapshot;
use crate::state::{
    Action, BeginFrameState, CommitState, ForcedRedrawState, OutputSurfaceState, ReadbackState,
    TextureState,
};

/// Decides the next scheduling action from the current state.
#[derive(Clone, Debug)]
pub struct StateMachine {
    settings: SchedulerSettings,

    output_surface_state: OutputSurfaceState,
    begin_frame_state: BeginFrameState,
    commit_state: CommitState,
    texture_state: TextureState,
    forced_redraw_state: ForcedRedrawState,
    readback_state: ReadbackState,

    commit_count: u64,
    current_frame_number: u64,
    last_frame_number_swap_performed: Option<u64>,
    last_frame_number_begin_main_frame_sent: Option<u64>,
    last_frame_number_update_visible_tiles_was_called: Option<u64>,
    last_frame_number_manage_tiles_called: Option<u64>,
    consecutive_failed_draws: u32,

    // Per-tick counters backing `check_invariants`.
    swaps_this_frame: u32,
    throttled_begin_main_frames_this_frame: u32,

    needs_redraw: bool,
    needs_manage_tiles: bool,
    swap_used_incomplete_tile: bool,
    needs_commit: bool,
    producer_needs_textures: bool,
    inside_poll_for_anticipated_draw_triggers: bool,
    visible: bool,
    can_start: bool,
    can_draw: bool,
    has_pending_tree: bool,
    pending_tree_is_ready_for_activation: bool,
    active_tree_needs_first_draw: bool,
    draw_if_possible_failed: bool,
    did_create_and_initialize_first_output_surface: bool,
    smoothness_takes_priority: bool,
    skip_begin_main_frame_to_reduce_latency: bool,
}

impl StateMachine {
    /// Creates a state machine with no output surface, invisible, and unable
    /// to start or draw.
    #[must_use]
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            settings,
            output_surface_state: OutputSurfaceState::Lost,
            begin_frame_state: BeginFrameState::Idle,
            commit_state: CommitState::Idle,
            texture_state: TextureState::Unlocked,
            forced_redraw_state: ForcedRedrawState::Idle,
            readback_state: ReadbackState::Idle,
            commit_count: 0,
            current_frame_number: 0,
            last_frame_number_swap_performed: None,
            last_frame_number_begin_main_frame_sent: None,
            last_frame_number_update_visible_tiles_was_called: None,
            last_frame_number_manage_tiles_called: None,
            consecutive_failed_draws: 0,
            swaps_this_frame: 0,
            throttled_begin_main_frames_this_frame: 0,
            needs_redraw: false,
            needs_manage_tiles: false,
            swap_used_incomplete_tile: false,
            needs_commit: false,
            producer_needs_textures: false,
            inside_poll_for_anticipated_draw_triggers: false,
            visible: false,
            can_start: false,
            can_draw: false,
            has_pending_tree: false,
            pending_tree_is_ready_for_activation: false,
            active_tree_needs_first_draw: false,
            draw_if_possible_failed: false,
            did_create_and_initialize_first_output_surface: false,
            smoothness_takes_priority: false,
            skip_begin_main_frame_to_reduce_latency: false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The settings this machine was built with.
    #[must_use]
    pub const fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Output surface lifecycle state.
    #[must_use]
    pub const fn output_surface_state(&self) -> OutputSurfaceState {
        self.output_surface_state
    }

    /// Position within the current tick.
    #[must_use]
    pub const fn begin_frame_state(&self) -> BeginFrameState {
        self.begin_frame_state
    }

    /// Commit handoff state.
    #[must_use]
    pub const fn commit_state(&self) -> CommitState {
        self.commit_state
    }

    /// Texture token owner.
    #[must_use]
    pub const fn texture_state(&self) -> TextureState {
        self.texture_state
    }

    /// Forced-redraw recovery state.
    #[must_use]
    pub const fn forced_redraw_state(&self) -> ForcedRedrawState {
        self.forced_redraw_state
    }

    /// Readback request state.
    #[must_use]
    pub const fn readback_state(&self) -> ReadbackState {
        self.readback_state
    }

    /// Number of commits (including aborted-but-handled ones) so far.
    #[must_use]
    pub const fn commit_count(&self) -> u64 {
        self.commit_count
    }

    /// Monotonic tick counter, advanced by every BeginFrame and poll.
    #[must_use]
    pub const fn current_frame_number(&self) -> u64 {
        self.current_frame_number
    }

    /// Consecutive failed `DrawAndSwapIfPossible` attempts.
    #[must_use]
    pub const fn consecutive_failed_draws(&self) -> u32 {
        self.consecutive_failed_draws
    }

    /// Whether the active tree should be drawn.
    #[must_use]
    pub const fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    /// Whether a commit was requested.
    #[must_use]
    pub const fn needs_commit(&self) -> bool {
        self.needs_commit
    }

    /// Whether a pending tree is waiting to be activated.
    #[must_use]
    pub const fn has_pending_tree(&self) -> bool {
        self.has_pending_tree
    }

    /// Whether the active tree has not been drawn since it became active.
    #[must_use]
    pub const fn active_tree_needs_first_draw(&self) -> bool {
        self.active_tree_needs_first_draw
    }

    /// Whether the output surface can be drawn to.
    #[must_use]
    pub const fn has_initialized_output_surface(&self) -> bool {
        self.output_surface_state.is_initialized()
    }

    /// Whether the skip-begin-main-frame heuristic is currently engaged.
    #[must_use]
    pub const fn skip_begin_main_frame_to_reduce_latency(&self) -> bool {
        self.skip_begin_main_frame_to_reduce_latency
    }

    fn has_swapped_this_frame(&self) -> bool {
        self.last_frame_number_swap_performed == Some(self.current_frame_number)
    }

    fn has_sent_begin_main_frame_this_frame(&self) -> bool {
        self.last_frame_number_begin_main_frame_sent == Some(self.current_frame_number)
    }

    fn has_updated_visible_tiles_this_frame(&self) -> bool {
        self.last_frame_number_update_visible_tiles_was_called == Some(self.current_frame_number)
    }

    fn has_managed_tiles_this_frame(&self) -> bool {
        self.last_frame_number_manage_tiles_called == Some(self.current_frame_number)
    }

    // -----------------------------------------------------------------------
    // Policy predicates
    // -----------------------------------------------------------------------

    /// Activation must happen even if the pending tree is not ready, because
    /// otherwise nothing would ever unblock it.
    ///
    /// True while the producer holds the texture token or there is no output
    /// surface to draw the active tree with.
    #[must_use]
    pub fn pending_activations_should_be_forced(&self) -> bool {
        if self.texture_state == TextureState::AcquiredByProducer {
            return true;
        }
        matches!(
            self.output_surface_state,
            OutputSurfaceState::Lost | OutputSurfaceState::Creating
        )
    }

    /// Draws cannot or should not happen; an owed first draw is still
    /// performed as an abort so the bookkeeping advances.
    ///
    /// A superset of [`pending_activations_should_be_forced`], since
    /// activation waits on the active tree's first draw.
    ///
    /// [`pending_activations_should_be_forced`]: Self::pending_activations_should_be_forced
    #[must_use]
    pub fn pending_draws_should_be_aborted(&self) -> bool {
        self.pending_activations_should_be_forced() || !self.can_draw || !self.visible
    }

    fn should_draw(&self) -> bool {
        // The readback commit must be replaced before anything else is shown.
        if matches!(
            self.readback_state,
            ReadbackState::WaitingForReplacementCommit
                | ReadbackState::WaitingForReplacementActivation
        ) {
            return false;
        }

        // Unblock the producer as soon as possible.
        if self.readback_state == ReadbackState::WaitingForDrawAndReadback {
            return true;
        }

        // An aborted draw also hands back a token the producer is waiting
        // for; with draws aborted nothing else would release it.
        if self.pending_draws_should_be_aborted() {
            return self.active_tree_needs_first_draw
                || self.producer_waits_for_consumer_textures();
        }

        if self.has_swapped_this_frame() {
            return false;
        }

        if self.begin_frame_state != BeginFrameState::InsideDeadline {
            return false;
        }

        if self.forced_redraw_state == ForcedRedrawState::WaitingForDraw {
            return true;
        }

        self.needs_redraw
    }

    fn producer_waits_for_consumer_textures(&self) -> bool {
        self.producer_needs_textures && self.texture_state == TextureState::AcquiredByConsumer
    }

    fn should_acquire_layer_textures_for_main_thread(&self) -> bool {
        self.producer_needs_textures && self.texture_state == TextureState::Unlocked
    }

    fn should_update_visible_tiles(&self) -> bool {
        self.settings.impl_side_painting
            && !self.has_updated_visible_tiles_this_frame()
            && self.has_initialized_output_surface()
            && self.begin_frame_state == BeginFrameState::InsideDeadline
            && self.swap_used_incomplete_tile
    }

    fn should_activate_pending_tree(&self) -> bool {
        if !self.has_pending_tree {
            return false;
        }
        // A second tree never activates before the first one was drawn, even
        // when forced; the draw is aborted instead.
        if self.active_tree_needs_first_draw {
            return false;
        }
        self.pending_activations_should_be_forced() || self.pending_tree_is_ready_for_activation
    }

    fn should_commit(&self) -> bool {
        self.commit_state == CommitState::ReadyToCommit
    }

    fn should_manage_tiles(&self) -> bool {
        // Only after draws: either in the deadline or in a poll.
        if self.begin_frame_state != BeginFrameState::InsideDeadline
            && !self.inside_poll_for_anticipated_draw_triggers
        {
            return false;
        }
        self.needs_manage_tiles && !self.has_managed_tiles_this_frame()
    }

    fn should_send_begin_main_frame(&self) -> bool {
        if !self.needs_commit {
            return false;
        }
        if self.commit_state != CommitState::Idle || self.has_pending_tree {
            return false;
        }

        // Readbacks go out regardless of visibility.
        if self.readback_state == ReadbackState::NeedsBeginMainFrame {
            return true;
        }

        if !self.visible {
            return false;
        }

        // Start the first commit on a new surface right away.
        if self.output_surface_state == OutputSurfaceState::WaitingForFirstCommit {
            return true;
        }

        // Input may arrive before the next tick; wait for it unless no tick is
        // expected at all.
        if self.settings.deadline_scheduling_enabled
            && self.begin_frame_state == BeginFrameState::Idle
            && self.begin_frame_needed_by_impl_thread()
        {
            return false;
        }

        if self.forced_redraw_state == ForcedRedrawState::WaitingForCommit {
            return true;
        }

        if self.has_sent_begin_main_frame_this_frame() {
            return false;
        }

        if !self.has_initialized_output_surface() {
            return false;
        }

        !self.skip_begin_main_frame_to_reduce_latency
    }

    fn should_begin_output_surface_creation(&self) -> bool {
        if !self.can_start {
            return false;
        }
        // Drain the pipeline first.
        if self.commit_state != CommitState::Idle {
            return false;
        }
        if self.active_tree_needs_first_draw || self.has_pending_tree {
            return false;
        }
        self.output_surface_state == OutputSurfaceState::Lost
    }

    // -----------------------------------------------------------------------
    // Next action
    // -----------------------------------------------------------------------

    /// Returns the highest-priority action that should happen now.
    ///
    /// Pure: calling it repeatedly without mutating the machine returns the
    /// same action.
    #[must_use]
    pub fn next_action(&self) -> Action {
        if self.should_acquire_layer_textures_for_main_thread() {
            return Action::AcquireLayerTexturesForMainThread;
        }
        if self.should_update_visible_tiles() {
            return Action::UpdateVisibleTiles;
        }
        if self.should_activate_pending_tree() {
            return Action::ActivatePendingTree;
        }
        if self.should_commit() {
            return Action::Commit;
        }
        if self.should_draw() {
            return if self.readback_state == ReadbackState::WaitingForDrawAndReadback {
                Action::DrawAndReadback
            } else if self.pending_draws_should_be_aborted() {
                Action::DrawAndSwapAbort
            } else if self.forced_redraw_state == ForcedRedrawState::WaitingForDraw {
                Action::DrawAndSwapForced
            } else {
                Action::DrawAndSwapIfPossible
            };
        }
        if self.should_manage_tiles() {
            return Action::ManageTiles;
        }
        if self.should_send_begin_main_frame() {
            return Action::SendBeginMainFrame;
        }
        if self.should_begin_output_surface_creation() {
            return Action::BeginOutputSurfaceCreation;
        }
        Action::None
    }

    // -----------------------------------------------------------------------
    // Action transitions
    // -----------------------------------------------------------------------

    /// Records that `action` was performed.
    pub fn update_state(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::UpdateVisibleTiles => {
                self.last_frame_number_update_visible_tiles_was_called =
                    Some(self.current_frame_number);
            }
            Action::ActivatePendingTree => self.update_state_on_activation(),
            Action::SendBeginMainFrame => {
                debug_assert!(
                    !self.has_pending_tree,
                    "begin-main-frame sent with a pending tree: {}",
                    self.snapshot()
                );
                let exempt = self.readback_state == ReadbackState::NeedsBeginMainFrame
                    || self.forced_redraw_state == ForcedRedrawState::WaitingForCommit
                    || self.output_surface_state == OutputSurfaceState::WaitingForFirstCommit;
                if !exempt {
                    self.throttled_begin_main_frames_this_frame += 1;
                }
                self.commit_state = CommitState::FrameInProgress;
                self.needs_commit = false;
                if self.readback_state == ReadbackState::NeedsBeginMainFrame {
                    self.readback_state = ReadbackState::WaitingForCommit;
                }
                self.last_frame_number_begin_main_frame_sent = Some(self.current_frame_number);
            }
            Action::Commit => self.update_state_on_commit(false),
            Action::DrawAndSwapForced | Action::DrawAndSwapIfPossible => {
                self.update_state_on_draw(true);
            }
            Action::DrawAndSwapAbort | Action::DrawAndReadback => {
                self.update_state_on_draw(false);
            }
            Action::BeginOutputSurfaceCreation => {
                debug_assert_eq!(
                    self.output_surface_state,
                    OutputSurfaceState::Lost,
                    "surface creation requested while not lost"
                );
                self.output_surface_state = OutputSurfaceState::Creating;
            }
            Action::AcquireLayerTexturesForMainThread => {
                self.texture_state = TextureState::AcquiredByProducer;
                self.producer_needs_textures = false;
            }
            Action::ManageTiles => {
                self.needs_manage_tiles = false;
                self.last_frame_number_manage_tiles_called = Some(self.current_frame_number);
            }
        }
    }

    fn update_state_on_commit(&mut self, commit_was_aborted: bool) {
        self.commit_count += 1;

        // An aborted commit produces no pending tree, even with impl-side
        // painting.
        self.has_pending_tree = self.settings.impl_side_painting && !commit_was_aborted;

        match self.readback_state {
            ReadbackState::WaitingForCommit => {
                self.readback_state = if self.has_pending_tree {
                    ReadbackState::WaitingForActivation
                } else {
                    ReadbackState::WaitingForDrawAndReadback
                };
            }
            ReadbackState::WaitingForReplacementCommit => {
                self.readback_state = if self.has_pending_tree {
                    ReadbackState::WaitingForReplacementActivation
                } else {
                    ReadbackState::Idle
                };
            }
            _ => {}
        }

        // A readback in flight owns this commit; surface initialization and
        // forced redraws only advance on ordinary (or replacement) commits.
        if matches!(
            self.readback_state,
            ReadbackState::Idle
                | ReadbackState::NeedsBeginMainFrame
                | ReadbackState::WaitingForReplacementActivation
        ) {
            if self.forced_redraw_state == ForcedRedrawState::WaitingForCommit {
                self.forced_redraw_state = if self.has_pending_tree {
                    ForcedRedrawState::WaitingForActivation
                } else {
                    ForcedRedrawState::WaitingForDraw
                };
            }

            if self.output_surface_state == OutputSurfaceState::WaitingForFirstCommit {
                if self.has_pending_tree {
                    self.output_surface_state = OutputSurfaceState::WaitingForFirstActivation;
                } else {
                    self.output_surface_state = OutputSurfaceState::Active;
                    self.needs_redraw = true;
                }
            }
        }

        // Expect a draw unless the commit was aborted with nothing forcing one.
        self.commit_state = if !commit_was_aborted
            || self.readback_state != ReadbackState::Idle
            || self.forced_redraw_state != ForcedRedrawState::Idle
        {
            CommitState::WaitingForFirstDraw
        } else {
            CommitState::Idle
        };

        if !self.has_pending_tree
            && (!commit_was_aborted
                || self.readback_state == ReadbackState::WaitingForDrawAndReadback
                || self.forced_redraw_state == ForcedRedrawState::WaitingForDraw)
        {
            self.needs_redraw = true;
            self.active_tree_needs_first_draw = true;
        }

        self.pending_tree_is_ready_for_activation = false;

        // The failed draw did not really swap; let the retry swap this tick.
        if self.draw_if_possible_failed {
            self.last_frame_number_swap_performed = None;
        }

        // Lock the textures for the consumer only if a draw is coming.
        self.texture_state = if self.has_pending_tree || self.needs_redraw {
            TextureState::AcquiredByConsumer
        } else {
            TextureState::Unlocked
        };
    }

    fn update_state_on_activation(&mut self) {
        if self.output_surface_state == OutputSurfaceState::WaitingForFirstActivation {
            self.output_surface_state = OutputSurfaceState::Active;
        }
        if self.forced_redraw_state == ForcedRedrawState::WaitingForActivation {
            self.forced_redraw_state = ForcedRedrawState::WaitingForDraw;
        }
        match self.readback_state {
            ReadbackState::WaitingForActivation => {
                self.readback_state = ReadbackState::WaitingForDrawAndReadback;
            }
            ReadbackState::WaitingForReplacementActivation => {
                self.readback_state = ReadbackState::Idle;
            }
            _ => {}
        }

        self.has_pending_tree = false;
        self.pending_tree_is_ready_for_activation = false;
        self.active_tree_needs_first_draw = true;
        self.needs_redraw = true;
    }

    fn update_state_on_draw(&mut self, did_swap: bool) {
        debug_assert!(
            !matches!(
                self.readback_state,
                ReadbackState::WaitingForReplacementCommit
                    | ReadbackState::WaitingForReplacementActivation
            ),
            "draw while waiting for the readback replacement: {}",
            self.snapshot()
        );

        if self.readback_state == ReadbackState::WaitingForDrawAndReadback {
            // The producer already has a begin-main-frame behind the readback;
            // its commit replaces the readback content.
            self.commit_state = CommitState::FrameInProgress;
            self.readback_state = ReadbackState::WaitingForReplacementCommit;
        } else if self.forced_redraw_state == ForcedRedrawState::WaitingForDraw {
            self.commit_state = CommitState::Idle;
            self.forced_redraw_state = ForcedRedrawState::Idle;
        } else if self.commit_state == CommitState::WaitingForFirstDraw {
            self.commit_state = CommitState::Idle;
        }

        if self.texture_state == TextureState::AcquiredByConsumer {
            self.texture_state = TextureState::Unlocked;
        }

        self.needs_redraw = false;
        self.draw_if_possible_failed = false;
        self.active_tree_needs_first_draw = false;

        if did_swap {
            self.last_frame_number_swap_performed = Some(self.current_frame_number);
            self.swaps_this_frame += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Tick lifecycle
    // -----------------------------------------------------------------------

    /// A new BeginFrame tick started.
    pub fn on_begin_frame(&mut self, args: &BeginFrameArgs) {
        _ = args;
        debug_assert_eq!(
            self.begin_frame_state,
            BeginFrameState::Idle,
            "begin frame outside idle"
        );
        self.advance_frame();
        self.begin_frame_state = BeginFrameState::FrameStarting;
    }

    /// The tick's actions were drained and its deadline is posted.
    pub fn on_begin_frame_deadline_pending(&mut self) {
        debug_assert_eq!(
            self.begin_frame_state,
            BeginFrameState::FrameStarting,
            "deadline posted outside frame start"
        );
        self.begin_frame_state = BeginFrameState::InsideFrame;
    }

    /// The tick's deadline fired.
    pub fn on_begin_frame_deadline(&mut self) {
        debug_assert_eq!(
            self.begin_frame_state,
            BeginFrameState::InsideFrame,
            "deadline fired outside frame"
        );
        self.begin_frame_state = BeginFrameState::InsideDeadline;
    }

    /// Everything triggered by the deadline has run.
    pub fn on_begin_frame_idle(&mut self) {
        debug_assert_eq!(
            self.begin_frame_state,
            BeginFrameState::InsideDeadline,
            "idle outside deadline"
        );
        self.begin_frame_state = BeginFrameState::Idle;
    }

    /// A poll for draw triggers started. Counts as a tick for the
    /// once-per-tick rules.
    pub fn did_enter_poll_for_anticipated_draw_triggers(&mut self) {
        self.advance_frame();
        self.inside_poll_for_anticipated_draw_triggers = true;
    }

    /// The poll for draw triggers ended.
    pub fn did_leave_poll_for_anticipated_draw_triggers(&mut self) {
        self.inside_poll_for_anticipated_draw_triggers = false;
    }

    fn advance_frame(&mut self) {
        self.current_frame_number += 1;
        self.swaps_this_frame = 0;
        self.throttled_begin_main_frames_this_frame = 0;
    }

    // -----------------------------------------------------------------------
    // Begin-frame policy
    // -----------------------------------------------------------------------

    /// Whether the consumer thread wants BeginFrame ticks.
    ///
    /// The synchronous compositor must draw on every tick it receives, so it
    /// only asks for ticks it will draw on and polls for everything else.
    #[must_use]
    pub fn begin_frame_needed_by_impl_thread(&self) -> bool {
        if !self.supports_proactive_begin_frame() {
            return self.begin_frame_needed_to_draw();
        }
        self.begin_frame_needed_to_draw() || self.proactive_begin_frame_wanted()
    }

    /// Whether polling replaces proactive ticks.
    #[must_use]
    pub fn should_poll_for_anticipated_draw_triggers(&self) -> bool {
        if !self.supports_proactive_begin_frame() {
            return !self.begin_frame_needed_to_draw() && self.proactive_begin_frame_wanted();
        }
        false
    }

    /// Whether proactive ticks are acceptable for this embedder.
    #[must_use]
    pub fn supports_proactive_begin_frame(&self) -> bool {
        !self.settings.using_synchronous_renderer_compositor
            && self.settings.throttle_frame_production
    }

    fn begin_frame_needed_to_draw(&self) -> bool {
        if !self.has_initialized_output_surface() || !self.can_draw {
            return false;
        }
        if self.forced_redraw_state == ForcedRedrawState::WaitingForDraw {
            return true;
        }
        if !self.visible {
            return false;
        }
        // Ask again in the hope that more tiles are ready.
        if self.swap_used_incomplete_tile {
            return true;
        }
        self.needs_redraw
    }

    fn proactive_begin_frame_wanted(&self) -> bool {
        if !self.visible || !self.has_initialized_output_surface() {
            return false;
        }
        if self.needs_commit || self.commit_state != CommitState::Idle {
            return true;
        }
        if self.has_pending_tree || self.needs_manage_tiles {
            return true;
        }
        // A swap usually means another frame follows; staying subscribed
        // avoids toggling the tick source every other frame.
        self.has_swapped_this_frame()
    }

    /// Whether the deadline should fire now instead of at its scheduled time.
    #[must_use]
    pub fn should_trigger_begin_frame_deadline_early(&self) -> bool {
        // A readback never swaps, so there is nothing to hurry.
        if self.readback_state != ReadbackState::Idle {
            return false;
        }
        if self.begin_frame_state != BeginFrameState::InsideFrame {
            return false;
        }
        // End the frame so surface creation can start.
        if self.output_surface_state == OutputSurfaceState::Lost {
            return true;
        }
        if self.active_tree_needs_first_draw {
            return true;
        }
        if !self.needs_redraw {
            return false;
        }
        // Nothing is coming from the producer (e.g. after an aborted main
        // frame), or impl-thread smoothness wins.
        (self.commit_state == CommitState::Idle && !self.has_pending_tree)
            || self.smoothness_takes_priority
    }

    /// Whether the producer is running at least a frame behind.
    #[must_use]
    pub fn main_thread_is_in_high_latency_mode(&self) -> bool {
        let sent_this_frame = self.has_sent_begin_main_frame_this_frame();

        // A begin-main-frame sent this tick before the deadline is on time.
        if sent_this_frame
            && matches!(
                self.begin_frame_state,
                BeginFrameState::FrameStarting | BeginFrameState::InsideFrame
            )
        {
            return false;
        }

        // An outstanding commit is either from an earlier tick or started
        // after the deadline.
        if matches!(
            self.commit_state,
            CommitState::FrameInProgress | CommitState::ReadyToCommit
        ) {
            return true;
        }

        // A pending tree will only be drawn next tick.
        if self.has_pending_tree {
            return true;
        }

        if self.begin_frame_state == BeginFrameState::InsideDeadline {
            return (self.active_tree_needs_first_draw || self.has_swapped_this_frame())
                && !sent_this_frame;
        }

        self.active_tree_needs_first_draw
    }

    // -----------------------------------------------------------------------
    // Event setters
    // -----------------------------------------------------------------------

    /// The embedder is ready for output surface creation.
    pub fn set_can_start(&mut self) {
        self.can_start = true;
    }

    /// Content visibility changed.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Whether the consumer is able to draw at all (e.g. has a viewport).
    pub fn set_can_draw(&mut self, can_draw: bool) {
        self.can_draw = can_draw;
    }

    /// The active tree changed and must be drawn.
    pub fn set_needs_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Tile priorities changed.
    pub fn set_needs_manage_tiles(&mut self) {
        self.needs_manage_tiles = true;
    }

    /// Whether the last swap showed checkerboarded or missing tiles.
    pub fn set_swap_used_incomplete_tile(&mut self, used_incomplete_tile: bool) {
        self.swap_used_incomplete_tile = used_incomplete_tile;
    }

    /// Prefer presenting impl-thread work over waiting for the producer.
    pub fn set_smoothness_takes_priority(&mut self, smoothness_takes_priority: bool) {
        self.smoothness_takes_priority = smoothness_takes_priority;
    }

    /// The producer wants a new frame.
    pub fn set_needs_commit(&mut self) {
        self.needs_commit = true;
    }

    /// The producer needs a forced commit to read pixels back.
    ///
    /// Back-to-back requests are absorbed into the sequence already in
    /// flight. A request arriving after the readback draw but before the
    /// replacement commit starts a new sequence that reuses the replacement
    /// begin-main-frame.
    pub fn set_needs_forced_commit_for_readback(&mut self) {
        self.needs_commit = true;
        match self.readback_state {
            ReadbackState::NeedsBeginMainFrame
            | ReadbackState::WaitingForCommit
            | ReadbackState::WaitingForActivation
            | ReadbackState::WaitingForDrawAndReadback => {}
            ReadbackState::Idle
            | ReadbackState::WaitingForReplacementCommit
            | ReadbackState::WaitingForReplacementActivation => {
                // A begin-main-frame already in flight serves the readback.
                self.readback_state = if self.commit_state == CommitState::FrameInProgress {
                    ReadbackState::WaitingForCommit
                } else {
                    ReadbackState::NeedsBeginMainFrame
                };
            }
        }
    }

    /// The producer finished building the frame requested by the last
    /// begin-main-frame.
    pub fn finish_commit(&mut self) {
        debug_assert_eq!(
            self.commit_state,
            CommitState::FrameInProgress,
            "finish_commit without a frame in progress"
        );
        if self.commit_state == CommitState::FrameInProgress {
            self.commit_state = CommitState::ReadyToCommit;
        }
    }

    /// The producer gave up on the frame requested by the last
    /// begin-main-frame.
    ///
    /// With `did_handle` the abort counts as a no-op commit; otherwise the
    /// commit is re-requested as if it never started.
    pub fn begin_main_frame_aborted(&mut self, did_handle: bool) {
        debug_assert_eq!(
            self.commit_state,
            CommitState::FrameInProgress,
            "begin_main_frame_aborted without a frame in progress"
        );
        if self.commit_state != CommitState::FrameInProgress {
            return;
        }
        if did_handle {
            self.update_state_on_commit(true);
        } else {
            self.commit_state = CommitState::Idle;
            self.set_needs_commit();
        }
    }

    /// The producer wants the texture token.
    pub fn set_main_thread_needs_layer_textures(&mut self) {
        debug_assert!(
            self.texture_state != TextureState::AcquiredByProducer,
            "producer already holds the textures"
        );
        self.producer_needs_textures = true;
    }

    /// Result of the last `DrawAndSwapIfPossible`.
    ///
    /// A failure re-requests a commit; enough consecutive failures escalate
    /// to a forced redraw on the next commit.
    pub fn did_draw_if_possible_completed(&mut self, success: bool) {
        self.draw_if_possible_failed = !success;
        if success {
            self.consecutive_failed_draws = 0;
            self.forced_redraw_state = ForcedRedrawState::Idle;
            return;
        }

        self.needs_redraw = true;
        self.needs_commit = true;
        self.swaps_this_frame = self.swaps_this_frame.saturating_sub(1);
        self.consecutive_failed_draws += 1;
        if self.settings.timeout_and_draw_when_animation_checkerboards
            && self.consecutive_failed_draws
                >= self
                    .settings
                    .maximum_number_of_failed_draws_before_draw_is_forced
        {
            self.consecutive_failed_draws = 0;
            // Forcing only makes sense with fresh content.
            self.forced_redraw_state = ForcedRedrawState::WaitingForCommit;
        }
    }

    /// The output surface was lost. Ignored while one is already being
    /// created.
    pub fn did_lose_output_surface(&mut self) {
        if matches!(
            self.output_surface_state,
            OutputSurfaceState::Lost | OutputSurfaceState::Creating
        ) {
            return;
        }
        self.output_surface_state = OutputSurfaceState::Lost;
        self.needs_redraw = false;
    }

    /// The pending tree finished rasterizing.
    pub fn notify_ready_to_activate(&mut self) {
        if self.has_pending_tree {
            self.pending_tree_is_ready_for_activation = true;
        }
    }

    /// The output surface requested by `BeginOutputSurfaceCreation` exists.
    pub fn did_create_and_initialize_output_surface(&mut self) {
        debug_assert_eq!(
            self.output_surface_state,
            OutputSurfaceState::Creating,
            "surface initialized without being requested"
        );
        self.output_surface_state = OutputSurfaceState::WaitingForFirstCommit;

        // A recreated surface needs fresh content; the very first one waits
        // for the producer's own request.
        if self.did_create_and_initialize_first_output_surface {
            self.needs_commit = true;
        }
        self.did_create_and_initialize_first_output_surface = true;
    }

    /// Engages or clears the skip-begin-main-frame heuristic.
    pub fn set_skip_begin_main_frame_to_reduce_latency(&mut self, skip: bool) {
        self.skip_begin_main_frame_to_reduce_latency = skip;
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Checks the structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let frame = self.current_frame_number;
        if self.swaps_this_frame > 1 {
            return Err(InvariantViolation::MultipleSwapsInFrame { frame });
        }
        if self.throttled_begin_main_frames_this_frame > 1 {
            return Err(InvariantViolation::MultipleBeginMainFramesInFrame { frame });
        }
        if self.forced_redraw_state == ForcedRedrawState::WaitingForDraw
            && self.readback_state == ReadbackState::WaitingForDrawAndReadback
        {
            return Err(InvariantViolation::ForcedRedrawAndReadbackBothWaitingForDraw);
        }
        if self.has_pending_tree && !self.settings.impl_side_painting {
            return Err(InvariantViolation::PendingTreeWithoutImplSidePainting);
        }
        if self.pending_tree_is_ready_for_activation && !self.has_pending_tree {
            return Err(InvariantViolation::ReadyWithoutPendingTree);
        }
        let stamps = [
            ("swap", self.last_frame_number_swap_performed),
            (
                "begin_main_frame",
                self.last_frame_number_begin_main_frame_sent,
            ),
            (
                "update_visible_tiles",
                self.last_frame_number_update_visible_tiles_was_called,
            ),
            ("manage_tiles", self.last_frame_number_manage_tiles_called),
        ];
        for (what, stamp) in stamps {
            if let Some(stamped) = stamp.filter(|&s| s > frame) {
                return Err(InvariantViolation::StampFromTheFuture {
                    what,
                    stamped,
                    current: frame,
                });
            }
        }
        Ok(())
    }

    /// Captures every sub-state, counter and flag.
    #[must_use]
    pub fn snapshot(&self) -> StateMachineSnapshot {
        StateMachineSnapshot {
            next_action: self.next_action(),
            output_surface_state: self.output_surface_state,
            begin_frame_state: self.begin_frame_state,
            commit_state: self.commit_state,
            texture_state: self.texture_state,
            forced_redraw_state: self.forced_redraw_state,
            readback_state: self.readback_state,
            commit_count: self.commit_count,
            current_frame_number: self.current_frame_number,
            last_frame_number_swap_performed: self.last_frame_number_swap_performed,
            last_frame_number_begin_main_frame_sent: self.last_frame_number_begin_main_frame_sent,
            last_frame_number_update_visible_tiles_was_called: self
                .last_frame_number_update_visible_tiles_was_called,
            last_frame_number_manage_tiles_called: self.last_frame_number_manage_tiles_called,
            consecutive_failed_draws: self.consecutive_failed_draws,
            needs_redraw: self.needs_redraw,
            needs_manage_tiles: self.needs_manage_tiles,
            swap_used_incomplete_tile: self.swap_used_incomplete_tile,
            needs_commit: self.needs_commit,
            producer_needs_textures: self.producer_needs_textures,
            inside_poll_for_anticipated_draw_triggers: self
                .inside_poll_for_anticipated_draw_triggers,
            visible: self.visible,
            can_start: self.can_start,
            can_draw: self.can_draw,
            has_pending_tree: self.has_pending_tree,
            pending_tree_is_ready_for_activation: self.pending_tree_is_ready_for_activation,
            active_tree_needs_first_draw: self.active_tree_needs_first_draw,
            draw_if_possible_failed: self.draw_if_possible_failed,
            did_create_and_initialize_first_output_surface: self
                .did_create_and_initialize_first_output_surface,
            smoothness_takes_priority: self.smoothness_takes_priority,
            skip_begin_main_frame_to_reduce_latency: self.skip_begin_main_frame_to_reduce_latency,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::time::Duration;

    /// Drains actions the way the scheduler does, reporting `draw_ok` for
    /// every `DrawAndSwapIfPossible`.
    fn drain(sm: &mut StateMachine, draw_ok: bool) -> Vec<Action> {
        let mut out = Vec::new();
        for _ in 0..64 {
            assert_eq!(sm.check_invariants(), Ok(()), "{}", sm.snapshot());
            let action = sm.next_action();
            sm.update_state(action);
            if action == Action::None {
                return out;
            }
            if action == Action::DrawAndSwapIfPossible {
                sm.did_draw_if_possible_completed(draw_ok);
            }
            out.push(action);
        }
        panic!("actions did not settle: {}", sm.snapshot());
    }

    fn run_actions(sm: &mut StateMachine) -> Vec<Action> {
        drain(sm, true)
    }

    fn begin_frame(sm: &mut StateMachine) -> Vec<Action> {
        sm.on_begin_frame(&BeginFrameArgs::default());
        let actions = run_actions(sm);
        sm.on_begin_frame_deadline_pending();
        actions
    }

    fn deadline_with(sm: &mut StateMachine, draw_ok: bool) -> Vec<Action> {
        sm.on_begin_frame_deadline();
        let actions = drain(sm, draw_ok);
        sm.on_begin_frame_idle();
        actions
    }

    fn deadline(sm: &mut StateMachine) -> Vec<Action> {
        deadline_with(sm, true)
    }

    fn impl_side() -> SchedulerSettings {
        SchedulerSettings::threaded()
    }

    fn main_thread_painting() -> SchedulerSettings {
        SchedulerSettings {
            impl_side_painting: false,
            ..SchedulerSettings::threaded()
        }
    }

    /// Visible, drawable, with an active surface whose first frame was drawn.
    fn ready_machine(settings: SchedulerSettings) -> StateMachine {
        let mut sm = StateMachine::new(settings);
        sm.set_can_start();
        sm.set_visible(true);
        sm.set_can_draw(true);
        assert_eq!(run_actions(&mut sm), [Action::BeginOutputSurfaceCreation]);
        sm.did_create_and_initialize_output_surface();
        sm.set_needs_commit();
        assert_eq!(run_actions(&mut sm), [Action::SendBeginMainFrame]);
        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        if settings.impl_side_painting {
            sm.notify_ready_to_activate();
            assert_eq!(run_actions(&mut sm), [Action::ActivatePendingTree]);
        }
        assert_eq!(sm.output_surface_state(), OutputSurfaceState::Active);
        assert!(begin_frame(&mut sm).is_empty());
        assert_eq!(deadline(&mut sm), [Action::DrawAndSwapIfPossible]);
        assert!(!sm.needs_redraw());
        assert_eq!(sm.commit_state(), CommitState::Idle);
        sm
    }

    #[test]
    fn nothing_happens_before_can_start() {
        let mut sm = StateMachine::new(impl_side());
        sm.set_visible(true);
        sm.set_can_draw(true);
        sm.set_needs_commit();
        assert_eq!(sm.next_action(), Action::None);
    }

    #[test]
    fn first_surface_waits_for_producer_request() {
        let mut sm = StateMachine::new(impl_side());
        sm.set_can_start();
        sm.set_visible(true);
        sm.set_can_draw(true);
        assert_eq!(run_actions(&mut sm), [Action::BeginOutputSurfaceCreation]);
        assert_eq!(sm.output_surface_state(), OutputSurfaceState::Creating);

        sm.did_create_and_initialize_output_surface();
        assert!(run_actions(&mut sm).is_empty());

        sm.set_needs_commit();
        assert_eq!(run_actions(&mut sm), [Action::SendBeginMainFrame]);
        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        assert_eq!(
            sm.output_surface_state(),
            OutputSurfaceState::WaitingForFirstActivation
        );
        sm.notify_ready_to_activate();
        assert_eq!(run_actions(&mut sm), [Action::ActivatePendingTree]);
        assert_eq!(sm.output_surface_state(), OutputSurfaceState::Active);
        assert!(sm.needs_redraw());
        assert!(sm.active_tree_needs_first_draw());
    }

    #[test]
    fn main_thread_painting_activates_surface_on_commit() {
        let mut sm = StateMachine::new(main_thread_painting());
        sm.set_can_start();
        sm.set_visible(true);
        sm.set_can_draw(true);
        run_actions(&mut sm);
        sm.did_create_and_initialize_output_surface();
        sm.set_needs_commit();
        run_actions(&mut sm);
        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        assert_eq!(sm.output_surface_state(), OutputSurfaceState::Active);
        assert!(!sm.has_pending_tree());
        assert!(sm.needs_redraw());
    }

    #[test]
    fn commit_waits_for_tick_then_draws_at_deadline() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_commit();
        // Idle with ticks coming: wait for the tick.
        assert!(run_actions(&mut sm).is_empty());

        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);
        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        sm.notify_ready_to_activate();
        assert_eq!(run_actions(&mut sm), [Action::ActivatePendingTree]);
        assert_eq!(deadline(&mut sm), [Action::DrawAndSwapIfPossible]);

        assert_eq!(sm.commit_state(), CommitState::Idle);
        assert!(!sm.needs_redraw());
        assert_eq!(sm.commit_count(), 2);
    }

    #[test]
    fn begin_main_frame_goes_out_immediately_without_deadline_scheduling() {
        let mut sm = ready_machine(SchedulerSettings::synchronous());
        sm.set_needs_commit();
        assert_eq!(run_actions(&mut sm), [Action::SendBeginMainFrame]);
    }

    #[test]
    fn at_most_one_begin_main_frame_per_tick() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_commit();
        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);
        sm.begin_main_frame_aborted(false);
        assert!(sm.needs_commit());
        // Same tick: no second begin-main-frame.
        assert!(run_actions(&mut sm).is_empty());
        assert!(deadline(&mut sm).is_empty());
        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);
    }

    #[test]
    fn handled_abort_counts_as_empty_commit() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_commit();
        begin_frame(&mut sm);
        sm.begin_main_frame_aborted(true);
        assert_eq!(sm.commit_state(), CommitState::Idle);
        assert!(!sm.has_pending_tree());
        assert!(!sm.needs_commit());
    }

    #[test]
    fn failed_draws_escalate_to_forced_redraw() {
        let settings = SchedulerSettings {
            maximum_number_of_failed_draws_before_draw_is_forced: 2,
            ..impl_side()
        };
        let mut sm = ready_machine(settings);

        sm.set_needs_redraw();
        begin_frame(&mut sm);
        // The failure re-requests a commit within the same deadline.
        assert_eq!(
            deadline_with(&mut sm, false),
            [Action::DrawAndSwapIfPossible, Action::SendBeginMainFrame]
        );
        assert_eq!(sm.consecutive_failed_draws(), 1);
        assert_eq!(sm.forced_redraw_state(), ForcedRedrawState::Idle);

        begin_frame(&mut sm);
        assert_eq!(
            deadline_with(&mut sm, false),
            [Action::DrawAndSwapIfPossible]
        );
        assert_eq!(
            sm.forced_redraw_state(),
            ForcedRedrawState::WaitingForCommit
        );
        assert_eq!(sm.consecutive_failed_draws(), 0);

        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        assert_eq!(
            sm.forced_redraw_state(),
            ForcedRedrawState::WaitingForActivation
        );
        sm.notify_ready_to_activate();
        assert_eq!(run_actions(&mut sm), [Action::ActivatePendingTree]);
        assert_eq!(sm.forced_redraw_state(), ForcedRedrawState::WaitingForDraw);

        begin_frame(&mut sm);
        assert_eq!(deadline(&mut sm)[0], Action::DrawAndSwapForced);
        assert_eq!(sm.forced_redraw_state(), ForcedRedrawState::Idle);
    }

    #[test]
    fn forced_redraw_without_impl_side_painting_skips_activation() {
        let settings = SchedulerSettings {
            maximum_number_of_failed_draws_before_draw_is_forced: 1,
            ..main_thread_painting()
        };
        let mut sm = ready_machine(settings);

        sm.set_needs_redraw();
        begin_frame(&mut sm);
        assert_eq!(
            deadline_with(&mut sm, false),
            [Action::DrawAndSwapIfPossible, Action::SendBeginMainFrame]
        );
        assert_eq!(
            sm.forced_redraw_state(),
            ForcedRedrawState::WaitingForCommit
        );

        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        assert_eq!(sm.forced_redraw_state(), ForcedRedrawState::WaitingForDraw);

        begin_frame(&mut sm);
        assert_eq!(deadline(&mut sm), [Action::DrawAndSwapForced]);
        assert_eq!(sm.commit_state(), CommitState::Idle);
    }

    #[test]
    fn successful_draw_resets_failure_count() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_redraw();
        begin_frame(&mut sm);
        deadline_with(&mut sm, false);
        assert_eq!(sm.consecutive_failed_draws(), 1);

        sm.finish_commit();
        run_actions(&mut sm);
        sm.notify_ready_to_activate();
        run_actions(&mut sm);
        begin_frame(&mut sm);
        assert_eq!(deadline(&mut sm)[0], Action::DrawAndSwapIfPossible);
        assert_eq!(sm.consecutive_failed_draws(), 0);
    }

    #[test]
    fn producer_holding_textures_forces_activation_and_aborts_draw() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_commit();
        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);
        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        assert_eq!(sm.texture_state(), TextureState::AcquiredByConsumer);

        sm.set_main_thread_needs_layer_textures();
        // The consumer still holds the token.
        assert!(run_actions(&mut sm).is_empty());
        assert!(!sm.pending_activations_should_be_forced());

        sm.set_needs_redraw();
        assert_eq!(
            deadline(&mut sm),
            [
                Action::DrawAndSwapIfPossible,
                Action::AcquireLayerTexturesForMainThread,
                Action::ActivatePendingTree,
                Action::DrawAndSwapAbort,
            ]
        );
        assert_eq!(sm.texture_state(), TextureState::AcquiredByProducer);
        assert!(sm.pending_activations_should_be_forced());
        assert!(sm.pending_draws_should_be_aborted());

        // The next commit takes the token back.
        sm.set_needs_commit();
        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);
        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        assert_eq!(sm.texture_state(), TextureState::AcquiredByConsumer);
        assert!(!sm.pending_activations_should_be_forced());
    }

    #[test]
    fn unlocked_token_goes_to_producer_immediately() {
        let mut sm = ready_machine(impl_side());
        assert_eq!(sm.texture_state(), TextureState::Unlocked);

        sm.set_main_thread_needs_layer_textures();
        assert_eq!(
            run_actions(&mut sm),
            [Action::AcquireLayerTexturesForMainThread]
        );
        assert_eq!(sm.texture_state(), TextureState::AcquiredByProducer);
        assert!(sm.pending_draws_should_be_aborted());

        // Aborted until the producer's next commit takes the token back.
        sm.set_needs_commit();
        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);
        assert!(sm.pending_draws_should_be_aborted());
        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        assert_eq!(sm.texture_state(), TextureState::AcquiredByConsumer);
        assert!(!sm.pending_draws_should_be_aborted());
    }

    #[test]
    fn hidden_consumer_hands_back_textures_the_producer_waits_for() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_commit();
        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);
        sm.set_needs_redraw();
        sm.begin_main_frame_aborted(true);
        assert_eq!(sm.texture_state(), TextureState::AcquiredByConsumer);
        assert_eq!(sm.commit_state(), CommitState::Idle);
        assert!(!sm.active_tree_needs_first_draw());
        assert!(run_actions(&mut sm).is_empty());

        sm.set_visible(false);
        assert!(run_actions(&mut sm).is_empty());

        // No ticks will come while hidden; the abort releases the token.
        sm.set_main_thread_needs_layer_textures();
        assert_eq!(
            run_actions(&mut sm),
            [
                Action::DrawAndSwapAbort,
                Action::AcquireLayerTexturesForMainThread,
            ]
        );
        assert_eq!(sm.texture_state(), TextureState::AcquiredByProducer);
        assert!(deadline(&mut sm).is_empty());
    }

    #[test]
    fn readback_while_invisible_runs_full_sequence() {
        let mut sm = ready_machine(impl_side());
        sm.set_visible(false);

        sm.set_needs_forced_commit_for_readback();
        assert_eq!(run_actions(&mut sm), [Action::SendBeginMainFrame]);
        assert_eq!(sm.readback_state(), ReadbackState::WaitingForCommit);

        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        assert_eq!(sm.readback_state(), ReadbackState::WaitingForActivation);

        sm.notify_ready_to_activate();
        assert_eq!(
            run_actions(&mut sm),
            [Action::ActivatePendingTree, Action::DrawAndReadback]
        );
        assert_eq!(
            sm.readback_state(),
            ReadbackState::WaitingForReplacementCommit
        );
        assert_eq!(sm.commit_state(), CommitState::FrameInProgress);

        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        assert_eq!(
            sm.readback_state(),
            ReadbackState::WaitingForReplacementActivation
        );
        sm.notify_ready_to_activate();
        // Still invisible: the replacement tree is owed a draw, which aborts.
        assert_eq!(
            run_actions(&mut sm),
            [Action::ActivatePendingTree, Action::DrawAndSwapAbort]
        );
        assert_eq!(sm.readback_state(), ReadbackState::Idle);
        assert_eq!(sm.commit_state(), CommitState::Idle);
    }

    #[test]
    fn readback_without_impl_side_painting_draws_after_commit() {
        let mut sm = ready_machine(main_thread_painting());
        sm.set_needs_forced_commit_for_readback();
        assert_eq!(run_actions(&mut sm), [Action::SendBeginMainFrame]);
        sm.finish_commit();
        assert_eq!(
            run_actions(&mut sm),
            [Action::Commit, Action::DrawAndReadback]
        );
        sm.finish_commit();
        assert_eq!(run_actions(&mut sm), [Action::Commit]);
        assert_eq!(sm.readback_state(), ReadbackState::Idle);
    }

    #[test]
    fn repeated_readback_requests_are_absorbed() {
        let mut sm = ready_machine(impl_side());
        sm.set_visible(false);
        sm.set_needs_forced_commit_for_readback();
        sm.set_needs_forced_commit_for_readback();
        assert_eq!(sm.readback_state(), ReadbackState::NeedsBeginMainFrame);
        assert_eq!(run_actions(&mut sm), [Action::SendBeginMainFrame]);

        sm.set_needs_forced_commit_for_readback();
        assert_eq!(sm.readback_state(), ReadbackState::WaitingForCommit);
        assert!(run_actions(&mut sm).is_empty());
    }

    #[test]
    fn readback_reuses_begin_main_frame_in_flight() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_commit();
        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);
        sm.set_needs_forced_commit_for_readback();
        assert_eq!(sm.readback_state(), ReadbackState::WaitingForCommit);
    }

    #[test]
    fn surface_lost_mid_commit_drains_pipeline_before_recreating() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_commit();
        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);

        sm.did_lose_output_surface();
        assert!(sm.pending_activations_should_be_forced());
        // Commit in flight: creation waits.
        assert!(run_actions(&mut sm).is_empty());

        sm.finish_commit();
        assert_eq!(
            run_actions(&mut sm),
            [
                Action::Commit,
                Action::ActivatePendingTree,
                Action::DrawAndSwapAbort,
                Action::BeginOutputSurfaceCreation,
            ]
        );
        assert_eq!(sm.commit_state(), CommitState::Idle);
        assert_eq!(sm.texture_state(), TextureState::Unlocked);
        // Still forced while the replacement is being created.
        assert!(sm.pending_activations_should_be_forced());
    }

    #[test]
    fn recreated_surface_requests_commit() {
        let mut sm = ready_machine(impl_side());
        sm.did_lose_output_surface();
        assert_eq!(run_actions(&mut sm), [Action::BeginOutputSurfaceCreation]);
        sm.did_create_and_initialize_output_surface();
        assert!(sm.needs_commit());
        assert_eq!(run_actions(&mut sm), [Action::SendBeginMainFrame]);
    }

    #[test]
    fn losing_surface_while_creating_is_ignored() {
        let mut sm = ready_machine(impl_side());
        sm.did_lose_output_surface();
        run_actions(&mut sm);
        sm.did_lose_output_surface();
        assert_eq!(sm.output_surface_state(), OutputSurfaceState::Creating);
    }

    #[test]
    fn early_deadline_when_nothing_else_is_coming() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_redraw();
        begin_frame(&mut sm);
        assert!(sm.should_trigger_begin_frame_deadline_early());
    }

    #[test]
    fn no_early_deadline_while_commit_in_flight_unless_smoothness_wins() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_redraw();
        sm.set_needs_commit();
        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);
        assert!(!sm.should_trigger_begin_frame_deadline_early());

        sm.set_smoothness_takes_priority(true);
        assert!(sm.should_trigger_begin_frame_deadline_early());
    }

    #[test]
    fn lost_surface_ends_frame_early() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_commit();
        begin_frame(&mut sm);
        sm.did_lose_output_surface();
        assert!(sm.should_trigger_begin_frame_deadline_early());
    }

    #[test]
    fn readback_never_triggers_early_deadline() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_forced_commit_for_readback();
        sm.set_needs_redraw();
        begin_frame(&mut sm);
        assert!(!sm.should_trigger_begin_frame_deadline_early());
    }

    #[test]
    fn late_begin_main_frame_is_high_latency() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_commit();
        assert_eq!(begin_frame(&mut sm), [Action::SendBeginMainFrame]);
        assert!(!sm.main_thread_is_in_high_latency_mode());
        assert!(deadline(&mut sm).is_empty());

        // Still outstanding when the next tick starts.
        sm.on_begin_frame(&BeginFrameArgs::default());
        assert!(sm.main_thread_is_in_high_latency_mode());
    }

    #[test]
    fn skip_suppresses_begin_main_frame_for_the_tick() {
        let mut sm = ready_machine(impl_side());
        sm.set_skip_begin_main_frame_to_reduce_latency(true);
        sm.set_needs_commit();
        assert!(begin_frame(&mut sm).is_empty());

        sm.set_skip_begin_main_frame_to_reduce_latency(false);
        assert_eq!(run_actions(&mut sm), [Action::SendBeginMainFrame]);
    }

    #[test]
    fn synchronous_compositor_polls_instead_of_ticking_proactively() {
        let mut sm = ready_machine(SchedulerSettings::synchronous());
        assert!(!sm.supports_proactive_begin_frame());
        assert!(!sm.begin_frame_needed_by_impl_thread());

        sm.set_needs_commit();
        assert!(!sm.begin_frame_needed_by_impl_thread());
        assert!(sm.should_poll_for_anticipated_draw_triggers());

        sm.set_needs_redraw();
        assert!(sm.begin_frame_needed_by_impl_thread());
        assert!(!sm.should_poll_for_anticipated_draw_triggers());
    }

    #[test]
    fn threaded_compositor_keeps_ticking_after_a_swap() {
        let mut sm = ready_machine(impl_side());
        // Swapped in the frame that just ended.
        assert!(sm.begin_frame_needed_by_impl_thread());
        begin_frame(&mut sm);
        deadline(&mut sm);
        assert!(!sm.begin_frame_needed_by_impl_thread());
    }

    #[test]
    fn manage_tiles_runs_once_per_deadline() {
        let mut sm = ready_machine(impl_side());
        sm.set_needs_manage_tiles();
        assert!(run_actions(&mut sm).is_empty());
        begin_frame(&mut sm);
        assert_eq!(deadline(&mut sm), [Action::ManageTiles]);
        sm.set_needs_manage_tiles();
        assert!(run_actions(&mut sm).is_empty());
    }

    #[test]
    fn manage_tiles_runs_inside_poll() {
        let mut sm = ready_machine(SchedulerSettings {
            impl_side_painting: true,
            ..SchedulerSettings::synchronous()
        });
        sm.set_needs_manage_tiles();
        sm.did_enter_poll_for_anticipated_draw_triggers();
        assert_eq!(run_actions(&mut sm), [Action::ManageTiles]);
        sm.did_leave_poll_for_anticipated_draw_triggers();
    }

    #[test]
    fn incomplete_tiles_update_once_per_deadline() {
        let mut sm = ready_machine(impl_side());
        sm.set_swap_used_incomplete_tile(true);
        assert!(sm.begin_frame_needed_by_impl_thread());
        begin_frame(&mut sm);
        assert_eq!(deadline(&mut sm), [Action::UpdateVisibleTiles]);
    }

    #[test]
    fn invisible_drops_redraws() {
        let mut sm = ready_machine(impl_side());
        sm.set_visible(false);
        sm.set_needs_redraw();
        assert!(!sm.begin_frame_needed_by_impl_thread());
        assert!(sm.pending_draws_should_be_aborted());
        begin_frame(&mut sm);
        assert!(deadline(&mut sm).is_empty());
    }

    #[test]
    fn snapshot_reports_next_action() {
        let mut sm = ready_machine(SchedulerSettings::synchronous());
        sm.set_needs_commit();
        let snapshot = sm.snapshot();
        assert_eq!(snapshot.next_action, Action::SendBeginMainFrame);
        assert!(snapshot.needs_commit);
        assert_eq!(snapshot.current_frame_number, sm.current_frame_number());
    }

    #[test]
    fn invariant_violation_is_reported() {
        let mut sm = StateMachine::new(impl_side());
        sm.swaps_this_frame = 2;
        assert_eq!(
            sm.check_invariants(),
            Err(InvariantViolation::MultipleSwapsInFrame { frame: 0 })
        );
    }

    mod properties {
        use alloc::vec;

        use proptest::prelude::*;

        use super::*;

        #[derive(Clone, Copy, Debug)]
        enum Op {
            CanStart,
            Visible(bool),
            CanDraw(bool),
            NeedsRedraw,
            NeedsManageTiles,
            NeedsCommit,
            Readback,
            FinishCommit,
            AbortMainFrame(bool),
            NeedsTextures,
            LoseSurface,
            CreateSurface,
            ReadyToActivate,
            Smoothness(bool),
            IncompleteTile(bool),
            SkipMainFrame(bool),
            Tick,
            Deadline(bool),
            Poll,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::CanStart),
                any::<bool>().prop_map(Op::Visible),
                any::<bool>().prop_map(Op::CanDraw),
                Just(Op::NeedsRedraw),
                Just(Op::NeedsManageTiles),
                Just(Op::NeedsCommit),
                Just(Op::Readback),
                Just(Op::FinishCommit),
                any::<bool>().prop_map(Op::AbortMainFrame),
                Just(Op::NeedsTextures),
                Just(Op::LoseSurface),
                Just(Op::CreateSurface),
                Just(Op::ReadyToActivate),
                any::<bool>().prop_map(Op::Smoothness),
                any::<bool>().prop_map(Op::IncompleteTile),
                any::<bool>().prop_map(Op::SkipMainFrame),
                Just(Op::Tick),
                any::<bool>().prop_map(Op::Deadline),
                Just(Op::Poll),
            ]
        }

        fn settings() -> impl Strategy<Value = SchedulerSettings> {
            (any::<bool>(), any::<bool>(), any::<bool>(), 1u32..4).prop_map(
                |(impl_side_painting, deadline_scheduling_enabled, synchronous, failures)| {
                    SchedulerSettings {
                        impl_side_painting,
                        deadline_scheduling_enabled,
                        using_synchronous_renderer_compositor: synchronous,
                        maximum_number_of_failed_draws_before_draw_is_forced: failures,
                        low_latency_safety_margin: Duration::ZERO,
                        ..SchedulerSettings::threaded()
                    }
                },
            )
        }

        fn run_deadline(sm: &mut StateMachine, draw_ok: bool) {
            if sm.begin_frame_state() == BeginFrameState::InsideFrame {
                deadline_with(sm, draw_ok);
            }
        }

        /// Applies `op`, skipping it when its precondition does not hold.
        fn apply(sm: &mut StateMachine, op: Op) {
            match op {
                Op::CanStart => sm.set_can_start(),
                Op::Visible(v) => sm.set_visible(v),
                Op::CanDraw(v) => sm.set_can_draw(v),
                Op::NeedsRedraw => sm.set_needs_redraw(),
                Op::NeedsManageTiles => sm.set_needs_manage_tiles(),
                Op::NeedsCommit => sm.set_needs_commit(),
                Op::Readback => sm.set_needs_forced_commit_for_readback(),
                Op::FinishCommit => {
                    if sm.commit_state() == CommitState::FrameInProgress {
                        sm.finish_commit();
                    }
                }
                Op::AbortMainFrame(handled) => {
                    if sm.commit_state() == CommitState::FrameInProgress {
                        sm.begin_main_frame_aborted(handled);
                    }
                }
                Op::NeedsTextures => {
                    if sm.texture_state() != TextureState::AcquiredByProducer {
                        sm.set_main_thread_needs_layer_textures();
                    }
                }
                Op::LoseSurface => sm.did_lose_output_surface(),
                Op::CreateSurface => {
                    if sm.output_surface_state() == OutputSurfaceState::Creating {
                        sm.did_create_and_initialize_output_surface();
                    }
                }
                Op::ReadyToActivate => sm.notify_ready_to_activate(),
                Op::Smoothness(v) => sm.set_smoothness_takes_priority(v),
                Op::IncompleteTile(v) => sm.set_swap_used_incomplete_tile(v),
                Op::SkipMainFrame(v) => sm.set_skip_begin_main_frame_to_reduce_latency(v),
                Op::Tick => {
                    run_deadline(sm, true);
                    begin_frame(sm);
                    if sm.settings().using_synchronous_renderer_compositor {
                        deadline(sm);
                    }
                }
                Op::Deadline(draw_ok) => run_deadline(sm, draw_ok),
                Op::Poll => {
                    if sm.begin_frame_state() == BeginFrameState::Idle {
                        sm.did_enter_poll_for_anticipated_draw_triggers();
                        run_actions(sm);
                        sm.did_leave_poll_for_anticipated_draw_triggers();
                    }
                }
            }
            drain(sm, true);
        }

        proptest! {
            #[test]
            fn invariants_hold_under_random_events(
                settings in settings(),
                ops in proptest::collection::vec(op(), 1..200),
            ) {
                let mut sm = StateMachine::new(settings);
                for op in ops {
                    apply(&mut sm, op);
                    prop_assert_eq!(sm.check_invariants(), Ok(()));
                    prop_assert_eq!(sm.next_action(), sm.next_action());
                    if sm.texture_state() == TextureState::AcquiredByProducer {
                        prop_assert!(sm.pending_activations_should_be_forced());
                        prop_assert!(sm.pending_draws_should_be_aborted());
                    }
                    prop_assert!(!(sm.forced_redraw_state() == ForcedRedrawState::WaitingForDraw
                        && sm.readback_state() == ReadbackState::WaitingForDrawAndReadback));
                    if sm.has_pending_tree() {
                        prop_assert!(settings.impl_side_painting);
                    }
                }
                run_deadline(&mut sm, true);
                prop_assert_eq!(sm.begin_frame_state(), BeginFrameState::Idle);
            }

            #[test]
            fn frame_number_only_moves_forward(
                ops in proptest::collection::vec(op(), 1..100),
            ) {
                let mut sm = StateMachine::new(SchedulerSettings::threaded());
                let mut last = sm.current_frame_number();
                for op in ops {
                    apply(&mut sm, op);
                    prop_assert!(sm.current_frame_number() >= last);
                    last = sm.current_frame_number();
                }
            }
        }
    }
}
