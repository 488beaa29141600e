// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sub-state enums and the action vocabulary of the state machine.
//!
//! Each enum is an independent axis of scheduling state. The
//! [`StateMachine`](crate::state_machine::StateMachine) holds one value of
//! each; not every combination is reachable.
//!
//! Every enum has an `as_str` returning a stable `SCREAMING_SNAKE_CASE` name,
//! used by diagnostic snapshots and trace output.

/// Lifecycle of the renderable output surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum OutputSurfaceState {
    /// No surface. Nothing can be drawn until a new one is created.
    #[default]
    Lost,
    /// Creation was requested and is in flight.
    Creating,
    /// Surface exists; waiting for the first commit onto it.
    WaitingForFirstCommit,
    /// First commit landed in a pending tree; waiting for it to activate.
    WaitingForFirstActivation,
    /// Fully initialized.
    Active,
}

impl OutputSurfaceState {
    /// Stable diagnostic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lost => "OUTPUT_SURFACE_LOST",
            Self::Creating => "OUTPUT_SURFACE_CREATING",
            Self::WaitingForFirstCommit => "OUTPUT_SURFACE_WAITING_FOR_FIRST_COMMIT",
            Self::WaitingForFirstActivation => "OUTPUT_SURFACE_WAITING_FOR_FIRST_ACTIVATION",
            Self::Active => "OUTPUT_SURFACE_ACTIVE",
        }
    }

    /// Returns `true` once the surface has finished its first commit (and
    /// activation, if any) and can be drawn to.
    #[must_use]
    pub const fn is_initialized(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Position within one BeginFrame tick.
///
/// Advances cyclically: `Idle → FrameStarting → InsideFrame → InsideDeadline
/// → Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BeginFrameState {
    /// Between ticks.
    #[default]
    Idle,
    /// A tick arrived and its actions are being drained.
    FrameStarting,
    /// Tick handled; the deadline is posted but has not fired.
    InsideFrame,
    /// The deadline fired; draws are allowed.
    InsideDeadline,
}

impl BeginFrameState {
    /// Stable diagnostic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "BEGIN_FRAME_STATE_IDLE",
            Self::FrameStarting => "BEGIN_FRAME_STATE_BEGIN_FRAME_STARTING",
            Self::InsideFrame => "BEGIN_FRAME_STATE_INSIDE_BEGIN_FRAME",
            Self::InsideDeadline => "BEGIN_FRAME_STATE_INSIDE_DEADLINE",
        }
    }
}

/// Progress of the producer → consumer content handoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CommitState {
    /// No commit in flight.
    #[default]
    Idle,
    /// Begin-main-frame was sent; the producer is building content.
    FrameInProgress,
    /// The producer finished; the commit can run.
    ReadyToCommit,
    /// Committed straight to the active tree; waiting for it to be drawn.
    WaitingForFirstDraw,
}

impl CommitState {
    /// Stable diagnostic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "COMMIT_STATE_IDLE",
            Self::FrameInProgress => "COMMIT_STATE_FRAME_IN_PROGRESS",
            Self::ReadyToCommit => "COMMIT_STATE_READY_TO_COMMIT",
            Self::WaitingForFirstDraw => "COMMIT_STATE_WAITING_FOR_FIRST_DRAW",
        }
    }
}

/// Ownership of the shared single-buffered texture token.
///
/// A single enum value means the token can never be held by both sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TextureState {
    /// Nobody holds the token.
    #[default]
    Unlocked,
    /// The producer thread holds it; consumer draws must abort.
    AcquiredByProducer,
    /// The consumer holds it until its next draw.
    AcquiredByConsumer,
}

impl TextureState {
    /// Stable diagnostic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unlocked => "LAYER_TEXTURE_STATE_UNLOCKED",
            Self::AcquiredByProducer => "LAYER_TEXTURE_STATE_ACQUIRED_BY_MAIN_THREAD",
            Self::AcquiredByConsumer => "LAYER_TEXTURE_STATE_ACQUIRED_BY_IMPL_THREAD",
        }
    }
}

/// Recovery sequence after repeated draw failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ForcedRedrawState {
    /// No forced redraw pending.
    #[default]
    Idle,
    /// Waiting for a fresh commit.
    WaitingForCommit,
    /// Commit landed in a pending tree; waiting for activation.
    WaitingForActivation,
    /// Ready to draw regardless of `needs_redraw`.
    WaitingForDraw,
}

impl ForcedRedrawState {
    /// Stable diagnostic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "FORCED_REDRAW_STATE_IDLE",
            Self::WaitingForCommit => "FORCED_REDRAW_STATE_WAITING_FOR_COMMIT",
            Self::WaitingForActivation => "FORCED_REDRAW_STATE_WAITING_FOR_ACTIVATION",
            Self::WaitingForDraw => "FORCED_REDRAW_STATE_WAITING_FOR_DRAW",
        }
    }
}

/// Lifecycle of a synchronous pixel readback request.
///
/// A readback interleaves with normal commits: its own commit is followed by
/// a replacement commit that restores the content the producer was building
/// before the readback interrupted it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ReadbackState {
    /// No readback pending.
    #[default]
    Idle,
    /// A begin-main-frame must be sent for the readback.
    NeedsBeginMainFrame,
    /// Waiting for the readback's commit.
    WaitingForCommit,
    /// Readback commit landed in a pending tree; waiting for activation.
    WaitingForActivation,
    /// Ready to draw and read back.
    WaitingForDrawAndReadback,
    /// Readback done; waiting for the replacement commit.
    WaitingForReplacementCommit,
    /// Replacement commit landed; waiting for it to activate.
    WaitingForReplacementActivation,
}

impl ReadbackState {
    /// Stable diagnostic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "READBACK_STATE_IDLE",
            Self::NeedsBeginMainFrame => "READBACK_STATE_NEEDS_BEGIN_MAIN_FRAME",
            Self::WaitingForCommit => "READBACK_STATE_WAITING_FOR_COMMIT",
            Self::WaitingForActivation => "READBACK_STATE_WAITING_FOR_ACTIVATION",
            Self::WaitingForDrawAndReadback => "READBACK_STATE_WAITING_FOR_DRAW_AND_READBACK",
            Self::WaitingForReplacementCommit => "READBACK_STATE_WAITING_FOR_REPLACEMENT_COMMIT",
            Self::WaitingForReplacementActivation => {
                "READBACK_STATE_WAITING_FOR_REPLACEMENT_ACTIVATION"
            }
        }
    }
}

/// The single next step the scheduler wants performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Nothing to do.
    None,
    /// Ask the producer thread to build a new frame.
    SendBeginMainFrame,
    /// Move the producer's finished frame to the consumer.
    Commit,
    /// Re-rasterize tiles that were missing at the last swap.
    UpdateVisibleTiles,
    /// Promote the pending tree to active.
    ActivatePendingTree,
    /// Draw and swap if content is ready.
    DrawAndSwapIfPossible,
    /// Draw and swap even if content is incomplete.
    DrawAndSwapForced,
    /// Account for a draw that cannot happen (no surface, hidden, token held).
    DrawAndSwapAbort,
    /// Draw and read the pixels back for the producer.
    DrawAndReadback,
    /// Ask the client to create a new output surface.
    BeginOutputSurfaceCreation,
    /// Hand the texture token to the producer.
    AcquireLayerTexturesForMainThread,
    /// Prioritize and schedule tile work.
    ManageTiles,
}

impl Action {
    /// Stable diagnostic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "ACTION_NONE",
            Self::SendBeginMainFrame => "ACTION_SEND_BEGIN_MAIN_FRAME",
            Self::Commit => "ACTION_COMMIT",
            Self::UpdateVisibleTiles => "ACTION_UPDATE_VISIBLE_TILES",
            Self::ActivatePendingTree => "ACTION_ACTIVATE_PENDING_TREE",
            Self::DrawAndSwapIfPossible => "ACTION_DRAW_AND_SWAP_IF_POSSIBLE",
            Self::DrawAndSwapForced => "ACTION_DRAW_AND_SWAP_FORCED",
            Self::DrawAndSwapAbort => "ACTION_DRAW_AND_SWAP_ABORT",
            Self::DrawAndReadback => "ACTION_DRAW_AND_READBACK",
            Self::BeginOutputSurfaceCreation => "ACTION_BEGIN_OUTPUT_SURFACE_CREATION",
            Self::AcquireLayerTexturesForMainThread => {
                "ACTION_ACQUIRE_LAYER_TEXTURES_FOR_MAIN_THREAD"
            }
            Self::ManageTiles => "ACTION_MANAGE_TILES",
        }
    }

    /// Returns `true` for the four draw variants.
    #[must_use]
    pub const fn is_draw(self) -> bool {
        matches!(
            self,
            Self::DrawAndSwapIfPossible
                | Self::DrawAndSwapForced
                | Self::DrawAndSwapAbort
                | Self::DrawAndReadback
        )
    }

    /// Compact numeric code for binary trace records.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::SendBeginMainFrame => 1,
            Self::Commit => 2,
            Self::UpdateVisibleTiles => 3,
            Self::ActivatePendingTree => 4,
            Self::DrawAndSwapIfPossible => 5,
            Self::DrawAndSwapForced => 6,
            Self::DrawAndSwapAbort => 7,
            Self::DrawAndReadback => 8,
            Self::BeginOutputSurfaceCreation => 9,
            Self::AcquireLayerTexturesForMainThread => 10,
            Self::ManageTiles => 11,
        }
    }

    /// Inverse of [`Action::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::SendBeginMainFrame,
            2 => Self::Commit,
            3 => Self::UpdateVisibleTiles,
            4 => Self::ActivatePendingTree,
            5 => Self::DrawAndSwapIfPossible,
            6 => Self::DrawAndSwapForced,
            7 => Self::DrawAndSwapAbort,
            8 => Self::DrawAndReadback,
            9 => Self::BeginOutputSurfaceCreation,
            10 => Self::AcquireLayerTexturesForMainThread,
            11 => Self::ManageTiles,
            _ => return None,
        })
    }
}
