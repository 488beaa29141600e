// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invariant violations reported by the state machine.
//!
//! Scheduling failures (lost surfaces, failed draws, aborted commits) are
//! state transitions, not errors. The only typed error in the core is a
//! broken internal invariant, which indicates a bug in the state machine or
//! an embedder calling setters out of contract.

use thiserror::Error;

/// A state-machine invariant that no longer holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// More than one swap was stamped in the same tick.
    #[error("swapped more than once in frame {frame}")]
    MultipleSwapsInFrame {
        /// The offending frame number.
        frame: u64,
    },
    /// More than one throttled begin-main-frame was sent in the same tick.
    #[error("sent more than one begin-main-frame in frame {frame}")]
    MultipleBeginMainFramesInFrame {
        /// The offending frame number.
        frame: u64,
    },
    /// A forced-redraw draw and a readback draw are both pending.
    #[error("forced redraw and readback are both waiting to draw")]
    ForcedRedrawAndReadbackBothWaitingForDraw,
    /// A pending tree exists without impl-side painting.
    #[error("pending tree exists but impl-side painting is disabled")]
    PendingTreeWithoutImplSidePainting,
    /// A frame stamp refers to a frame that has not started yet.
    #[error("{what} stamped frame {stamped} ahead of current frame {current}")]
    StampFromTheFuture {
        /// Which stamp.
        what: &'static str,
        /// The stamped frame number.
        stamped: u64,
        /// The current frame number.
        current: u64,
    },
    /// The pending tree is marked ready but there is no pending tree.
    #[error("pending tree marked ready but no pending tree exists")]
    ReadyWithoutPendingTree,
}
