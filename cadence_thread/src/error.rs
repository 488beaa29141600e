// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use thiserror::Error;

/// Failures at the thread boundary of the compositor runtime.
#[derive(Debug, Error)]
pub enum LoopError {
    /// The compositor loop has exited and no longer receives events.
    #[error("compositor loop is no longer receiving events")]
    Disconnected,
    /// The compositor mailbox is at capacity.
    #[error("compositor mailbox is full")]
    MailboxFull,
    /// The BeginFrame ticker thread exited while the loop was running.
    #[error("BeginFrame ticker stopped unexpectedly")]
    TickerStopped,
    /// The BeginFrame ticker thread could not be spawned.
    #[error("failed to spawn BeginFrame ticker thread")]
    TickerSpawn(#[source] std::io::Error),
}
