// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The message boundary between producer threads and the compositor loop.
//!
//! Every scheduler setter has a [`MainThreadEvent`] counterpart. Producers
//! post events through a cloneable [`MainThreadHandle`]; the compositor loop
//! owns the single [`Mailbox`] and applies events in arrival order.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use cadence_core::client::{SchedulerClient, TimeSource};
use cadence_core::scheduler::Scheduler;

use crate::error::LoopError;

/// An event for the scheduler, posted from any thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MainThreadEvent {
    /// [`Scheduler::set_can_start`].
    SetCanStart,
    /// [`Scheduler::set_visible`].
    SetVisible(bool),
    /// [`Scheduler::set_can_draw`].
    SetCanDraw(bool),
    /// [`Scheduler::notify_ready_to_activate`].
    NotifyReadyToActivate,
    /// [`Scheduler::set_needs_commit`].
    SetNeedsCommit,
    /// [`Scheduler::set_needs_forced_commit_for_readback`].
    SetNeedsForcedCommitForReadback,
    /// [`Scheduler::set_needs_redraw`].
    SetNeedsRedraw,
    /// [`Scheduler::set_needs_manage_tiles`].
    SetNeedsManageTiles,
    /// [`Scheduler::set_swap_used_incomplete_tile`].
    SetSwapUsedIncompleteTile(bool),
    /// [`Scheduler::set_smoothness_takes_priority`].
    SetSmoothnessTakesPriority(bool),
    /// [`Scheduler::set_main_thread_needs_layer_textures`].
    SetMainThreadNeedsLayerTextures,
    /// [`Scheduler::finish_commit`].
    FinishCommit,
    /// [`Scheduler::begin_main_frame_aborted`].
    BeginMainFrameAborted {
        /// The producer handled the frame without changes.
        did_handle: bool,
    },
    /// [`Scheduler::did_lose_output_surface`].
    DidLoseOutputSurface,
    /// [`Scheduler::did_create_and_initialize_output_surface`].
    DidCreateAndInitializeOutputSurface,
}

impl MainThreadEvent {
    /// Forwards the event to the matching scheduler setter.
    pub fn apply<C: SchedulerClient, T: TimeSource>(self, scheduler: &mut Scheduler<C, T>) {
        match self {
            Self::SetCanStart => scheduler.set_can_start(),
            Self::SetVisible(visible) => scheduler.set_visible(visible),
            Self::SetCanDraw(can_draw) => scheduler.set_can_draw(can_draw),
            Self::NotifyReadyToActivate => scheduler.notify_ready_to_activate(),
            Self::SetNeedsCommit => scheduler.set_needs_commit(),
            Self::SetNeedsForcedCommitForReadback => {
                scheduler.set_needs_forced_commit_for_readback();
            }
            Self::SetNeedsRedraw => scheduler.set_needs_redraw(),
            Self::SetNeedsManageTiles => scheduler.set_needs_manage_tiles(),
            Self::SetSwapUsedIncompleteTile(used) => scheduler.set_swap_used_incomplete_tile(used),
            Self::SetSmoothnessTakesPriority(priority) => {
                scheduler.set_smoothness_takes_priority(priority);
            }
            Self::SetMainThreadNeedsLayerTextures => {
                scheduler.set_main_thread_needs_layer_textures();
            }
            Self::FinishCommit => scheduler.finish_commit(),
            Self::BeginMainFrameAborted { did_handle } => {
                scheduler.begin_main_frame_aborted(did_handle);
            }
            Self::DidLoseOutputSurface => scheduler.did_lose_output_surface(),
            Self::DidCreateAndInitializeOutputSurface => {
                scheduler.did_create_and_initialize_output_surface();
            }
        }
    }
}

#[derive(Debug)]
pub(crate) enum Message {
    Event(MainThreadEvent),
    Shutdown,
}

/// Creates a connected handle and mailbox holding at most `capacity`
/// undelivered messages.
#[must_use]
pub fn mailbox(capacity: usize) -> (MainThreadHandle, Mailbox) {
    let (sender, receiver) = bounded(capacity.max(1));
    (MainThreadHandle { sender }, Mailbox { receiver })
}

/// The receiving end of the compositor mailbox.
#[derive(Debug)]
pub struct Mailbox {
    pub(crate) receiver: Receiver<Message>,
}

/// A cloneable, `Send` sender of scheduler events.
///
/// Posting never blocks. A full mailbox is reported as
/// [`LoopError::MailboxFull`] so the producer can decide whether to retry.
#[derive(Clone, Debug)]
pub struct MainThreadHandle {
    sender: Sender<Message>,
}

impl MainThreadHandle {
    /// Posts an event to the compositor loop.
    ///
    /// # Errors
    ///
    /// Returns [`LoopError::MailboxFull`] if the mailbox is at capacity, or
    /// [`LoopError::Disconnected`] if the loop has exited.
    pub fn post(&self, event: MainThreadEvent) -> Result<(), LoopError> {
        self.send(Message::Event(event))
    }

    /// Asks the compositor loop to stop after the messages already queued.
    ///
    /// # Errors
    ///
    /// As for [`post`](Self::post).
    pub fn shutdown(&self) -> Result<(), LoopError> {
        self.send(Message::Shutdown)
    }

    fn send(&self, message: Message) -> Result<(), LoopError> {
        self.sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => LoopError::MailboxFull,
            TrySendError::Disconnected(_) => LoopError::Disconnected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mailbox_is_reported() {
        let (handle, _mailbox) = mailbox(1);
        handle.post(MainThreadEvent::SetNeedsCommit).unwrap();
        assert!(
            matches!(
                handle.post(MainThreadEvent::SetNeedsRedraw),
                Err(LoopError::MailboxFull)
            ),
            "second post should not fit"
        );
    }

    #[test]
    fn dropped_mailbox_disconnects_handles() {
        let (handle, mailbox) = mailbox(4);
        drop(mailbox);
        assert!(
            matches!(handle.shutdown(), Err(LoopError::Disconnected)),
            "no receiver left"
        );
    }

    #[test]
    fn events_arrive_in_order() {
        let (handle, mailbox) = mailbox(4);
        let other = handle.clone();
        handle.post(MainThreadEvent::SetVisible(true)).unwrap();
        other.post(MainThreadEvent::FinishCommit).unwrap();
        handle.shutdown().unwrap();

        let received: Vec<_> = mailbox.receiver.try_iter().collect();
        assert!(
            matches!(
                received.as_slice(),
                [
                    Message::Event(MainThreadEvent::SetVisible(true)),
                    Message::Event(MainThreadEvent::FinishCommit),
                    Message::Shutdown,
                ]
            ),
            "got {received:?}"
        );
    }
}
