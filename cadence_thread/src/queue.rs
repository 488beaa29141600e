// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tick coalescing on the compositor side of the ticker channel.

use std::collections::VecDeque;

use cadence_core::begin_frame::BeginFrameArgs;

/// Bounded FIFO of pending ticks that drops the oldest tick on overflow.
///
/// A compositor thread that stalls for several intervals wakes up to at most
/// `capacity` ticks, the freshest ones.
#[derive(Debug, Clone)]
pub(crate) struct TickQueue {
    items: VecDeque<BeginFrameArgs>,
    capacity: usize,
    dropped_count: u64,
}

impl TickQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            dropped_count: 0,
        }
    }

    pub(crate) fn push(&mut self, args: BeginFrameArgs) {
        if self.items.len() == self.capacity {
            let _ = self.items.pop_front();
            self.dropped_count += 1;
        }
        self.items.push_back(args);
    }

    pub(crate) fn pop(&mut self) -> Option<BeginFrameArgs> {
        self.items.pop_front()
    }

    pub(crate) fn dropped_count(&self) -> u64 {
        self.dropped_count
    }
}
