// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles, simulation and frame-pacing metrics for `cadence_core`.
//!
//! - [`ManualClock`]: a shared clock that moves only when told to.
//! - [`RecordingClient`]: a [`SchedulerClient`](cadence_core::client::SchedulerClient)
//!   that records every action and timing request, with scriptable draw
//!   outcomes and estimator-backed duration estimates.
//! - [`Simulation`]: a deterministic compositor plus producer, stepping one
//!   tick interval at a time.
//! - [`FramePacingTracker`]: rolling swap statistics and a letter grade.

#![no_std]

extern crate alloc;

mod client;
mod clock;
mod pacing;
mod sim;

pub use client::RecordingClient;
pub use clock::ManualClock;
pub use pacing::{FramePacingTracker, FrameSample, PacingGrade, PacingReport};
pub use sim::{Simulation, StepReport};
