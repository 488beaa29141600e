// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic end-to-end simulation of a compositor and its producer.
//!
//! [`Simulation`] plays both sides around a [`Scheduler`]: it delivers
//! ticks and runs deadlines on a [`ManualClock`], and it acts as the
//! producer thread, answering each begin-main-frame with a commit after a
//! configurable latency. Surface creation completes immediately and pending
//! trees are ready to activate as soon as they commit.

use alloc::vec::Vec;

use cadence_core::begin_frame::BeginFrameArgs;
use cadence_core::client::TimeSource;
use cadence_core::scheduler::Scheduler;
use cadence_core::settings::SchedulerSettings;
use cadence_core::state::Action;
use cadence_core::time::{Duration, HostTime};

use crate::client::RecordingClient;
use crate::clock::ManualClock;
use crate::pacing::{FramePacingTracker, FrameSample, PacingReport};

/// What happened during one [`Simulation::step`].
#[derive(Clone, Debug)]
pub struct StepReport {
    /// Frame time of the step's interval.
    pub frame_time: HostTime,
    /// Pacing after this step, if a tick was delivered.
    pub pacing: Option<PacingReport>,
    /// Actions performed during the step, and since the previous step, in order.
    pub actions: Vec<Action>,
}

/// A scheduler, a recording client, a manual clock and a simulated producer.
#[derive(Debug)]
pub struct Simulation {
    scheduler: Scheduler<RecordingClient, ManualClock>,
    clock: ManualClock,
    impl_side_painting: bool,
    interval: Duration,
    next_frame_time: HostTime,
    producer_latency: Duration,
    continuous: bool,
    commit_due: Option<HostTime>,
    new_content: bool,
    step_actions: Vec<Action>,
    pacing: FramePacingTracker<64>,
}

impl Simulation {
    /// Creates a simulation whose first tick arrives one `interval` from now.
    #[must_use]
    pub fn new(settings: SchedulerSettings, interval: Duration) -> Self {
        let clock = ManualClock::new(HostTime(0));
        let scheduler = Scheduler::new(settings, RecordingClient::new(), clock.clone());
        Self {
            scheduler,
            pacing: FramePacingTracker::new(clock.timebase(), 0.0),
            clock,
            impl_side_painting: settings.impl_side_painting,
            interval,
            next_frame_time: HostTime(0).saturating_add(interval),
            producer_latency: Duration::ZERO,
            continuous: false,
            commit_due: None,
            new_content: false,
            step_actions: Vec::new(),
        }
    }

    /// Sets how long the producer takes from begin-main-frame to commit.
    #[must_use]
    pub fn with_producer_latency(mut self, latency: Duration) -> Self {
        self.producer_latency = latency;
        self
    }

    /// Makes the producer request another commit after every commit, as a
    /// running animation does.
    #[must_use]
    pub fn continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    /// The scheduler under test.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<RecordingClient, ManualClock> {
        &self.scheduler
    }

    /// Mutable access to the scheduler.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler<RecordingClient, ManualClock> {
        &mut self.scheduler
    }

    /// The shared clock.
    #[must_use]
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Makes the compositor startable, visible and drawable, and lets it
    /// create its first surface.
    ///
    /// Setup actions are not reported; anything a later call triggers
    /// between steps shows up in the next [`StepReport`].
    pub fn start(&mut self) {
        self.scheduler.set_can_start();
        self.scheduler.set_visible(true);
        self.scheduler.set_can_draw(true);
        self.react();
        self.step_actions.clear();
    }

    /// Asks the producer for a new frame.
    pub fn request_commit(&mut self) {
        self.scheduler.set_needs_commit();
        self.react();
    }

    /// Asks for a readback; the producer answers it like any other
    /// begin-main-frame.
    pub fn request_readback(&mut self) {
        self.scheduler.set_needs_forced_commit_for_readback();
        self.react();
    }

    /// Loses the output surface; the simulation recreates it right away.
    pub fn lose_output_surface(&mut self) {
        self.scheduler.did_lose_output_surface();
        self.react();
    }

    /// Runs `steps` intervals and returns the last step's report.
    pub fn run(&mut self, steps: usize) -> Option<StepReport> {
        let mut last = None;
        for _ in 0..steps {
            last = Some(self.step());
        }
        last
    }

    /// Runs one interval: due producer commits, the tick (if subscribed),
    /// and everything that falls before the next tick.
    pub fn step(&mut self) -> StepReport {
        let frame_time = self.next_frame_time;
        let frame_end = frame_time.saturating_add(self.interval);
        self.next_frame_time = frame_end;
        let swaps_before = self.scheduler.client().swaps();

        self.clock.set(frame_time);
        if self.commit_due.is_some_and(|at| at <= frame_time) {
            self.finish_commit();
        }

        let ticked = self.scheduler.needs_begin_frame();
        if ticked {
            self.scheduler
                .begin_frame(BeginFrameArgs::from_interval(frame_time, self.interval));
            self.react();
        }

        // Interleave producer commits and the deadline in time order.
        loop {
            let now = self.clock.now();
            let deadline = self
                .scheduler
                .pending_deadline()
                .map(|request| (request.token, request.target.resolve(now)));
            let commit = self.commit_due.filter(|at| *at < frame_end);
            match (deadline, commit) {
                (None, None) => break,
                (Some((_, deadline_at)), Some(commit_at)) if commit_at <= deadline_at => {
                    self.clock.set(commit_at);
                    self.finish_commit();
                }
                (None, Some(commit_at)) => {
                    self.clock.set(commit_at);
                    self.finish_commit();
                }
                (Some((token, deadline_at)), _) => {
                    self.clock.set(deadline_at);
                    self.scheduler.on_begin_frame_deadline(token);
                    self.react();
                }
            }
        }

        let pacing = ticked.then(|| {
            let swapped = self.scheduler.client().swaps() > swaps_before;
            let new_content = swapped && core::mem::take(&mut self.new_content);
            self.pacing.observe(FrameSample {
                frame_time,
                interval: self.interval,
                swapped,
                new_content,
            })
        });

        StepReport {
            frame_time,
            pacing,
            actions: core::mem::take(&mut self.step_actions),
        }
    }

    fn finish_commit(&mut self) {
        self.commit_due = None;
        self.scheduler.finish_commit();
        self.react();
        if self.continuous {
            self.scheduler.set_needs_commit();
            self.react();
        }
    }

    /// Plays the producer's and the platform's part for every new action.
    fn react(&mut self) {
        loop {
            let actions = self.scheduler.client_mut().take_actions();
            if actions.is_empty() {
                break;
            }
            for action in actions {
                self.step_actions.push(action);
                match action {
                    Action::SendBeginMainFrame => {
                        let due = self.clock.now().saturating_add(self.producer_latency);
                        self.commit_due = Some(due);
                    }
                    Action::Commit => {
                        if self.impl_side_painting {
                            self.scheduler.notify_ready_to_activate();
                        } else {
                            self.new_content = true;
                        }
                    }
                    Action::ActivatePendingTree => self.new_content = true,
                    Action::BeginOutputSurfaceCreation => {
                        self.scheduler.did_create_and_initialize_output_surface();
                    }
                    _ => {}
                }
            }
        }
    }
}
