// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-pacing metrics and grading for scheduler simulations.

use alloc::string::String;

use cadence_core::time::{Duration, HostTime, Timebase};

/// One BeginFrame tick as seen by [`FramePacingTracker::observe`].
#[derive(Clone, Copy, Debug)]
pub struct FrameSample {
    /// Frame time of the tick.
    pub frame_time: HostTime,
    /// Tick interval.
    pub interval: Duration,
    /// A frame was swapped (or read back) during this tick.
    pub swapped: bool,
    /// New content from the producer reached the screen during this tick.
    pub new_content: bool,
}

/// Letter grade for frame pacing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacingGrade {
    /// Nearly every tick produced a frame.
    A,
    /// Occasional dropped frames.
    B,
    /// Visible stutter.
    C,
    /// Poor pacing.
    D,
}

impl PacingGrade {
    /// Returns a short label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`FramePacingTracker::observe`].
#[derive(Clone, Copy, Debug)]
pub struct PacingReport {
    /// Current grade.
    pub grade: PacingGrade,
    /// Ticks without a swap per 1000 observed ticks.
    pub dropped_per_1000: f64,
    /// Time since the previous swap in milliseconds, if this tick swapped.
    pub swap_delta_ms: Option<f64>,
    /// Total ticks observed.
    pub total_frames: u64,
    /// Ticks without a swap.
    pub dropped_frames: u64,
    /// Ticks whose swap carried new producer content.
    pub new_content_frames: u64,
}

/// Rolling pacing tracker with a fixed-size history of swap-to-swap deltas.
#[derive(Debug)]
pub struct FramePacingTracker<const N: usize> {
    timebase: Timebase,
    deltas_ms: [f64; N],
    cursor: usize,
    last_swap: Option<HostTime>,
    total_frames: u64,
    dropped_frames: u64,
    new_content_frames: u64,
}

impl<const N: usize> Default for FramePacingTracker<N> {
    fn default() -> Self {
        Self::new(Timebase::NANOS, 16.67)
    }
}

impl<const N: usize> FramePacingTracker<N> {
    /// Creates a tracker with `seed_delta_ms` prefilled in the ring buffer.
    #[must_use]
    pub const fn new(timebase: Timebase, seed_delta_ms: f64) -> Self {
        Self {
            timebase,
            deltas_ms: [seed_delta_ms; N],
            cursor: 0,
            last_swap: None,
            total_frames: 0,
            dropped_frames: 0,
            new_content_frames: 0,
        }
    }

    /// Observes one tick and returns an updated report.
    #[must_use]
    pub fn observe(&mut self, sample: FrameSample) -> PacingReport {
        self.total_frames = self.total_frames.saturating_add(1);

        let mut swap_delta_ms = None;
        if sample.swapped {
            if let Some(last) = self.last_swap {
                let gap = sample.frame_time.saturating_duration_since(last);
                let ms = self.ticks_to_ms(gap.ticks());
                self.deltas_ms[self.cursor % N] = ms;
                self.cursor = (self.cursor + 1) % N;
                swap_delta_ms = Some(ms);
            }
            self.last_swap = Some(sample.frame_time);
            if sample.new_content {
                self.new_content_frames = self.new_content_frames.saturating_add(1);
            }
        } else {
            self.dropped_frames = self.dropped_frames.saturating_add(1);
        }

        let dropped_rate = self.dropped_frames as f64 * 1000.0 / self.total_frames as f64;
        let interval_ms = self.ticks_to_ms(sample.interval.ticks());
        let worst_ratio = if interval_ms > 0.0 {
            self.frame_deltas()
                .iter()
                .fold(0.0_f64, |worst, d| worst.max(d / interval_ms))
        } else {
            0.0
        };

        PacingReport {
            grade: grade_for(dropped_rate, worst_ratio),
            dropped_per_1000: dropped_rate,
            swap_delta_ms,
            total_frames: self.total_frames,
            dropped_frames: self.dropped_frames,
            new_content_frames: self.new_content_frames,
        }
    }

    fn ticks_to_ms(&self, ticks: u64) -> f64 {
        self.timebase.ticks_to_nanos(ticks) as f64 / 1_000_000.0
    }

    /// Returns ring-buffer swap deltas oldest→newest.
    #[must_use]
    pub fn frame_deltas(&self) -> [f64; N] {
        let mut out = [0.0; N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.deltas_ms[(self.cursor + i) % N];
        }
        out
    }

    /// Returns an ASCII sparkline over [`frame_deltas`](Self::frame_deltas).
    #[must_use]
    pub fn sparkline_ascii(&self, min_ms: f64, max_ms: f64) -> String {
        const LEVELS: &[u8] = b" .:-=+*#%@";
        let mut out = String::with_capacity(N);
        for v in self.frame_deltas() {
            let v = v.clamp(min_ms, max_ms);
            let t = (v - min_ms) / (max_ms - min_ms);
            #[expect(
                clippy::cast_possible_truncation,
                reason = "index is clamped to ASCII level count"
            )]
            let level = (t * (LEVELS.len() as f64 - 1.0) + 0.5) as usize;
            out.push(LEVELS[level] as char);
        }
        out
    }
}

/// `worst_ratio` is the longest recent swap gap in intervals.
fn grade_for(dropped_per_1000: f64, worst_ratio: f64) -> PacingGrade {
    if dropped_per_1000 < 10.0 && worst_ratio < 1.5 {
        PacingGrade::A
    } else if dropped_per_1000 < 50.0 && worst_ratio < 2.5 {
        PacingGrade::B
    } else if dropped_per_1000 < 150.0 && worst_ratio < 4.5 {
        PacingGrade::C
    } else {
        PacingGrade::D
    }
}
