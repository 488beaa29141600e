// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Duration estimation for the deadline heuristics.
//!
//! The scheduler asks its client for three estimates: draw duration,
//! begin-main-frame-to-commit duration and commit-to-activate duration.
//! [`DurationEstimator`] is the stock way to produce them: an exponential
//! moving average of observed durations scaled by a safety multiplier, so a
//! single fast sample does not make the scheduler overconfident.

use crate::time::Duration;

/// Exponential moving average tracker.
#[derive(Clone, Copy, Debug)]
struct Ema {
    value: f32,
    alpha: f32,
    initialized: bool,
}

impl Ema {
    const fn new(alpha: f32) -> Self {
        Self {
            value: 0.0,
            alpha,
            initialized: false,
        }
    }

    fn update(&mut self, sample: f32) {
        if self.initialized {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }
}

/// Tuning for a [`DurationEstimator`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimatorConfig {
    /// EMA smoothing factor (0.0–1.0). Smaller values smooth more.
    pub alpha: f32,
    /// Multiplier applied to the smoothed duration.
    pub safety_multiplier: f32,
    /// Estimate reported before any sample was observed.
    pub initial: Duration,
}

impl EstimatorConfig {
    /// Smoothing suited to per-frame compositor work.
    #[must_use]
    pub const fn compositor() -> Self {
        Self {
            alpha: 0.2,
            safety_multiplier: 1.5,
            initial: Duration::ZERO,
        }
    }

    /// Heavier smoothing and margin for producer-thread work, which is
    /// noisier.
    #[must_use]
    pub const fn main_thread() -> Self {
        Self {
            alpha: 0.15,
            safety_multiplier: 2.0,
            initial: Duration::ZERO,
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::compositor()
    }
}

/// Smoothed, padded estimate of how long a recurring piece of work takes.
#[derive(Clone, Copy, Debug)]
pub struct DurationEstimator {
    config: EstimatorConfig,
    ema: Ema,
    samples: u64,
}

impl DurationEstimator {
    /// Creates an estimator with no samples.
    #[must_use]
    pub const fn new(config: EstimatorConfig) -> Self {
        Self {
            ema: Ema::new(config.alpha),
            config,
            samples: 0,
        }
    }

    /// Feeds one observed duration.
    pub fn observe(&mut self, sample: Duration) {
        self.ema.update(sample.ticks() as f32);
        self.samples += 1;
    }

    /// Number of samples observed.
    #[must_use]
    pub const fn samples(&self) -> u64 {
        self.samples
    }

    /// Current estimate: the smoothed duration times the safety multiplier,
    /// or the configured initial value before the first sample.
    #[must_use]
    pub fn estimate(&self) -> Duration {
        if self.samples == 0 {
            return self.config.initial;
        }
        let padded = self.ema.value * self.config.safety_multiplier;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "padded EMA of tick counts fits in u64"
        )]
        let ticks = padded as u64;
        Duration(ticks)
    }

    /// Forgets all samples.
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_initial_value_before_samples() {
        let config = EstimatorConfig {
            initial: Duration(7),
            ..EstimatorConfig::compositor()
        };
        let est = DurationEstimator::new(config);
        assert_eq!(est.estimate(), Duration(7));
    }

    #[test]
    fn first_sample_seeds_the_average() {
        let mut est = DurationEstimator::new(EstimatorConfig::compositor());
        est.observe(Duration(1_000));
        // 1000 * 1.5
        assert_eq!(est.estimate(), Duration(1_500));
        assert_eq!(est.samples(), 1);
    }

    #[test]
    fn later_samples_are_smoothed() {
        let mut est = DurationEstimator::new(EstimatorConfig {
            alpha: 0.5,
            safety_multiplier: 1.0,
            initial: Duration::ZERO,
        });
        est.observe(Duration(1_000));
        est.observe(Duration(3_000));
        assert_eq!(est.estimate(), Duration(2_000));
    }

    #[test]
    fn reset_forgets_samples() {
        let mut est = DurationEstimator::new(EstimatorConfig::main_thread());
        est.observe(Duration(1_000));
        est.reset();
        assert_eq!(est.samples(), 0);
        assert_eq!(est.estimate(), Duration::ZERO);
    }
}
