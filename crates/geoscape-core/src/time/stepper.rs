//! Frame stepping - split one frame's game time into bounded steps
//!
//! The clock itself takes steps of any size. Host loops go through
//! [`FrameStepper`] so a single frame at high speed becomes several small
//! steps (craft cannot tunnel past each other) and a slow frame cannot stall
//! the host for ever.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Limits on how a frame's game time is stepped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepBounds {
    /// Largest single step handed to the simulation, in game ms
    pub max_step_ms: u64,
    /// Wall-clock time a frame may spend stepping; `None` means unbounded
    pub frame_budget: Option<Duration>,
}

impl Default for StepBounds {
    fn default() -> Self {
        Self {
            max_step_ms: 60_000,
            frame_budget: Some(Duration::from_millis(100)),
        }
    }
}

/// Outcome of stepping one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub steps: u32,
    pub game_ms_advanced: u64,
    /// Game time skipped because the frame budget ran out
    pub game_ms_dropped: u64,
}

impl StepBounds {
    pub fn with_max_step(mut self, max_step_ms: u64) -> Self {
        self.max_step_ms = max_step_ms.max(1);
        self
    }

    pub fn with_frame_budget(mut self, budget: Option<Duration>) -> Self {
        self.frame_budget = budget;
        self
    }

    /// Run `step` over `total_ms` in chunks of at most `max_step_ms`.
    ///
    /// Always takes at least one step when `total_ms > 0`. If the frame
    /// budget runs out, the rest of the frame's game time is dropped rather
    /// than carried into the next frame.
    pub fn run<F>(&self, total_ms: u64, mut step: F) -> FrameReport
    where
        F: FnMut(u64),
    {
        let max_step = self.max_step_ms.max(1);
        let started = Instant::now();
        let mut report = FrameReport::default();
        let mut remaining = total_ms;

        while remaining > 0 {
            if report.steps > 0 {
                if let Some(budget) = self.frame_budget {
                    if started.elapsed() >= budget {
                        warn!(
                            dropped_ms = remaining,
                            steps = report.steps,
                            "frame budget exhausted, dropping remaining game time"
                        );
                        report.game_ms_dropped = remaining;
                        break;
                    }
                }
            }

            let chunk = remaining.min(max_step);
            step(chunk);
            remaining -= chunk;
            report.steps += 1;
            report.game_ms_advanced += chunk;
        }

        report
    }
}

/// Converts fractional per-frame game time to whole milliseconds.
///
/// Sub-millisecond remainders are carried to the next frame so slow ratios
/// still add up over time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStepper {
    pub bounds: StepBounds,
    carry_ms: f64,
}

impl FrameStepper {
    pub fn new(bounds: StepBounds) -> Self {
        Self {
            bounds,
            carry_ms: 0.0,
        }
    }

    /// Add a frame's game time; returns the whole milliseconds to step now
    pub fn accumulate(&mut self, game_ms: f64) -> u64 {
        if !game_ms.is_finite() || game_ms <= 0.0 {
            return 0;
        }
        let total = self.carry_ms + game_ms;
        let whole = total.floor();
        self.carry_ms = total - whole;
        whole as u64
    }

    /// Forget any carried fraction (used on pause and load)
    pub fn reset(&mut self) {
        self.carry_ms = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_split_into_bounded_steps() {
        let bounds = StepBounds::default()
            .with_max_step(1_000)
            .with_frame_budget(None);

        let mut steps = Vec::new();
        let report = bounds.run(3_500, |ms| steps.push(ms));

        assert_eq!(steps, vec![1_000, 1_000, 1_000, 500]);
        assert_eq!(report.steps, 4);
        assert_eq!(report.game_ms_advanced, 3_500);
        assert_eq!(report.game_ms_dropped, 0);
    }

    #[test]
    fn test_zero_total_takes_no_steps() {
        let report = StepBounds::default().run(0, |_| panic!("should not step"));
        assert_eq!(report, FrameReport::default());
    }

    #[test]
    fn test_exhausted_budget_drops_remainder() {
        let bounds = StepBounds::default()
            .with_max_step(10)
            .with_frame_budget(Some(Duration::ZERO));

        let mut stepped = 0;
        let report = bounds.run(1_000, |ms| stepped += ms);

        // One step always happens, the rest is dropped
        assert_eq!(report.steps, 1);
        assert_eq!(stepped, 10);
        assert_eq!(report.game_ms_dropped, 990);
        assert_eq!(report.game_ms_advanced + report.game_ms_dropped, 1_000);
    }

    #[test]
    fn test_accumulate_carries_fractions() {
        let mut stepper = FrameStepper::new(StepBounds::default());
        let mut total = 0;
        for _ in 0..10 {
            total += stepper.accumulate(0.25);
        }
        // 2.5ms of game time, 2 whole ms released so far
        assert_eq!(total, 2);
        assert_eq!(stepper.accumulate(0.5), 1);

        stepper.reset();
        assert_eq!(stepper.accumulate(0.9), 0);
        assert_eq!(stepper.accumulate(f64::NAN), 0);
        assert_eq!(stepper.accumulate(-3.0), 0);
    }
}
