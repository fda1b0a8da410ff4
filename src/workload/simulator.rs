//! Busy-work loop with a duration controlled by an intensity parameter.
//!
//! The loop runs `work_units / intensity` iterations, so a higher intensity
//! means a shorter run. It allocates nothing and does not observe
//! cancellation: once started it runs to completion.

use std::hint::black_box;

use crate::core::error::{NodeError, NodeResult};

/// Iteration budget divided by the intensity. At the default intensity of 100
/// this is 10^8 iterations, roughly a tenth of a second on current hardware.
pub const DEFAULT_WORK_UNITS: u64 = 10_000_000_000;

#[derive(Debug, Clone, Copy)]
pub struct WorkloadSimulator {
    work_units: u64,
}

impl WorkloadSimulator {
    pub fn new() -> Self {
        Self {
            work_units: DEFAULT_WORK_UNITS,
        }
    }

    /// Simulator with a custom calibration constant.
    pub fn with_work_units(work_units: u64) -> Self {
        Self { work_units }
    }

    pub fn work_units(&self) -> u64 {
        self.work_units
    }

    /// Number of loop iterations `run` performs for `intensity`.
    ///
    /// An intensity of zero has no finite iteration count and is rejected.
    pub fn iterations_for(&self, intensity: u64) -> NodeResult<u64> {
        if intensity == 0 {
            return Err(NodeError::InvalidIntensity { intensity });
        }
        Ok(self.work_units / intensity)
    }

    /// Burn CPU for a duration inversely proportional to `intensity`.
    /// Returns the number of iterations performed.
    pub fn run(&self, intensity: u64) -> NodeResult<u64> {
        let reps = self.iterations_for(intensity)?;

        let mut acc = 0u64;
        for i in 0..reps {
            acc = acc.wrapping_add(black_box(i));
        }
        black_box(acc);

        Ok(reps)
    }
}

impl Default for WorkloadSimulator {
    fn default() -> Self {
        Self::new()
    }
}
