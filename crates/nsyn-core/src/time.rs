//! Simulation time resolution and step conversion
//!
//! Time is counted in integer tics. A simulation step is a whole number of
//! tics, so changing the resolution is an exact integer rescaling of stored
//! step counts.

use crate::{
    descriptor::MAX_DELAY_STEPS,
    error::{ConnectionError, Result},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of tics per millisecond
pub const DEFAULT_TICS_PER_MS: i64 = 1000;

/// Default step length in tics (0.1 ms)
pub const DEFAULT_TICS_PER_STEP: i64 = 100;

/// Simulation time resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Resolution {
    tics_per_ms: i64,
    tics_per_step: i64,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            tics_per_ms: DEFAULT_TICS_PER_MS,
            tics_per_step: DEFAULT_TICS_PER_STEP,
        }
    }
}

impl Resolution {
    /// Create a resolution from a step length in milliseconds.
    ///
    /// The step must be a positive whole number of tics.
    pub fn from_ms(step_ms: f64, tics_per_ms: i64) -> Result<Self> {
        if !step_ms.is_finite() || step_ms <= 0.0 {
            return Err(ConnectionError::configuration(format!(
                "resolution must be positive, got {} ms",
                step_ms
            )));
        }
        if tics_per_ms <= 0 {
            return Err(ConnectionError::configuration(format!(
                "tics per ms must be positive, got {}",
                tics_per_ms
            )));
        }

        let tics = step_ms * tics_per_ms as f64;
        let rounded = tics.round();
        if rounded < 1.0 || (tics - rounded).abs() > 1e-6 * rounded.max(1.0) {
            return Err(ConnectionError::configuration(format!(
                "resolution {} ms is not a multiple of the tic length {} ms",
                step_ms,
                1.0 / tics_per_ms as f64
            )));
        }

        Self::from_tics(tics_per_ms, rounded as i64)
    }

    /// Create a resolution from raw tic counts.
    ///
    /// The longest storable delay must still be countable in tics.
    pub fn from_tics(tics_per_ms: i64, tics_per_step: i64) -> Result<Self> {
        if tics_per_ms <= 0 || tics_per_step <= 0 {
            return Err(ConnectionError::configuration(format!(
                "tic counts must be positive (tics/ms = {}, tics/step = {})",
                tics_per_ms, tics_per_step
            )));
        }
        if MAX_DELAY_STEPS.checked_mul(tics_per_step).is_none() {
            return Err(ConnectionError::configuration(format!(
                "step of {} tics is too long: {} steps overflow the tic counter",
                tics_per_step, MAX_DELAY_STEPS
            )));
        }
        Ok(Self {
            tics_per_ms,
            tics_per_step,
        })
    }

    /// Tics per millisecond
    pub fn tics_per_ms(&self) -> i64 {
        self.tics_per_ms
    }

    /// Tics per simulation step
    pub fn tics_per_step(&self) -> i64 {
        self.tics_per_step
    }

    /// Step length in milliseconds
    pub fn step_ms(&self) -> f64 {
        self.tics_per_step as f64 / self.tics_per_ms as f64
    }

    /// Steps per millisecond
    pub fn steps_per_ms(&self) -> f64 {
        self.tics_per_ms as f64 / self.tics_per_step as f64
    }

    /// Convert a duration in ms to the nearest number of steps
    pub fn ms_to_steps(&self, ms: f64) -> i64 {
        (ms * self.steps_per_ms()).round() as i64
    }

    /// Convert a number of steps to ms
    pub fn steps_to_ms(&self, steps: i64) -> f64 {
        (steps as i128 * self.tics_per_step as i128) as f64 / self.tics_per_ms as f64
    }
}

/// Maps a step count under the previous resolution to the current one
pub trait StepConverter: Sync {
    /// Convert a step count recorded under the old resolution
    fn from_old_steps(&self, steps: i64) -> i64;
}

impl<F> StepConverter for F
where
    F: Fn(i64) -> i64 + Sync,
{
    fn from_old_steps(&self, steps: i64) -> i64 {
        self(steps)
    }
}

/// Exact converter between two resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeConverter {
    old: Resolution,
    new: Resolution,
}

impl TimeConverter {
    /// Create a converter from `old` to `new`
    pub fn new(old: Resolution, new: Resolution) -> Self {
        Self { old, new }
    }

    /// Resolution step counts are converted from
    pub fn old(&self) -> Resolution {
        self.old
    }

    /// Resolution step counts are converted to
    pub fn new_resolution(&self) -> Resolution {
        self.new
    }
}

impl StepConverter for TimeConverter {
    fn from_old_steps(&self, steps: i64) -> i64 {
        // old steps -> new tics -> new steps, truncating partial steps
        let num = (steps as i128)
            .checked_mul(self.old.tics_per_step as i128)
            .and_then(|n| n.checked_mul(self.new.tics_per_ms as i128));
        let den = self.old.tics_per_ms as i128 * self.new.tics_per_step as i128;
        // saturate so oversized results still read as too long
        match num {
            Some(num) => num.div_euclid(den).clamp(i64::MIN as i128, i64::MAX as i128) as i64,
            None if steps < 0 => i64::MIN,
            None => i64::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolution() {
        let res = Resolution::default();
        assert!((res.step_ms() - 0.1).abs() < 1e-12);
        assert_eq!(res.ms_to_steps(1.0), 10);
        assert_eq!(res.steps_to_ms(10), 1.0);
    }

    #[test]
    fn test_from_ms_validation() {
        assert!(Resolution::from_ms(0.1, 1000).is_ok());
        assert!(Resolution::from_ms(0.0, 1000).is_err());
        assert!(Resolution::from_ms(-1.0, 1000).is_err());
        assert!(Resolution::from_ms(0.0005, 1000).is_err());
        assert!(Resolution::from_ms(0.1, 0).is_err());
    }

    #[test]
    fn test_converter_halving_step() {
        let old = Resolution::from_ms(0.2, 1000).unwrap();
        let new = Resolution::from_ms(0.1, 1000).unwrap();
        let conv = TimeConverter::new(old, new);
        assert_eq!(conv.from_old_steps(5), 10);
    }

    #[test]
    fn test_converter_coarsening_truncates() {
        let old = Resolution::from_ms(0.1, 1000).unwrap();
        let new = Resolution::from_ms(0.3, 1000).unwrap();
        let conv = TimeConverter::new(old, new);
        assert_eq!(conv.from_old_steps(1), 0);
        assert_eq!(conv.from_old_steps(7), 2);
    }

    #[test]
    fn test_converter_across_tic_change() {
        let old = Resolution::from_ms(0.1, 1000).unwrap();
        let new = Resolution::from_ms(0.1, 10_000).unwrap();
        let conv = TimeConverter::new(old, new);
        assert_eq!(conv.from_old_steps(15), 15);
    }

    #[test]
    fn test_step_too_long_for_tic_counter() {
        assert!(Resolution::from_tics(1, 1 << 43).is_err());
        assert!(Resolution::from_ms((1i64 << 43) as f64, 1).is_err());

        let coarse = Resolution::from_tics(1, 1 << 40).unwrap();
        let expected = (MAX_DELAY_STEPS as f64) * (1u64 << 40) as f64;
        assert_eq!(coarse.steps_to_ms(MAX_DELAY_STEPS), expected);
    }

    #[test]
    fn test_converter_saturates() {
        let old = Resolution::from_tics(1, 1 << 40).unwrap();
        let new = Resolution::from_tics(1 << 40, 1).unwrap();
        let conv = TimeConverter::new(old, new);
        assert_eq!(conv.from_old_steps(MAX_DELAY_STEPS), i64::MAX);
        assert_eq!(conv.from_old_steps(-MAX_DELAY_STEPS), i64::MIN);
    }

    #[test]
    fn test_closure_converter() {
        let double = |s: i64| s * 2;
        assert_eq!(double.from_old_steps(4), 8);
    }
}
