//! Kernel configuration and the simulation context passed into
//! establishment and property updates

use crate::{
    descriptor::{check_delay_steps, MAX_DELAY_STEPS},
    error::{ConnectionError, Result},
    time::{Resolution, StepConverter, TimeConverter, DEFAULT_TICS_PER_MS},
};
use parking_lot::Mutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kernel-level settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KernelConfig {
    /// Step length in milliseconds
    pub resolution_ms: f64,
    /// Tics per millisecond
    pub tics_per_ms: i64,
    /// Number of worker threads (thread partitions)
    pub num_threads: usize,
    /// Smallest delay connections may use, in ms
    pub min_delay_ms: Option<f64>,
    /// Largest delay connections may use, in ms
    pub max_delay_ms: Option<f64>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            resolution_ms: 0.1,
            tics_per_ms: DEFAULT_TICS_PER_MS,
            num_threads: 1,
            min_delay_ms: None,
            max_delay_ms: None,
        }
    }
}

impl KernelConfig {
    /// Largest supported thread count; thread ids are stored in one byte
    pub const MAX_THREADS: usize = u8::MAX as usize + 1;

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.resolution()?;

        if self.num_threads == 0 || self.num_threads > Self::MAX_THREADS {
            return Err(ConnectionError::configuration(format!(
                "thread count must be in 1..={}, got {}",
                Self::MAX_THREADS,
                self.num_threads
            )));
        }

        for (name, bound) in [("min_delay", self.min_delay_ms), ("max_delay", self.max_delay_ms)] {
            if let Some(ms) = bound {
                if !ms.is_finite() || ms <= 0.0 {
                    return Err(ConnectionError::configuration(format!(
                        "{} must be positive, got {} ms",
                        name, ms
                    )));
                }
            }
        }

        if let (Some(min), Some(max)) = (self.min_delay_ms, self.max_delay_ms) {
            if min > max {
                return Err(ConnectionError::configuration(format!(
                    "min_delay {} ms exceeds max_delay {} ms",
                    min, max
                )));
            }
        }

        Ok(())
    }

    /// Resolution described by this configuration
    pub fn resolution(&self) -> Result<Resolution> {
        Resolution::from_ms(self.resolution_ms, self.tics_per_ms)
    }
}

/// Smallest and largest delay (in steps) seen on established edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayExtrema {
    /// Smallest delay in steps
    pub min: i64,
    /// Largest delay in steps
    pub max: i64,
}

/// Validates delays against the user bounds and tracks observed extrema
#[derive(Debug)]
pub struct DelayChecker {
    resolution: Resolution,
    user_min_ms: Option<f64>,
    user_max_ms: Option<f64>,
    observed: Mutex<Option<DelayExtrema>>,
}

impl DelayChecker {
    /// Create a checker for `resolution` with optional user bounds
    pub fn new(resolution: Resolution, user_min_ms: Option<f64>, user_max_ms: Option<f64>) -> Self {
        Self {
            resolution,
            user_min_ms,
            user_max_ms,
            observed: Mutex::new(None),
        }
    }

    /// Validate a delay in ms and return it in steps
    pub fn assert_valid_delay_ms(&self, ms: f64) -> Result<i64> {
        if !ms.is_finite() || ms <= 0.0 {
            return Err(ConnectionError::configuration(format!(
                "delay must be positive, got {} ms",
                ms
            )));
        }
        let steps = self.resolution.ms_to_steps(ms);
        self.assert_valid_delay_steps(steps)?;
        Ok(steps)
    }

    /// Validate a delay in steps
    pub fn assert_valid_delay_steps(&self, steps: i64) -> Result<()> {
        check_delay_steps(steps)?;

        let ms = self.resolution.steps_to_ms(steps);
        if let Some(min) = self.user_min_ms {
            if self.resolution.ms_to_steps(min) > steps {
                return Err(ConnectionError::configuration(format!(
                    "delay {} ms is below min_delay {} ms",
                    ms, min
                )));
            }
        }
        if let Some(max) = self.user_max_ms {
            if self.resolution.ms_to_steps(max) < steps {
                return Err(ConnectionError::configuration(format!(
                    "delay {} ms exceeds max_delay {} ms",
                    ms, max
                )));
            }
        }
        Ok(())
    }

    /// Note the delay of a committed edge
    pub fn record(&self, steps: i64) {
        let mut observed = self.observed.lock();
        *observed = Some(match *observed {
            Some(ext) => DelayExtrema {
                min: ext.min.min(steps),
                max: ext.max.max(steps),
            },
            None => DelayExtrema {
                min: steps,
                max: steps,
            },
        });
    }

    /// Observed extrema, `None` before the first edge
    pub fn extrema(&self) -> Option<DelayExtrema> {
        *self.observed.lock()
    }

    /// Smallest observed delay in steps
    pub fn min_delay(&self) -> Option<i64> {
        self.extrema().map(|e| e.min)
    }

    /// Largest observed delay in steps
    pub fn max_delay(&self) -> Option<i64> {
        self.extrema().map(|e| e.max)
    }

    /// Resolution delays are checked under
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn rescale(&mut self, conv: &TimeConverter) {
        self.resolution = conv.new_resolution();
        let observed = self.observed.get_mut();
        if let Some(ext) = observed.as_mut() {
            ext.min = conv.from_old_steps(ext.min).clamp(1, MAX_DELAY_STEPS);
            ext.max = conv.from_old_steps(ext.max).clamp(1, MAX_DELAY_STEPS);
        }
    }
}

/// Explicit kernel state handed to operations that need it
#[derive(Debug)]
pub struct SimulationContext {
    resolution: Resolution,
    delay_checker: DelayChecker,
    slice_origin: i64,
}

impl SimulationContext {
    /// Build a context from a validated configuration
    pub fn new(config: &KernelConfig) -> Result<Self> {
        config.validate()?;
        let resolution = config.resolution()?;
        Ok(Self {
            resolution,
            delay_checker: DelayChecker::new(resolution, config.min_delay_ms, config.max_delay_ms),
            slice_origin: 0,
        })
    }

    /// Current resolution
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Delay bounds and extrema
    pub fn delay_checker(&self) -> &DelayChecker {
        &self.delay_checker
    }

    /// First step of the current time slice
    pub fn slice_origin(&self) -> i64 {
        self.slice_origin
    }

    /// Move to a new time slice
    pub fn set_slice_origin(&mut self, step: i64) {
        self.slice_origin = step;
    }

    /// Switch to `new` and return the converter for stored step counts.
    ///
    /// Edges must be recalibrated with the returned converter.
    pub fn set_resolution(&mut self, new: Resolution) -> TimeConverter {
        let conv = TimeConverter::new(self.resolution, new);
        self.slice_origin = conv.from_old_steps(self.slice_origin);
        self.delay_checker.rescale(&conv);
        self.resolution = new;
        conv
    }
}

impl Default for SimulationContext {
    fn default() -> Self {
        let resolution = Resolution::default();
        Self {
            resolution,
            delay_checker: DelayChecker::new(resolution, None, None),
            slice_origin: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(KernelConfig::default().validate().is_ok());

        let cfg = KernelConfig {
            num_threads: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = KernelConfig {
            min_delay_ms: Some(2.0),
            max_delay_ms: Some(1.0),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = KernelConfig {
            resolution_ms: 0.00025,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_delay_checker_bounds() {
        let checker = DelayChecker::new(Resolution::default(), Some(0.5), Some(2.0));
        assert_eq!(checker.assert_valid_delay_ms(1.0).unwrap(), 10);
        assert!(checker.assert_valid_delay_ms(0.2).is_err());
        assert!(checker.assert_valid_delay_ms(2.5).is_err());
        assert!(checker.assert_valid_delay_ms(-1.0).is_err());
        assert!(checker.assert_valid_delay_steps(0).is_err());
    }

    #[test]
    fn test_extrema_tracking() {
        let checker = DelayChecker::new(Resolution::default(), None, None);
        assert_eq!(checker.extrema(), None);
        checker.record(5);
        checker.record(2);
        checker.record(9);
        assert_eq!(checker.min_delay(), Some(2));
        assert_eq!(checker.max_delay(), Some(9));
    }

    #[test]
    fn test_resolution_change_rescales_state() {
        let mut ctx = SimulationContext::new(&KernelConfig {
            resolution_ms: 0.2,
            ..Default::default()
        })
        .unwrap();
        ctx.delay_checker().record(5);
        ctx.set_slice_origin(50);

        let conv = ctx.set_resolution(Resolution::from_ms(0.1, 1000).unwrap());
        assert_eq!(conv.from_old_steps(5), 10);
        assert_eq!(ctx.slice_origin(), 100);
        assert_eq!(ctx.delay_checker().min_delay(), Some(10));
        assert!((ctx.resolution().step_ms() - 0.1).abs() < 1e-12);
    }
}
