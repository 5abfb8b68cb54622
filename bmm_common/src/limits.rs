//! Closed per-axis travel intervals.
//!
//! Serialized as a two-element array so configuration reads naturally:
//!
//! ```toml
//! pitch = [-5.5, 5.5]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::KinematicsError;

/// Closed interval `[min, max]` of valid values for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct AxisLimits {
    min: f64,
    max: f64,
}

impl AxisLimits {
    /// Create an interval. Callers pass `min <= max`; use `TryFrom` for untrusted input.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Lower bound (inclusive).
    #[inline]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Upper bound (inclusive).
    #[inline]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Width of the interval.
    #[inline]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// True if `value` lies inside the interval. NaN is never inside.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp `value` into the interval.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Check `value` for the axis named `axis`.
    ///
    /// # Errors
    /// `KinematicsError::OutOfRange` when `value` is outside the interval.
    pub fn check(&self, axis: &'static str, value: f64) -> Result<(), KinematicsError> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(KinematicsError::OutOfRange {
                axis,
                value,
                min: self.min,
                max: self.max,
            })
        }
    }

    /// `n` evenly spaced values from `min` to `max`, both ends included.
    pub fn sweep(&self, n: usize) -> impl Iterator<Item = f64> + '_ {
        let steps = n.saturating_sub(1).max(1) as f64;
        (0..n).map(move |i| {
            if i + 1 == n {
                self.max
            } else {
                self.min + self.span() * (i as f64) / steps
            }
        })
    }
}

impl TryFrom<[f64; 2]> for AxisLimits {
    type Error = String;

    fn try_from([min, max]: [f64; 2]) -> Result<Self, Self::Error> {
        if !min.is_finite() || !max.is_finite() {
            return Err(format!("limits [{min}, {max}] must be finite"));
        }
        if min > max {
            return Err(format!("limits [{min}, {max}] have min > max"));
        }
        Ok(Self { min, max })
    }
}

impl From<AxisLimits> for [f64; 2] {
    fn from(limits: AxisLimits) -> Self {
        [limits.min, limits.max]
    }
}
