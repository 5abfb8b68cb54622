//! The pseudo-positioner contract.
//!
//! A pseudo-positioner maps a record of human-meaningful logical axes onto
//! a record of physical actuator positions and back. Implementations are
//! pure: no I/O, no motion, no retries.
//!
//! | Operation | Direction           | May fail with          |
//! |-----------|---------------------|------------------------|
//! | `forward` | logical → physical  | `UnreachableEnergy`    |
//! | `inverse` | physical → logical  | `UnreachableEnergy`    |
//! | `check`   | logical limits      | `OutOfRange`           |

use crate::error::KinematicsError;
use crate::limits::AxisLimits;

/// Bidirectional logical ⇄ physical coordinate transform with declared limits.
pub trait PseudoPositioner {
    /// Logical (pseudo) pose record.
    type Logical;
    /// Physical (real) pose record.
    type Physical;

    /// Instance name, e.g. `"m2"` or `"dcm"`.
    fn name(&self) -> &str;

    /// Logical → physical.
    ///
    /// `current` is the latest physical readback. Transforms that hold some
    /// actuators still (channel-cut mode) copy those positions from it; the
    /// others ignore it.
    ///
    /// Precondition: `pose` satisfies [`PseudoPositioner::check`]. The
    /// transform does not enforce it.
    fn forward(
        &self,
        pose: &Self::Logical,
        current: &Self::Physical,
    ) -> Result<Self::Physical, KinematicsError>;

    /// Physical → logical.
    fn inverse(&self, physical: &Self::Physical) -> Result<Self::Logical, KinematicsError>;

    /// Declared logical-axis limits as `(axis name, interval)` pairs.
    fn limits(&self) -> Vec<(&'static str, AxisLimits)>;

    /// Value of each logical axis of `pose`, in the same order as [`limits`](Self::limits).
    fn axis_values(&self, pose: &Self::Logical) -> Vec<f64>;

    /// Check every logical axis of `pose` against its limits.
    ///
    /// # Errors
    /// The first `KinematicsError::OutOfRange` encountered.
    fn check(&self, pose: &Self::Logical) -> Result<(), KinematicsError> {
        self.limits()
            .into_iter()
            .zip(self.axis_values(pose))
            .try_for_each(|((axis, limits), value)| limits.check(axis, value))
    }
}
