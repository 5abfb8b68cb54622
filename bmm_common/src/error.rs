//! Kinematics error taxonomy.
//!
//! Transforms never fail on finite inputs except for the two kinds below.
//! Neither is retried locally; both propagate straight to the caller.

use thiserror::Error;

/// Why an energy (or Bragg angle) cannot be realised by the active crystal.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum UnreachableReason {
    /// `λ / 2d` falls outside [-1, 1]: the energy is below what the lattice can diffract.
    #[error("energy {energy} eV is below the {min_energy:.1} eV reachable with this crystal")]
    BelowCrystalMinimum {
        /// Requested photon energy [eV].
        energy: f64,
        /// Smallest energy the crystal diffracts (Bragg angle of 90°) [eV].
        min_energy: f64,
    },

    /// A zero energy or a zero Bragg angle would divide by zero.
    #[error("Bragg angle {bragg} deg has no finite energy")]
    ZeroAngle {
        /// Requested or read-back Bragg angle [deg].
        bragg: f64,
    },

    /// The computation produced NaN or infinity.
    #[error("non-finite result for input {input}")]
    NonFinite {
        /// The offending input value.
        input: f64,
    },
}

/// Errors raised by the pseudo-positioner layer.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum KinematicsError {
    /// A logical or physical axis value lies outside its declared interval.
    ///
    /// Forward/inverse never raise this; it comes from explicit limit checks
    /// made by whoever is about to command motion.
    #[error("{axis} = {value} outside limits [{min}, {max}]")]
    OutOfRange {
        /// Axis name.
        axis: &'static str,
        /// Offending value.
        value: f64,
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
    },

    /// The monochromator cannot reach the requested energy or angle.
    #[error("Unreachable energy (2d = {two_d_spacing} Å): {reason}")]
    UnreachableEnergy {
        /// Two-d-spacing of the crystal in use [Å].
        two_d_spacing: f64,
        /// Which condition failed.
        reason: UnreachableReason,
    },
}

impl KinematicsError {
    /// True for [`KinematicsError::UnreachableEnergy`].
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::UnreachableEnergy { .. })
    }

    /// True for [`KinematicsError::OutOfRange`].
    pub const fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}
