//! Prelude module for common re-exports.
//!
//! ```rust
//! use bmm_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig, Validate};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{HBARC, HC, MONO_ENERGY_MAX, MONO_ENERGY_MIN};

// ─── Kinematics ─────────────────────────────────────────────────────
pub use crate::error::{KinematicsError, UnreachableReason};
pub use crate::limits::AxisLimits;
pub use crate::positioner::PseudoPositioner;
