//! BMM Common Library
//!
//! Shared building blocks for the beamline optics workspace: the
//! pseudo-positioner contract, per-axis travel limits, the kinematics error
//! taxonomy, physical constants and TOML configuration loading.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Physical constants and operating envelopes
//! - [`error`] - Kinematics error taxonomy
//! - [`limits`] - Closed per-axis travel intervals
//! - [`positioner`] - The pseudo-positioner trait
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use bmm_common::prelude::*;
//!
//! let pitch = AxisLimits::new(-5.5, 5.5);
//! assert!(pitch.check("pitch", 2.0).is_ok());
//! assert!(matches!(
//!     pitch.check("pitch", 6.0),
//!     Err(KinematicsError::OutOfRange { .. })
//! ));
//! ```

pub mod config;
pub mod consts;
pub mod error;
pub mod limits;
pub mod positioner;
pub mod prelude;
