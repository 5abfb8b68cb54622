//! # BMM Optics
//!
//! Pseudo-positioner kinematics for the beamline optics: the five-actuator
//! mirrors and sample table, and the double-crystal monochromator.
//!
//! # Module Structure
//!
//! - [`mirror`] - Five-axis mirror / table transform
//! - [`mono`] - Energy ⇄ Bragg/para/perp transform and monochromator state
//! - [`deployment`] - Installed instances with geometry and limits
//! - [`edge`] - Edge-change planning
//! - [`motion`] - Actuator bus seam, limit-checked moves, post-move kills
//! - [`simulation`] - In-memory actuator bus
//! - [`persistence`] - Monochromator state file
//! - [`config`] - `optics.toml`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         bmm_optics                           │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────┐  │
//! │  │ OpticsConfig│───►│ Mirror / Dcm │◄──►│ motion helpers  │  │
//! │  │ deployment  │    │  (pure math) │    │                 │  │
//! │  └─────────────┘    └──────────────┘    └────────┬────────┘  │
//! │                                                  ▼           │
//! │                                        ┌─────────────────┐   │
//! │                                        │  ActuatorBus    │   │
//! │                                        │  (trait)        │   │
//! │                                        └─────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod deployment;
pub mod edge;
pub mod mirror;
pub mod mono;
pub mod motion;
pub mod persistence;
pub mod simulation;

pub use config::OpticsConfig;
pub use mirror::{LogicalMirrorPose, Mirror, PhysicalMirrorPose};
pub use mono::{Crystal, Dcm, LogicalMonoPose, MonoMode, MonoState, PhysicalMonoPose};
pub use motion::{ActuatorBus, BusError, MotionError};
pub use simulation::SimulatedBus;
