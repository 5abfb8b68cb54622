//! In-memory actuator bus.
//!
//! Moves are instantaneous: a command sets the readback. Used by the tests,
//! the benches and the CLI when no hardware is attached.

use std::collections::HashMap;

use bmm_common::limits::AxisLimits;
use tracing::{debug, trace};

use crate::mirror::{Mirror, PhysicalMirrorPose};
use crate::mono::{Dcm, PhysicalMonoPose};
use crate::motion::{ActuatorBus, BusError};

/// One simulated actuator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct SimulatedActuator {
    /// Dial position.
    position: f64,
    /// User offset applied by reference-zero calibration.
    user_offset: f64,
    /// Hardware travel limits, if any.
    limits: Option<AxisLimits>,
    /// Killed since the last command.
    killed: bool,
}

/// Simulated motion-control layer.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    /// Actuators by full name
    actuators: HashMap<String, SimulatedActuator>,
    /// Every accepted command, in order
    commands: Vec<(String, f64)>,
    /// Every kill, in order
    kills: Vec<String>,
}

impl SimulatedBus {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or reset) an actuator at `position`.
    pub fn with_actuator(mut self, name: impl Into<String>, position: f64) -> Self {
        let entry = self.actuators.entry(name.into()).or_default();
        entry.position = position;
        self
    }

    /// Set hardware travel limits on an existing or new actuator.
    pub fn with_limits(mut self, name: impl Into<String>, limits: AxisLimits) -> Self {
        self.actuators.entry(name.into()).or_default().limits = Some(limits);
        self
    }

    /// Add the five jacks of `mirror`, all at zero.
    pub fn with_mirror(self, mirror: &Mirror) -> Self {
        PhysicalMirrorPose::AXES
            .into_iter()
            .fold(self, |bus, suffix| bus.with_actuator(mirror.actuator(suffix), 0.0))
    }

    /// Add bragg, para, perp and the crystal exchange stage of `dcm`, all at zero.
    pub fn with_dcm(self, dcm: &Dcm) -> Self {
        PhysicalMonoPose::AXES
            .into_iter()
            .chain(["x"])
            .fold(self, |bus, suffix| bus.with_actuator(dcm.actuator(suffix), 0.0))
    }

    /// Current dial position, `None` for unknown actuators.
    pub fn position(&self, name: &str) -> Option<f64> {
        self.actuators.get(name).map(|a| a.position)
    }

    /// Last user offset applied, `None` for unknown actuators.
    pub fn user_offset(&self, name: &str) -> Option<f64> {
        self.actuators.get(name).map(|a| a.user_offset)
    }

    /// Whether `name` has been killed since its last command.
    pub fn is_killed(&self, name: &str) -> bool {
        self.actuators.get(name).is_some_and(|a| a.killed)
    }

    /// Accepted commands, oldest first.
    pub fn commands(&self) -> &[(String, f64)] {
        &self.commands
    }

    /// Kills, oldest first.
    pub fn kills(&self) -> &[String] {
        &self.kills
    }

    /// Forget recorded commands and kills.
    pub fn clear_history(&mut self) {
        self.commands.clear();
        self.kills.clear();
    }

    fn actuator_mut(&mut self, name: &str) -> Result<&mut SimulatedActuator, BusError> {
        self.actuators
            .get_mut(name)
            .ok_or_else(|| BusError::UnknownActuator(name.to_string()))
    }
}

impl ActuatorBus for SimulatedBus {
    fn read(&self, actuator: &str) -> Result<f64, BusError> {
        self.position(actuator)
            .ok_or_else(|| BusError::UnknownActuator(actuator.to_string()))
    }

    fn command(&mut self, actuator: &str, position: f64) -> Result<(), BusError> {
        let entry = self.actuator_mut(actuator)?;
        if !position.is_finite() {
            return Err(BusError::Rejected {
                actuator: actuator.to_string(),
                position,
                reason: "setpoint is not finite".to_string(),
            });
        }
        if let Some(limits) = entry.limits.filter(|l| !l.contains(position)) {
            return Err(BusError::Rejected {
                actuator: actuator.to_string(),
                position,
                reason: format!("outside hardware limits [{}, {}]", limits.min(), limits.max()),
            });
        }
        entry.position = position;
        entry.killed = false;
        trace!("{} -> {}", actuator, position);
        self.commands.push((actuator.to_string(), position));
        Ok(())
    }

    fn kill(&mut self, actuator: &str) -> Result<(), BusError> {
        self.actuator_mut(actuator)?.killed = true;
        self.kills.push(actuator.to_string());
        Ok(())
    }

    fn set_user_offset(&mut self, actuator: &str, offset: f64) -> Result<(), BusError> {
        self.actuator_mut(actuator)?.user_offset = offset;
        debug!("{} user offset -> {}", actuator, offset);
        Ok(())
    }
}
