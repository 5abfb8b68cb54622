//! Seam between the kinematics and the motion-control layer.
//!
//! The actuator layer (EPICS motors on the beamline, [`SimulatedBus`] in
//! tests) implements [`ActuatorBus`]. The helpers here read physical
//! positions, run the transforms, check logical limits and issue commands.
//! Completion polling, retries and fault handling stay in the actuator layer.
//!
//! ## Post-move hook
//!
//! After every move the horizontal mirror jacks (`xu`, `xd`) and the DCM
//! translation stages (`para`, `perp`) are killed to stop them heating.
//! The kills run even when a command fails partway; the first error is
//! returned afterwards.
//!
//! [`SimulatedBus`]: crate::simulation::SimulatedBus

use bmm_common::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::mirror::{self, LogicalMirrorPose, Mirror, PhysicalMirrorPose};
use crate::mono::{self, Crystal, Dcm, DcmReport, LogicalMonoPose, PhysicalMonoPose};

/// Errors reported by the actuator layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BusError {
    /// No actuator with this name.
    #[error("Unknown actuator: {0}")]
    UnknownActuator(String),

    /// The actuator refused the setpoint (hardware limit, disabled, ...).
    #[error("Actuator {actuator} rejected {position}: {reason}")]
    Rejected {
        /// Actuator name.
        actuator: String,
        /// Requested position.
        position: f64,
        /// Actuator-specific reason.
        reason: String,
    },

    /// Hardware communication error.
    #[error("Hardware communication error: {0}")]
    Communication(String),
}

/// Anything that can go wrong moving a pseudo-positioner.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    /// Limit violation or unreachable energy; nothing was commanded.
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),

    /// The actuator layer failed.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Capability provided by the motion-control layer.
pub trait ActuatorBus {
    /// Current readback of `actuator`.
    fn read(&self, actuator: &str) -> Result<f64, BusError>;

    /// Command `actuator` to `position`.
    fn command(&mut self, actuator: &str, position: f64) -> Result<(), BusError>;

    /// Stop and de-energize `actuator`.
    fn kill(&mut self, _actuator: &str) -> Result<(), BusError> {
        Ok(())
    }

    /// Set the user offset of `actuator` (reference-zero calibration).
    fn set_user_offset(&mut self, _actuator: &str, _offset: f64) -> Result<(), BusError> {
        Ok(())
    }
}

/// Kill every actuator in `actuators`, attempting all of them.
///
/// Returns the first failure.
fn kill_after_move<B, I>(bus: &mut B, actuators: I) -> Result<(), BusError>
where
    B: ActuatorBus + ?Sized,
    I: IntoIterator<Item = String>,
{
    let mut first = Ok(());
    for actuator in actuators {
        if let Err(e) = bus.kill(&actuator) {
            warn!("Failed to kill {}: {}", actuator, e);
            if first.is_ok() {
                first = Err(e);
            }
        }
    }
    first
}

// ─── Mirrors ────────────────────────────────────────────────────────

/// Read the five jacks of `mirror`.
pub fn read_mirror_physical<B: ActuatorBus + ?Sized>(
    bus: &B,
    mirror: &Mirror,
) -> Result<PhysicalMirrorPose, BusError> {
    let mut values = [0.0; 5];
    for (value, suffix) in values.iter_mut().zip(PhysicalMirrorPose::AXES) {
        *value = bus.read(&mirror.actuator(suffix))?;
    }
    Ok(PhysicalMirrorPose::from_values(values))
}

/// Current logical pose of `mirror`.
pub fn read_mirror<B: ActuatorBus + ?Sized>(
    bus: &B,
    mirror: &Mirror,
) -> Result<LogicalMirrorPose, MotionError> {
    let physical = read_mirror_physical(bus, mirror)?;
    Ok(mirror::inverse(&physical, mirror.geometry()))
}

/// Move `mirror` to `target`.
///
/// Nothing is commanded if `target` violates the declared limits.
pub fn move_mirror<B: ActuatorBus + ?Sized>(
    bus: &mut B,
    mirror: &Mirror,
    target: &LogicalMirrorPose,
) -> Result<PhysicalMirrorPose, MotionError> {
    mirror.check(target)?;
    let physical = mirror::forward(target, mirror.geometry());
    debug!("{} forward {:?} -> {:?}", mirror.name(), target, physical);

    let commanded = PhysicalMirrorPose::AXES
        .into_iter()
        .zip(physical.values())
        .try_for_each(|(suffix, position)| bus.command(&mirror.actuator(suffix), position));
    let killed = kill_after_move(
        bus,
        PhysicalMirrorPose::KILL_AFTER_MOVE.map(|suffix| mirror.actuator(suffix)),
    );
    commanded?;
    killed?;

    info!(
        "{} moved to vertical={:.4} lateral={:.4} pitch={:.4} roll={:.4} yaw={:.4}",
        mirror.name(),
        target.vertical,
        target.lateral,
        target.pitch,
        target.roll,
        target.yaw
    );
    Ok(physical)
}

// ─── Monochromator ──────────────────────────────────────────────────

/// Read bragg, para and perp.
pub fn read_dcm_physical<B: ActuatorBus + ?Sized>(
    bus: &B,
    dcm: &Dcm,
) -> Result<PhysicalMonoPose, BusError> {
    Ok(PhysicalMonoPose {
        bragg: bus.read(&dcm.actuator("bragg"))?,
        para: bus.read(&dcm.actuator("para"))?,
        perp: bus.read(&dcm.actuator("perp"))?,
    })
}

/// Current energy of `dcm`.
pub fn read_dcm<B: ActuatorBus + ?Sized>(bus: &B, dcm: &Dcm) -> Result<LogicalMonoPose, MotionError> {
    let physical = read_dcm_physical(bus, dcm)?;
    let state = dcm.lock();
    Ok(mono::inverse(&physical, &state)?)
}

/// Move `dcm` to `energy` [eV].
///
/// The state lock is held from the limit check to the last command, so a
/// concurrent crystal or mode change cannot interleave.
pub fn move_dcm<B: ActuatorBus + ?Sized>(
    bus: &mut B,
    dcm: &Dcm,
    energy: f64,
) -> Result<PhysicalMonoPose, MotionError> {
    let state = dcm.lock();
    dcm.energy_limits().check("energy", energy)?;

    let current = read_dcm_physical(bus, dcm)?;
    let physical = mono::forward(&LogicalMonoPose { energy }, &state, &current)?;
    debug!(
        "{} forward {:.2} eV ({}, {}) -> {:?}",
        dcm.name(),
        energy,
        state.active_crystal(),
        state.mode(),
        physical
    );

    let commanded = PhysicalMonoPose::AXES
        .into_iter()
        .zip(physical.values())
        .try_for_each(|(suffix, position)| bus.command(&dcm.actuator(suffix), position));
    let killed = kill_after_move(
        bus,
        PhysicalMonoPose::KILL_AFTER_MOVE.map(|suffix| dcm.actuator(suffix)),
    );
    commanded?;
    killed?;

    info!(
        "{} moved to {:.1} eV (bragg {:.5} deg)",
        dcm.name(),
        energy,
        physical.bragg
    );
    Ok(physical)
}

/// Put `crystal` in the beam and apply its Bragg offset.
///
/// The offset is applied first; the state changes only once the actuator
/// layer has accepted it.
pub fn select_crystal<B: ActuatorBus + ?Sized>(
    bus: &mut B,
    dcm: &Dcm,
    crystal: Crystal,
) -> Result<f64, MotionError> {
    let mut state = dcm.lock();
    let offset = state.calibration().for_crystal(crystal).bragg_offset;
    bus.set_user_offset(&dcm.actuator("bragg"), offset)?;
    state.select_crystal(crystal);
    Ok(offset)
}

/// Re-derive crystal and mode from the exchange stage (`<dcm>_x`) after a
/// power interruption and re-apply the Bragg offset.
///
/// Crystal and mode are left untouched if the offset cannot be applied.
pub fn restore_dcm<B: ActuatorBus + ?Sized>(bus: &mut B, dcm: &Dcm) -> Result<Crystal, MotionError> {
    let exchange = bus.read(&dcm.actuator("x"))?;
    let mut state = dcm.lock();
    let crystal = state.crystal_at_exchange(exchange);
    let offset = state.calibration().for_crystal(crystal).bragg_offset;
    bus.set_user_offset(&dcm.actuator("bragg"), offset)?;
    state.restore(exchange);
    Ok(state.active_crystal())
}

/// `Ok(None)` when the bus has no such actuator; other failures propagate.
fn read_if_present<B: ActuatorBus + ?Sized>(bus: &B, actuator: &str) -> Result<Option<f64>, BusError> {
    match bus.read(actuator) {
        Ok(value) => Ok(Some(value)),
        Err(BusError::UnknownActuator(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Readback summary of `dcm`.
///
/// Pitch and roll are included when the bus has both actuators. A failed
/// read of an existing one is an error.
pub fn report_dcm<B: ActuatorBus + ?Sized>(bus: &B, dcm: &Dcm) -> Result<DcmReport, MotionError> {
    let physical = read_dcm_physical(bus, dcm)?;
    let state = dcm.lock();
    let energy = mono::inverse(&physical, &state)?.energy;
    let pitch_roll = match (
        read_if_present(bus, &dcm.actuator("pitch"))?,
        read_if_present(bus, &dcm.actuator("roll"))?,
    ) {
        (Some(pitch), Some(roll)) => Some((pitch, roll)),
        _ => None,
    };
    Ok(DcmReport {
        energy,
        crystal: state.active_crystal(),
        physical,
        pitch_roll,
    })
}
