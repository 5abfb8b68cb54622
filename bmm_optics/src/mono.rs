//! Double-crystal monochromator (DCM) kinematics.
//!
//! Maps photon energy onto the Bragg rotation and the two translation stages
//! of the second crystal (parallel and perpendicular to the beam).
//!
//! ## Modes
//!
//! | Mode       | Bragg         | para / perp                         |
//! |------------|---------------|-------------------------------------|
//! | FixedExit  | asin(λ / 2d)  | offset / (2 sin θ), offset / (2 cos θ) |
//! | ChannelCut | asin(λ / 2d)  | held at current readbacks           |
//!
//! `suppress_channel_cut` forces FixedExit behaviour without touching the
//! stored mode.
//!
//! ## Concurrency
//!
//! [`Dcm`] owns its [`MonoState`] behind one `parking_lot::Mutex`. Take
//! [`Dcm::lock`] for any sequence (select crystal, then forward) that must be
//! observed atomically. The lock is not reentrant: while holding the guard,
//! call the free functions in this module, not the `Dcm` methods.

use std::fmt;
use std::str::FromStr;

use bmm_common::consts::{CRYSTAL_EXCHANGE_THRESHOLD, DEFAULT_FIXED_OFFSET, HC};
use bmm_common::prelude::*;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ─── Crystal & Mode ─────────────────────────────────────────────────

/// Diffracting crystal cut.
///
/// Deserializes through [`FromStr`], so `"si111"`, `"111"` and `"Si(111)"`
/// are all accepted. Serializes as `"si111"` / `"si311"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String")]
pub enum Crystal {
    /// Si(111), the low-energy cut.
    #[default]
    #[serde(rename = "si111")]
    Si111,
    /// Si(311), the high-resolution cut.
    #[serde(rename = "si311")]
    Si311,
}

impl Crystal {
    /// Miller indices as a bare string, e.g. `"111"`.
    pub const fn reflection(&self) -> &'static str {
        match self {
            Self::Si111 => "111",
            Self::Si311 => "311",
        }
    }
}

impl fmt::Display for Crystal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Si({})", self.reflection())
    }
}

impl FromStr for Crystal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        match key.as_str() {
            "111" => Ok(Self::Si111),
            "311" => Ok(Self::Si311),
            _ => Err(format!("unknown crystal '{s}', expected 111 or 311")),
        }
    }
}

impl TryFrom<String> for Crystal {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Operating mode of the translation stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String")]
pub enum MonoMode {
    /// Translations follow the Bragg angle to keep a constant exit offset.
    #[default]
    #[serde(rename = "fixed")]
    FixedExit,
    /// Only the Bragg axis moves; translations hold their position.
    #[serde(rename = "channelcut")]
    ChannelCut,
}

impl fmt::Display for MonoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedExit => f.write_str("fixed"),
            Self::ChannelCut => f.write_str("channelcut"),
        }
    }
}

impl FromStr for MonoMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower.contains("channel") {
            Ok(Self::ChannelCut)
        } else if lower.starts_with("fixed") {
            Ok(Self::FixedExit)
        } else {
            Err(format!("unknown mode '{s}', expected fixed or channelcut"))
        }
    }
}

impl TryFrom<String> for MonoMode {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ─── Calibration ────────────────────────────────────────────────────

/// Calibration of one crystal cut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrystalCalibration {
    /// Lattice d-spacing [Å].
    pub dspacing: f64,
    /// Offset of the Bragg rotation's reference zero [deg].
    pub bragg_offset: f64,
}

/// Calibration of both cuts, re-measured out of band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DcmCalibration {
    /// Si(111) calibration.
    pub si111: CrystalCalibration,
    /// Si(311) calibration.
    pub si311: CrystalCalibration,
}

impl DcmCalibration {
    /// Values measured on 11 September 2023.
    pub const MEASURED: Self = Self {
        si111: CrystalCalibration {
            dspacing: 3.1354173,
            bragg_offset: 16.0891518,
        },
        si311: CrystalCalibration {
            dspacing: 1.6376417,
            bragg_offset: 16.0010050,
        },
    };

    /// Calibration of `crystal`.
    pub const fn for_crystal(&self, crystal: Crystal) -> &CrystalCalibration {
        match crystal {
            Crystal::Si111 => &self.si111,
            Crystal::Si311 => &self.si311,
        }
    }

    /// Both d-spacings finite and positive, both offsets finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for crystal in [Crystal::Si111, Crystal::Si311] {
            let cal = self.for_crystal(crystal);
            if !(cal.dspacing.is_finite() && cal.dspacing > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{crystal} d-spacing must be > 0, got {}",
                    cal.dspacing
                )));
            }
            if !cal.bragg_offset.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "{crystal} bragg offset must be finite"
                )));
            }
        }
        Ok(())
    }
}

impl Default for DcmCalibration {
    fn default() -> Self {
        Self::MEASURED
    }
}

// ─── State ──────────────────────────────────────────────────────────

/// Mutable monochromator configuration read by both transforms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonoState {
    active_crystal: Crystal,
    mode: MonoMode,
    fixed_offset: f64,
    suppress_channel_cut: bool,
    calibration: DcmCalibration,
}

impl Default for MonoState {
    fn default() -> Self {
        Self::new(Crystal::Si111, MonoMode::FixedExit, DEFAULT_FIXED_OFFSET)
    }
}

impl MonoState {
    /// Create a state with the measured calibration.
    pub const fn new(crystal: Crystal, mode: MonoMode, fixed_offset: f64) -> Self {
        Self {
            active_crystal: crystal,
            mode,
            fixed_offset,
            suppress_channel_cut: false,
            calibration: DcmCalibration::MEASURED,
        }
    }

    /// Replace the calibration table.
    pub const fn with_calibration(mut self, calibration: DcmCalibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// Crystal in the beam.
    pub const fn active_crystal(&self) -> Crystal {
        self.active_crystal
    }

    /// Stored mode (see also [`channel_cut_active`](Self::channel_cut_active)).
    pub const fn mode(&self) -> MonoMode {
        self.mode
    }

    /// Perpendicular beam offset kept in fixed-exit mode [mm].
    pub const fn fixed_offset(&self) -> f64 {
        self.fixed_offset
    }

    /// Whether channel-cut behaviour is overridden.
    pub const fn suppress_channel_cut(&self) -> bool {
        self.suppress_channel_cut
    }

    /// Calibration table.
    pub const fn calibration(&self) -> &DcmCalibration {
        &self.calibration
    }

    /// `2d` of the active crystal [Å].
    pub const fn two_d_spacing(&self) -> f64 {
        2.0 * self.calibration.for_crystal(self.active_crystal).dspacing
    }

    /// Bragg reference-zero offset of the active crystal [deg].
    pub const fn bragg_offset(&self) -> f64 {
        self.calibration.for_crystal(self.active_crystal).bragg_offset
    }

    /// True iff mode is channel-cut and not suppressed.
    pub const fn channel_cut_active(&self) -> bool {
        matches!(self.mode, MonoMode::ChannelCut) && !self.suppress_channel_cut
    }

    /// Lowest energy the active crystal diffracts (θ = 90°) [eV].
    pub fn min_energy(&self) -> f64 {
        HC / self.two_d_spacing()
    }

    /// Put `crystal` in the beam.
    ///
    /// Returns the Bragg reference-zero offset the actuator layer must apply
    /// for the new crystal.
    pub fn select_crystal(&mut self, crystal: Crystal) -> f64 {
        if crystal != self.active_crystal {
            info!("DCM crystal {} -> {}", self.active_crystal, crystal);
        }
        self.active_crystal = crystal;
        self.bragg_offset()
    }

    /// Set the stored mode.
    pub fn set_mode(&mut self, mode: MonoMode) {
        debug!("DCM mode -> {}", mode);
        self.mode = mode;
    }

    /// Force fixed-exit behaviour regardless of mode.
    pub fn set_suppress_channel_cut(&mut self, suppress: bool) {
        debug!("DCM suppress_channel_cut -> {}", suppress);
        self.suppress_channel_cut = suppress;
    }

    /// Set the fixed-exit offset [mm].
    ///
    /// # Errors
    /// `ConfigError::ValidationError` unless the offset is finite and positive.
    pub fn set_fixed_offset(&mut self, offset: f64) -> Result<(), ConfigError> {
        validate_offset(offset)?;
        self.fixed_offset = offset;
        Ok(())
    }

    /// Replace the calibration after a re-measurement.
    pub fn set_calibration(&mut self, calibration: DcmCalibration) -> Result<(), ConfigError> {
        calibration.validate()?;
        self.calibration = calibration;
        Ok(())
    }

    /// Crystal implied by the exchange stage at `exchange_position`.
    pub fn crystal_at_exchange(&self, exchange_position: f64) -> Crystal {
        if exchange_position < CRYSTAL_EXCHANGE_THRESHOLD {
            Crystal::Si111
        } else if exchange_position > CRYSTAL_EXCHANGE_THRESHOLD {
            Crystal::Si311
        } else {
            self.active_crystal
        }
    }

    /// Re-derive state after a power interruption.
    ///
    /// Mode returns to fixed-exit. The crystal follows the exchange stage:
    /// below the threshold Si(111), above it Si(311), exactly on it unchanged.
    /// Returns the Bragg offset for the resulting crystal.
    pub fn restore(&mut self, exchange_position: f64) -> f64 {
        self.mode = MonoMode::FixedExit;
        self.active_crystal = self.crystal_at_exchange(exchange_position);
        info!(
            "DCM restored: {} fixed-exit (exchange stage at {:.3})",
            self.active_crystal, exchange_position
        );
        self.bragg_offset()
    }

    /// Check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_offset(self.fixed_offset)?;
        self.calibration.validate()
    }
}

fn validate_offset(offset: f64) -> Result<(), ConfigError> {
    if offset.is_finite() && offset > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "fixed-exit offset must be > 0, got {offset}"
        )))
    }
}

// ─── Pose Records ───────────────────────────────────────────────────

/// Logical monochromator pose.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicalMonoPose {
    /// Photon energy [eV].
    pub energy: f64,
}

/// Physical monochromator pose.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicalMonoPose {
    /// Crystal rotation [deg].
    pub bragg: f64,
    /// Second-crystal translation parallel to the beam [mm].
    pub para: f64,
    /// Second-crystal translation perpendicular to the beam [mm].
    pub perp: f64,
}

impl PhysicalMonoPose {
    /// Actuator suffixes, in record order.
    pub const AXES: [&'static str; 3] = ["bragg", "para", "perp"];

    /// Translation stages, stopped after every move to keep them cool.
    pub const KILL_AFTER_MOVE: [&'static str; 2] = ["para", "perp"];

    /// Positions in [`AXES`](Self::AXES) order.
    pub const fn values(&self) -> [f64; 3] {
        [self.bragg, self.para, self.perp]
    }
}

// ─── Transform ──────────────────────────────────────────────────────

fn unreachable_error(state: &MonoState, reason: UnreachableReason) -> KinematicsError {
    KinematicsError::UnreachableEnergy {
        two_d_spacing: state.two_d_spacing(),
        reason,
    }
}

/// Bragg angle [rad] diffracting `energy` from the active crystal.
fn bragg_angle(energy: f64, state: &MonoState) -> Result<f64, KinematicsError> {
    if !energy.is_finite() {
        return Err(unreachable_error(state, UnreachableReason::NonFinite { input: energy }));
    }
    let wavelength = HC / energy;
    let ratio = wavelength / state.two_d_spacing();
    if !(-1.0..=1.0).contains(&ratio) {
        return Err(unreachable_error(
            state,
            UnreachableReason::BelowCrystalMinimum {
                energy,
                min_energy: state.min_energy(),
            },
        ));
    }
    Ok(ratio.asin())
}

/// Logical → physical.
///
/// In channel-cut mode `para` and `perp` are copied from `current`.
///
/// # Errors
/// `KinematicsError::UnreachableEnergy` when `λ / 2d` leaves [-1, 1] (the
/// energy is below the crystal minimum, including zero) or the fixed-exit
/// translations are not finite.
pub fn forward(
    pose: &LogicalMonoPose,
    state: &MonoState,
    current: &PhysicalMonoPose,
) -> Result<PhysicalMonoPose, KinematicsError> {
    let angle = bragg_angle(pose.energy, state)?;
    let bragg = angle.to_degrees();

    if state.channel_cut_active() {
        return Ok(PhysicalMonoPose {
            bragg,
            para: current.para,
            perp: current.perp,
        });
    }

    let para = state.fixed_offset / (2.0 * angle.sin());
    let perp = state.fixed_offset / (2.0 * angle.cos());
    if !(para.is_finite() && perp.is_finite()) {
        return Err(unreachable_error(
            state,
            UnreachableReason::NonFinite { input: pose.energy },
        ));
    }
    Ok(PhysicalMonoPose { bragg, para, perp })
}

/// Physical → logical. Only the Bragg angle matters.
///
/// # Errors
/// `KinematicsError::UnreachableEnergy` when `sin(bragg)` is zero to machine
/// precision or the angle is not finite.
pub fn inverse(
    physical: &PhysicalMonoPose,
    state: &MonoState,
) -> Result<LogicalMonoPose, KinematicsError> {
    if !physical.bragg.is_finite() {
        return Err(unreachable_error(
            state,
            UnreachableReason::NonFinite {
                input: physical.bragg,
            },
        ));
    }
    let sine = physical.bragg.to_radians().sin();
    if sine.abs() <= f64::EPSILON {
        return Err(unreachable_error(
            state,
            UnreachableReason::ZeroAngle {
                bragg: physical.bragg,
            },
        ));
    }
    Ok(LogicalMonoPose {
        energy: HC / (state.two_d_spacing() * sine),
    })
}

/// Bragg angle [deg] for `energy` [eV].
pub fn energy_to_angle(energy: f64, state: &MonoState) -> Result<f64, KinematicsError> {
    bragg_angle(energy, state).map(f64::to_degrees)
}

/// Wavelength [Å] selected at Bragg angle `bragg` [deg].
pub fn angle_to_wavelength(bragg: f64, state: &MonoState) -> f64 {
    state.two_d_spacing() * bragg.to_radians().sin()
}

/// Linear model of the first-crystal pitch that peaks the rocking curve.
///
/// Only characterised for Si(111); for Si(311) returns `None` and the
/// caller keeps the current pitch readback.
pub fn approximate_pitch(energy: f64, crystal: Crystal) -> Option<f64> {
    const SLOPE: f64 = -4.42156e-6;
    const INTERCEPT: f64 = 3.94956;
    match crystal {
        Crystal::Si111 => Some(SLOPE * energy + INTERCEPT),
        Crystal::Si311 => None,
    }
}

// ─── Instance ───────────────────────────────────────────────────────

/// A monochromator instance: name, energy limits and the locked state.
#[derive(Debug)]
pub struct Dcm {
    name: String,
    energy_limits: AxisLimits,
    state: Mutex<MonoState>,
}

impl Dcm {
    /// Energy axis limits of the installed mono [eV].
    pub const ENERGY_LIMITS: AxisLimits = AxisLimits::new(MONO_ENERGY_MIN, MONO_ENERGY_MAX);

    /// Create an instance with the default energy limits.
    pub fn new(name: impl Into<String>, state: MonoState) -> Self {
        Self::with_limits(name, state, Self::ENERGY_LIMITS)
    }

    /// Create an instance with explicit energy limits.
    pub fn with_limits(name: impl Into<String>, state: MonoState, energy_limits: AxisLimits) -> Self {
        Self {
            name: name.into(),
            energy_limits,
            state: Mutex::new(state),
        }
    }

    /// Exclusive access to the state for an atomic sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, MonoState> {
        self.state.lock()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> MonoState {
        *self.state.lock()
    }

    /// Energy axis limits [eV].
    pub fn energy_limits(&self) -> AxisLimits {
        self.energy_limits
    }

    /// Full actuator name, e.g. `dcm_bragg`.
    pub fn actuator(&self, suffix: &str) -> String {
        format!("{}_{}", self.name, suffix)
    }

    /// See [`MonoState::select_crystal`].
    pub fn select_crystal(&self, crystal: Crystal) -> f64 {
        self.state.lock().select_crystal(crystal)
    }

    /// See [`MonoState::set_mode`].
    pub fn set_mode(&self, mode: MonoMode) {
        self.state.lock().set_mode(mode);
    }

    /// See [`MonoState::set_suppress_channel_cut`].
    pub fn set_suppress_channel_cut(&self, suppress: bool) {
        self.state.lock().set_suppress_channel_cut(suppress);
    }

    /// `2d` of the active crystal [Å].
    pub fn two_d_spacing(&self) -> f64 {
        self.state.lock().two_d_spacing()
    }

    /// Crystal in the beam.
    pub fn active_crystal(&self) -> Crystal {
        self.state.lock().active_crystal()
    }

    /// Stored mode.
    pub fn mode(&self) -> MonoMode {
        self.state.lock().mode()
    }

    /// Bragg reference-zero offset of the active crystal [deg].
    pub fn bragg_offset(&self) -> f64 {
        self.state.lock().bragg_offset()
    }
}

impl PseudoPositioner for Dcm {
    type Logical = LogicalMonoPose;
    type Physical = PhysicalMonoPose;

    fn name(&self) -> &str {
        &self.name
    }

    fn forward(
        &self,
        pose: &LogicalMonoPose,
        current: &PhysicalMonoPose,
    ) -> Result<PhysicalMonoPose, KinematicsError> {
        forward(pose, &self.state.lock(), current)
    }

    fn inverse(&self, physical: &PhysicalMonoPose) -> Result<LogicalMonoPose, KinematicsError> {
        inverse(physical, &self.state.lock())
    }

    fn limits(&self) -> Vec<(&'static str, AxisLimits)> {
        vec![("energy", self.energy_limits)]
    }

    fn axis_values(&self, pose: &LogicalMonoPose) -> Vec<f64> {
        vec![pose.energy]
    }
}

// ─── Report ─────────────────────────────────────────────────────────

/// Human-readable summary of the monochromator readbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcmReport {
    /// Energy computed from the Bragg readback [eV].
    pub energy: f64,
    /// Crystal in the beam.
    pub crystal: Crystal,
    /// Physical readbacks.
    pub physical: PhysicalMonoPose,
    /// First-crystal pitch and roll readbacks, when available.
    pub pitch_roll: Option<(f64, f64)>,
}

impl fmt::Display for DcmReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            " Energy = {:.1}   reflection = {}",
            self.energy, self.crystal
        )?;
        write!(
            f,
            " current: Bragg = {:8.5}   2nd Xtal Perp = {:7.4}   Para = {:8.4}",
            self.physical.bragg, self.physical.perp, self.physical.para
        )?;
        if let Some((pitch, roll)) = self.pitch_roll {
            write!(
                f,
                "\n          Pitch = {:7.4}   Roll = {:8.4}",
                pitch, roll
            )?;
        }
        Ok(())
    }
}
