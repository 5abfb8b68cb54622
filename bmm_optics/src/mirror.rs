//! Five-actuator mirror / table kinematics.
//!
//! ```text
//!                 length
//!        ◄──────────────────────►
//!   yu ●─────────────────────────● ydo ┐
//!                                │     │ width
//!                                ● ydi ┘
//!   xu ■─────────────────────────■ xd
//! ```
//!
//! Three vertical jacks (one upstream, two at the downstream split) and two
//! horizontal jacks carry five logical axes: vertical and lateral
//! translation at the centre, and pitch, roll and yaw in milliradians.
//!
//! The same shape serves every mirror and the sample table; only the
//! [`MirrorGeometry`] and the [`MirrorLimits`] differ between instances.

use bmm_common::consts::MRAD_PER_RAD;
use bmm_common::prelude::*;
use serde::{Deserialize, Serialize};

// ─── Pose Records ───────────────────────────────────────────────────

/// Logical mirror pose.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicalMirrorPose {
    /// Vertical translation at the mirror centre [mm].
    pub vertical: f64,
    /// Lateral translation at the mirror centre [mm].
    pub lateral: f64,
    /// Rotation about the horizontal transverse axis [mrad].
    pub pitch: f64,
    /// Rotation about the beam axis [mrad].
    pub roll: f64,
    /// Rotation about the vertical axis [mrad].
    pub yaw: f64,
}

impl LogicalMirrorPose {
    /// Logical axis names, in record order.
    pub const AXES: [&'static str; 5] = ["vertical", "lateral", "pitch", "roll", "yaw"];

    /// Axis values in [`AXES`](Self::AXES) order.
    pub const fn values(&self) -> [f64; 5] {
        [self.vertical, self.lateral, self.pitch, self.roll, self.yaw]
    }
}

/// Physical actuator positions [mm].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicalMirrorPose {
    /// Upstream vertical jack.
    pub yu: f64,
    /// Downstream outboard vertical jack.
    pub ydo: f64,
    /// Downstream inboard vertical jack.
    pub ydi: f64,
    /// Upstream horizontal jack.
    pub xu: f64,
    /// Downstream horizontal jack.
    pub xd: f64,
}

impl PhysicalMirrorPose {
    /// Actuator suffixes, in record order.
    pub const AXES: [&'static str; 5] = ["yu", "ydo", "ydi", "xu", "xd"];

    /// Horizontal actuators, stopped after every move to keep them cool.
    pub const KILL_AFTER_MOVE: [&'static str; 2] = ["xd", "xu"];

    /// Positions in [`AXES`](Self::AXES) order.
    pub const fn values(&self) -> [f64; 5] {
        [self.yu, self.ydo, self.ydi, self.xu, self.xd]
    }

    /// Build from positions in [`AXES`](Self::AXES) order.
    pub const fn from_values([yu, ydo, ydi, xu, xd]: [f64; 5]) -> Self {
        Self {
            yu,
            ydo,
            ydi,
            xu,
            xd,
        }
    }
}

// ─── Geometry & Limits ──────────────────────────────────────────────

/// Actuator footprint of one mirror or table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MirrorGeometry {
    /// Distance between the upstream and downstream actuator pairs [mm].
    pub length: f64,
    /// Distance between the two downstream vertical actuators [mm].
    pub width: f64,
}

impl MirrorGeometry {
    /// Create a geometry record. See [`validate`](Self::validate).
    pub const fn new(length: f64, width: f64) -> Self {
        Self { length, width }
    }

    /// Both lever arms must be finite and strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (what, value) in [("length", self.length), ("width", self.width)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "mirror {what} must be > 0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Declared logical-axis travel limits of one instance.
///
/// Axes missing from configuration fall back to the generic defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorLimits {
    /// Vertical [mm].
    pub vertical: AxisLimits,
    /// Lateral [mm].
    pub lateral: AxisLimits,
    /// Pitch [mrad].
    pub pitch: AxisLimits,
    /// Roll [mrad].
    pub roll: AxisLimits,
    /// Yaw [mrad].
    pub yaw: AxisLimits,
}

impl MirrorLimits {
    /// Generic limits of the mirror shape before per-instance overrides.
    pub const GENERIC: Self = Self {
        vertical: AxisLimits::new(-8.0, 8.0),
        lateral: AxisLimits::new(-16.0, 16.0),
        pitch: AxisLimits::new(-5.5, 5.5),
        roll: AxisLimits::new(-3.0, 3.0),
        yaw: AxisLimits::new(-3.0, 3.0),
    };

    /// Limits in [`LogicalMirrorPose::AXES`] order.
    pub const fn as_array(&self) -> [AxisLimits; 5] {
        [self.vertical, self.lateral, self.pitch, self.roll, self.yaw]
    }
}

impl Default for MirrorLimits {
    fn default() -> Self {
        Self::GENERIC
    }
}

// ─── Transform ──────────────────────────────────────────────────────

/// Logical → physical.
///
/// Total over the reals. Callers keep `pose` inside the instance limits.
pub fn forward(pose: &LogicalMirrorPose, geometry: &MirrorGeometry) -> PhysicalMirrorPose {
    let half_len = 0.5 * geometry.length;
    let half_w = 0.5 * geometry.width;

    let yaw_arm = half_len * (pose.yaw / MRAD_PER_RAD).tan();
    let pitch_arm = half_len * (pose.pitch / MRAD_PER_RAD).tan();
    let roll_arm = half_w * (pose.roll / MRAD_PER_RAD).tan();

    PhysicalMirrorPose {
        xu: pose.lateral - yaw_arm,
        xd: pose.lateral + yaw_arm,
        yu: pose.vertical - pitch_arm,
        ydo: pose.vertical + pitch_arm + roll_arm,
        ydi: pose.vertical + pitch_arm - roll_arm,
    }
}

/// Physical → logical.
///
/// Angles use `atan2` so a zero lever-arm difference maps to exactly zero
/// with the right sign.
pub fn inverse(physical: &PhysicalMirrorPose, geometry: &MirrorGeometry) -> LogicalMirrorPose {
    let downstream = 0.5 * (physical.ydo + physical.ydi);

    LogicalMirrorPose {
        lateral: 0.5 * (physical.xu + physical.xd),
        yaw: MRAD_PER_RAD * (physical.xd - physical.xu).atan2(geometry.length),
        vertical: 0.5 * (physical.yu + downstream),
        pitch: MRAD_PER_RAD * (downstream - physical.yu).atan2(geometry.length),
        roll: MRAD_PER_RAD * (physical.ydo - physical.ydi).atan2(geometry.width),
    }
}

// ─── Instance ───────────────────────────────────────────────────────

/// One named mirror or table: geometry plus declared limits.
#[derive(Debug, Clone, PartialEq)]
pub struct Mirror {
    name: String,
    geometry: MirrorGeometry,
    limits: MirrorLimits,
}

impl Mirror {
    /// Create an instance.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` if the geometry is degenerate or the
    /// name is empty.
    pub fn new(
        name: impl Into<String>,
        geometry: MirrorGeometry,
        limits: MirrorLimits,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::ValidationError(
                "mirror name cannot be empty".to_string(),
            ));
        }
        geometry.validate()?;
        Ok(Self {
            name,
            geometry,
            limits,
        })
    }

    /// Instance from the compiled-in deployment table, whose geometry is
    /// checked by that module's tests.
    pub(crate) fn from_table(name: &str, geometry: MirrorGeometry, limits: MirrorLimits) -> Self {
        Self {
            name: name.to_string(),
            geometry,
            limits,
        }
    }

    /// Geometry constants.
    pub fn geometry(&self) -> &MirrorGeometry {
        &self.geometry
    }

    /// Declared logical limits.
    pub fn mirror_limits(&self) -> &MirrorLimits {
        &self.limits
    }

    /// Full actuator name, e.g. `m2_ydo`.
    pub fn actuator(&self, suffix: &str) -> String {
        format!("{}_{}", self.name, suffix)
    }
}

impl PseudoPositioner for Mirror {
    type Logical = LogicalMirrorPose;
    type Physical = PhysicalMirrorPose;

    fn name(&self) -> &str {
        &self.name
    }

    fn forward(
        &self,
        pose: &LogicalMirrorPose,
        _current: &PhysicalMirrorPose,
    ) -> Result<PhysicalMirrorPose, KinematicsError> {
        Ok(forward(pose, &self.geometry))
    }

    fn inverse(&self, physical: &PhysicalMirrorPose) -> Result<LogicalMirrorPose, KinematicsError> {
        Ok(inverse(physical, &self.geometry))
    }

    fn limits(&self) -> Vec<(&'static str, AxisLimits)> {
        LogicalMirrorPose::AXES
            .into_iter()
            .zip(self.limits.as_array())
            .collect()
    }

    fn axis_values(&self, pose: &LogicalMirrorPose) -> Vec<f64> {
        pose.values().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const GEOMETRY: MirrorGeometry = MirrorGeometry::new(1288.0, 240.0);

    #[test]
    fn pure_translation_moves_all_jacks_together() {
        let pose = LogicalMirrorPose {
            vertical: 2.5,
            lateral: -1.0,
            ..Default::default()
        };
        let p = forward(&pose, &GEOMETRY);
        assert_eq!(p.yu, 2.5);
        assert_eq!(p.ydo, 2.5);
        assert_eq!(p.ydi, 2.5);
        assert_eq!(p.xu, -1.0);
        assert_eq!(p.xd, -1.0);
    }

    #[test]
    fn pitch_splits_upstream_and_downstream() {
        let pose = LogicalMirrorPose {
            pitch: 3.0,
            ..Default::default()
        };
        let p = forward(&pose, &GEOMETRY);
        let arm = 644.0 * (0.003_f64).tan();
        assert_abs_diff_eq!(p.yu, -arm, epsilon = 1e-12);
        assert_abs_diff_eq!(p.ydo, arm, epsilon = 1e-12);
        assert_abs_diff_eq!(p.ydi, arm, epsilon = 1e-12);
        assert_eq!(p.xu, 0.0);
        assert_eq!(p.xd, 0.0);
    }

    #[test]
    fn roll_only_touches_downstream_pair() {
        let pose = LogicalMirrorPose {
            roll: -1.5,
            ..Default::default()
        };
        let p = forward(&pose, &GEOMETRY);
        assert_eq!(p.yu, 0.0);
        assert_abs_diff_eq!(p.ydo, -p.ydi, epsilon = 1e-15);
        assert!(p.ydo < 0.0);
    }

    #[test]
    fn inverse_of_level_pose_has_signed_zero_angles() {
        let pose = inverse(&PhysicalMirrorPose::from_values([1.0; 5]), &GEOMETRY);
        assert_eq!(pose.pitch, 0.0);
        assert_eq!(pose.roll, 0.0);
        assert_eq!(pose.yaw, 0.0);
        assert_eq!(pose.vertical, 1.0);
        assert_eq!(pose.lateral, 1.0);
    }

    #[test]
    fn round_trip_near_zero_angles() {
        let pose = LogicalMirrorPose {
            vertical: 0.1,
            lateral: -0.2,
            pitch: 1e-9,
            roll: -1e-9,
            yaw: 1e-12,
        };
        let back = inverse(&forward(&pose, &GEOMETRY), &GEOMETRY);
        assert_abs_diff_eq!(back.vertical, pose.vertical, epsilon = 1e-9);
        assert_abs_diff_eq!(back.lateral, pose.lateral, epsilon = 1e-9);
        assert_abs_diff_eq!(back.pitch, pose.pitch, epsilon = 1e-6);
        assert_abs_diff_eq!(back.roll, pose.roll, epsilon = 1e-6);
        assert_abs_diff_eq!(back.yaw, pose.yaw, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_geometry_rejected() {
        let err = Mirror::new("bad", MirrorGeometry::new(0.0, 240.0), MirrorLimits::GENERIC);
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
        let err = Mirror::new("bad", MirrorGeometry::new(556.0, f64::NAN), MirrorLimits::GENERIC);
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
        let err = Mirror::new("", GEOMETRY, MirrorLimits::GENERIC);
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn check_enforces_instance_limits() {
        let limits = MirrorLimits {
            pitch: AxisLimits::new(0.0, 5.0),
            ..MirrorLimits::GENERIC
        };
        let m = Mirror::new("m2", GEOMETRY, limits).unwrap();
        let mut pose = LogicalMirrorPose {
            pitch: 2.0,
            ..Default::default()
        };
        assert!(m.check(&pose).is_ok());
        pose.pitch = -0.1;
        assert!(matches!(
            m.check(&pose),
            Err(KinematicsError::OutOfRange { axis: "pitch", .. })
        ));
        assert_eq!(m.actuator("ydo"), "m2_ydo");
    }

    #[test]
    fn limits_deserialize_with_generic_fallback() {
        let limits: MirrorLimits = toml::from_str("pitch = [0, 5]\nyaw = [-1, 1]").unwrap();
        assert_eq!(limits.pitch, AxisLimits::new(0.0, 5.0));
        assert_eq!(limits.yaw, AxisLimits::new(-1.0, 1.0));
        assert_eq!(limits.vertical, MirrorLimits::GENERIC.vertical);
    }
}
