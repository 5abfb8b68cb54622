//! The installed optics: geometry and declared limits of every instance.
//!
//! | Instance     | length | width | vertical   | lateral   | pitch     | roll    | yaw      |
//! |--------------|--------|-------|------------|-----------|-----------|---------|----------|
//! | `m1`         | 556    | 240   | [-5, 5]    | [-5, 5]   | [-5, 5]   | [-5, 5] | [-5, 5]  |
//! | `m2`         | 1288   | 240   | [-6, 8]    | [-2, 2]   | [0, 5]    | [-2, 2] | [-1, 1]  |
//! | `m3`         | 667    | 240   | [-9, 1]    | [-16, 16] | [-6, 0.5] | [-2, 2] | [-1, 1]  |
//! | `xafs_table` | 1160   | 558   | [5, 135]   | [4, 8]    | [-8, 1]   | [-2, 2] | [16, 20] |
//!
//! Lengths and translations in mm, angles in mrad.

use bmm_common::limits::AxisLimits;

use crate::mirror::{Mirror, MirrorGeometry, MirrorLimits};
use crate::mono::{Dcm, MonoState};

/// Static description of one installed mirror or table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorEntry {
    /// Instance name; also the actuator name prefix.
    pub name: &'static str,
    /// Actuator footprint.
    pub geometry: MirrorGeometry,
    /// Declared logical limits.
    pub limits: MirrorLimits,
}

impl MirrorEntry {
    /// Build the runtime instance.
    pub fn build(&self) -> Mirror {
        Mirror::from_table(self.name, self.geometry, self.limits)
    }
}

const fn limits(v: [f64; 2], l: [f64; 2], p: [f64; 2], r: [f64; 2], y: [f64; 2]) -> MirrorLimits {
    MirrorLimits {
        vertical: AxisLimits::new(v[0], v[1]),
        lateral: AxisLimits::new(l[0], l[1]),
        pitch: AxisLimits::new(p[0], p[1]),
        roll: AxisLimits::new(r[0], r[1]),
        yaw: AxisLimits::new(y[0], y[1]),
    }
}

/// Collimating mirror.
pub const M1: MirrorEntry = MirrorEntry {
    name: "m1",
    geometry: MirrorGeometry::new(556.0, 240.0),
    limits: limits([-5.0, 5.0], [-5.0, 5.0], [-5.0, 5.0], [-5.0, 5.0], [-5.0, 5.0]),
};

/// Focusing mirror.
pub const M2: MirrorEntry = MirrorEntry {
    name: "m2",
    geometry: MirrorGeometry::new(1288.0, 240.0),
    limits: limits([-6.0, 8.0], [-2.0, 2.0], [0.0, 5.0], [-2.0, 2.0], [-1.0, 1.0]),
};

/// Harmonic rejection mirror.
pub const M3: MirrorEntry = MirrorEntry {
    name: "m3",
    geometry: MirrorGeometry::new(667.0, 240.0),
    limits: limits([-9.0, 1.0], [-16.0, 16.0], [-6.0, 0.5], [-2.0, 2.0], [-1.0, 1.0]),
};

/// XAFS sample table.
pub const XAFS_TABLE: MirrorEntry = MirrorEntry {
    name: "xafs_table",
    geometry: MirrorGeometry::new(1160.0, 558.0),
    limits: limits([5.0, 135.0], [4.0, 8.0], [-8.0, 1.0], [-2.0, 2.0], [16.0, 20.0]),
};

/// Every installed five-actuator instance, upstream to downstream.
pub const MIRRORS: [MirrorEntry; 4] = [M1, M2, M3, XAFS_TABLE];

/// Name of the installed monochromator; also its actuator prefix.
pub const DCM_NAME: &str = "dcm";

/// Look up an installed instance by name.
pub fn mirror(name: &str) -> Option<Mirror> {
    MIRRORS
        .iter()
        .find(|entry| entry.name == name)
        .map(MirrorEntry::build)
}

/// All installed instances.
pub fn mirrors() -> Vec<Mirror> {
    MIRRORS.iter().map(MirrorEntry::build).collect()
}

/// The installed monochromator: Si(111), fixed exit, 30 mm offset.
pub fn dcm() -> Dcm {
    Dcm::new(DCM_NAME, MonoState::default())
}
