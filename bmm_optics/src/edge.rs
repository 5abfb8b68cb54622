//! Edge-change planning.
//!
//! Computes everything an energy change needs before any motor moves: the
//! edge actually used, the photon delivery mode, the mono target and its
//! physical pose, and the approximate first-crystal pitch. Executing the
//! plan (mode change, rocking curve, slit scan, reference foil) belongs to
//! the orchestration layer.
//!
//! ## Photon delivery modes
//!
//! | Edge energy      | focused | unfocused |
//! |------------------|---------|-----------|
//! | E > 8000 eV      | A       | D         |
//! | 6000 ≤ E ≤ 8000  | C       | E         |
//! | E < 6000 eV      | B       | F         |

use std::fmt;
use std::str::FromStr;

use bmm_common::consts::{EDGE_ENERGY_MAX, EDGE_ENERGY_MIN, EDGE_TARGET_DEFAULT};
use bmm_common::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mono::{self, Crystal, LogicalMonoPose, MonoState, PhysicalMonoPose};

/// Edge energies the beamline configures automatically [eV].
pub const EDGE_LIMITS: AxisLimits = AxisLimits::new(EDGE_ENERGY_MIN, EDGE_ENERGY_MAX);

/// Absorption edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Edge {
    /// K edge.
    #[default]
    K,
    /// L1 edge.
    L1,
    /// L2 edge.
    L2,
    /// L3 edge.
    L3,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::K => "K",
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
        };
        f.write_str(s)
    }
}

impl FromStr for Edge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "K" => Ok(Self::K),
            "L1" => Ok(Self::L1),
            "L2" => Ok(Self::L2),
            "L3" => Ok(Self::L3),
            _ => Err(format!("unknown edge '{s}'")),
        }
    }
}

/// Photon delivery mode: the mirror/table configuration for an energy range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhotonDeliveryMode {
    /// Focused, above 8 keV.
    A,
    /// Focused, below 6 keV.
    B,
    /// Focused, 6–8 keV.
    C,
    /// Unfocused, above 8 keV.
    D,
    /// Unfocused, 6–8 keV.
    E,
    /// Unfocused, below 6 keV.
    F,
}

impl PhotonDeliveryMode {
    /// Mode for an edge at `energy` [eV].
    pub fn for_energy(energy: f64, focus: bool) -> Self {
        match (energy, focus) {
            (e, true) if e > 8000.0 => Self::A,
            (e, false) if e > 8000.0 => Self::D,
            (e, true) if e < 6000.0 => Self::B,
            (e, false) if e < 6000.0 => Self::F,
            (_, true) => Self::C,
            (_, false) => Self::E,
        }
    }

    /// True for the focused modes A, B and C.
    pub const fn is_focused(&self) -> bool {
        matches!(self, Self::A | Self::B | Self::C)
    }
}

impl fmt::Display for PhotonDeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeRequest {
    /// Requested edge.
    pub edge: Edge,
    /// Energy of the requested edge [eV].
    pub edge_energy: f64,
    /// L3 energy of the same element, used when `edge_energy` is out of reach [eV].
    pub l3_energy: Option<f64>,
    /// Focused beam.
    pub focus: bool,
    /// Energy above the edge where the rocking curve is measured [eV].
    pub target: f64,
}

impl EdgeRequest {
    /// Unfocused K-edge request with the default target.
    pub const fn new(edge_energy: f64) -> Self {
        Self {
            edge: Edge::K,
            edge_energy,
            l3_energy: None,
            focus: false,
            target: EDGE_TARGET_DEFAULT,
        }
    }

    /// Set the edge label.
    pub const fn with_edge(mut self, edge: Edge) -> Self {
        self.edge = edge;
        self
    }

    /// Request a focused beam.
    pub const fn with_focus(mut self, focus: bool) -> Self {
        self.focus = focus;
        self
    }

    /// Override the rocking-curve target above the edge.
    pub const fn with_target(mut self, target: f64) -> Self {
        self.target = target;
        self
    }

    /// Supply the element's L3 energy as a fallback for hard K edges.
    pub const fn with_l3_fallback(mut self, l3_energy: f64) -> Self {
        self.l3_energy = Some(l3_energy);
        self
    }
}

/// Everything needed to carry out an edge change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeChangePlan {
    /// Edge actually measured (K may fall back to L3).
    pub edge: Edge,
    /// Energy of that edge [eV].
    pub edge_energy: f64,
    /// Mono target: edge + target offset [eV].
    pub mono_energy: f64,
    /// Required photon delivery mode.
    pub photon_mode: PhotonDeliveryMode,
    /// Crystal the plan was computed for.
    pub crystal: Crystal,
    /// Physical mono pose at `mono_energy`.
    pub mono: PhysicalMonoPose,
    /// Approximate first-crystal pitch, `None` to keep the current readback.
    pub pitch: Option<f64>,
}

/// Plan an edge change.
///
/// # Errors
/// - `OutOfRange` on `edge_energy` when the edge lies outside
///   [`EDGE_LIMITS`] after the L3 fallback.
/// - `OutOfRange` on `energy` when the mono target leaves the mono limits.
/// - `UnreachableEnergy` when the active crystal cannot diffract the target.
pub fn plan_edge_change(
    request: &EdgeRequest,
    state: &MonoState,
    current: &PhysicalMonoPose,
    mono_limits: &AxisLimits,
) -> Result<EdgeChangePlan, KinematicsError> {
    let (edge, edge_energy) = match request.l3_energy {
        Some(l3) if request.edge_energy > EDGE_LIMITS.max() => {
            info!(
                "{} edge at {:.1} eV out of reach, using L3 at {:.1} eV",
                request.edge, request.edge_energy, l3
            );
            (Edge::L3, l3)
        }
        _ => (request.edge, request.edge_energy),
    };

    if let Err(e) = EDGE_LIMITS.check("edge_energy", edge_energy) {
        warn!("Edge energy {:.1} eV cannot be configured automatically", edge_energy);
        return Err(e);
    }

    let mono_energy = edge_energy + request.target;
    mono_limits.check("energy", mono_energy)?;

    let mono = mono::forward(&LogicalMonoPose { energy: mono_energy }, state, current)?;
    let crystal = state.active_crystal();

    Ok(EdgeChangePlan {
        edge,
        edge_energy,
        mono_energy,
        photon_mode: PhotonDeliveryMode::for_energy(edge_energy, request.focus),
        crystal,
        mono,
        pitch: mono::approximate_pitch(mono_energy, crystal),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mono::Dcm;

    fn plan(request: EdgeRequest) -> Result<EdgeChangePlan, KinematicsError> {
        plan_edge_change(
            &request,
            &MonoState::default(),
            &PhysicalMonoPose::default(),
            &Dcm::ENERGY_LIMITS,
        )
    }

    #[test]
    fn mode_table() {
        use PhotonDeliveryMode::*;
        assert_eq!(PhotonDeliveryMode::for_energy(8979.0, true), A);
        assert_eq!(PhotonDeliveryMode::for_energy(8979.0, false), D);
        assert_eq!(PhotonDeliveryMode::for_energy(5465.0, true), B);
        assert_eq!(PhotonDeliveryMode::for_energy(5465.0, false), F);
        assert_eq!(PhotonDeliveryMode::for_energy(7112.0, true), C);
        assert_eq!(PhotonDeliveryMode::for_energy(7112.0, false), E);
        assert_eq!(PhotonDeliveryMode::for_energy(8000.0, false), E);
        assert_eq!(PhotonDeliveryMode::for_energy(6000.0, true), C);
        assert!(A.is_focused());
        assert!(!F.is_focused());
    }

    #[test]
    fn copper_k_edge() {
        let p = plan(EdgeRequest::new(8979.0).with_focus(true)).unwrap();
        assert_eq!(p.edge, Edge::K);
        assert_eq!(p.mono_energy, 9279.0);
        assert_eq!(p.photon_mode, PhotonDeliveryMode::A);
        assert_eq!(p.crystal, Crystal::Si111);
        assert!(p.pitch.is_some());
        assert!(p.mono.bragg > 0.0 && p.mono.bragg < 90.0);
    }

    #[test]
    fn below_window_is_out_of_range() {
        let err = plan(EdgeRequest::new(4500.0)).unwrap_err();
        assert!(matches!(
            err,
            KinematicsError::OutOfRange {
                axis: "edge_energy",
                ..
            }
        ));
    }

    #[test]
    fn hard_k_edge_falls_back_to_l3() {
        // Pb: K at 88005 eV, L3 at 13035 eV.
        let p = plan(EdgeRequest::new(88005.0).with_l3_fallback(13035.0)).unwrap();
        assert_eq!(p.edge, Edge::L3);
        assert_eq!(p.edge_energy, 13035.0);

        let err = plan(EdgeRequest::new(88005.0)).unwrap_err();
        assert!(err.is_out_of_range());
    }

    #[test]
    fn target_can_push_mono_out_of_range() {
        let err = plan(EdgeRequest::new(23000.0).with_target(2500.0)).unwrap_err();
        assert!(matches!(
            err,
            KinematicsError::OutOfRange { axis: "energy", .. }
        ));
    }

    #[test]
    fn si311_leaves_pitch_alone() {
        let mut state = MonoState::default();
        state.select_crystal(Crystal::Si311);
        let p = plan_edge_change(
            &EdgeRequest::new(17038.0),
            &state,
            &PhysicalMonoPose::default(),
            &Dcm::ENERGY_LIMITS,
        )
        .unwrap();
        assert_eq!(p.pitch, None);
        assert_eq!(p.crystal, Crystal::Si311);
    }

    #[test]
    fn edge_parses() {
        assert_eq!("l3".parse::<Edge>().unwrap(), Edge::L3);
        assert!("M5".parse::<Edge>().is_err());
    }
}
