//! Optics configuration file.
//!
//! Every section is optional; an empty file reproduces the installed
//! deployment (see [`crate::deployment`]).
//!
//! ```toml
//! [shared]
//! service_name = "bmm-optics"
//! log_level = "info"
//!
//! [[mirrors]]
//! name = "m2"
//! length = 1288.0
//! width = 240.0
//! limits = { pitch = [0.0, 5.0], yaw = [-1.0, 1.0] }
//!
//! [dcm]
//! crystal = "si111"
//! mode = "fixed"
//! offset = 30.0
//! energy_limits = [2900.0, 25000.0]
//! state_file = "/var/lib/bmm/dcm_state.json"
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use bmm_common::consts::DEFAULT_FIXED_OFFSET;
use bmm_common::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::deployment::{self, MirrorEntry};
use crate::mirror::{Mirror, MirrorGeometry, MirrorLimits};
use crate::mono::{Crystal, Dcm, DcmCalibration, MonoMode, MonoState};
use crate::persistence::MonoStatePersistence;

// ─── Sections ───────────────────────────────────────────────────────

/// One `[[mirrors]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    /// Instance name and actuator prefix.
    pub name: String,
    /// Distance between upstream and downstream actuators [mm].
    pub length: f64,
    /// Distance between the downstream vertical actuators [mm].
    pub width: f64,
    /// Logical limits; omitted axes use the generic defaults.
    #[serde(default)]
    pub limits: MirrorLimits,
}

impl From<&MirrorEntry> for MirrorConfig {
    fn from(entry: &MirrorEntry) -> Self {
        Self {
            name: entry.name.to_string(),
            length: entry.geometry.length,
            width: entry.geometry.width,
            limits: entry.limits,
        }
    }
}

impl MirrorConfig {
    /// Build the runtime instance.
    pub fn build(&self) -> Result<Mirror, ConfigError> {
        Mirror::new(
            self.name.as_str(),
            MirrorGeometry::new(self.length, self.width),
            self.limits,
        )
    }
}

/// The `[dcm]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DcmConfig {
    /// Instance name and actuator prefix.
    pub name: String,
    /// Crystal in the beam at start-up.
    pub crystal: Crystal,
    /// Mode at start-up.
    pub mode: MonoMode,
    /// Fixed-exit offset [mm].
    pub offset: f64,
    /// Force fixed-exit behaviour in channel-cut mode.
    pub suppress_channel_cut: bool,
    /// Crystal calibration.
    pub calibration: DcmCalibration,
    /// Energy axis limits [eV].
    pub energy_limits: AxisLimits,
    /// Where the state is persisted; `None` disables persistence.
    pub state_file: Option<PathBuf>,
}

impl Default for DcmConfig {
    fn default() -> Self {
        Self {
            name: deployment::DCM_NAME.to_string(),
            crystal: Crystal::Si111,
            mode: MonoMode::FixedExit,
            offset: DEFAULT_FIXED_OFFSET,
            suppress_channel_cut: false,
            calibration: DcmCalibration::MEASURED,
            energy_limits: Dcm::ENERGY_LIMITS,
            state_file: None,
        }
    }
}

impl DcmConfig {
    /// Start-up state described by this section.
    pub fn initial_state(&self) -> Result<MonoState, ConfigError> {
        let mut state = MonoState::new(self.crystal, self.mode, self.offset)
            .with_calibration(self.calibration);
        state.set_suppress_channel_cut(self.suppress_channel_cut);
        state.validate()?;
        Ok(state)
    }

    /// State persistence manager, if a state file is configured.
    pub fn persistence(&self) -> Option<MonoStatePersistence> {
        self.state_file.as_ref().map(MonoStatePersistence::new)
    }
}

impl Validate for DcmConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "dcm name cannot be empty".to_string(),
            ));
        }
        self.initial_state().map(|_| ())
    }
}

fn default_mirrors() -> Vec<MirrorConfig> {
    deployment::MIRRORS.iter().map(MirrorConfig::from).collect()
}

// ─── Root ───────────────────────────────────────────────────────────

/// Root of `optics.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpticsConfig {
    /// Logging and identity.
    #[serde(default)]
    pub shared: SharedConfig,
    /// Mirrors and tables; defaults to the deployment table.
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<MirrorConfig>,
    /// Monochromator.
    #[serde(default)]
    pub dcm: DcmConfig,
}

impl Default for OpticsConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            mirrors: default_mirrors(),
            dcm: DcmConfig::default(),
        }
    }
}

impl Validate for OpticsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let mut seen = HashSet::new();
        for entry in &self.mirrors {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate mirror name '{}'",
                    entry.name
                )));
            }
            entry.build()?;
        }
        if seen.contains(self.dcm.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "dcm name '{}' collides with a mirror",
                self.dcm.name
            )));
        }

        self.dcm.validate()
    }
}

impl OpticsConfig {
    /// Build every configured mirror.
    pub fn build_mirrors(&self) -> Result<Vec<Mirror>, ConfigError> {
        self.mirrors.iter().map(MirrorConfig::build).collect()
    }

    /// Build one mirror by name. `Ok(None)` if no such entry.
    pub fn mirror(&self, name: &str) -> Result<Option<Mirror>, ConfigError> {
        self.mirrors
            .iter()
            .find(|m| m.name == name)
            .map(MirrorConfig::build)
            .transpose()
    }

    /// Build the monochromator.
    ///
    /// A saved selection, when configured and readable, takes precedence
    /// over the `[dcm]` start-up crystal, mode, offset and override. The
    /// calibration always comes from `[dcm.calibration]`.
    pub fn build_dcm(&self) -> Result<Dcm, ConfigError> {
        let mut state = self.dcm.initial_state()?;
        if let Some(store) = self.dcm.persistence() {
            match store.load() {
                Ok(Some(saved)) => saved.apply(&mut state)?,
                Ok(None) => {}
                Err(e) => debug!("Ignoring saved DCM state: {}", e),
            }
        }
        Ok(Dcm::with_limits(
            self.dcm.name.as_str(),
            state,
            self.dcm.energy_limits,
        ))
    }
}
