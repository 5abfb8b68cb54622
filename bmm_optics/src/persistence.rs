//! Monochromator state persistence.
//!
//! Saves the session selection (crystal, mode, exit offset and the
//! channel-cut override) as JSON so a restarted session picks up where it
//! left off. Calibration is re-measured out of band and always comes from
//! the configuration. A missing, unreadable-format or outdated file means
//! "start fresh".

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bmm_common::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::mono::{Crystal, Dcm, MonoMode, MonoState};

/// Persistence failures other than "nothing saved yet".
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem error.
    #[error("State file I/O error: {0}")]
    Io(String),

    /// Encoding failed.
    #[error("Failed to serialize state: {0}")]
    Serialize(String),
}

/// Operator choices that survive a restart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonoSelection {
    /// Crystal in the beam.
    pub crystal: Crystal,
    /// Stored mode.
    pub mode: MonoMode,
    /// Fixed-exit offset [mm].
    pub fixed_offset: f64,
    /// Channel-cut override.
    pub suppress_channel_cut: bool,
}

impl MonoSelection {
    /// Selection currently held by `state`.
    pub const fn of(state: &MonoState) -> Self {
        Self {
            crystal: state.active_crystal(),
            mode: state.mode(),
            fixed_offset: state.fixed_offset(),
            suppress_channel_cut: state.suppress_channel_cut(),
        }
    }

    /// Check the saved values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        MonoState::new(self.crystal, self.mode, self.fixed_offset).validate()
    }

    /// Apply onto `state`, keeping its calibration.
    ///
    /// `state` is untouched if the offset is invalid.
    pub fn apply(&self, state: &mut MonoState) -> Result<(), ConfigError> {
        state.set_fixed_offset(self.fixed_offset)?;
        state.select_crystal(self.crystal);
        state.set_mode(self.mode);
        state.set_suppress_channel_cut(self.suppress_channel_cut);
        Ok(())
    }
}

/// On-disk record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedMonoState {
    /// Format version (for migration)
    pub version: u32,
    /// Saved selection
    pub selection: MonoSelection,
    /// Timestamp of last save (Unix epoch seconds)
    pub saved_at: u64,
}

impl PersistedMonoState {
    /// Current format version.
    pub const CURRENT_VERSION: u32 = 2;

    /// Wrap the selection of `state` for saving.
    pub fn new(state: &MonoState) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            selection: MonoSelection::of(state),
            saved_at: 0,
        }
    }
}

/// State file manager.
#[derive(Debug, Clone)]
pub struct MonoStatePersistence {
    path: PathBuf,
}

impl MonoStatePersistence {
    /// Manager for the file at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the selection held by `state`, creating parent directories as
    /// needed.
    pub fn save(&self, state: &MonoState) -> Result<(), PersistenceError> {
        debug!("Saving DCM state to {:?}", self.path);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| PersistenceError::Io(format!("Failed to create directory: {e}")))?;
        }

        let mut record = PersistedMonoState::new(state);
        record.saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let text = serde_json::to_string_pretty(&record)
            .map_err(|e| PersistenceError::Serialize(e.to_string()))?;
        fs::write(&self.path, text)
            .map_err(|e| PersistenceError::Io(format!("Failed to write state file: {e}")))?;

        info!(
            "Saved DCM state ({}, {}) to {:?}",
            state.active_crystal(),
            state.mode(),
            self.path
        );
        Ok(())
    }

    /// Save the current state of `dcm`.
    pub fn save_dcm(&self, dcm: &Dcm) -> Result<(), PersistenceError> {
        self.save(&dcm.snapshot())
    }

    /// Load the saved selection.
    ///
    /// `Ok(None)` when there is no file, the file does not decode, the
    /// version differs or the saved values fail validation.
    pub fn load(&self) -> Result<Option<MonoSelection>, PersistenceError> {
        debug!("Loading DCM state from {:?}", self.path);

        if !self.path.exists() {
            debug!("State file does not exist, starting fresh");
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path)
            .map_err(|e| PersistenceError::Io(format!("Failed to read state file: {e}")))?;

        let record: PersistedMonoState = match serde_json::from_str(&text) {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to deserialize state file, starting fresh: {}", e);
                return Ok(None);
            }
        };

        if record.version != PersistedMonoState::CURRENT_VERSION {
            warn!(
                "State file version {} differs from current {}, starting fresh",
                record.version,
                PersistedMonoState::CURRENT_VERSION
            );
            return Ok(None);
        }

        if let Err(e) = record.selection.validate() {
            warn!("Saved DCM state is invalid, starting fresh: {}", e);
            return Ok(None);
        }

        info!(
            "Loaded DCM state ({}, {}) from {:?} (saved at {})",
            record.selection.crystal,
            record.selection.mode,
            self.path,
            record.saved_at
        );
        Ok(Some(record.selection))
    }

    /// Delete the state file if present.
    pub fn delete(&self) -> Result<(), PersistenceError> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| PersistenceError::Io(format!("Failed to delete state file: {e}")))?;
            info!("Deleted state file {:?}", self.path);
        }
        Ok(())
    }
}
