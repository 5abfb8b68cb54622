//! Physical constants and operating envelopes for the beamline optics.
//!
//! Single source of truth for numeric constants shared between crates.

/// ħc in eV·Å.
pub const HBARC: f64 = 1973.27053324;

/// 2π·ħc in eV·Å: photon energy × wavelength.
pub const HC: f64 = 2.0 * std::f64::consts::PI * HBARC;

/// Lower bound of the monochromator energy axis [eV].
pub const MONO_ENERGY_MIN: f64 = 2900.0;

/// Upper bound of the monochromator energy axis [eV].
pub const MONO_ENERGY_MAX: f64 = 25000.0;

/// Lowest edge energy the beamline configures automatically [eV].
pub const EDGE_ENERGY_MIN: f64 = 4950.0;

/// Highest edge energy the beamline can reach [eV].
pub const EDGE_ENERGY_MAX: f64 = 23500.0;

/// Default energy above the edge at which the rocking curve is measured [eV].
pub const EDGE_TARGET_DEFAULT: f64 = 300.0;

/// Default perpendicular beam offset in fixed-exit mode [mm].
pub const DEFAULT_FIXED_OFFSET: f64 = 30.0;

/// Crystal-exchange stage position separating Si(111) (below) from Si(311) (above) [mm].
pub const CRYSTAL_EXCHANGE_THRESHOLD: f64 = 10.0;

/// Logical mirror angles are expressed in milliradians.
pub const MRAD_PER_RAD: f64 = 1000.0;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/bmm/optics.toml";

/// Default monochromator state file name.
pub const DEFAULT_STATE_FILE: &str = "dcm_state.json";
