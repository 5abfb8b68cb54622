//! Configuration file loading and state persistence.
//!
//! Tests for `OpticsConfig::load_validated()`: defaults, overrides, missing
//! files, validation failures, and start-up from a saved DCM selection.

use std::fs;
use std::path::Path;

use bmm_common::prelude::*;
use bmm_optics::config::OpticsConfig;
use bmm_optics::deployment;
use bmm_optics::mono::{Crystal, MonoMode};
use bmm_optics::persistence::MonoStatePersistence;
use tempfile::TempDir;

fn write(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("optics.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn full_file_loads() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        r#"
[shared]
service_name = "bmm-optics-test"
log_level = "debug"

[[mirrors]]
name = "m1"
length = 556.0
width = 240.0
limits = { vertical = [-5.0, 5.0], lateral = [-5.0, 5.0], pitch = [-5.0, 5.0], roll = [-5.0, 5.0], yaw = [-5.0, 5.0] }

[[mirrors]]
name = "m2"
length = 1288.0
width = 240.0

[mirrors.limits]
vertical = [-6.0, 8.0]
lateral = [-2.0, 2.0]
pitch = [0.0, 5.0]
roll = [-2.0, 2.0]
yaw = [-1.0, 1.0]

[dcm]
crystal = "si311"
mode = "fixed"
offset = 30.0

[dcm.calibration.si111]
dspacing = 3.1354173
bragg_offset = 16.0891518

[dcm.calibration.si311]
dspacing = 1.6376417
bragg_offset = 16.0010050
"#,
    );

    let config = OpticsConfig::load_validated(&path).unwrap();
    assert_eq!(config.shared.service_name, "bmm-optics-test");
    assert_eq!(config.shared.log_level, LogLevel::Debug);

    let mirrors = config.build_mirrors().unwrap();
    assert_eq!(mirrors[0], deployment::mirror("m1").unwrap());
    assert_eq!(mirrors[1], deployment::mirror("m2").unwrap());

    let dcm = config.build_dcm().unwrap();
    assert_eq!(dcm.active_crystal(), Crystal::Si311);
    assert_eq!(dcm.bragg_offset(), 16.0010050);
}

#[test]
fn missing_file() {
    let err = OpticsConfig::load_validated(Path::new("/nonexistent/optics.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound));
}

#[test]
fn negative_dspacing_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        r#"
[dcm.calibration.si111]
dspacing = -3.1354173
bragg_offset = 16.0891518

[dcm.calibration.si311]
dspacing = 1.6376417
bragg_offset = 16.0010050
"#,
    );
    let err = OpticsConfig::load_validated(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn dcm_name_cannot_shadow_a_mirror() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "[dcm]\nname = \"m1\"\n");
    let err = OpticsConfig::load_validated(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn saved_state_wins_over_start_up_values() {
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("state/dcm_state.json");
    let path = write(
        dir.path(),
        &format!(
            "[dcm]\ncrystal = \"111\"\nstate_file = {:?}\n",
            state_file.to_string_lossy()
        ),
    );

    let config = OpticsConfig::load_validated(&path).unwrap();
    let dcm = config.build_dcm().unwrap();
    assert_eq!(dcm.active_crystal(), Crystal::Si111);

    dcm.select_crystal(Crystal::Si311);
    dcm.set_mode(MonoMode::ChannelCut);
    config.dcm.persistence().unwrap().save_dcm(&dcm).unwrap();

    let restarted = config.build_dcm().unwrap();
    assert_eq!(restarted.active_crystal(), Crystal::Si311);
    assert_eq!(restarted.mode(), MonoMode::ChannelCut);

    MonoStatePersistence::new(&state_file).delete().unwrap();
    assert_eq!(config.build_dcm().unwrap().active_crystal(), Crystal::Si111);
}

#[test]
fn recalibration_applies_over_a_saved_state() {
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("dcm_state.json");
    let quoted = format!("{:?}", state_file.to_string_lossy());

    let before = write(dir.path(), &format!("[dcm]\nstate_file = {quoted}\n"));
    let config = OpticsConfig::load_validated(&before).unwrap();
    let dcm = config.build_dcm().unwrap();
    dcm.select_crystal(Crystal::Si311);
    config.dcm.persistence().unwrap().save_dcm(&dcm).unwrap();

    let after = write(
        dir.path(),
        &format!(
            r#"
[dcm]
state_file = {quoted}

[dcm.calibration.si111]
dspacing = 3.2
bragg_offset = 16.0891518

[dcm.calibration.si311]
dspacing = 1.6376417
bragg_offset = 16.1
"#
        ),
    );
    let config = OpticsConfig::load_validated(&after).unwrap();
    let restarted = config.build_dcm().unwrap().snapshot();
    assert_eq!(restarted.active_crystal(), Crystal::Si311);
    assert_eq!(restarted.calibration().si111.dspacing, 3.2);
    assert_eq!(restarted.bragg_offset(), 16.1);
}

#[test]
fn shipped_example_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/optics.toml");
    let config = OpticsConfig::load_validated(&path).unwrap();
    assert_eq!(config.build_mirrors().unwrap(), deployment::mirrors());
    assert_eq!(config.dcm.state_file, None);
}
