//! Motion seam against the simulated bus.
//!
//! Limit refusal before any command, post-move kills, channel-cut hold,
//! hardware rejection, and concurrent crystal changes on one DCM.

use std::sync::Arc;
use std::thread;

use approx::assert_relative_eq;
use bmm_common::prelude::*;
use bmm_optics::deployment;
use bmm_optics::mirror::{LogicalMirrorPose, PhysicalMirrorPose};
use bmm_optics::mono::{Crystal, MonoMode};
use bmm_optics::motion::{self, ActuatorBus, BusError, MotionError};
use bmm_optics::simulation::SimulatedBus;

#[test]
fn every_mirror_moves_and_reads_back() {
    for mirror in deployment::mirrors() {
        let mut bus = SimulatedBus::new().with_mirror(&mirror);
        let l = *mirror.mirror_limits();
        let target = LogicalMirrorPose {
            vertical: l.vertical.max(),
            lateral: l.lateral.min(),
            pitch: l.pitch.max(),
            roll: l.roll.min(),
            yaw: l.yaw.max(),
        };

        motion::move_mirror(&mut bus, &mirror, &target).unwrap();
        assert_eq!(bus.commands().len(), 5);
        for suffix in PhysicalMirrorPose::KILL_AFTER_MOVE {
            assert!(bus.is_killed(&mirror.actuator(suffix)));
        }
        for suffix in ["yu", "ydo", "ydi"] {
            assert!(!bus.is_killed(&mirror.actuator(suffix)));
        }

        let back = motion::read_mirror(&bus, &mirror).unwrap();
        assert_relative_eq!(back.vertical, target.vertical, epsilon = 1e-9);
        assert_relative_eq!(back.yaw, target.yaw, epsilon = 1e-6);
    }
}

#[test]
fn out_of_range_axis_is_named() {
    let m3 = deployment::mirror("m3").unwrap();
    let mut bus = SimulatedBus::new().with_mirror(&m3);
    let err = motion::move_mirror(
        &mut bus,
        &m3,
        &LogicalMirrorPose {
            vertical: 2.0,
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(
        err,
        MotionError::Kinematics(KinematicsError::OutOfRange {
            axis: "vertical",
            value: 2.0,
            min: -9.0,
            max: 1.0,
        })
    );
    assert!(bus.commands().is_empty());
}

#[test]
fn hardware_rejection_surfaces() {
    let m1 = deployment::mirror("m1").unwrap();
    let mut bus = SimulatedBus::new()
        .with_mirror(&m1)
        .with_limits("m1_yu", AxisLimits::new(-0.5, 0.5));
    let err = motion::move_mirror(
        &mut bus,
        &m1,
        &LogicalMirrorPose {
            vertical: 2.0,
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, MotionError::Bus(BusError::Rejected { .. })));
}

#[test]
fn fixed_exit_move_updates_translations() {
    let dcm = deployment::dcm();
    let mut bus = SimulatedBus::new().with_dcm(&dcm);
    let physical = motion::move_dcm(&mut bus, &dcm, 12000.0).unwrap();
    assert_eq!(bus.read("dcm_para").unwrap(), physical.para);
    assert_eq!(bus.read("dcm_perp").unwrap(), physical.perp);
    assert!(bus.is_killed("dcm_para"));
    assert!(bus.is_killed("dcm_perp"));
    assert!(!bus.is_killed("dcm_bragg"));
}

#[test]
fn crystal_change_then_move_is_consistent() {
    let dcm = deployment::dcm();
    let mut bus = SimulatedBus::new().with_dcm(&dcm);
    motion::select_crystal(&mut bus, &dcm, Crystal::Si311).unwrap();
    motion::move_dcm(&mut bus, &dcm, 18000.0).unwrap();
    let energy = motion::read_dcm(&bus, &dcm).unwrap().energy;
    assert_relative_eq!(energy, 18000.0, max_relative = 1e-9);
}

#[test]
fn concurrent_crystal_changes_never_tear() {
    let dcm = Arc::new(deployment::dcm());
    dcm.set_mode(MonoMode::ChannelCut);

    let switcher = {
        let dcm = Arc::clone(&dcm);
        thread::spawn(move || {
            for i in 0..200 {
                let crystal = if i % 2 == 0 { Crystal::Si311 } else { Crystal::Si111 };
                dcm.select_crystal(crystal);
            }
        })
    };

    for _ in 0..200 {
        let state = dcm.lock();
        let two_d = state.two_d_spacing();
        let expected = match state.active_crystal() {
            Crystal::Si111 => 2.0 * 3.1354173,
            Crystal::Si311 => 2.0 * 1.6376417,
        };
        assert_eq!(two_d, expected);
    }

    switcher.join().unwrap();
}
