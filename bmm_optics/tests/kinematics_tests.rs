//! Transform properties across the installed deployment.
//!
//! Round-trips over each instance's declared limits, the zero pose, the
//! limit table and the monochromator energy band for both crystal cuts.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use bmm_common::prelude::*;
use bmm_optics::deployment;
use bmm_optics::mirror::{LogicalMirrorPose, MirrorLimits, PhysicalMirrorPose};
use bmm_optics::mono::{Crystal, Dcm, LogicalMonoPose, MonoMode, MonoState, PhysicalMonoPose};

const SWEEP: usize = 7;

fn assert_mirror_round_trip(name: &str, pose: &LogicalMirrorPose) {
    let mirror = deployment::mirror(name).unwrap();
    let physical = mirror.forward(pose, &PhysicalMirrorPose::default()).unwrap();
    let back = mirror.inverse(&physical).unwrap();

    assert_abs_diff_eq!(back.vertical, pose.vertical, epsilon = 1e-9);
    assert_abs_diff_eq!(back.lateral, pose.lateral, epsilon = 1e-9);
    assert_abs_diff_eq!(back.pitch, pose.pitch, epsilon = 1e-6);
    assert_abs_diff_eq!(back.roll, pose.roll, epsilon = 1e-6);
    assert_abs_diff_eq!(back.yaw, pose.yaw, epsilon = 1e-6);
}

#[test]
fn mirror_round_trip_per_axis_sweep() {
    for mirror in deployment::mirrors() {
        let limits = *mirror.mirror_limits();
        let centre = LogicalMirrorPose {
            vertical: limits.vertical.clamp(0.0),
            lateral: limits.lateral.clamp(0.0),
            pitch: limits.pitch.clamp(0.0),
            roll: limits.roll.clamp(0.0),
            yaw: limits.yaw.clamp(0.0),
        };

        for v in limits.vertical.sweep(SWEEP) {
            assert_mirror_round_trip(mirror.name(), &LogicalMirrorPose { vertical: v, ..centre });
        }
        for l in limits.lateral.sweep(SWEEP) {
            assert_mirror_round_trip(mirror.name(), &LogicalMirrorPose { lateral: l, ..centre });
        }
        for p in limits.pitch.sweep(SWEEP) {
            assert_mirror_round_trip(mirror.name(), &LogicalMirrorPose { pitch: p, ..centre });
        }
        for r in limits.roll.sweep(SWEEP) {
            assert_mirror_round_trip(mirror.name(), &LogicalMirrorPose { roll: r, ..centre });
        }
        for y in limits.yaw.sweep(SWEEP) {
            assert_mirror_round_trip(mirror.name(), &LogicalMirrorPose { yaw: y, ..centre });
        }
    }
}

#[test]
fn mirror_round_trip_at_corners() {
    for mirror in deployment::mirrors() {
        let l = *mirror.mirror_limits();
        for pick_max in [false, true] {
            let end = |a: AxisLimits| if pick_max { a.max() } else { a.min() };
            let pose = LogicalMirrorPose {
                vertical: end(l.vertical),
                lateral: end(l.lateral),
                pitch: end(l.pitch),
                roll: end(l.roll),
                yaw: end(l.yaw),
            };
            assert!(mirror.check(&pose).is_ok());
            assert_mirror_round_trip(mirror.name(), &pose);
        }
    }
}

#[test]
fn zero_pose_puts_every_jack_at_zero() {
    for mirror in deployment::mirrors() {
        let physical = mirror
            .forward(&LogicalMirrorPose::default(), &PhysicalMirrorPose::default())
            .unwrap();
        assert_eq!(physical.values(), [0.0; 5], "{}", mirror.name());
    }
}

#[test]
fn limit_table_matches_deployment() {
    let expect = [
        ("m1", [(-5.0, 5.0), (-5.0, 5.0), (-5.0, 5.0), (-5.0, 5.0), (-5.0, 5.0)]),
        ("m2", [(-6.0, 8.0), (-2.0, 2.0), (0.0, 5.0), (-2.0, 2.0), (-1.0, 1.0)]),
        ("m3", [(-9.0, 1.0), (-16.0, 16.0), (-6.0, 0.5), (-2.0, 2.0), (-1.0, 1.0)]),
        ("xafs_table", [(5.0, 135.0), (4.0, 8.0), (-8.0, 1.0), (-2.0, 2.0), (16.0, 20.0)]),
    ];
    for (name, axes) in expect {
        let mirror = deployment::mirror(name).unwrap();
        let declared = mirror.limits();
        assert_eq!(declared.len(), 5);
        for ((axis, limits), (min, max)) in declared.into_iter().zip(axes) {
            assert_eq!((limits.min(), limits.max()), (min, max), "{name}.{axis}");
        }
    }

    let dcm = deployment::dcm();
    assert_eq!(dcm.limits(), vec![("energy", AxisLimits::new(2900.0, 25000.0))]);
    assert_eq!(MirrorLimits::GENERIC.pitch, AxisLimits::new(-5.5, 5.5));
}

#[test]
fn geometry_table_matches_deployment() {
    for (name, length, width) in [
        ("m1", 556.0, 240.0),
        ("m2", 1288.0, 240.0),
        ("m3", 667.0, 240.0),
        ("xafs_table", 1160.0, 558.0),
    ] {
        let g = *deployment::mirror(name).unwrap().geometry();
        assert_eq!((g.length, g.width), (length, width), "{name}");
    }
}

#[test]
fn mono_round_trip_both_crystals() {
    for crystal in [Crystal::Si111, Crystal::Si311] {
        for mode in [MonoMode::FixedExit, MonoMode::ChannelCut] {
            let dcm = Dcm::new("dcm", MonoState::new(crystal, mode, 30.0));
            let band = AxisLimits::new(4950.0, 23500.0);
            for energy in band.sweep(40) {
                let physical = dcm
                    .forward(&LogicalMonoPose { energy }, &PhysicalMonoPose::default())
                    .unwrap();
                let back = dcm.inverse(&physical).unwrap();
                assert_relative_eq!(back.energy, energy, max_relative = 1e-6);
            }
        }
    }
}

#[test]
fn crystal_minimum_energies() {
    let mut state = MonoState::default();
    assert_relative_eq!(state.min_energy(), 1977.15, epsilon = 0.5);
    state.select_crystal(Crystal::Si311);
    assert_relative_eq!(state.min_energy(), 3785.45, epsilon = 0.5);
}

#[test]
fn fixed_exit_translations_shrink_with_energy() {
    let dcm = deployment::dcm();
    let low = dcm
        .forward(&LogicalMonoPose { energy: 5000.0 }, &PhysicalMonoPose::default())
        .unwrap();
    let high = dcm
        .forward(&LogicalMonoPose { energy: 20000.0 }, &PhysicalMonoPose::default())
        .unwrap();
    assert!(high.bragg < low.bragg);
    assert!(high.para > low.para);
    assert!(high.perp < low.perp);
    assert!(low.perp > 15.0);
}
