//! Properties that hold for any step: unit orientations, cleared
//! accumulators and joints that stay in bounds.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use rigid_core::{JointType, Real, StepMethod, World, WorldConfig};

fn vector(range: Real) -> impl Strategy<Value = Vector3<Real>> {
    (-range..range, -range..range, -range..range).prop_map(|(x, y, z)| Vector3::new(x, y, z))
}

fn method() -> impl Strategy<Value = StepMethod> {
    prop_oneof![
        Just(StepMethod::Direct),
        Just(StepMethod::QuickStep),
        (1usize..8).prop_map(|max_iterations| StepMethod::StepFast { max_iterations }),
    ]
}

/// Two ball-joint chains of six links, the first hung from a hinge.
fn jointed_world() -> World {
    let mut world = World::new(WorldConfig::earth());
    for chain in 0..2 {
        let y = chain as Real * 3.0;
        let mut previous = None;
        for i in 0..6 {
            let body = world.create_body_at(Point3::new((i + 1) as Real, y, 0.0));
            let kind = if i == 0 { JointType::Hinge } else { JointType::Ball };
            let joint = world.create_joint(None, kind).unwrap();
            world.attach_joint(joint, Some(body), previous).unwrap();
            let anchor = Point3::new(i as Real + 0.5, y, 0.0);
            if i == 0 {
                world.set_hinge_anchor(joint, anchor).unwrap();
                world.set_hinge_axis(joint, Vector3::y()).unwrap();
            } else {
                world.set_ball_anchor(joint, anchor).unwrap();
            }
            previous = Some(body);
        }
    }
    world
}

#[test]
fn test_identical_worlds_step_identically() {
    let methods = [
        StepMethod::Direct,
        StepMethod::QuickStep,
        StepMethod::StepFast { max_iterations: 4 },
    ];
    for method in methods {
        let mut first = jointed_world();
        let mut second = jointed_world();
        for _ in 0..50 {
            first.step_with(method, 0.01).unwrap();
            second.step_with(method, 0.01).unwrap();
        }

        for (a, b) in first.bodies().zip(second.bodies()) {
            assert_eq!(a.position(), b.position(), "{method:?}");
            assert_eq!(a.quaternion(), b.quaternion(), "{method:?}");
            assert_eq!(a.linear_vel(), b.linear_vel(), "{method:?}");
            assert_eq!(a.angular_vel(), b.angular_vel(), "{method:?}");
        }
    }
}

proptest! {
    #[test]
    fn prop_orientation_stays_unit(
        w in vector(50.0),
        finite in any::<bool>(),
        steps in 1usize..30,
    ) {
        let mut world = World::default();
        let body = world.create_body();
        {
            let b = world.body_mut(body).unwrap();
            b.set_angular_vel(w);
            b.set_finite_rotation_mode(finite);
        }

        for _ in 0..steps {
            world.step(0.01).unwrap();
        }

        let q = world.body(body).unwrap().quaternion();
        prop_assert!((q.quaternion().norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn prop_accumulators_cleared_after_step(
        force in vector(100.0),
        torque in vector(100.0),
        method in method(),
    ) {
        let mut world = World::new(WorldConfig::earth());
        let a = world.create_body();
        let b = world.create_body_at(Point3::new(1.0, 0.0, 0.0));
        let j = world.create_joint(None, JointType::Hinge).unwrap();
        world.attach_joint(j, Some(a), Some(b)).unwrap();
        world.body_mut(a).unwrap().add_force(force);
        world.body_mut(b).unwrap().add_torque(torque);

        world.step_with(method, 0.01).unwrap();

        for body in [a, b] {
            let body = world.body(body).unwrap();
            prop_assert_eq!(body.force(), Vector3::zeros());
            prop_assert_eq!(body.torque(), Vector3::zeros());
        }
    }

    #[test]
    fn prop_hinge_respects_stops(
        lo in -1.0 as Real..-0.05,
        hi in 0.05 as Real..1.0,
        spin in -20.0 as Real..20.0,
    ) {
        let mut world = World::default();
        let bob = world.create_body_at(Point3::new(1.0, 0.0, 0.0));
        let j = world.create_joint(None, JointType::Hinge).unwrap();
        world.attach_joint(j, Some(bob), None).unwrap();
        world.set_hinge_anchor(j, Point3::origin()).unwrap();
        world.set_hinge_axis(j, Vector3::y()).unwrap();
        world.set_joint_param(j, rigid_core::Param::LoStop.into(), lo).unwrap();
        world.set_joint_param(j, rigid_core::Param::HiStop.into(), hi).unwrap();
        world.body_mut(bob).unwrap().set_angular_vel(Vector3::new(0.0, spin, 0.0));

        for _ in 0..50 {
            world.step(0.01).unwrap();
        }

        // One step of overshoot at the entry speed, then held.
        let angle = world.hinge_angle(j).unwrap();
        prop_assert!(angle > lo - 0.1, "angle {} below {}", angle, lo);
        prop_assert!(angle < hi + 0.1, "angle {} above {}", angle, hi);
    }
}
