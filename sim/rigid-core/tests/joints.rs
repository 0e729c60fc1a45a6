//! Joint behavior under stepping: limits, motors, contacts and the
//! variant-specific geometry.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use approx::assert_relative_eq;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use rigid_core::{
    AMotorMode, AxisFrame, ContactGeom, ContactJoint, FrictionModel, JointId, JointType, Param,
    ParamKey, Real, StepMethod, SurfaceParams, World, WorldConfig,
};

const DT: Real = 0.01;
const METHODS: [StepMethod; 2] = [StepMethod::Direct, StepMethod::QuickStep];

/// Bob at (1, 0, 0) hinged about +y at the origin.
fn pendulum(world: &mut World) -> JointId {
    let bob = world.create_body_at(Point3::new(1.0, 0.0, 0.0));
    let j = world.create_joint(None, JointType::Hinge).unwrap();
    world.attach_joint(j, Some(bob), None).unwrap();
    world.set_hinge_anchor(j, Point3::origin()).unwrap();
    world.set_hinge_axis(j, Vector3::y()).unwrap();
    j
}

#[test]
fn test_hinge_swings_about_axis() {
    for method in METHODS {
        let mut world = World::new(WorldConfig::earth());
        let j = pendulum(&mut world);
        let bob = world.connected_body(j, 0).unwrap().unwrap();

        for _ in 0..30 {
            world.step_with(method, DT).unwrap();
        }

        let b = world.body(bob).unwrap();
        assert!(b.position().y.abs() < 1e-3, "{method:?}");
        assert_relative_eq!(b.position().coords.norm(), 1.0, epsilon = 1e-2);
        // Falling from +x toward -z turns about +y.
        assert!(world.hinge_angle(j).unwrap() > 0.1);
        assert!(world.hinge_angle_rate(j).unwrap() > 0.0);
        assert_relative_eq!(world.hinge_axis(j).unwrap(), Vector3::y(), epsilon = 1e-3);
    }
}

#[test]
fn test_hinge_stops_hold() {
    for method in METHODS {
        let mut world = World::new(WorldConfig::earth());
        let j = pendulum(&mut world);
        world.set_joint_param(j, Param::LoStop.into(), -0.3).unwrap();
        world.set_joint_param(j, Param::HiStop.into(), 0.3).unwrap();

        for _ in 0..150 {
            world.step_with(method, DT).unwrap();
            let angle = world.hinge_angle(j).unwrap();
            assert!(angle < 0.3 + 0.05, "{method:?}: angle {angle}");
        }
        assert_relative_eq!(world.hinge_angle(j).unwrap(), 0.3, epsilon = 0.05);
    }
}

#[test]
fn test_hinge_motor_reaches_velocity() {
    for method in METHODS {
        let mut world = World::default();
        let j = pendulum(&mut world);
        world.set_joint_param(j, Param::Vel.into(), 2.0).unwrap();
        world.set_joint_param(j, Param::FMax.into(), 100.0).unwrap();

        for _ in 0..20 {
            world.step_with(method, DT).unwrap();
        }
        assert_relative_eq!(world.hinge_angle_rate(j).unwrap(), 2.0, epsilon = 1e-2);
    }
}

#[test]
fn test_weak_motor_is_force_limited() {
    let mut world = World::default();
    let j = pendulum(&mut world);
    world.set_joint_param(j, Param::Vel.into(), 10.0).unwrap();
    world.set_joint_param(j, Param::FMax.into(), 0.1).unwrap();

    world.step(DT).unwrap();
    // Bob inertia about the hinge: 0.4 + 1 = 1.4.
    let rate = world.hinge_angle_rate(j).unwrap();
    assert_relative_eq!(rate, 0.1 * DT / 1.4, epsilon = 1e-4);
}

#[test]
fn test_slider_translates_along_axis_only() {
    for method in METHODS {
        let mut world = World::default();
        let body = world.create_body();
        let j = world.create_joint(None, JointType::Slider).unwrap();
        world.attach_joint(j, Some(body), None).unwrap();
        world.set_slider_axis(j, Vector3::x()).unwrap();

        for _ in 0..20 {
            world
                .body_mut(body)
                .unwrap()
                .add_force(Vector3::new(1.0, 1.0, 1.0));
            world
                .body_mut(body)
                .unwrap()
                .add_torque(Vector3::new(0.0, 0.0, 1.0));
            world.step_with(method, DT).unwrap();
        }

        let b = world.body(body).unwrap();
        assert!(b.position().x > 0.01);
        assert!(b.position().y.abs() < 1e-4, "{method:?}");
        assert!(b.position().z.abs() < 1e-4, "{method:?}");
        assert!(b.angular_vel().norm() < 1e-3, "{method:?}");
        assert_relative_eq!(world.slider_position(j).unwrap(), b.position().x, epsilon = 1e-6);
        assert!(world.slider_position_rate(j).unwrap() > 0.0);
    }
}

#[test]
fn test_slider_lower_stop_under_gravity() {
    let mut world = World::new(WorldConfig::earth());
    let body = world.create_body();
    let j = world.create_joint(None, JointType::Slider).unwrap();
    world.attach_joint(j, Some(body), None).unwrap();
    world.set_slider_axis(j, Vector3::z()).unwrap();
    world.set_joint_param(j, Param::LoStop.into(), -0.1).unwrap();

    for _ in 0..200 {
        world.step(DT).unwrap();
    }
    assert_relative_eq!(world.slider_position(j).unwrap(), -0.1, epsilon = 1e-2);
}

#[test]
fn test_slider_axis_delta_shifts_zero() {
    let mut world = World::default();
    let body = world.create_body();
    let j = world.create_joint(None, JointType::Slider).unwrap();
    world.attach_joint(j, Some(body), None).unwrap();
    world
        .set_slider_axis_delta(j, Vector3::x(), Vector3::new(0.25, 0.0, 0.0))
        .unwrap();

    assert_relative_eq!(world.slider_position(j).unwrap(), -0.25, epsilon = 1e-9);
}

#[test]
fn test_fixed_joint_moves_bodies_together() {
    for method in METHODS {
        let mut world = World::default();
        let a = world.create_body_at(Point3::new(0.0, 0.0, 0.0));
        let b = world.create_body_at(Point3::new(1.0, 0.0, 0.0));
        let j = world.create_joint(None, JointType::Fixed).unwrap();
        world.attach_joint(j, Some(a), Some(b)).unwrap();
        world.set_fixed(j).unwrap();

        for _ in 0..50 {
            world
                .body_mut(a)
                .unwrap()
                .add_force(Vector3::new(0.0, 2.0, 0.0));
            world.step_with(method, DT).unwrap();
        }

        let pa = world.body(a).unwrap().position();
        let pb = world.body(b).unwrap().position();
        assert!(pa.y > 0.1);
        assert_relative_eq!((pb - pa).norm(), 1.0, epsilon = 1e-2);
        let qa = world.body(a).unwrap().quaternion();
        let qb = world.body(b).unwrap().quaternion();
        assert!(qa.angle_to(&qb) < 1e-2, "{method:?}");
    }
}

#[test]
fn test_universal_blocks_twist() {
    let mut world = World::default();
    let a = world.create_body_at(Point3::new(0.0, 0.0, 0.0));
    let b = world.create_body_at(Point3::new(0.0, 0.0, 1.0));
    let j = world.create_joint(None, JointType::Universal).unwrap();
    world.attach_joint(j, Some(a), Some(b)).unwrap();
    world.set_universal_anchor(j, Point3::new(0.0, 0.0, 0.5)).unwrap();
    world.set_universal_axis1(j, Vector3::x()).unwrap();
    world.set_universal_axis2(j, Vector3::y()).unwrap();

    // Twist about z is the blocked direction; it must be shared.
    world
        .body_mut(b)
        .unwrap()
        .set_angular_vel(Vector3::new(0.0, 0.0, 1.0));
    world.step(DT).unwrap();

    let wa = world.body(a).unwrap().angular_vel();
    let wb = world.body(b).unwrap().angular_vel();
    assert_relative_eq!(wa.z, wb.z, epsilon = 1e-3);
    assert_relative_eq!(wa.z, 0.5, epsilon = 1e-2);
    assert!(world.universal_angle1(j).unwrap().abs() < 1e-3);
    assert!(world.universal_angle2(j).unwrap().abs() < 1e-3);
}

#[test]
fn test_universal_torques_reach_axes() {
    let mut world = World::default();
    let a = world.create_body();
    let j = world.create_joint(None, JointType::Universal).unwrap();
    world.attach_joint(j, Some(a), None).unwrap();
    world.set_universal_axis1(j, Vector3::x()).unwrap();
    world.set_universal_axis2(j, Vector3::y()).unwrap();

    world.add_universal_torques(j, 1.0, 2.0).unwrap();
    assert_relative_eq!(
        world.body(a).unwrap().torque(),
        Vector3::new(1.0, 2.0, 0.0),
        epsilon = 1e-12
    );
}

#[test]
fn test_hinge2_spin_motor() {
    let mut world = World::default();
    let chassis = world.create_body_at(Point3::new(0.0, 0.0, 0.0));
    let wheel = world.create_body_at(Point3::new(0.0, 1.0, 0.0));
    let j = world.create_joint(None, JointType::Hinge2).unwrap();
    world.attach_joint(j, Some(chassis), Some(wheel)).unwrap();
    world.set_hinge2_anchor(j, Point3::new(0.0, 1.0, 0.0)).unwrap();
    world.set_hinge2_axis1(j, Vector3::z()).unwrap();
    world.set_hinge2_axis2(j, Vector3::y()).unwrap();

    world
        .set_joint_param(j, ParamKey::new(Param::Vel, 1), 3.0)
        .unwrap();
    world
        .set_joint_param(j, ParamKey::new(Param::FMax, 1), 50.0)
        .unwrap();
    world.set_joint_param(j, Param::LoStop.into(), 0.0).unwrap();
    world.set_joint_param(j, Param::HiStop.into(), 0.0).unwrap();

    for _ in 0..20 {
        world.step(DT).unwrap();
    }

    assert_relative_eq!(world.hinge2_angle2_rate(j).unwrap(), 3.0, epsilon = 2e-2);
    // The steering axis is locked by the zero-width stops.
    assert!(world.hinge2_angle1(j).unwrap().abs() < 1e-2);
}

#[test]
fn test_hinge2_suspension_is_soft() {
    let stiff_drop = |erp: Real, cfm: Real| {
        let mut world = World::new(WorldConfig::earth());
        let chassis = world.create_body_at(Point3::new(0.0, 0.0, 0.0));
        let j = world.create_joint(None, JointType::Hinge2).unwrap();
        world.attach_joint(j, Some(chassis), None).unwrap();
        world.set_hinge2_anchor(j, Point3::origin()).unwrap();
        world.set_hinge2_axis1(j, Vector3::z()).unwrap();
        world.set_hinge2_axis2(j, Vector3::y()).unwrap();
        world
            .set_joint_param(j, Param::SuspensionErp.into(), erp)
            .unwrap();
        world
            .set_joint_param(j, Param::SuspensionCfm.into(), cfm)
            .unwrap();
        for _ in 0..20 {
            world.step(DT).unwrap();
        }
        world.body(chassis).unwrap().position().z
    };

    let rigid = stiff_drop(0.2, 1e-10);
    let soft = stiff_drop(0.2, 0.1);
    assert!(rigid.abs() < 1e-3);
    assert!(soft < rigid - 1e-3);
}

#[test]
fn test_amotor_user_mode_drives_rate() {
    for method in METHODS {
        let mut world = World::default();
        let body = world.create_body();
        let j = world.create_joint(None, JointType::AngularMotor).unwrap();
        world.attach_joint(j, Some(body), None).unwrap();
        world.set_amotor_mode(j, AMotorMode::User).unwrap();
        world.set_amotor_num_axes(j, 1).unwrap();
        world
            .set_amotor_axis(j, 0, AxisFrame::Global, Vector3::z())
            .unwrap();
        world.set_joint_param(j, Param::Vel.into(), 1.5).unwrap();
        world.set_joint_param(j, Param::FMax.into(), 100.0).unwrap();

        world.step_with(method, DT).unwrap();

        assert_relative_eq!(world.amotor_angle_rate(j, 0).unwrap(), 1.5, epsilon = 1e-2);
        assert_relative_eq!(
            world.body(body).unwrap().angular_vel().z,
            1.5,
            epsilon = 1e-2
        );
        world.set_amotor_angle(j, 0, 0.25).unwrap();
        assert_eq!(world.amotor_angle(j, 0).unwrap(), 0.25);
    }
}

#[test]
fn test_amotor_euler_mode_reads_angles() {
    let mut world = World::default();
    let body = world.create_body();
    let j = world.create_joint(None, JointType::AngularMotor).unwrap();
    world.attach_joint(j, Some(body), None).unwrap();
    world.set_amotor_mode(j, AMotorMode::Euler).unwrap();
    world.set_amotor_num_axes(j, 3).unwrap();
    world
        .set_amotor_axis(j, 0, AxisFrame::Body1, Vector3::z())
        .unwrap();
    world
        .set_amotor_axis(j, 2, AxisFrame::Body2, Vector3::x())
        .unwrap();

    world
        .body_mut(body)
        .unwrap()
        .set_quaternion(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3));

    let angles: Vec<Real> = (0..3).map(|i| world.amotor_angle(j, i).unwrap()).collect();
    assert_relative_eq!(angles[0].abs(), 0.3, epsilon = 1e-6);
    assert!(angles[1].abs() < 1e-6);
    assert!(angles[2].abs() < 1e-6);
    assert_relative_eq!(world.amotor_axis(j, 1).unwrap().norm(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_lmotor_drives_linear_velocity() {
    let mut world = World::new(WorldConfig::earth());
    let body = world.create_body();
    let j = world.create_joint(None, JointType::LinearMotor).unwrap();
    world.attach_joint(j, Some(body), None).unwrap();
    world.set_lmotor_num_axes(j, 2).unwrap();
    world
        .set_lmotor_axis(j, 0, AxisFrame::Global, Vector3::x())
        .unwrap();
    world
        .set_lmotor_axis(j, 1, AxisFrame::Global, Vector3::z())
        .unwrap();
    world.set_joint_param(j, Param::Vel.into(), 0.5).unwrap();
    world.set_joint_param(j, Param::FMax.into(), 100.0).unwrap();
    world
        .set_joint_param(j, ParamKey::new(Param::FMax, 1), 100.0)
        .unwrap();

    for _ in 0..5 {
        world.step(DT).unwrap();
    }

    let v = world.body(body).unwrap().linear_vel();
    assert_relative_eq!(v.x, 0.5, epsilon = 1e-2);
    // Axis 1 holds zero velocity against gravity.
    assert!(v.z.abs() < 1e-2);
}

/// Sphere of radius 0.5 resting on the ground plane, one contact per step.
fn slide(mu: Real, model: FrictionModel, method: StepMethod) -> (World, rigid_core::BodyId) {
    let mut world = World::new(WorldConfig::earth());
    let body = world.create_body_at(Point3::new(0.0, 0.0, 0.5));
    world
        .body_mut(body)
        .unwrap()
        .set_linear_vel(Vector3::new(1.0, 0.0, 0.0));
    let contacts = world.create_joint_group();

    for _ in 0..20 {
        let p = world.body(body).unwrap().position();
        let depth = 0.5 - p.z;
        if depth >= 0.0 {
            let contact = ContactJoint::new(
                ContactGeom::new(Point3::new(p.x, p.y, 0.0), Vector3::z(), depth),
                SurfaceParams::with_friction(mu).with_friction_model(model),
            );
            let j = world.create_contact(Some(contacts), contact).unwrap();
            world.attach_joint(j, Some(body), None).unwrap();
        }
        world.step_with(method, DT).unwrap();
        world.empty_joint_group(contacts).unwrap();
    }
    (world, body)
}

#[test]
fn test_contact_supports_resting_body() {
    for method in METHODS {
        let (world, body) = slide(0.0, FrictionModel::Pyramid, method);
        let b = world.body(body).unwrap();
        assert!(b.position().z > 0.45, "{method:?}: sank to {}", b.position().z);
        assert!(b.linear_vel().z.abs() < 0.1);
        // Frictionless: horizontal motion is untouched.
        assert_relative_eq!(b.linear_vel().x, 1.0, epsilon = 1e-6);
    }
}

#[test]
fn test_contact_friction_slows_sliding() {
    for method in METHODS {
        for model in [FrictionModel::Pyramid, FrictionModel::Box] {
            let (world, body) = slide(0.5, model, method);
            let b = world.body(body).unwrap();
            assert!(b.linear_vel().x < 0.95, "{method:?} {model:?}");
            assert!(b.linear_vel().x > 0.0);
            // Friction at the bottom spins the sphere forward (about +y).
            assert!(b.angular_vel().y > 0.0);
        }
    }
}

#[test]
fn test_reversed_contact_pushes_body_up() {
    let mut world = World::new(WorldConfig::earth());
    let body = world.create_body_at(Point3::new(0.0, 0.0, 0.45));
    // Normal points into body 1, here the environment: -z.
    let contact = ContactJoint::new(
        ContactGeom::new(Point3::origin(), -Vector3::z(), 0.05),
        SurfaceParams::default(),
    );
    let j = world.create_contact(None, contact).unwrap();
    world.attach_joint(j, None, Some(body)).unwrap();

    world.step(DT).unwrap();
    assert!(world.body(body).unwrap().linear_vel().z > 0.0);
}
