//! Body and force types shared by the joint models and the solvers.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use rigid_types::{Pose, Real, Twist};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Snapshot of one body as seen by joint geometry and the row builder.
///
/// A joint endpoint left empty is represented by [`BodyState::fixed`], the
/// static environment frame at the world origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    /// Center of mass in world coordinates.
    pub position: Point3<Real>,
    /// Orientation.
    pub orientation: UnitQuaternion<Real>,
    /// Rotation matrix mirroring `orientation`.
    pub rotation: Matrix3<Real>,
    /// Linear velocity.
    pub linear_velocity: Vector3<Real>,
    /// Angular velocity.
    pub angular_velocity: Vector3<Real>,
    /// Inverse mass (0 for the environment).
    pub inv_mass: Real,
    /// Inverse inertia tensor in world coordinates.
    pub inv_inertia: Matrix3<Real>,
}

impl BodyState {
    /// The static environment frame.
    #[must_use]
    pub fn fixed() -> Self {
        Self {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
            rotation: Matrix3::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            inv_mass: 0.0,
            inv_inertia: Matrix3::zeros(),
        }
    }

    /// Build a snapshot from pose, velocity and body-frame inverse inertia.
    #[must_use]
    pub fn new(pose: &Pose, twist: &Twist, inv_mass: Real, inv_inertia_body: &Matrix3<Real>) -> Self {
        let rotation = pose.rotation_matrix();
        Self {
            position: pose.position,
            orientation: pose.rotation,
            rotation,
            linear_velocity: twist.linear,
            angular_velocity: twist.angular,
            inv_mass,
            inv_inertia: rotation * inv_inertia_body * rotation.transpose(),
        }
    }

    /// Pose-only snapshot, for joint geometry that ignores mass.
    #[must_use]
    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            position: pose.position,
            orientation: pose.rotation,
            rotation: pose.rotation_matrix(),
            ..Self::fixed()
        }
    }

    /// Body-frame vector to world.
    #[must_use]
    pub fn to_world(&self, local: &Vector3<Real>) -> Vector3<Real> {
        self.rotation * local
    }

    /// World vector to body frame.
    #[must_use]
    pub fn to_local(&self, world: &Vector3<Real>) -> Vector3<Real> {
        self.rotation.transpose() * world
    }

    /// Body-frame point to world.
    #[must_use]
    pub fn point_to_world(&self, local: &Vector3<Real>) -> Point3<Real> {
        self.position + self.rotation * local
    }

    /// World point to body frame.
    #[must_use]
    pub fn point_to_local(&self, world: &Point3<Real>) -> Vector3<Real> {
        self.rotation.transpose() * (world - self.position)
    }
}

/// Force and torque one joint applied to its two bodies in the last step.
///
/// Forces are in world coordinates; torques are about each body's center of
/// mass. `force2`/`torque2` stay zero when the joint has no second body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointFeedback {
    /// Force on body 1.
    pub force1: Vector3<Real>,
    /// Torque on body 1.
    pub torque1: Vector3<Real>,
    /// Force on body 2.
    pub force2: Vector3<Real>,
    /// Torque on body 2.
    pub torque2: Vector3<Real>,
}

/// Force and torque applied to a body's center of mass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Load {
    /// Force.
    pub force: Vector3<Real>,
    /// Torque.
    pub torque: Vector3<Real>,
}

impl Load {
    /// Accumulate another load.
    pub fn add(&mut self, other: &Self) {
        self.force += other.force;
        self.torque += other.torque;
    }
}
