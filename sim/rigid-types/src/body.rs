//! Rigid body state types.
//!
//! This module provides types for representing rigid body state in 6 degrees
//! of freedom: position, orientation, linear velocity, and angular velocity.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

use crate::Real;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position and orientation of a rigid body.
///
/// The position is the center of mass in world coordinates.
///
/// # Example
///
/// ```
/// use rigid_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
///
/// let local = Point3::new(1.0, 0.0, 0.0);
/// let world = pose.transform_point(&local);
/// assert_eq!(world, Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Center of mass in world coordinates.
    pub position: Point3<Real>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<Real>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create a new pose from position and rotation.
    #[must_use]
    pub fn new(position: Point3<Real>, rotation: UnitQuaternion<Real>) -> Self {
        Self { position, rotation }
    }

    /// Pose at the origin with no rotation.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Pose at a position with no rotation.
    #[must_use]
    pub fn from_position(position: Point3<Real>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Rotation matrix mirroring the quaternion.
    #[must_use]
    pub fn rotation_matrix(&self) -> Matrix3<Real> {
        *self.rotation.to_rotation_matrix().matrix()
    }

    /// Transform a point from body to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<Real>) -> Point3<Real> {
        self.position + self.rotation * local.coords
    }

    /// Rotate a vector from body to world coordinates.
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<Real>) -> Vector3<Real> {
        self.rotation * local
    }

    /// Transform a point from world to body coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<Real>) -> Point3<Real> {
        Point3::from(self.rotation.inverse_transform_vector(&(world - self.position)))
    }

    /// Rotate a vector from world to body coordinates.
    #[must_use]
    pub fn inverse_transform_vector(&self, world: &Vector3<Real>) -> Vector3<Real> {
        self.rotation.inverse_transform_vector(world)
    }

    /// Check that position and rotation are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Linear and angular velocity of a rigid body, both in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Velocity of the center of mass.
    pub linear: Vector3<Real>,
    /// Angular velocity.
    pub angular: Vector3<Real>,
}

impl Twist {
    /// Create a twist from linear and angular parts.
    #[must_use]
    pub fn new(linear: Vector3<Real>, angular: Vector3<Real>) -> Self {
        Self { linear, angular }
    }

    /// Zero velocity.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Pure translation.
    #[must_use]
    pub fn linear(v: Vector3<Real>) -> Self {
        Self {
            linear: v,
            angular: Vector3::zeros(),
        }
    }

    /// Pure rotation.
    #[must_use]
    pub fn angular(omega: Vector3<Real>) -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: omega,
        }
    }

    /// Velocity of a point at `offset` from the center of mass (world frame).
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<Real>) -> Vector3<Real> {
        self.linear + self.angular.cross(offset)
    }

    /// Linear speed.
    #[must_use]
    pub fn speed(&self) -> Real {
        self.linear.norm()
    }

    /// Angular speed.
    #[must_use]
    pub fn angular_speed(&self) -> Real {
        self.angular.norm()
    }

    /// Check that both parts are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().chain(self.angular.iter()).all(|x| x.is_finite())
    }
}

/// Complete kinematic state of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodyState {
    /// Position and orientation.
    pub pose: Pose,
    /// Linear and angular velocity.
    pub twist: Twist,
}

impl RigidBodyState {
    /// Create a state from pose and twist.
    #[must_use]
    pub fn new(pose: Pose, twist: Twist) -> Self {
        Self { pose, twist }
    }

    /// State at rest at the given pose.
    #[must_use]
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            pose,
            twist: Twist::zero(),
        }
    }

    /// Check that pose and twist are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.pose.is_finite() && self.twist.is_finite()
    }
}

/// Mass and inertia of a rigid body.
///
/// The inertia tensor is expressed in the body frame about the center of
/// mass, which is also the body origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass.
    pub mass: Real,
    /// Inertia tensor about the center of mass in body coordinates.
    pub inertia: Matrix3<Real>,
}

impl Default for MassProperties {
    /// Unit-density unit sphere, the mass a freshly created body starts with.
    fn default() -> Self {
        Self::sphere(1.0, 1.0)
    }
}

impl MassProperties {
    /// Create mass properties with given values.
    #[must_use]
    pub const fn new(mass: Real, inertia: Matrix3<Real>) -> Self {
        Self { mass, inertia }
    }

    /// Uniform solid sphere: I = (2/5) m r².
    #[must_use]
    pub fn sphere(mass: Real, radius: Real) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            inertia: Matrix3::from_diagonal_element(i),
        }
    }

    /// Uniform solid box given its half extents.
    #[must_use]
    pub fn box_shape(mass: Real, half_extents: Vector3<Real>) -> Self {
        let x2 = 4.0 * half_extents.x * half_extents.x;
        let y2 = 4.0 * half_extents.y * half_extents.y;
        let z2 = 4.0 * half_extents.z * half_extents.z;

        Self {
            mass,
            inertia: Matrix3::from_diagonal(&Vector3::new(
                mass * (y2 + z2) / 12.0,
                mass * (x2 + z2) / 12.0,
                mass * (x2 + y2) / 12.0,
            )),
        }
    }

    /// Uniform solid cylinder aligned with the Z axis.
    #[must_use]
    pub fn cylinder(mass: Real, radius: Real, half_height: Real) -> Self {
        let r2 = radius * radius;
        let h2 = 4.0 * half_height * half_height;
        let ixx = mass * (3.0 * r2 + h2) / 12.0;

        Self {
            mass,
            inertia: Matrix3::from_diagonal(&Vector3::new(ixx, ixx, 0.5 * mass * r2)),
        }
    }

    /// Rescale to a new total mass, keeping the mass distribution.
    #[must_use]
    pub fn with_total_mass(&self, mass: Real) -> Self {
        let scale = mass / self.mass;
        Self {
            mass,
            inertia: self.inertia * scale,
        }
    }

    /// Inverse mass.
    #[must_use]
    pub fn inverse_mass(&self) -> Real {
        1.0 / self.mass
    }

    /// Inverse of the body-frame inertia tensor, `None` if singular.
    #[must_use]
    pub fn inverse_inertia(&self) -> Option<Matrix3<Real>> {
        self.inertia.try_inverse()
    }

    /// Inertia tensor rotated into world coordinates: R I Rᵀ.
    #[must_use]
    pub fn world_inertia(&self, rotation: &Matrix3<Real>) -> Matrix3<Real> {
        rotation * self.inertia * rotation.transpose()
    }

    /// Validate that the mass properties describe a dynamic body.
    ///
    /// Every body in the world is dynamic; the static environment is modeled
    /// by leaving a joint endpoint empty, so mass must be positive and finite
    /// and the inertia tensor symmetric positive definite.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(crate::SimError::invalid_mass(
                "mass must be positive and finite",
            ));
        }

        if !self.inertia.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass("inertia must be finite"));
        }

        let asymmetry = (self.inertia - self.inertia.transpose()).amax();
        if asymmetry > 1e-6 * (1.0 + self.inertia.amax()) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be symmetric",
            ));
        }

        let eigenvalues = self.inertia.symmetric_eigenvalues();
        if eigenvalues.iter().any(|&e| e <= 0.0) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be positive definite",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pose_round_trip_point() {
        let pose = Pose::new(
            Point3::new(1.0, -2.0, 0.5),
            UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1),
        );
        let local = Point3::new(0.2, 0.4, -0.7);
        let back = pose.inverse_transform_point(&pose.transform_point(&local));

        assert_relative_eq!(back, local, epsilon = 1e-10);
    }

    #[test]
    fn test_rotation_matrix_mirrors_quaternion() {
        let pose = Pose::new(
            Point3::origin(),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2 as Real),
        );
        let x = pose.rotation_matrix() * Vector3::x();

        assert_relative_eq!(x, Vector3::y(), epsilon = 1e-6);
    }

    #[test]
    fn test_velocity_at_point() {
        let twist = Twist::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 2.0));
        let v = twist.velocity_at_point(&Vector3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(v, Vector3::new(1.0, 2.0, 0.0), epsilon = 1e-10);
    }

    #[test]
    fn test_sphere_inertia() {
        let props = MassProperties::sphere(2.0, 0.5);
        assert_relative_eq!(props.inertia[(0, 0)], 0.2, epsilon = 1e-10);
        assert!(props.validate().is_ok());
    }

    #[test]
    fn test_box_inertia() {
        let props = MassProperties::box_shape(12.0, Vector3::new(0.5, 1.0, 1.5));
        assert_relative_eq!(props.inertia[(0, 0)], 13.0, epsilon = 1e-10);
        assert_relative_eq!(props.inertia[(1, 1)], 10.0, epsilon = 1e-10);
        assert_relative_eq!(props.inertia[(2, 2)], 5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_with_total_mass_scales_inertia() {
        let props = MassProperties::sphere(1.0, 1.0).with_total_mass(5.0);
        assert_relative_eq!(props.mass, 5.0);
        assert_relative_eq!(props.inertia[(2, 2)], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_validate_rejects_bad_mass() {
        assert!(MassProperties::sphere(0.0, 1.0).validate().is_err());
        assert!(MassProperties::sphere(-1.0, 1.0).validate().is_err());
        assert!(MassProperties::new(1.0, Matrix3::zeros()).validate().is_err());
        assert!(MassProperties::new(Real::INFINITY, Matrix3::identity())
            .validate()
            .is_err());
    }

    #[test]
    fn test_world_inertia() {
        let props = MassProperties::box_shape(12.0, Vector3::new(0.5, 1.0, 1.5));
        let rot = *UnitQuaternion::from_axis_angle(
            &Vector3::z_axis(),
            std::f64::consts::FRAC_PI_2 as Real,
        )
        .to_rotation_matrix()
        .matrix();
        let world = props.world_inertia(&rot);

        assert_relative_eq!(world[(0, 0)], 10.0, epsilon = 1e-4);
        assert_relative_eq!(world[(1, 1)], 13.0, epsilon = 1e-4);
    }
}
