//! Position and orientation integration.
//!
//! Stepping is semi-implicit: the solver produces the new velocities from
//! the old ones, the external forces and the constraint forces, and the
//! pose is then advanced with those new velocities:
//!
//! ```text
//! v(t+h) = v(t) + h M⁻¹ (f_ext + Jᵀ λ)
//! x(t+h) = x(t) + h v(t+h)
//! q(t+h) = normalize(q(t) + h/2 (0, ω) ⊗ q(t))
//! ```
//!
//! Angular velocities are in world coordinates, so rotation increments are
//! applied on the left of the orientation.
//!
//! # Example
//!
//! ```
//! use rigid_core::integrators::{integrate_pose, RotationUpdate};
//! use rigid_types::{Pose, Twist};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut pose = Pose::from_position(Point3::new(0.0, 0.0, 10.0));
//! let twist = Twist::new(Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.0, 0.0, 0.5));
//!
//! integrate_pose(&mut pose, &twist, RotationUpdate::Infinitesimal, 0.01);
//!
//! assert!(pose.position.z < 10.0);
//! assert!((pose.rotation.norm() - 1.0).abs() < 1e-6);
//! ```

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use rigid_types::{Pose, Real, Twist};

/// How orientation is advanced over one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotationUpdate {
    /// First-order quaternion update.
    Infinitesimal,
    /// Exact rotation about a unit axis for the component of ω along it,
    /// first-order update for the rest. A zero axis rotates exactly about ω.
    Finite {
        /// Unit axis in world coordinates, or zero.
        axis: Vector3<Real>,
    },
}

/// Advance `pose` by `dt` with the (already updated) velocity `twist`.
pub fn integrate_pose(pose: &mut Pose, twist: &Twist, update: RotationUpdate, dt: Real) {
    pose.position += twist.linear * dt;
    pose.rotation = match update {
        RotationUpdate::Infinitesimal => infinitesimal_rotation(&pose.rotation, &twist.angular, dt),
        RotationUpdate::Finite { axis } => {
            finite_rotation(&pose.rotation, &twist.angular, &axis, dt)
        }
    };
}

/// First-order quaternion update, renormalized.
///
/// ```text
/// q' = normalize(q + h/2 (0, ω) ⊗ q)
/// ```
#[must_use]
pub fn infinitesimal_rotation(
    rotation: &UnitQuaternion<Real>,
    omega: &Vector3<Real>,
    dt: Real,
) -> UnitQuaternion<Real> {
    let q = rotation.quaternion();
    let dq = Quaternion::from_imag(*omega) * q * (0.5 * dt);
    UnitQuaternion::new_normalize(q + dq)
}

/// Split ω into a part along `axis`, integrated as an exact rotation, and a
/// residual integrated to first order. The result is an approximation: the
/// two parts do not commute, and the residual update is followed by
/// renormalization.
#[must_use]
pub fn finite_rotation(
    rotation: &UnitQuaternion<Real>,
    omega: &Vector3<Real>,
    axis: &Vector3<Real>,
    dt: Real,
) -> UnitQuaternion<Real> {
    let (finite, residual) = if axis.norm_squared() > 0.0 {
        let along = axis * omega.dot(axis);
        (along, omega - along)
    } else {
        (*omega, Vector3::zeros())
    };

    let turned = UnitQuaternion::from_scaled_axis(finite * dt) * rotation;
    if residual.norm_squared() > 0.0 {
        infinitesimal_rotation(&turned, &residual, dt)
    } else {
        turned
    }
}
