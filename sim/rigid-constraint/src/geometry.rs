//! Shared row-building geometry.

use nalgebra::{UnitQuaternion, Vector3};
use rigid_types::{Real, SimError};

use crate::row::{ConstraintRow, JointOutput, RowContext};
use crate::types::BodyState;

/// Two unit vectors completing `n` to a right-handed orthonormal basis.
///
/// Returns `(p, q)` with `q = n × p`. The choice is deterministic in `n`.
#[must_use]
pub fn plane_space(n: &Vector3<Real>) -> (Vector3<Real>, Vector3<Real>) {
    if n.z.abs() > std::f64::consts::FRAC_1_SQRT_2 as Real {
        let a = n.y * n.y + n.z * n.z;
        let k = 1.0 / a.sqrt();
        let p = Vector3::new(0.0, -n.z * k, n.y * k);
        let q = Vector3::new(a * k, -n.x * p.z, n.x * p.y);
        (p, q)
    } else {
        let a = n.x * n.x + n.y * n.y;
        let k = 1.0 / a.sqrt();
        let p = Vector3::new(-n.y * k, n.x * k, 0.0);
        let q = Vector3::new(-n.z * p.y, n.z * p.x, a * k);
        (p, q)
    }
}

/// World coordinate axes, the row directions of a plain point constraint.
pub(crate) const WORLD_AXES: [Vector3<Real>; 3] = [
    Vector3::new(1.0, 0.0, 0.0),
    Vector3::new(0.0, 1.0, 0.0),
    Vector3::new(0.0, 0.0, 1.0),
];

/// Map an angle into `(-π, π]`.
#[must_use]
pub fn wrap_angle(angle: Real) -> Real {
    let pi = std::f64::consts::PI as Real;
    let mut a = angle % (2.0 * pi);
    if a > pi {
        a -= 2.0 * pi;
    } else if a <= -pi {
        a += 2.0 * pi;
    }
    a
}

/// Rows keeping a point fixed in body 1 coincident with a point fixed in
/// body 2 (or in the world), measured along three orthonormal directions.
///
/// `erps` sets the error reduction per direction; each row uses the world
/// CFM.
#[allow(clippy::too_many_arguments)]
pub(crate) fn anchor_rows(
    ctx: &RowContext,
    b1: &BodyState,
    frame2: &BodyState,
    anchor1: &Vector3<Real>,
    anchor2: &Vector3<Real>,
    axes: &[Vector3<Real>; 3],
    erps: [Real; 3],
    out: &mut JointOutput,
) {
    let a1 = b1.to_world(anchor1);
    let a2 = frame2.to_world(anchor2);
    let error = (frame2.position.coords + a2) - (b1.position.coords + a1);

    for (axis, erp) in axes.iter().zip(erps) {
        let mut row = ConstraintRow::new(ctx.cfm);
        row.j1_linear = *axis;
        row.j1_angular = a1.cross(axis);
        row.j2_linear = -axis;
        row.j2_angular = -a2.cross(axis);
        row.rhs = ctx.correction(erp, error.dot(axis));
        out.rows.push(row);
    }
}

/// Three rows locking the relative orientation of two frames to `q_initial`,
/// the value of `q1⁻¹ q2` when the lock was set up.
pub(crate) fn orientation_rows(
    ctx: &RowContext,
    b1: &BodyState,
    frame2: &BodyState,
    q_initial: &UnitQuaternion<Real>,
    out: &mut JointOutput,
) {
    // Rotation body 2 has made relative to body 1 since setup, small-angle
    // approximated as twice the quaternion's vector part.
    let q_err = b1.orientation.inverse() * frame2.orientation * q_initial.inverse();
    let q = q_err.quaternion();
    let mut v = q.imag();
    if q.w < 0.0 {
        v = -v;
    }
    let e = b1.to_world(&v);

    for axis in &WORLD_AXES {
        let mut row = ConstraintRow::new(ctx.cfm);
        row.j1_angular = *axis;
        row.j2_angular = -axis;
        row.rhs = ctx.correction(ctx.erp, 2.0 * e.dot(axis));
        out.rows.push(row);
    }
}

/// Rotation of body 1 relative to body 2 about `axis` (body-1 frame),
/// measured from the relative orientation `q_initial` recorded at setup.
#[must_use]
pub(crate) fn relative_twist_angle(
    b1: &BodyState,
    frame2: &BodyState,
    axis: &Vector3<Real>,
    q_initial: &UnitQuaternion<Real>,
) -> Real {
    let q_rel = b1.orientation.inverse() * frame2.orientation * q_initial.inverse();
    let q = q_rel.quaternion();
    let theta = 2.0 * q.imag().dot(axis).atan2(q.w);
    -wrap_angle(theta)
}

/// Signed angle from `from` to `to` about `axis`.
#[must_use]
pub(crate) fn signed_angle(from: &Vector3<Real>, to: &Vector3<Real>, axis: &Vector3<Real>) -> Real {
    axis.dot(&from.cross(to)).atan2(from.dot(to))
}

/// Unit vector, or `None` for a (near) zero input.
#[must_use]
pub(crate) fn try_unit(v: &Vector3<Real>) -> Option<Vector3<Real>> {
    let n = v.norm();
    if n > Real::EPSILON && n.is_finite() {
        Some(v / n)
    } else {
        None
    }
}

/// Unit axis, rejecting zero and non-finite input.
pub(crate) fn unit_axis(v: &Vector3<Real>) -> rigid_types::Result<Vector3<Real>> {
    try_unit(v).ok_or(SimError::DegenerateAxis([v.x, v.y, v.z]))
}

/// Second joint frame: the attached body, or the static environment.
#[must_use]
pub(crate) fn frame_or_static(b2: Option<&BodyState>) -> BodyState {
    b2.copied().unwrap_or_else(BodyState::fixed)
}
