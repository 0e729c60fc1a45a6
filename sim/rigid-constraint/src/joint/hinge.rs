//! Hinge joint: a shared anchor plus a common rotation axis.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rigid_types::Real;
use tracing::warn;

use crate::geometry::{
    anchor_rows, frame_or_static, plane_space, relative_twist_angle, unit_axis, WORLD_AXES,
};
use crate::limits::{AxisKind, LimitMotor};
use crate::row::{ConstraintRow, JointOutput, RowContext};
use crate::types::{BodyState, Load};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Hinge (revolute) joint.
///
/// Five rows: three for the anchor, two keeping the axes parallel. A sixth
/// row is added while the stops are hit or the motor is on.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HingeJoint {
    anchor1: Vector3<Real>,
    anchor2: Vector3<Real>,
    /// Axis in body 1 coordinates.
    axis1: Vector3<Real>,
    /// Axis in body 2 (or world) coordinates.
    axis2: Vector3<Real>,
    /// `q1⁻¹ q2` when the axis was set; zero angle.
    q_initial: UnitQuaternion<Real>,
    /// Stops and motor about the axis.
    pub limot: LimitMotor,
}

impl HingeJoint {
    /// Hinge about x at the origin, softness taken from the world.
    #[must_use]
    pub fn new(erp: Real, cfm: Real) -> Self {
        Self {
            anchor1: Vector3::zeros(),
            anchor2: Vector3::zeros(),
            axis1: Vector3::x(),
            axis2: Vector3::x(),
            q_initial: UnitQuaternion::identity(),
            limot: LimitMotor::new(erp, cfm),
        }
    }

    /// Set the anchor from a world point.
    pub fn set_anchor(&mut self, b1: &BodyState, b2: Option<&BodyState>, anchor: &Point3<Real>) {
        self.set_anchor_delta(b1, b2, anchor, &Vector3::zeros());
    }

    /// Set the anchor, recording it in body 1 shifted by `delta`.
    ///
    /// The joint then starts with a positional error of `delta` that the
    /// stabilization pulls out over the following steps.
    pub fn set_anchor_delta(
        &mut self,
        b1: &BodyState,
        b2: Option<&BodyState>,
        anchor: &Point3<Real>,
        delta: &Vector3<Real>,
    ) {
        self.anchor1 = b1.point_to_local(&(anchor + delta));
        self.anchor2 = frame_or_static(b2).point_to_local(anchor);
    }

    /// Set the axis from a world direction. The current relative
    /// orientation becomes angle zero.
    pub fn set_axis(
        &mut self,
        b1: &BodyState,
        b2: Option<&BodyState>,
        axis: &Vector3<Real>,
    ) -> rigid_types::Result<()> {
        let axis = unit_axis(axis)?;
        let frame2 = frame_or_static(b2);
        self.axis1 = b1.to_local(&axis);
        self.axis2 = frame2.to_local(&axis);
        self.q_initial = b1.orientation.inverse() * frame2.orientation;
        Ok(())
    }

    /// Anchor on body 1 in world coordinates.
    #[must_use]
    pub fn anchor(&self, b1: &BodyState) -> Point3<Real> {
        b1.point_to_world(&self.anchor1)
    }

    /// Anchor on body 2 in world coordinates.
    #[must_use]
    pub fn anchor2(&self, b2: Option<&BodyState>) -> Point3<Real> {
        frame_or_static(b2).point_to_world(&self.anchor2)
    }

    /// Axis in world coordinates, as carried by body 1.
    #[must_use]
    pub fn axis(&self, b1: &BodyState) -> Vector3<Real> {
        b1.to_world(&self.axis1)
    }

    /// Rotation of body 1 relative to body 2 about the axis.
    #[must_use]
    pub fn angle(&self, b1: &BodyState, b2: Option<&BodyState>) -> Real {
        relative_twist_angle(b1, &frame_or_static(b2), &self.axis1, &self.q_initial)
    }

    /// Time derivative of [`angle`](Self::angle).
    #[must_use]
    pub fn angle_rate(&self, b1: &BodyState, b2: Option<&BodyState>) -> Real {
        let axis = self.axis(b1);
        axis.dot(&(b1.angular_velocity - frame_or_static(b2).angular_velocity))
    }

    /// Equal and opposite torques about the axis.
    #[must_use]
    pub fn torque_loads(&self, b1: &BodyState, torque: Real) -> (Load, Load) {
        let t = self.axis(b1) * torque;
        (
            Load { force: Vector3::zeros(), torque: t },
            Load { force: Vector3::zeros(), torque: -t },
        )
    }

    pub(crate) fn build_rows(
        &self,
        ctx: &RowContext,
        b1: &BodyState,
        b2: Option<&BodyState>,
        out: &mut JointOutput,
    ) {
        let frame2 = frame_or_static(b2);
        anchor_rows(
            ctx,
            b1,
            &frame2,
            &self.anchor1,
            &self.anchor2,
            &WORLD_AXES,
            [ctx.erp; 3],
            out,
        );

        let ax1 = b1.to_world(&self.axis1);
        let ax2 = frame2.to_world(&self.axis2);
        let (p, q) = plane_space(&ax1);
        let misalignment = ax1.cross(&ax2);
        for dir in [p, q] {
            let mut row = ConstraintRow::new(ctx.cfm);
            row.j1_angular = dir;
            row.j2_angular = -dir;
            row.rhs = ctx.correction(ctx.erp, misalignment.dot(&dir));
            out.rows.push(row);
        }

        let state = self.limot.limit_state(self.angle(b1, b2));
        self.limot
            .add_row(ctx, state, &ax1, AxisKind::Angular, b1, b2, out);
    }

    pub(crate) fn rebind(
        &mut self,
        old: (&BodyState, Option<&BodyState>),
        new: (&BodyState, Option<&BodyState>),
    ) {
        let anchor = self.anchor(old.0);
        let axis = self.axis(old.0);
        self.set_anchor(new.0, new.1, &anchor);
        if let Err(err) = self.set_axis(new.0, new.1, &axis) {
            warn!(error = %err, "hinge axis not rebound, keeping previous frame");
        }
    }
}
