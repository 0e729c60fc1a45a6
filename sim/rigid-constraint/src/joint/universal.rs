//! Universal (Cardan) joint.

use nalgebra::{Point3, Vector3};
use rigid_types::Real;
use tracing::warn;

use crate::geometry::{
    anchor_rows, frame_or_static, plane_space, signed_angle, try_unit, unit_axis, WORLD_AXES,
};
use crate::limits::{AxisKind, LimitMotor};
use crate::row::{ConstraintRow, JointOutput, RowContext};
use crate::types::{BodyState, Load};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Universal joint: a shared anchor, axis 1 fixed in body 1, axis 2 fixed in
/// body 2, the two axes kept perpendicular.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UniversalJoint {
    anchor1: Vector3<Real>,
    anchor2: Vector3<Real>,
    axis1: Vector3<Real>,
    axis2: Vector3<Real>,
    /// Axis 2 seen from body 1 at angle zero.
    ref1: Vector3<Real>,
    /// Axis 1 seen from body 2 at angle zero.
    ref2: Vector3<Real>,
    /// Stops and motor about axis 1.
    pub limot1: LimitMotor,
    /// Stops and motor about axis 2.
    pub limot2: LimitMotor,
}

impl UniversalJoint {
    /// Axes x (body 1) and y (body 2) at the origin.
    #[must_use]
    pub fn new(erp: Real, cfm: Real) -> Self {
        Self {
            anchor1: Vector3::zeros(),
            anchor2: Vector3::zeros(),
            axis1: Vector3::x(),
            axis2: Vector3::y(),
            ref1: Vector3::y(),
            ref2: Vector3::x(),
            limot1: LimitMotor::new(erp, cfm),
            limot2: LimitMotor::new(erp, cfm),
        }
    }

    /// Set the anchor from a world point.
    pub fn set_anchor(&mut self, b1: &BodyState, b2: Option<&BodyState>, anchor: &Point3<Real>) {
        self.anchor1 = b1.point_to_local(anchor);
        self.anchor2 = frame_or_static(b2).point_to_local(anchor);
    }

    /// Set axis 1 (carried by body 1) from a world direction.
    pub fn set_axis1(
        &mut self,
        b1: &BodyState,
        b2: Option<&BodyState>,
        axis: &Vector3<Real>,
    ) -> rigid_types::Result<()> {
        self.axis1 = b1.to_local(&unit_axis(axis)?);
        self.update_reference(b1, b2);
        Ok(())
    }

    /// Set axis 2 (carried by body 2) from a world direction.
    pub fn set_axis2(
        &mut self,
        b1: &BodyState,
        b2: Option<&BodyState>,
        axis: &Vector3<Real>,
    ) -> rigid_types::Result<()> {
        self.axis2 = frame_or_static(b2).to_local(&unit_axis(axis)?);
        self.update_reference(b1, b2);
        Ok(())
    }

    fn update_reference(&mut self, b1: &BodyState, b2: Option<&BodyState>) {
        let frame2 = frame_or_static(b2);
        self.ref1 = b1.to_local(&frame2.to_world(&self.axis2));
        self.ref2 = frame2.to_local(&b1.to_world(&self.axis1));
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

    /// Axis 1 in world coordinates.
    #[must_use]
    pub fn axis1(&self, b1: &BodyState) -> Vector3<Real> {
        b1.to_world(&self.axis1)
    }

    /// Axis 2 in world coordinates.
    #[must_use]
    pub fn axis2(&self, b2: Option<&BodyState>) -> Vector3<Real> {
        frame_or_static(b2).to_world(&self.axis2)
    }

    /// Rotation of body 1 about axis 1, relative to body 2.
    #[must_use]
    pub fn angle1(&self, b1: &BodyState, b2: Option<&BodyState>) -> Real {
        let current = b1.to_local(&self.axis2(b2));
        signed_angle(&current, &self.ref1, &self.axis1)
    }

    /// Rotation of body 1 about axis 2, relative to body 2.
    #[must_use]
    pub fn angle2(&self, b1: &BodyState, b2: Option<&BodyState>) -> Real {
        let current = frame_or_static(b2).to_local(&self.axis1(b1));
        signed_angle(&self.ref2, &current, &self.axis2)
    }

    /// Time derivative of [`angle1`](Self::angle1).
    #[must_use]
    pub fn angle1_rate(&self, b1: &BodyState, b2: Option<&BodyState>) -> Real {
        self.axis1(b1)
            .dot(&(b1.angular_velocity - frame_or_static(b2).angular_velocity))
    }

    /// Time derivative of [`angle2`](Self::angle2).
    #[must_use]
    pub fn angle2_rate(&self, b1: &BodyState, b2: Option<&BodyState>) -> Real {
        self.axis2(b2)
            .dot(&(b1.angular_velocity - frame_or_static(b2).angular_velocity))
    }

    /// Equal and opposite torques about both axes.
    #[must_use]
    pub fn torque_loads(
        &self,
        b1: &BodyState,
        b2: Option<&BodyState>,
        torque1: Real,
        torque2: Real,
    ) -> (Load, Load) {
        let t = self.axis1(b1) * torque1 + self.axis2(b2) * torque2;
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

        let ax1 = self.axis1(b1);
        let ax2 = frame2.to_world(&self.axis2);
        let k = ax1.dot(&ax2);
        let dir = try_unit(&ax1.cross(&(ax2 - ax1 * k))).unwrap_or_else(|| plane_space(&ax1).0);
        let mut row = ConstraintRow::new(ctx.cfm);
        row.j1_angular = dir;
        row.j2_angular = -dir;
        row.rhs = ctx.correction(ctx.erp, -k);
        out.rows.push(row);

        let state1 = self.limot1.limit_state(self.angle1(b1, b2));
        self.limot1
            .add_row(ctx, state1, &ax1, AxisKind::Angular, b1, b2, out);
        let state2 = self.limot2.limit_state(self.angle2(b1, b2));
        self.limot2
            .add_row(ctx, state2, &ax2, AxisKind::Angular, b1, b2, out);
    }

    pub(crate) fn rebind(
        &mut self,
        old: (&BodyState, Option<&BodyState>),
        new: (&BodyState, Option<&BodyState>),
    ) {
        let anchor = self.anchor(old.0);
        let ax1 = self.axis1(old.0);
        let ax2 = self.axis2(old.1);
        self.set_anchor(new.0, new.1, &anchor);
        if let Err(err) = self.set_axis1(new.0, new.1, &ax1) {
            warn!(error = %err, "universal axis 1 not rebound, keeping previous frame");
        }
        if let Err(err) = self.set_axis2(new.0, new.1, &ax2) {
            warn!(error = %err, "universal axis 2 not rebound, keeping previous frame");
        }
    }
}
