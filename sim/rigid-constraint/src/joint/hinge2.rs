//! Hinge-2 joint: a steering axis on body 1 and a spin axis on body 2, with
//! suspension along the steering axis. Built for vehicle wheels.

use nalgebra::{Point3, Vector3};
use rigid_types::{Real, SimError};
use tracing::warn;

use crate::geometry::{anchor_rows, frame_or_static, plane_space, try_unit, unit_axis};
use crate::limits::{AxisKind, LimitMotor, LimitState, Param, ParamKey};
use crate::row::{ConstraintRow, JointOutput, RowContext};
use crate::types::{BodyState, Load};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Hinge-2 joint.
///
/// Four rows: the anchor along the steering axis (the suspension, with its
/// own ERP/CFM), the anchor across it, and one row keeping the angle between
/// the axes. Axis 1 may carry stops and a motor; axis 2 only a motor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hinge2Joint {
    anchor1: Vector3<Real>,
    anchor2: Vector3<Real>,
    axis1: Vector3<Real>,
    axis2: Vector3<Real>,
    /// Cosine of the rest angle between the axes.
    c0: Real,
    /// Sine of the rest angle between the axes.
    s0: Real,
    /// Steering reference: axis 2 made perpendicular to axis 1, in body 1.
    v1: Vector3<Real>,
    /// `axis1 × v1` in body 1.
    v2: Vector3<Real>,
    /// Steering stops and motor.
    pub limot1: LimitMotor,
    /// Wheel spin motor.
    pub limot2: LimitMotor,
    /// ERP of the suspension row.
    pub suspension_erp: Real,
    /// CFM of the suspension row.
    pub suspension_cfm: Real,
}

impl Hinge2Joint {
    /// Steering about z, spin about y, at the origin.
    #[must_use]
    pub fn new(erp: Real, cfm: Real) -> Self {
        Self {
            anchor1: Vector3::zeros(),
            anchor2: Vector3::zeros(),
            axis1: Vector3::z(),
            axis2: Vector3::y(),
            c0: 0.0,
            s0: 1.0,
            v1: Vector3::y(),
            v2: -Vector3::x(),
            limot1: LimitMotor::new(erp, cfm),
            limot2: LimitMotor::new(erp, cfm),
            suspension_erp: erp,
            suspension_cfm: cfm,
        }
    }

    /// Set the anchor from a world point.
    pub fn set_anchor(&mut self, b1: &BodyState, b2: Option<&BodyState>, anchor: &Point3<Real>) {
        self.anchor1 = b1.point_to_local(anchor);
        self.anchor2 = frame_or_static(b2).point_to_local(anchor);
    }

    /// Set the steering axis (carried by body 1) from a world direction.
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

    /// Set the spin axis (carried by body 2) from a world direction.
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
        let ax1 = self.axis1(b1);
        let ax2 = self.axis2(b2);
        let cross = ax1.cross(&ax2);
        self.s0 = cross.norm();
        self.c0 = ax1.dot(&ax2);

        let k = ax1.dot(&ax2);
        if let Some(perp) = try_unit(&(ax2 - ax1 * k)) {
            self.v1 = b1.to_local(&perp);
            self.v2 = b1.to_local(&ax1.cross(&perp));
        }
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

    /// Steering axis in world coordinates.
    #[must_use]
    pub fn axis1(&self, b1: &BodyState) -> Vector3<Real> {
        b1.to_world(&self.axis1)
    }

    /// Spin axis in world coordinates.
    #[must_use]
    pub fn axis2(&self, b2: Option<&BodyState>) -> Vector3<Real> {
        frame_or_static(b2).to_world(&self.axis2)
    }

    /// Steering angle: rotation of body 1 about axis 1, relative to body 2.
    #[must_use]
    pub fn angle1(&self, b1: &BodyState, b2: Option<&BodyState>) -> Real {
        let a2 = b1.to_local(&self.axis2(b2));
        -self.v2.dot(&a2).atan2(self.v1.dot(&a2))
    }

    /// Steering rate.
    #[must_use]
    pub fn angle1_rate(&self, b1: &BodyState, b2: Option<&BodyState>) -> Real {
        self.axis1(b1)
            .dot(&(b1.angular_velocity - frame_or_static(b2).angular_velocity))
    }

    /// Spin rate.
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

    pub(crate) fn param(&self, key: ParamKey) -> Option<Real> {
        match (key.axis, key.param) {
            (0, Param::SuspensionErp) => Some(self.suspension_erp),
            (0, Param::SuspensionCfm) => Some(self.suspension_cfm),
            (0, p) => self.limot1.get(p),
            (1, p) => self.limot2.get(p),
            _ => None,
        }
    }

    pub(crate) fn set_param(&mut self, key: ParamKey, value: Real) -> rigid_types::Result<bool> {
        match (key.axis, key.param) {
            (0, Param::SuspensionErp) => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(SimError::InvalidParameterValue {
                        code: key.code(),
                        value,
                        reason: "suspension ERP must be in [0, 1]",
                    });
                }
                self.suspension_erp = value;
                Ok(true)
            }
            (0, Param::SuspensionCfm) => {
                if value.is_nan() || value < 0.0 {
                    return Err(SimError::InvalidParameterValue {
                        code: key.code(),
                        value,
                        reason: "suspension CFM must be non-negative",
                    });
                }
                self.suspension_cfm = value;
                Ok(true)
            }
            (0, _) => self.limot1.set(key, value),
            (1, _) => self.limot2.set(key, value),
            _ => Ok(false),
        }
    }

    pub(crate) fn build_rows(
        &self,
        ctx: &RowContext,
        b1: &BodyState,
        b2: Option<&BodyState>,
        out: &mut JointOutput,
    ) {
        let frame2 = frame_or_static(b2);
        let ax1 = self.axis1(b1);
        let ax2 = frame2.to_world(&self.axis2);
        let (p, q) = plane_space(&ax1);

        let first = out.len();
        anchor_rows(
            ctx,
            b1,
            &frame2,
            &self.anchor1,
            &self.anchor2,
            &[ax1, p, q],
            [self.suspension_erp, ctx.erp, ctx.erp],
            out,
        );
        out.rows[first].cfm = self.suspension_cfm;

        let cross = ax1.cross(&ax2);
        let s = cross.norm();
        let c = ax1.dot(&ax2);
        let hinge_dir = try_unit(&cross).unwrap_or(p);
        let mut row = ConstraintRow::new(ctx.cfm);
        row.j1_angular = hinge_dir;
        row.j2_angular = -hinge_dir;
        row.rhs = ctx.correction(ctx.erp, self.c0 * s - self.s0 * c);
        out.rows.push(row);

        let state1 = self.limot1.limit_state(self.angle1(b1, b2));
        self.limot1
            .add_row(ctx, state1, &ax1, AxisKind::Angular, b1, b2, out);
        self.limot2
            .add_row(ctx, LimitState::Free, &ax2, AxisKind::Angular, b1, b2, out);
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
            warn!(error = %err, "hinge-2 steering axis not rebound, keeping previous frame");
        }
        if let Err(err) = self.set_axis2(new.0, new.1, &ax2) {
            warn!(error = %err, "hinge-2 spin axis not rebound, keeping previous frame");
        }
    }
}
