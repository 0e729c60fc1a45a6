//! Slider (prismatic) joint.

use nalgebra::{UnitQuaternion, Vector3};
use rigid_types::Real;
use tracing::warn;

use crate::geometry::{frame_or_static, orientation_rows, plane_space, unit_axis};
use crate::limits::{AxisKind, LimitMotor};
use crate::row::{ConstraintRow, JointOutput, RowContext};
use crate::types::{BodyState, Load};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Slider joint: relative orientation locked, translation only along the axis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliderJoint {
    /// Axis in body 1 coordinates.
    axis1: Vector3<Real>,
    q_initial: UnitQuaternion<Real>,
    /// Body 1 center in body 2 (or world) coordinates at position zero.
    offset: Vector3<Real>,
    /// Stops and motor along the axis.
    pub limot: LimitMotor,
}

impl SliderJoint {
    /// Slider along x, softness taken from the world.
    #[must_use]
    pub fn new(erp: Real, cfm: Real) -> Self {
        Self {
            axis1: Vector3::x(),
            q_initial: UnitQuaternion::identity(),
            offset: Vector3::zeros(),
            limot: LimitMotor::new(erp, cfm),
        }
    }

    /// Set the axis from a world direction; the current configuration
    /// becomes position zero.
    pub fn set_axis(
        &mut self,
        b1: &BodyState,
        b2: Option<&BodyState>,
        axis: &Vector3<Real>,
    ) -> rigid_types::Result<()> {
        self.set_axis_delta(b1, b2, axis, &Vector3::zeros())
    }

    /// Set the axis with position zero displaced by `delta` (world frame)
    /// from the current configuration.
    pub fn set_axis_delta(
        &mut self,
        b1: &BodyState,
        b2: Option<&BodyState>,
        axis: &Vector3<Real>,
        delta: &Vector3<Real>,
    ) -> rigid_types::Result<()> {
        let axis = unit_axis(axis)?;
        let frame2 = frame_or_static(b2);
        self.axis1 = b1.to_local(&axis);
        self.q_initial = b1.orientation.inverse() * frame2.orientation;
        self.offset = frame2.point_to_local(&(b1.position + delta));
        Ok(())
    }

    /// Axis in world coordinates.
    #[must_use]
    pub fn axis(&self, b1: &BodyState) -> Vector3<Real> {
        b1.to_world(&self.axis1)
    }

    /// Displacement of body 1 relative to body 2 along the axis.
    #[must_use]
    pub fn position(&self, b1: &BodyState, b2: Option<&BodyState>) -> Real {
        let rest = frame_or_static(b2).point_to_world(&self.offset);
        self.axis(b1).dot(&(b1.position - rest))
    }

    /// Time derivative of [`position`](Self::position).
    #[must_use]
    pub fn position_rate(&self, b1: &BodyState, b2: Option<&BodyState>) -> Real {
        let v2 = b2.map_or_else(Vector3::zeros, |b| b.linear_velocity);
        self.axis(b1).dot(&(b1.linear_velocity - v2))
    }

    /// Equal and opposite forces along the axis.
    ///
    /// With two bodies the pair acts at the midpoint of their centers, so
    /// each body also receives the matching torque.
    #[must_use]
    pub fn force_loads(&self, b1: &BodyState, b2: Option<&BodyState>, force: Real) -> (Load, Load) {
        let axis = self.axis(b1);
        let f = axis * force;
        let torque = b2.map_or_else(Vector3::zeros, |b2| {
            0.5 * (b2.position - b1.position).cross(&axis) * force
        });
        (
            Load { force: f, torque },
            Load { force: -f, torque },
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
        orientation_rows(ctx, b1, &frame2, &self.q_initial, out);

        let ax1 = self.axis(b1);
        let (p, q) = plane_space(&ax1);
        let center_gap = b2.map(|b2| b2.position - b1.position);
        let error = frame2.point_to_world(&self.offset) - b1.position;
        for dir in [p, q] {
            let mut row = ConstraintRow::new(ctx.cfm);
            row.j1_linear = dir;
            row.j2_linear = -dir;
            if let Some(c) = center_gap {
                let lever = 0.5 * c.cross(&dir);
                row.j1_angular = lever;
                row.j2_angular = lever;
            }
            row.rhs = ctx.correction(ctx.erp, error.dot(&dir));
            out.rows.push(row);
        }

        let state = self.limot.limit_state(self.position(b1, b2));
        self.limot
            .add_row(ctx, state, &ax1, AxisKind::Linear, b1, b2, out);
    }

    pub(crate) fn rebind(
        &mut self,
        old: (&BodyState, Option<&BodyState>),
        new: (&BodyState, Option<&BodyState>),
    ) {
        let axis = self.axis(old.0);
        if let Err(err) = self.set_axis(new.0, new.1, &axis) {
            warn!(error = %err, "slider axis not rebound, keeping previous frame");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use rigid_types::Pose;

    fn at(x: Real, y: Real) -> BodyState {
        BodyState::from_pose(&Pose::from_position(Point3::new(x, y, 0.0)))
    }

    #[test]
    fn test_position_along_axis() {
        let mut slider = SliderJoint::new(0.2, 1e-10);
        slider.set_axis(&at(1.0, 0.0), None, &Vector3::x()).unwrap();

        assert_relative_eq!(slider.position(&at(1.0, 0.0), None), 0.0);
        assert_relative_eq!(slider.position(&at(1.5, 0.0), None), 0.5, epsilon = 1e-12);
        // Off-axis drift does not change the position.
        assert_relative_eq!(slider.position(&at(1.5, 0.3), None), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_rebind_from_collapsed_frame_keeps_axis() {
        let mut slider = SliderJoint::new(0.2, 1e-10);
        slider.set_axis(&at(0.0, 0.0), None, &Vector3::y()).unwrap();

        let collapsed = BodyState {
            rotation: nalgebra::Matrix3::zeros(),
            ..at(0.0, 0.0)
        };
        slider.rebind((&collapsed, None), (&at(0.0, 0.0), None));

        assert_relative_eq!(slider.axis(&at(0.0, 0.0)), Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_off_axis_drift_is_corrected() {
        let mut slider = SliderJoint::new(0.2, 1e-10);
        slider.set_axis(&at(0.0, 0.0), None, &Vector3::x()).unwrap();

        let ctx = RowContext::new(0.01, 0.2, 1e-10);
        let mut out = JointOutput::new();
        slider.build_rows(&ctx, &at(0.0, 0.1), None, &mut out);

        assert_eq!(out.len(), 5);
        // Rows 3 and 4 span the plane normal to x; together they ask for a
        // velocity of -erp * 0.1 / h along y.
        let vy: Real = out.rows[3..5]
            .iter()
            .map(|r| r.rhs * r.j1_linear.y)
            .sum();
        assert_relative_eq!(vy, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_delta_shifts_zero() {
        let mut slider = SliderJoint::new(0.2, 1e-10);
        slider
            .set_axis_delta(&at(0.0, 0.0), None, &Vector3::x(), &Vector3::new(0.25, 0.0, 0.0))
            .unwrap();
        assert_relative_eq!(slider.position(&at(0.0, 0.0), None), -0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_force_loads_balance() {
        let slider = SliderJoint::new(0.2, 1e-10);
        let (l1, l2) = slider.force_loads(&at(0.0, 0.0), Some(&at(0.0, 1.0)), 3.0);
        assert_relative_eq!(l1.force + l2.force, Vector3::zeros());
        assert_relative_eq!(l1.force.x, 3.0);
    }
}
