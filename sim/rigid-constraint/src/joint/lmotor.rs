//! Linear motor: up to three powered translation axes.

use nalgebra::Vector3;
use rigid_types::{Real, SimError};

use super::amotor::{check_axis_index, AxisFrame, MotorAxis, MAX_MOTOR_AXES};
use crate::limits::{AxisKind, LimitMotor, LimitState};
use crate::row::{JointOutput, RowContext};
use crate::types::BodyState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Linear motor joint.
///
/// Each active axis drives the relative velocity of the two body centers;
/// there is no position measurement, so stops are not enforced.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearMotorJoint {
    num_axes: usize,
    axes: [MotorAxis; MAX_MOTOR_AXES],
    /// Motor per axis.
    pub limots: [LimitMotor; MAX_MOTOR_AXES],
}

impl LinearMotorJoint {
    /// Motor with no axes.
    #[must_use]
    pub fn new(erp: Real, cfm: Real) -> Self {
        Self {
            num_axes: 0,
            axes: [MotorAxis::default(); MAX_MOTOR_AXES],
            limots: [LimitMotor::new(erp, cfm); MAX_MOTOR_AXES],
        }
    }

    /// Number of active axes.
    #[must_use]
    pub fn num_axes(&self) -> usize {
        self.num_axes
    }

    /// Set the number of active axes (0 to 3).
    pub fn set_num_axes(&mut self, num: usize) -> rigid_types::Result<()> {
        if num > MAX_MOTOR_AXES {
            return Err(SimError::AxisOutOfRange {
                index: num,
                count: MAX_MOTOR_AXES,
            });
        }
        self.num_axes = num;
        Ok(())
    }

    /// Set axis `index` from a world direction anchored to `frame`.
    pub fn set_axis(
        &mut self,
        index: usize,
        frame: AxisFrame,
        axis: &Vector3<Real>,
        b1: &BodyState,
        b2: Option<&BodyState>,
    ) -> rigid_types::Result<()> {
        check_axis_index(index)?;
        self.axes[index] = MotorAxis::new(frame, axis, b1, b2)?;
        Ok(())
    }

    /// Stored axis `index`.
    pub fn motor_axis(&self, index: usize) -> rigid_types::Result<MotorAxis> {
        check_axis_index(index)?;
        Ok(self.axes[index])
    }

    /// Axis `index` in world coordinates.
    pub fn axis(
        &self,
        index: usize,
        b1: &BodyState,
        b2: Option<&BodyState>,
    ) -> rigid_types::Result<Vector3<Real>> {
        check_axis_index(index)?;
        Ok(self.axes[index].world(b1, b2))
    }

    pub(crate) fn build_rows(
        &self,
        ctx: &RowContext,
        b1: &BodyState,
        b2: Option<&BodyState>,
        out: &mut JointOutput,
    ) {
        for (axis, limot) in self.axes.iter().zip(&self.limots).take(self.num_axes) {
            let dir = axis.world(b1, b2);
            limot.add_row(ctx, LimitState::Free, &dir, AxisKind::Linear, b1, b2, out);
        }
    }

    pub(crate) fn rebind(
        &mut self,
        old: (&BodyState, Option<&BodyState>),
        new: (&BodyState, Option<&BodyState>),
    ) {
        for axis in &mut self.axes {
            let world = axis.world(old.0, old.1);
            if let Ok(rebound) = MotorAxis::new(axis.frame, &world, new.0, new.1) {
                *axis = rebound;
            }
        }
    }
}
