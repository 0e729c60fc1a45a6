//! Fixed joint: locks the full relative pose.

use nalgebra::{UnitQuaternion, Vector3};
use rigid_types::Real;

use crate::geometry::{anchor_rows, frame_or_static, orientation_rows, WORLD_AXES};
use crate::row::{JointOutput, RowContext};
use crate::types::BodyState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fixed joint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixedJoint {
    /// Body 1 center in body 2 (or world) coordinates.
    offset: Vector3<Real>,
    q_initial: UnitQuaternion<Real>,
}

impl Default for FixedJoint {
    fn default() -> Self {
        Self {
            offset: Vector3::zeros(),
            q_initial: UnitQuaternion::identity(),
        }
    }
}

impl FixedJoint {
    /// Joint locking body 1 at the origin of body 2.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the current relative pose of the two bodies.
    pub fn set_fixed(&mut self, b1: &BodyState, b2: Option<&BodyState>) {
        let frame2 = frame_or_static(b2);
        self.offset = frame2.point_to_local(&b1.position);
        self.q_initial = b1.orientation.inverse() * frame2.orientation;
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
            &Vector3::zeros(),
            &self.offset,
            &WORLD_AXES,
            [ctx.erp; 3],
            out,
        );
        orientation_rows(ctx, b1, &frame2, &self.q_initial, out);
    }
}
