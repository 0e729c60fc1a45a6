//! Ball-and-socket joint: three rows pinning a common point.

use nalgebra::{Point3, Vector3};
use rigid_types::Real;

use crate::geometry::{anchor_rows, frame_or_static, WORLD_AXES};
use crate::row::{JointOutput, RowContext};
use crate::types::BodyState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ball-and-socket joint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BallJoint {
    /// Anchor in body 1 coordinates.
    anchor1: Vector3<Real>,
    /// Anchor in body 2 (or world) coordinates.
    anchor2: Vector3<Real>,
}

impl BallJoint {
    /// Joint anchored at the origin of both frames.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the anchor from a world point, recorded in both body frames.
    pub fn set_anchor(&mut self, b1: &BodyState, b2: Option<&BodyState>, anchor: &Point3<Real>) {
        self.anchor1 = b1.point_to_local(anchor);
        self.anchor2 = frame_or_static(b2).point_to_local(anchor);
    }

    /// Anchor as carried by body 1, in world coordinates.
    #[must_use]
    pub fn anchor(&self, b1: &BodyState) -> Point3<Real> {
        b1.point_to_world(&self.anchor1)
    }

    /// Anchor as carried by body 2, in world coordinates.
    ///
    /// Differs from [`anchor`](Self::anchor) while the joint is not yet
    /// satisfied.
    #[must_use]
    pub fn anchor2(&self, b2: Option<&BodyState>) -> Point3<Real> {
        frame_or_static(b2).point_to_world(&self.anchor2)
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
    }

    pub(crate) fn rebind(
        &mut self,
        old: (&BodyState, Option<&BodyState>),
        new: (&BodyState, Option<&BodyState>),
    ) {
        let anchor = self.anchor(old.0);
        self.set_anchor(new.0, new.1, &anchor);
    }
}
