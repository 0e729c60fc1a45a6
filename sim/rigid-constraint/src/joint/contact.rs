//! Contact joint: a non-penetration row plus optional friction rows.
//!
//! Contacts are produced by collision detection each step and attached to a
//! joint group that is emptied afterwards. The normal points into body 1.

use nalgebra::{Point3, Vector3};
use rigid_types::Real;

use crate::geometry::{plane_space, try_unit};
use crate::row::{ConstraintRow, JointOutput, RowContext};
use crate::types::BodyState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How friction bounds relate to the normal force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrictionModel {
    /// Bounds `±mu·λn`, following the solved normal force.
    #[default]
    Pyramid,
    /// Fixed bounds `±mu`, with `mu` read as a force.
    Box,
}

/// Restitution settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounce {
    /// Coefficient of restitution in `[0, 1]`.
    pub restitution: Real,
    /// Minimum incoming speed for the bounce to apply.
    pub min_velocity: Real,
}

/// Contact surface parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurfaceParams {
    /// Friction coefficient; used for both directions unless `mu2` is set.
    pub mu: Real,
    /// Friction coefficient of the second direction.
    pub mu2: Option<Real>,
    /// First friction direction (world frame); derived from the normal if
    /// unset.
    pub fdir1: Option<Vector3<Real>>,
    /// Restitution.
    pub bounce: Option<Bounce>,
    /// ERP override for the normal row.
    pub soft_erp: Option<Real>,
    /// CFM override for the normal row.
    pub soft_cfm: Option<Real>,
    /// Surface velocity along friction direction 1.
    pub motion1: Real,
    /// Surface velocity along friction direction 2.
    pub motion2: Real,
    /// Surface velocity along the normal.
    pub motion_n: Real,
    /// Force-dependent slip along direction 1, used as the row CFM.
    pub slip1: Option<Real>,
    /// Force-dependent slip along direction 2.
    pub slip2: Option<Real>,
    /// Friction model.
    pub friction_model: FrictionModel,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            mu: 0.0,
            mu2: None,
            fdir1: None,
            bounce: None,
            soft_erp: None,
            soft_cfm: None,
            motion1: 0.0,
            motion2: 0.0,
            motion_n: 0.0,
            slip1: None,
            slip2: None,
            friction_model: FrictionModel::Pyramid,
        }
    }
}

impl SurfaceParams {
    /// Frictional surface with coefficient `mu`.
    #[must_use]
    pub fn with_friction(mu: Real) -> Self {
        Self {
            mu,
            ..Self::default()
        }
    }

    /// Set a separate second friction coefficient.
    #[must_use]
    pub fn with_mu2(mut self, mu2: Real) -> Self {
        self.mu2 = Some(mu2);
        self
    }

    /// Set the first friction direction.
    #[must_use]
    pub fn with_fdir1(mut self, dir: Vector3<Real>) -> Self {
        self.fdir1 = Some(dir);
        self
    }

    /// Enable restitution.
    #[must_use]
    pub fn with_bounce(mut self, restitution: Real, min_velocity: Real) -> Self {
        self.bounce = Some(Bounce {
            restitution,
            min_velocity,
        });
        self
    }

    /// Soften the normal row.
    #[must_use]
    pub fn with_softness(mut self, erp: Real, cfm: Real) -> Self {
        self.soft_erp = Some(erp);
        self.soft_cfm = Some(cfm);
        self
    }

    /// Set the surface velocities along the friction directions.
    #[must_use]
    pub fn with_motion(mut self, motion1: Real, motion2: Real) -> Self {
        self.motion1 = motion1;
        self.motion2 = motion2;
        self
    }

    /// Set force-dependent slip in both friction directions.
    #[must_use]
    pub fn with_slip(mut self, slip1: Real, slip2: Real) -> Self {
        self.slip1 = Some(slip1);
        self.slip2 = Some(slip2);
        self
    }

    /// Set the friction model.
    #[must_use]
    pub fn with_friction_model(mut self, model: FrictionModel) -> Self {
        self.friction_model = model;
        self
    }
}

/// Contact point geometry as reported by collision detection.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactGeom {
    /// Contact position in world coordinates.
    pub position: Point3<Real>,
    /// Unit normal pointing into body 1.
    pub normal: Vector3<Real>,
    /// Penetration depth.
    pub depth: Real,
}

impl ContactGeom {
    /// New contact geometry.
    #[must_use]
    pub fn new(position: Point3<Real>, normal: Vector3<Real>, depth: Real) -> Self {
        Self {
            position,
            normal,
            depth,
        }
    }
}

impl Default for ContactGeom {
    fn default() -> Self {
        Self::new(Point3::origin(), Vector3::z(), 0.0)
    }
}

/// Contact joint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactJoint {
    /// Contact geometry.
    pub geom: ContactGeom,
    /// Surface parameters.
    pub surface: SurfaceParams,
}

impl ContactJoint {
    /// New contact.
    #[must_use]
    pub fn new(geom: ContactGeom, surface: SurfaceParams) -> Self {
        Self { geom, surface }
    }

    /// Number of friction rows this contact emits.
    #[must_use]
    pub fn friction_row_count(&self) -> usize {
        match self.surface.mu2 {
            None if self.surface.mu > 0.0 => 2,
            None => 0,
            Some(mu2) => usize::from(self.surface.mu > 0.0) + usize::from(mu2 > 0.0),
        }
    }

    pub(crate) fn build_rows(
        &self,
        ctx: &RowContext,
        b1: &BodyState,
        b2: Option<&BodyState>,
        reversed: bool,
        out: &mut JointOutput,
    ) {
        let surface = &self.surface;
        let Some(mut normal) = try_unit(&self.geom.normal) else {
            return;
        };
        if reversed {
            normal = -normal;
        }

        let c1 = self.geom.position - b1.position;
        let c2 = b2.map(|b| self.geom.position - b.position);
        let jacobian = |dir: &Vector3<Real>| {
            let mut row = ConstraintRow::new(ctx.cfm);
            row.j1_linear = *dir;
            row.j1_angular = c1.cross(dir);
            if let Some(c2) = c2 {
                row.j2_linear = -dir;
                row.j2_angular = -c2.cross(dir);
            }
            row
        };

        let normal_index = out.len();
        let mut row = jacobian(&normal);
        let depth = (self.geom.depth - ctx.surface_layer).max(0.0);
        row.rhs = ctx.correction(surface.soft_erp.unwrap_or(ctx.erp), depth) + surface.motion_n;
        row.cfm = surface.soft_cfm.unwrap_or(ctx.cfm);
        row.lo = 0.0;
        row.hi = Real::INFINITY;

        if let Some(bounce) = surface.bounce.filter(|b| b.restitution > 0.0) {
            let outgoing = row.relative_velocity(
                &b1.linear_velocity,
                &b1.angular_velocity,
                b2.map(|b| (&b.linear_velocity, &b.angular_velocity)),
            ) - surface.motion_n;
            if -outgoing > bounce.min_velocity {
                let target = -bounce.restitution * outgoing + surface.motion_n;
                row.rhs = row.rhs.max(target);
            }
        }
        out.rows.push(row);

        if self.friction_row_count() == 0 {
            return;
        }

        let t1 = surface
            .fdir1
            .and_then(|d| try_unit(&(d - normal * normal.dot(&d))))
            .unwrap_or_else(|| plane_space(&normal).0);
        let t2 = normal.cross(&t1);
        let mu2 = surface.mu2.unwrap_or(surface.mu);
        let directions = [
            (t1, surface.mu, surface.motion1, surface.slip1),
            (t2, mu2, surface.motion2, surface.slip2),
        ];

        for (dir, mu, motion, slip) in directions {
            if mu <= 0.0 {
                continue;
            }
            let mut row = jacobian(&dir);
            row.rhs = motion;
            row.cfm = slip.unwrap_or(ctx.cfm);
            if mu.is_finite() {
                row.lo = -mu;
                row.hi = mu;
                if surface.friction_model == FrictionModel::Pyramid {
                    row.friction_of = Some(normal_index);
                }
            }
            out.rows.push(row);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rigid_types::Pose;

    fn ball_on_ground(vz: Real) -> BodyState {
        let mut b = BodyState::from_pose(&Pose::from_position(Point3::new(0.0, 0.0, 0.5)));
        b.linear_velocity = Vector3::new(0.0, 0.0, vz);
        b
    }

    fn contact(surface: SurfaceParams) -> ContactJoint {
        ContactJoint::new(
            ContactGeom::new(Point3::new(0.0, 0.0, 0.0), Vector3::z(), 0.01),
            surface,
        )
    }

    #[test]
    fn test_frictionless_contact_has_one_row() {
        let ctx = RowContext::new(0.01, 0.2, 1e-10);
        let mut out = JointOutput::new();
        contact(SurfaceParams::default()).build_rows(&ctx, &ball_on_ground(0.0), None, false, &mut out);

        assert_eq!(out.len(), 1);
        let row = out.rows[0];
        assert_eq!(row.lo, 0.0);
        assert_eq!(row.hi, Real::INFINITY);
        assert_relative_eq!(row.rhs, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_friction_rows_reference_normal() {
        let ctx = RowContext::new(0.01, 0.2, 1e-10);
        let mut out = JointOutput::new();
        contact(SurfaceParams::with_friction(0.5)).build_rows(
            &ctx,
            &ball_on_ground(0.0),
            None,
            false,
            &mut out,
        );

        assert_eq!(out.len(), 3);
        for row in &out.rows[1..] {
            assert_eq!(row.friction_of, Some(0));
            assert_eq!(row.hi, 0.5);
            assert_relative_eq!(row.j1_linear.dot(&Vector3::z()), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_mu2_zero_drops_second_direction() {
        let surface = SurfaceParams::with_friction(0.5).with_mu2(0.0);
        assert_eq!(contact(surface).friction_row_count(), 1);

        let surface = SurfaceParams::with_friction(0.0).with_mu2(0.3);
        assert_eq!(contact(surface).friction_row_count(), 1);
    }

    #[test]
    fn test_box_model_has_fixed_bounds() {
        let ctx = RowContext::new(0.01, 0.2, 1e-10);
        let mut out = JointOutput::new();
        let surface = SurfaceParams::with_friction(2.0).with_friction_model(FrictionModel::Box);
        contact(surface).build_rows(&ctx, &ball_on_ground(0.0), None, false, &mut out);
        assert!(out.rows[1..].iter().all(|r| r.friction_of.is_none()));
    }

    #[test]
    fn test_infinite_friction_is_unbounded() {
        let ctx = RowContext::new(0.01, 0.2, 1e-10);
        let mut out = JointOutput::new();
        contact(SurfaceParams::with_friction(Real::INFINITY)).build_rows(
            &ctx,
            &ball_on_ground(0.0),
            None,
            false,
            &mut out,
        );
        assert_eq!(out.rows[1].hi, Real::INFINITY);
        assert_eq!(out.rows[1].friction_of, None);
    }

    #[test]
    fn test_bounce_reflects_incoming_velocity() {
        let ctx = RowContext::new(0.01, 0.2, 1e-10);
        let mut out = JointOutput::new();
        let surface = SurfaceParams::default().with_bounce(0.5, 0.1);
        contact(surface).build_rows(&ctx, &ball_on_ground(-2.0), None, false, &mut out);
        assert_relative_eq!(out.rows[0].rhs, 1.0, epsilon = 1e-12);

        // Below the threshold only depth correction remains.
        out.clear();
        contact(surface).build_rows(&ctx, &ball_on_ground(-0.05), None, false, &mut out);
        assert_relative_eq!(out.rows[0].rhs, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_reversed_flips_normal() {
        let ctx = RowContext::new(0.01, 0.2, 1e-10);
        let mut out = JointOutput::new();
        contact(SurfaceParams::default()).build_rows(&ctx, &ball_on_ground(0.0), None, true, &mut out);
        assert_eq!(out.rows[0].j1_linear, -Vector3::z());
    }

    #[test]
    fn test_surface_layer_absorbs_depth() {
        let ctx = RowContext::new(0.01, 0.2, 1e-10).with_surface_layer(0.02);
        let mut out = JointOutput::new();
        contact(SurfaceParams::default()).build_rows(&ctx, &ball_on_ground(0.0), None, false, &mut out);
        assert_eq!(out.rows[0].rhs, 0.0);
    }
}
