//! Constraint rows emitted by joints.
//!
//! A row is one scalar condition on the relative velocity of two bodies:
//!
//! ```text
//! J1l·v1 + J1a·w1 + J2l·v2 + J2a·w2 = rhs - cfm·λ,    lo <= λ <= hi
//! ```
//!
//! `rhs` is the target relative velocity (stabilization bias plus any motor
//! or surface velocity), `λ` the constraint force the solvers compute.

use nalgebra::Vector3;
use rigid_types::Real;
use smallvec::SmallVec;

use crate::types::Load;

/// One scalar constraint row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintRow {
    /// Linear Jacobian for body 1.
    pub j1_linear: Vector3<Real>,
    /// Angular Jacobian for body 1.
    pub j1_angular: Vector3<Real>,
    /// Linear Jacobian for body 2, ignored without a second body.
    pub j2_linear: Vector3<Real>,
    /// Angular Jacobian for body 2, ignored without a second body.
    pub j2_angular: Vector3<Real>,
    /// Target relative velocity.
    pub rhs: Real,
    /// Constraint force mixing for this row.
    pub cfm: Real,
    /// Lower force bound.
    pub lo: Real,
    /// Upper force bound.
    pub hi: Real,
    /// Friction coupling: index (within the same joint) of the normal row
    /// whose force scales this row's bounds. The effective bounds become
    /// `[-|hi·λn|, |hi·λn|]`.
    pub friction_of: Option<usize>,
}

impl ConstraintRow {
    /// Unbounded equality row with zero Jacobian.
    #[must_use]
    pub fn new(cfm: Real) -> Self {
        Self {
            j1_linear: Vector3::zeros(),
            j1_angular: Vector3::zeros(),
            j2_linear: Vector3::zeros(),
            j2_angular: Vector3::zeros(),
            rhs: 0.0,
            cfm,
            lo: -Real::INFINITY,
            hi: Real::INFINITY,
            friction_of: None,
        }
    }

    /// Relative velocity of the two bodies along this row.
    #[must_use]
    pub fn relative_velocity(
        &self,
        v1: &Vector3<Real>,
        w1: &Vector3<Real>,
        v2: Option<(&Vector3<Real>, &Vector3<Real>)>,
    ) -> Real {
        let mut jv = self.j1_linear.dot(v1) + self.j1_angular.dot(w1);
        if let Some((v2, w2)) = v2 {
            jv += self.j2_linear.dot(v2) + self.j2_angular.dot(w2);
        }
        jv
    }
}

/// Per-step parameters every joint needs to build its rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowContext {
    /// Inverse stepsize.
    pub fps: Real,
    /// World ERP.
    pub erp: Real,
    /// World CFM.
    pub cfm: Real,
    /// Bound on stabilization velocity.
    pub max_correcting_vel: Real,
    /// Penetration depth contacts tolerate.
    pub surface_layer: Real,
}

impl RowContext {
    /// Context for a step of size `dt` with default ERP/CFM and no limits.
    #[must_use]
    pub fn new(dt: Real, erp: Real, cfm: Real) -> Self {
        Self {
            fps: 1.0 / dt,
            erp,
            cfm,
            max_correcting_vel: Real::INFINITY,
            surface_layer: 0.0,
        }
    }

    /// Set the stabilization velocity bound.
    #[must_use]
    pub fn with_max_correcting_vel(mut self, vel: Real) -> Self {
        self.max_correcting_vel = vel;
        self
    }

    /// Set the contact surface layer.
    #[must_use]
    pub fn with_surface_layer(mut self, depth: Real) -> Self {
        self.surface_layer = depth;
        self
    }

    /// Stabilization velocity `erp · error / h`, clamped to the bound.
    #[must_use]
    pub fn correction(&self, erp: Real, error: Real) -> Real {
        let v = self.fps * erp * error;
        v.max(-self.max_correcting_vel).min(self.max_correcting_vel)
    }
}

/// Rows and direct loads produced by one joint for one step.
#[derive(Debug, Clone, Default)]
pub struct JointOutput {
    /// Constraint rows in emission order.
    pub rows: SmallVec<[ConstraintRow; 6]>,
    /// Load applied directly to body 1, outside the solver.
    pub load1: Load,
    /// Load applied directly to body 2, outside the solver.
    pub load2: Load,
}

impl JointOutput {
    /// Empty output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for reuse.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.load1 = Load::default();
        self.load2 = Load::default();
    }

    /// Number of rows emitted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
