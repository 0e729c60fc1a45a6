//! Per-island constraint system shared by both solvers.
//!
//! For `m` rows and stepsize `h` the solvers work on
//!
//! ```text
//! A = J M⁻¹ Jᵀ + diag(cfm) / h
//! b = rhs / h - J (v / h + M⁻¹ f_ext)
//! A λ = b + w,    lo <= λ <= hi
//! ```
//!
//! where `λ` are constraint forces. After solving, velocities advance as
//! `v' = v + h M⁻¹ (f_ext + Jᵀ λ)`.

use std::ops::Range;

use nalgebra::{Matrix3, Vector3};
use rigid_types::Real;

use crate::row::{ConstraintRow, JointOutput};
use crate::types::{BodyState, JointFeedback};

/// One body as seen by the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverBody {
    /// Inverse mass.
    pub inv_mass: Real,
    /// Inverse inertia in world coordinates.
    pub inv_inertia: Matrix3<Real>,
    /// Linear velocity at the start of the step.
    pub linear_velocity: Vector3<Real>,
    /// Angular velocity at the start of the step.
    pub angular_velocity: Vector3<Real>,
    /// External force, including gravity and direct joint loads.
    pub force: Vector3<Real>,
    /// External torque, including the gyroscopic term and direct joint loads.
    pub torque: Vector3<Real>,
}

impl SolverBody {
    /// Solver body from a state snapshot and its external load.
    #[must_use]
    pub fn new(state: &BodyState, force: Vector3<Real>, torque: Vector3<Real>) -> Self {
        Self {
            inv_mass: state.inv_mass,
            inv_inertia: state.inv_inertia,
            linear_velocity: state.linear_velocity,
            angular_velocity: state.angular_velocity,
            force,
            torque,
        }
    }

    /// Linear velocity change per unit time under `force`.
    fn linear_accel(&self, force: &Vector3<Real>) -> Vector3<Real> {
        force * self.inv_mass
    }

    /// Angular velocity change per unit time under `torque`.
    fn angular_accel(&self, torque: &Vector3<Real>) -> Vector3<Real> {
        self.inv_inertia * torque
    }
}

/// A row placed in an island, with island-local body indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverRow {
    /// First body.
    pub body1: usize,
    /// Second body, `None` for the environment.
    pub body2: Option<usize>,
    /// Row data.
    pub row: ConstraintRow,
    /// Island-wide index of the normal row bounding this friction row.
    pub friction_of: Option<usize>,
}

/// `M⁻¹ Jᵀ` of one row, split by body and linear/angular part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowResponse {
    /// Body 1 linear part.
    pub linear1: Vector3<Real>,
    /// Body 1 angular part.
    pub angular1: Vector3<Real>,
    /// Body 2 linear part.
    pub linear2: Vector3<Real>,
    /// Body 2 angular part.
    pub angular2: Vector3<Real>,
}

/// Bodies and rows of one island for one step.
#[derive(Debug, Clone, Default)]
pub struct IslandSystem {
    bodies: Vec<SolverBody>,
    rows: Vec<SolverRow>,
    dt: Real,
}

impl IslandSystem {
    /// Empty system for a step of size `dt`.
    #[must_use]
    pub fn new(dt: Real) -> Self {
        Self {
            bodies: Vec::new(),
            rows: Vec::new(),
            dt,
        }
    }

    /// Stepsize.
    #[must_use]
    pub fn dt(&self) -> Real {
        self.dt
    }

    /// Add a body; returns its island-local index.
    pub fn push_body(&mut self, body: SolverBody) -> usize {
        self.bodies.push(body);
        self.bodies.len() - 1
    }

    /// Add a joint's rows and direct loads; returns the range of its rows.
    pub fn push_joint(
        &mut self,
        body1: usize,
        body2: Option<usize>,
        output: &JointOutput,
    ) -> Range<usize> {
        let start = self.rows.len();
        for row in &output.rows {
            self.rows.push(SolverRow {
                body1,
                body2,
                row: *row,
                friction_of: row.friction_of.map(|local| start + local),
            });
        }

        let b1 = &mut self.bodies[body1];
        b1.force += output.load1.force;
        b1.torque += output.load1.torque;
        if let Some(b2) = body2 {
            let b2 = &mut self.bodies[b2];
            b2.force += output.load2.force;
            b2.torque += output.load2.torque;
        }
        start..self.rows.len()
    }

    /// Bodies.
    #[must_use]
    pub fn bodies(&self) -> &[SolverBody] {
        &self.bodies
    }

    /// Rows.
    #[must_use]
    pub fn rows(&self) -> &[SolverRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// `M⁻¹ Jᵀ` for every row.
    #[must_use]
    pub fn responses(&self) -> Vec<RowResponse> {
        self.rows
            .iter()
            .map(|r| {
                let b1 = &self.bodies[r.body1];
                let (linear2, angular2) = r.body2.map_or_else(
                    || (Vector3::zeros(), Vector3::zeros()),
                    |b| {
                        let b2 = &self.bodies[b];
                        (b2.linear_accel(&r.row.j2_linear), b2.angular_accel(&r.row.j2_angular))
                    },
                );
                RowResponse {
                    linear1: b1.linear_accel(&r.row.j1_linear),
                    angular1: b1.angular_accel(&r.row.j1_angular),
                    linear2,
                    angular2,
                }
            })
            .collect()
    }

    /// Right-hand side `b` of the system.
    #[must_use]
    pub fn rhs(&self) -> Vec<Real> {
        let inv_dt = 1.0 / self.dt;
        let accel: Vec<(Vector3<Real>, Vector3<Real>)> = self
            .bodies
            .iter()
            .map(|b| {
                (
                    b.linear_velocity * inv_dt + b.linear_accel(&b.force),
                    b.angular_velocity * inv_dt + b.angular_accel(&b.torque),
                )
            })
            .collect();

        self.rows
            .iter()
            .map(|r| {
                let (l1, a1) = &accel[r.body1];
                let second = r.body2.map(|b| (&accel[b].0, &accel[b].1));
                r.row.rhs * inv_dt - r.row.relative_velocity(l1, a1, second)
            })
            .collect()
    }

    /// Diagonal softness term `cfm / h` of every row.
    #[must_use]
    pub fn softness(&self) -> Vec<Real> {
        let inv_dt = 1.0 / self.dt;
        self.rows.iter().map(|r| r.row.cfm * inv_dt).collect()
    }

    /// `J_i · r`, for a row `i` and accumulated per-body responses `r`.
    #[must_use]
    pub fn row_dot(&self, index: usize, acc: &[(Vector3<Real>, Vector3<Real>)]) -> Real {
        let r = &self.rows[index];
        let (l1, a1) = &acc[r.body1];
        let second = r.body2.map(|b| (&acc[b].0, &acc[b].1));
        r.row.relative_velocity(l1, a1, second)
    }

    /// Dense `A` entry between rows `i` and `j`, zero if they share no body.
    #[must_use]
    pub fn coupling(&self, i: usize, j: usize, response_j: &RowResponse) -> Real {
        let ri = &self.rows[i];
        let rj = &self.rows[j];
        let mut a = 0.0;
        if ri.body1 == rj.body1 {
            a += ri.row.j1_linear.dot(&response_j.linear1) + ri.row.j1_angular.dot(&response_j.angular1);
        }
        if Some(ri.body1) == rj.body2 {
            a += ri.row.j1_linear.dot(&response_j.linear2) + ri.row.j1_angular.dot(&response_j.angular2);
        }
        if let Some(b2) = ri.body2 {
            if b2 == rj.body1 {
                a += ri.row.j2_linear.dot(&response_j.linear1)
                    + ri.row.j2_angular.dot(&response_j.angular1);
            }
            if Some(b2) == rj.body2 {
                a += ri.row.j2_linear.dot(&response_j.linear2)
                    + ri.row.j2_angular.dot(&response_j.angular2);
            }
        }
        a
    }

    /// Effective bounds of a row given the current forces.
    ///
    /// Friction rows scale their bounds with the normal force they refer to.
    #[must_use]
    pub fn bounds(&self, index: usize, lambda: &[Real]) -> (Real, Real) {
        let r = &self.rows[index];
        match r.friction_of {
            Some(normal) => {
                let limit = (r.row.hi * lambda[normal]).abs();
                (-limit, limit)
            }
            None => (r.row.lo, r.row.hi),
        }
    }

    /// Velocities after applying constraint forces `lambda` for one step.
    #[must_use]
    pub fn solved_velocities(&self, lambda: &[Real]) -> Vec<(Vector3<Real>, Vector3<Real>)> {
        let mut force: Vec<(Vector3<Real>, Vector3<Real>)> =
            self.bodies.iter().map(|b| (b.force, b.torque)).collect();
        for (r, &l) in self.rows.iter().zip(lambda) {
            force[r.body1].0 += r.row.j1_linear * l;
            force[r.body1].1 += r.row.j1_angular * l;
            if let Some(b2) = r.body2 {
                force[b2].0 += r.row.j2_linear * l;
                force[b2].1 += r.row.j2_angular * l;
            }
        }
        self.bodies
            .iter()
            .zip(force)
            .map(|(b, (f, t))| {
                (
                    b.linear_velocity + b.linear_accel(&f) * self.dt,
                    b.angular_velocity + b.angular_accel(&t) * self.dt,
                )
            })
            .collect()
    }

    /// Constraint force and torque a range of rows applied to its bodies.
    #[must_use]
    pub fn feedback(&self, rows: Range<usize>, lambda: &[Real]) -> JointFeedback {
        let mut fb = JointFeedback::default();
        for i in rows {
            let r = &self.rows[i].row;
            let l = lambda[i];
            fb.force1 += r.j1_linear * l;
            fb.torque1 += r.j1_angular * l;
            if self.rows[i].body2.is_some() {
                fb.force2 += r.j2_linear * l;
                fb.torque2 += r.j2_angular * l;
            }
        }
        fb
    }
}

/// Result of solving one island.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IslandSolution {
    /// Constraint force per row.
    pub lambda: Vec<Real>,
    /// Sweeps (iterative) or pivots (direct) performed.
    pub iterations: usize,
    /// Whether the solve hit a degenerate case and fell back.
    pub degenerate: bool,
}

/// A solver for the per-island mixed LCP.
pub trait IslandSolver {
    /// Constraint forces for `system`.
    fn solve(&self, system: &IslandSystem) -> IslandSolution;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
