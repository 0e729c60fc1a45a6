//! Direct solver: exact box-constrained LCP by active-set pivoting.
//!
//! Every row is in one of three states: free, clamped at its lower bound or
//! clamped at its upper bound. Each pass solves the free rows exactly given
//! the clamped ones, then makes one pivot:
//!
//! 1. a free row outside its bounds is clamped to the bound it crossed
//! 2. otherwise a clamped row whose residual pulls it inward is released
//!
//! With `w = A λ - b`, a solution has `w = 0` on free rows, `w >= 0` at lower
//! bounds and `w <= 0` at upper bounds.
//!
//! Each pass factors the `f × f` block of free rows, `O(f³)`. A solve makes
//! at most `pivot_budget_factor · m + 8` passes, so the worst case is
//! `O(m⁴)`; contact islands usually settle within a few pivots. The last
//! factorization is kept keyed by its free set, so friction refinement
//! passes that end on the same active set do not refactor.
//!
//! Friction bounds depend on normal forces that are themselves unknowns. The
//! solver resolves the coupling by fixed-point refinement: solve with the
//! bounds implied by the previous normal forces (zero at first), update the
//! bounds, and repeat until they stop changing.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn, LU};
use rigid_types::{DirectSolverConfig, Real};
use tracing::{trace, warn};

use crate::system::{IslandSolution, IslandSolver, IslandSystem};

/// Clamping state of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowState {
    Free,
    AtLower,
    AtUpper,
}

/// Dense direct solver.
#[derive(Debug, Clone, Default)]
pub struct DirectSolver {
    config: DirectSolverConfig,
}

impl DirectSolver {
    /// Solver with the given configuration.
    #[must_use]
    pub fn new(config: DirectSolverConfig) -> Self {
        Self { config }
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &DirectSolverConfig {
        &self.config
    }

    /// Build the dense system matrix `A`.
    fn assemble(system: &IslandSystem) -> DMatrix<Real> {
        let m = system.num_rows();
        let responses = system.responses();
        let softness = system.softness();
        let mut a = DMatrix::zeros(m, m);
        for j in 0..m {
            for i in 0..m {
                a[(i, j)] = system.coupling(i, j, &responses[j]);
            }
            a[(j, j)] += softness[j];
        }
        a
    }
}

impl IslandSolver for DirectSolver {
    fn solve(&self, system: &IslandSystem) -> IslandSolution {
        let m = system.num_rows();
        if m == 0 {
            return IslandSolution::default();
        }

        let a = Self::assemble(system);
        let b = DVector::from_vec(system.rhs());
        let rows = system.rows();
        let has_friction = rows.iter().any(|r| r.friction_of.is_some());

        let mut lo: Vec<Real> = rows.iter().map(|r| r.row.lo).collect();
        let mut hi: Vec<Real> = rows.iter().map(|r| r.row.hi).collect();
        for (i, r) in rows.iter().enumerate() {
            if r.friction_of.is_some() {
                lo[i] = 0.0;
                hi[i] = 0.0;
            }
        }

        let mut lcp = BoxLcp::new(&a, &b, self.config.pivot_budget_factor);
        let mut lambda = lcp.solve(&lo, &hi);
        let passes = if has_friction {
            self.config.friction_iterations
        } else {
            0
        };

        for pass in 0..passes {
            let mut change: Real = 0.0;
            let mut largest: Real = 0.0;
            for (i, r) in rows.iter().enumerate() {
                if let Some(normal) = r.friction_of {
                    let limit = (r.row.hi * lambda[normal]).abs();
                    change = change.max((limit - hi[i]).abs());
                    largest = largest.max(limit);
                    lo[i] = -limit;
                    hi[i] = limit;
                }
            }
            if change <= self.config.friction_tolerance * (1.0 + largest) {
                trace!(pass, "friction bounds converged");
                break;
            }
            lambda = lcp.solve(&lo, &hi);
        }

        IslandSolution {
            lambda,
            iterations: lcp.pivots,
            degenerate: lcp.degenerate,
        }
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Factorization of a free-row block.
enum Factor {
    Cholesky(Cholesky<Real, Dyn>),
    Lu(LU<Real, Dyn, Dyn>),
}

impl Factor {
    /// Cholesky, then LU, then LU with a small diagonal shift.
    fn of(a: DMatrix<Real>) -> Option<Self> {
        if let Some(chol) = a.clone().cholesky() {
            return Some(Self::Cholesky(chol));
        }
        let lu = a.clone().lu();
        if lu.is_invertible() {
            return Some(Self::Lu(lu));
        }
        Self::shifted(a)
    }

    fn shifted(a: DMatrix<Real>) -> Option<Self> {
        let scale = a.diagonal().iter().fold(1.0 as Real, |acc, d| acc.max(d.abs()));
        warn!(size = a.nrows(), "factorization failed, regularizing");
        let n = a.nrows();
        let lu = (a + DMatrix::identity(n, n) * (scale * 1e-8 as Real)).lu();
        lu.is_invertible().then_some(Self::Lu(lu))
    }

    fn solve(&self, b: &DVector<Real>) -> Option<DVector<Real>> {
        let x = match self {
            Self::Cholesky(chol) => chol.solve(b),
            Self::Lu(lu) => lu.solve(b)?,
        };
        x.iter().all(|v| v.is_finite()).then_some(x)
    }
}

/// Active-set solver for `A λ = b + w` with box bounds.
///
/// Row states persist across calls so that a re-solve with nearby bounds
/// starts from the previous active set.
struct BoxLcp<'a> {
    a: &'a DMatrix<Real>,
    b: &'a DVector<Real>,
    state: Vec<RowState>,
    budget_factor: usize,
    pivots: usize,
    factorizations: usize,
    factor: Option<(Vec<usize>, Factor)>,
    degenerate: bool,
}

impl<'a> BoxLcp<'a> {
    fn new(a: &'a DMatrix<Real>, b: &'a DVector<Real>, budget_factor: usize) -> Self {
        Self {
            a,
            b,
            state: vec![RowState::Free; b.len()],
            budget_factor,
            pivots: 0,
            factorizations: 0,
            factor: None,
            degenerate: false,
        }
    }

    fn solve(&mut self, lo: &[Real], hi: &[Real]) -> Vec<Real> {
        let m = self.b.len();
        let tol = 1e-9 as Real;
        let budget = self.budget_factor.max(1) * m + 8;

        // Rows with equal bounds are pinned.
        for i in 0..m {
            if lo[i] == hi[i] {
                self.state[i] = RowState::AtLower;
            } else if self.state[i] == RowState::AtLower && !lo[i].is_finite() {
                self.state[i] = RowState::Free;
            } else if self.state[i] == RowState::AtUpper && !hi[i].is_finite() {
                self.state[i] = RowState::Free;
            }
        }

        for _ in 0..budget {
            let lambda = self.solve_free(lo, hi);

            // Primal: the worst free row outside its bounds gets clamped.
            let mut worst: Option<(usize, RowState, Real)> = None;
            for i in 0..m {
                if self.state[i] != RowState::Free {
                    continue;
                }
                let (clamp, violation) = if lambda[i] < lo[i] - tol {
                    (RowState::AtLower, lo[i] - lambda[i])
                } else if lambda[i] > hi[i] + tol {
                    (RowState::AtUpper, lambda[i] - hi[i])
                } else {
                    continue;
                };
                if worst.map_or(true, |(_, _, v)| violation > v) {
                    worst = Some((i, clamp, violation));
                }
            }
            if let Some((i, clamp, _)) = worst {
                self.state[i] = clamp;
                self.pivots += 1;
                continue;
            }

            // Dual: the worst clamped row whose residual points inward is
            // released.
            let w = self.a * DVector::from_column_slice(&lambda) - self.b;
            let mut worst: Option<(usize, Real)> = None;
            for i in 0..m {
                if lo[i] == hi[i] {
                    continue;
                }
                let violation = match self.state[i] {
                    RowState::AtLower if w[i] < -tol => -w[i],
                    RowState::AtUpper if w[i] > tol => w[i],
                    _ => continue,
                };
                if worst.map_or(true, |(_, v)| violation > v) {
                    worst = Some((i, violation));
                }
            }
            match worst {
                Some((i, _)) => {
                    self.state[i] = RowState::Free;
                    self.pivots += 1;
                }
                None => return lambda,
            }
        }

        warn!(rows = m, budget, "direct solver pivot budget exhausted, clamping");
        self.degenerate = true;
        let mut lambda = self.solve_free(lo, hi);
        for i in 0..m {
            lambda[i] = lambda[i].max(lo[i]).min(hi[i]);
        }
        lambda
    }

    /// Solve the free rows exactly with clamped rows held at their bounds.
    fn solve_free(&mut self, lo: &[Real], hi: &[Real]) -> Vec<Real> {
        let m = self.b.len();
        let mut lambda = vec![0.0; m];
        let mut free = Vec::with_capacity(m);
        for i in 0..m {
            match self.state[i] {
                RowState::Free => free.push(i),
                RowState::AtLower => lambda[i] = lo[i],
                RowState::AtUpper => lambda[i] = hi[i],
            }
        }
        if free.is_empty() {
            return lambda;
        }

        let rhs = if free.len() == m {
            self.b.clone()
        } else {
            let clamped = DVector::from_column_slice(&lambda);
            (self.b - self.a * clamped).select_rows(&free)
        };

        let x = match self.solve_block(&free, &rhs) {
            Some(x) => x,
            None => {
                warn!(free = free.len(), "singular island system, using zero forces");
                self.degenerate = true;
                DVector::zeros(free.len())
            }
        };
        for (k, &i) in free.iter().enumerate() {
            lambda[i] = x[k];
        }
        lambda
    }

    /// Solve the free block, reusing the factorization when the free set
    /// is unchanged since the last call.
    fn solve_block(&mut self, free: &[usize], rhs: &DVector<Real>) -> Option<DVector<Real>> {
        if let Some((cached, factor)) = &self.factor {
            if cached.as_slice() == free {
                if let Some(x) = factor.solve(rhs) {
                    return Some(x);
                }
            }
        }

        let a_ff = self.a.select_rows(free).select_columns(free);
        self.factorizations += 1;
        let factor = Factor::of(a_ff.clone())?;
        let x = match factor.solve(rhs) {
            Some(x) => x,
            None => {
                let shifted = Factor::shifted(a_ff)?;
                let x = shifted.solve(rhs)?;
                self.factor = Some((free.to_vec(), shifted));
                return Some(x);
            }
        };
        self.factor = Some((free.to_vec(), factor));
        Some(x)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::row::{ConstraintRow, JointOutput};
    use crate::system::SolverBody;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector3};

    fn body(velocity: Vector3<Real>, force: Vector3<Real>) -> SolverBody {
        SolverBody {
            inv_mass: 1.0,
            inv_inertia: Matrix3::identity(),
            linear_velocity: velocity,
            angular_velocity: Vector3::zeros(),
            force,
            torque: Vector3::zeros(),
        }
    }

    fn contact_rows(mu: Real) -> JointOutput {
        let mut out = JointOutput::new();
        let mut normal = ConstraintRow::new(0.0);
        normal.j1_linear = Vector3::z();
        normal.lo = 0.0;
        out.rows.push(normal);
        let mut friction = ConstraintRow::new(0.0);
        friction.j1_linear = Vector3::x();
        friction.lo = -mu;
        friction.hi = mu;
        friction.friction_of = Some(0);
        out.rows.push(friction);
        out
    }

    #[test]
    fn test_empty_system() {
        let sys = IslandSystem::new(0.01);
        assert!(DirectSolver::default().solve(&sys).lambda.is_empty());
    }

    #[test]
    fn test_resting_contact_supports_weight() {
        let mut sys = IslandSystem::new(0.01);
        let b = sys.push_body(body(Vector3::zeros(), Vector3::new(0.0, 0.0, -9.81)));
        let mut out = JointOutput::new();
        let mut row = ConstraintRow::new(0.0);
        row.j1_linear = Vector3::z();
        row.lo = 0.0;
        out.rows.push(row);
        sys.push_joint(b, None, &out);

        let sol = DirectSolver::default().solve(&sys);
        assert_relative_eq!(sol.lambda[0], 9.81, epsilon = 1e-9);
    }

    #[test]
    fn test_separating_contact_is_inactive() {
        let mut sys = IslandSystem::new(0.01);
        let b = sys.push_body(body(Vector3::new(0.0, 0.0, 5.0), Vector3::zeros()));
        let mut out = JointOutput::new();
        let mut row = ConstraintRow::new(0.0);
        row.j1_linear = Vector3::z();
        row.lo = 0.0;
        out.rows.push(row);
        sys.push_joint(b, None, &out);

        let sol = DirectSolver::default().solve(&sys);
        assert_eq!(sol.lambda[0], 0.0);
    }

    #[test]
    fn test_friction_sticks_below_cone() {
        // Weight 9.81, sideways push 2: mu = 1 holds it.
        let mut sys = IslandSystem::new(0.01);
        let b = sys.push_body(body(Vector3::zeros(), Vector3::new(2.0, 0.0, -9.81)));
        sys.push_joint(b, None, &contact_rows(1.0));

        let sol = DirectSolver::default().solve(&sys);
        assert_relative_eq!(sol.lambda[0], 9.81, epsilon = 1e-6);
        assert_relative_eq!(sol.lambda[1], -2.0, epsilon = 1e-6);
        let v = sys.solved_velocities(&sol.lambda);
        assert_relative_eq!(v[0].0.norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_friction_slips_at_cone() {
        // Weight 9.81, sideways push 5: mu = 0.2 caps friction at 1.962.
        let mut sys = IslandSystem::new(0.01);
        let b = sys.push_body(body(Vector3::zeros(), Vector3::new(5.0, 0.0, -9.81)));
        sys.push_joint(b, None, &contact_rows(0.2));

        let sol = DirectSolver::default().solve(&sys);
        assert_relative_eq!(sol.lambda[0], 9.81, epsilon = 1e-6);
        assert_relative_eq!(sol.lambda[1], -0.2 * 9.81, epsilon = 1e-6);
    }

    #[test]
    fn test_equality_rows_solved_exactly() {
        // Two bodies tied along x, one pushed: they share the push.
        let mut sys = IslandSystem::new(0.01);
        let a = sys.push_body(body(Vector3::zeros(), Vector3::new(4.0, 0.0, 0.0)));
        let b = sys.push_body(body(Vector3::zeros(), Vector3::zeros()));
        let mut out = JointOutput::new();
        let mut row = ConstraintRow::new(0.0);
        row.j1_linear = Vector3::x();
        row.j2_linear = -Vector3::x();
        out.rows.push(row);
        sys.push_joint(a, Some(b), &out);

        let sol = DirectSolver::default().solve(&sys);
        let v = sys.solved_velocities(&sol.lambda);
        assert_relative_eq!(v[0].0.x, v[1].0.x, epsilon = 1e-9);
        assert_relative_eq!(v[0].0.x, 0.02, epsilon = 1e-9);
    }

    #[test]
    fn test_unbounded_rows_need_no_pivots() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let mut lcp = BoxLcp::new(&a, &b, 4);
        let inf = Real::INFINITY;

        let lambda = lcp.solve(&[-inf, -inf], &[inf, inf]);

        assert_eq!(lcp.pivots, 0);
        assert_eq!(lcp.factorizations, 1);
        assert_relative_eq!(lambda[0], 0.2, epsilon = 1e-9);
        assert_relative_eq!(lambda[1], 0.6, epsilon = 1e-9);
    }

    #[test]
    fn test_factorization_reused_for_same_active_set() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let mut lcp = BoxLcp::new(&a, &b, 4);

        lcp.solve(&[-10.0, -10.0], &[10.0, 10.0]);
        lcp.solve(&[-20.0, -20.0], &[20.0, 20.0]);
        assert_eq!(lcp.factorizations, 1);

        // Pinning a row changes the free set.
        let lambda = lcp.solve(&[0.0, -20.0], &[0.0, 20.0]);
        assert_eq!(lcp.factorizations, 2);
        assert_eq!(lambda[0], 0.0);
        assert_relative_eq!(lambda[1], 2.0 / 3.0, epsilon = 1e-9);
    }
}
