//! QuickStep: projected successive over-relaxation on the island system.
//!
//! The solver never forms `A`. It keeps, per body, the accumulated
//! `M⁻¹ Jᵀ λ` and updates each row in turn:
//!
//! ```text
//! δ   = ω (b_i - (cfm_i / h) λ_i - J_i · fc) / (J_i M⁻¹ J_iᵀ + cfm_i / h)
//! λ_i = clamp(λ_i + δ, lo_i, hi_i)
//! fc += (λ_i' - λ_i) M⁻¹ J_iᵀ
//! ```
//!
//! Exactly `iterations` sweeps are run; there is no convergence test, so the
//! cost is `O(m · iterations)` and results are only as accurate as the sweep
//! count allows.

use nalgebra::Vector3;
use rigid_types::{QuickStepConfig, Real};
use tracing::trace;

use crate::system::{IslandSolution, IslandSolver, IslandSystem};

/// Iterative relaxation solver.
#[derive(Debug, Clone, Default)]
pub struct QuickStepSolver {
    config: QuickStepConfig,
}

impl QuickStepSolver {
    /// Solver with the given configuration.
    #[must_use]
    pub fn new(config: QuickStepConfig) -> Self {
        Self { config }
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &QuickStepConfig {
        &self.config
    }
}

impl IslandSolver for QuickStepSolver {
    fn solve(&self, system: &IslandSystem) -> IslandSolution {
        let m = system.num_rows();
        if m == 0 {
            return IslandSolution::default();
        }

        let rows = system.rows();
        let responses = system.responses();
        let rhs = system.rhs();
        let softness = system.softness();
        let omega = self.config.sor_w;

        // Relaxed inverse diagonal of A.
        let mut degenerate = false;
        let inv_diag: Vec<Real> = (0..m)
            .map(|i| {
                let d = system.coupling(i, i, &responses[i]) + softness[i];
                if d > Real::EPSILON {
                    omega / d
                } else {
                    degenerate = true;
                    0.0
                }
            })
            .collect();

        let mut lambda = vec![0.0; m];
        let mut fc: Vec<(Vector3<Real>, Vector3<Real>)> =
            vec![(Vector3::zeros(), Vector3::zeros()); system.bodies().len()];

        for _ in 0..self.config.iterations {
            for i in 0..m {
                let (lo, hi) = system.bounds(i, &lambda);
                let residual = rhs[i] - softness[i] * lambda[i] - system.row_dot(i, &fc);
                let old = lambda[i];
                let new = (old + inv_diag[i] * residual).max(lo).min(hi);
                let delta = new - old;
                lambda[i] = new;

                let r = &rows[i];
                let resp = &responses[i];
                fc[r.body1].0 += resp.linear1 * delta;
                fc[r.body1].1 += resp.angular1 * delta;
                if let Some(b2) = r.body2 {
                    fc[b2].0 += resp.linear2 * delta;
                    fc[b2].1 += resp.angular2 * delta;
                }
            }
        }

        trace!(rows = m, sweeps = self.config.iterations, "quickstep solved island");
        IslandSolution {
            lambda,
            iterations: self.config.iterations,
            degenerate,
        }
    }

    fn name(&self) -> &'static str {
        "quickstep"
    }
}
