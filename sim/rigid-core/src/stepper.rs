//! Stepping: one world step with the direct, the iterative or the pairwise
//! solver.
//!
//! A step runs these stages in order:
//!
//! 1. Validate the timestep and the world state
//! 2. Wake disabled bodies joined to enabled ones
//! 3. Partition enabled bodies into islands
//! 4. Per island: emit constraint rows, solve, update velocities, advance
//!    poses and record joint feedback (pairwise stepping does this per
//!    joint and substep, see [`step_fast`](World::step_fast))
//! 5. Update idle counters and auto-disable idle bodies
//! 6. Clear every body's force and torque accumulators
//! 7. Advance time and check for divergence
//!
//! Islands share no bodies or rows. With the `parallel` feature their
//! solves run on the rayon pool; results are applied in island order either
//! way, so both builds produce identical numbers.
//!
//! # Example
//!
//! ```
//! use rigid_core::World;
//! use rigid_types::WorldConfig;
//! use nalgebra::Point3;
//!
//! let mut world = World::new(WorldConfig::earth());
//! let body = world.create_body_at(Point3::new(0.0, 0.0, 10.0));
//!
//! for _ in 0..100 {
//!     world.step(0.01).unwrap();
//! }
//!
//! assert!(world.body(body).unwrap().position().z < 10.0);
//! assert_eq!(world.step_count(), 100);
//! ```

use std::ops::Range;

use hashbrown::HashMap;
use nalgebra::Vector3;
use rigid_constraint::{
    ConstraintIslands, DirectSolver, Island, IslandSolution, IslandSolver, IslandSystem,
    JointLink, JointOutput, QuickStepSolver, RowContext, SolverBody,
};
use rigid_types::{BodyKey, JointKey, Real, SimError, Twist};
use tracing::{debug, trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::integrators::{integrate_pose, RotationUpdate};
use crate::world::World;

/// Which solver a step uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StepMethod {
    /// Dense active-set LCP solve per island, `O(m³)` per pivot.
    #[default]
    Direct,
    /// Fixed number of SOR sweeps per island, `O(m · iterations)`.
    QuickStep,
    /// Each joint solved alone against its two bodies, repeated over
    /// `max_iterations` substeps, `O(joints · max_iterations)`.
    StepFast {
        /// Substeps per step, at least one.
        max_iterations: usize,
    },
}

/// Summary of one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Solver used.
    pub method: StepMethod,
    /// Islands solved.
    pub islands: usize,
    /// Bodies integrated.
    pub bodies: usize,
    /// Joints that produced rows.
    pub joints: usize,
    /// Constraint rows across all islands.
    pub rows: usize,
    /// Sweeps or pivots summed across islands.
    pub iterations: usize,
    /// Islands whose solve fell back on a degenerate system.
    pub degenerate_islands: usize,
    /// Bodies woken through joints before partitioning.
    pub woken: usize,
    /// Bodies auto-disabled after integration.
    pub disabled: usize,
}

/// Dense view of the arenas in slot order, taken before partitioning.
pub(crate) struct ArenaSnapshot {
    pub(crate) body_keys: Vec<BodyKey>,
    pub(crate) joint_keys: Vec<JointKey>,
    pub(crate) dense: HashMap<BodyKey, usize>,
}

impl ArenaSnapshot {
    fn new(world: &World) -> Self {
        let body_keys: Vec<BodyKey> = world.bodies.keys().collect();
        let dense = body_keys
            .iter()
            .enumerate()
            .map(|(i, &k)| (k, i))
            .collect();
        Self {
            body_keys,
            joint_keys: world.joints.keys().collect(),
            dense,
        }
    }

    /// Position of a body within an island, `None` for the environment
    /// and for bodies outside it.
    pub(crate) fn local(&self, island: &Island, key: Option<BodyKey>) -> Option<usize> {
        let index = self.dense.get(&key?)?;
        island.bodies.binary_search(index).ok()
    }
}

/// One island ready to solve.
struct PreparedIsland {
    system: IslandSystem,
    bodies: Vec<BodyKey>,
    joints: Vec<(JointKey, Range<usize>)>,
}

impl World {
    /// Advance the world by `dt` with the direct solver.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTimestep`] for a non-positive or
    /// non-finite `dt`, and [`SimError::Diverged`] if a body state is
    /// non-finite before or after the step.
    pub fn step(&mut self, dt: Real) -> rigid_types::Result<StepReport> {
        self.step_with(StepMethod::Direct, dt)
    }

    /// Advance the world by `dt` with the iterative solver.
    ///
    /// # Errors
    ///
    /// Same as [`step`](Self::step).
    pub fn quick_step(&mut self, dt: Real) -> rigid_types::Result<StepReport> {
        self.step_with(StepMethod::QuickStep, dt)
    }

    /// Advance the world by `dt` with the given solver.
    ///
    /// # Errors
    ///
    /// Same as [`step`](Self::step), plus [`SimError::InvalidConfig`] for
    /// [`StepMethod::StepFast`] with zero iterations.
    pub fn step_with(&mut self, method: StepMethod, dt: Real) -> rigid_types::Result<StepReport> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SimError::InvalidTimestep(dt));
        }
        let wake_depth = match method {
            StepMethod::StepFast { max_iterations: 0 } => {
                return Err(SimError::invalid_config(
                    "step fast needs at least one iteration",
                ));
            }
            StepMethod::StepFast { .. } => Some(self.config().auto_enable_depth),
            StepMethod::Direct | StepMethod::QuickStep => None,
        };
        self.validate()?;

        let mut report = StepReport {
            method,
            woken: self.wake_connected(wake_depth),
            ..StepReport::default()
        };

        let snapshot = ArenaSnapshot::new(self);
        let enabled: Vec<bool> = self.bodies.values().map(|b| b.is_enabled()).collect();
        let links: Vec<JointLink> = self
            .joints
            .values()
            .map(|j| JointLink {
                body1: j.body1.and_then(|k| snapshot.dense.get(&k).copied()),
                body2: j.body2.and_then(|k| snapshot.dense.get(&k).copied()),
            })
            .collect();

        let islands = ConstraintIslands::build(&enabled, &links);
        let stepped = match method {
            StepMethod::StepFast { max_iterations } => {
                let mut stepped = Vec::with_capacity(snapshot.body_keys.len());
                for (index, island) in islands.islands().iter().enumerate() {
                    let outcome =
                        self.step_island_pairwise(island, &snapshot, dt, max_iterations);
                    trace!(
                        island = index,
                        bodies = island.bodies.len(),
                        joints = outcome.joints,
                        iterations = outcome.iterations,
                        solver = "step_fast",
                        "solved island"
                    );
                    report.islands += 1;
                    report.bodies += island.bodies.len();
                    report.joints += outcome.joints;
                    report.rows += outcome.rows;
                    report.iterations += outcome.iterations;
                    report.degenerate_islands += usize::from(outcome.degenerate);
                    stepped.extend(island.bodies.iter().map(|&i| snapshot.body_keys[i]));
                }
                stepped
            }
            StepMethod::Direct | StepMethod::QuickStep => {
                self.step_islands_coupled(method, islands.islands(), &snapshot, dt, &mut report)
            }
        };

        report.disabled = self.update_idle(&stepped, dt);
        for body in self.bodies.values_mut() {
            body.clear_forces();
        }
        self.advance_time(dt);

        if let Err(err) = self.validate() {
            warn!(step = self.step_count(), error = %err, "simulation diverged");
            return Err(err);
        }

        debug!(
            step = self.step_count(),
            method = ?method,
            islands = report.islands,
            rows = report.rows,
            woken = report.woken,
            disabled = report.disabled,
            "stepped world"
        );
        Ok(report)
    }

    /// Solve every island as one coupled system. Returns the bodies stepped.
    fn step_islands_coupled(
        &mut self,
        method: StepMethod,
        islands: &[Island],
        snapshot: &ArenaSnapshot,
        dt: Real,
        report: &mut StepReport,
    ) -> Vec<BodyKey> {
        let prepared: Vec<PreparedIsland> = islands
            .iter()
            .map(|island| self.prepare_island(island, snapshot, dt))
            .collect();

        let direct;
        let quick;
        let solver: &(dyn IslandSolver + Sync) = if method == StepMethod::QuickStep {
            quick = QuickStepSolver::new(self.config().quick_step);
            &quick
        } else {
            direct = DirectSolver::new(self.config().direct);
            &direct
        };

        #[cfg(feature = "parallel")]
        let solutions: Vec<IslandSolution> = prepared
            .par_iter()
            .map(|island| solver.solve(&island.system))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let solutions: Vec<IslandSolution> = prepared
            .iter()
            .map(|island| solver.solve(&island.system))
            .collect();

        let mut stepped = Vec::with_capacity(snapshot.body_keys.len());
        for (index, (island, solution)) in prepared.iter().zip(&solutions).enumerate() {
            trace!(
                island = index,
                bodies = island.bodies.len(),
                rows = island.system.num_rows(),
                iterations = solution.iterations,
                solver = solver.name(),
                "solved island"
            );
            self.apply_solution(island, solution, dt);

            report.islands += 1;
            report.bodies += island.bodies.len();
            report.joints += island.joints.len();
            report.rows += island.system.num_rows();
            report.iterations += solution.iterations;
            report.degenerate_islands += usize::from(solution.degenerate);
            stepped.extend_from_slice(&island.bodies);
        }
        stepped
    }

    /// External force and torque on a body: its accumulators, gravity and
    /// the gyroscopic term.
    pub(crate) fn external_load(&self, key: BodyKey) -> (Vector3<Real>, Vector3<Real>) {
        let body = &self.bodies[key];
        let mut force = body.force();
        if body.gravity_mode() {
            force += self.config().gravity * body.mass().mass;
        }
        let w = body.angular_vel();
        let inertia = body.mass().world_inertia(&body.rotation());
        let torque = body.torque() - w.cross(&(inertia * w));
        (force, torque)
    }

    /// Set a body's velocities and advance its pose by `dt`.
    pub(crate) fn integrate_body(
        &mut self,
        key: BodyKey,
        linear: Vector3<Real>,
        angular: Vector3<Real>,
        dt: Real,
    ) {
        let Some(body) = self.bodies.get_mut(key) else {
            return;
        };
        let update = if body.finite_rotation_mode() {
            RotationUpdate::Finite {
                axis: body.finite_rotation_axis(),
            }
        } else {
            RotationUpdate::Infinitesimal
        };
        let state = body.state_mut();
        state.twist = Twist::new(linear, angular);
        integrate_pose(&mut state.pose, &state.twist, update, dt);
    }

    /// Gather one island's bodies, external loads and joint rows.
    fn prepare_island(
        &self,
        island: &Island,
        snapshot: &ArenaSnapshot,
        dt: Real,
    ) -> PreparedIsland {
        let config = self.config();
        let mut system = IslandSystem::new(dt);
        let mut bodies = Vec::with_capacity(island.bodies.len());

        for &index in &island.bodies {
            let key = snapshot.body_keys[index];
            let (force, torque) = self.external_load(key);
            system.push_body(SolverBody::new(&self.bodies[key].solver_state(), force, torque));
            bodies.push(key);
        }

        let ctx = RowContext::new(dt, config.erp, config.cfm)
            .with_max_correcting_vel(config.contact_max_correcting_vel)
            .with_surface_layer(config.contact_surface_layer);
        let mut output = JointOutput::new();
        let mut joints = Vec::with_capacity(island.joints.len());

        for &index in &island.joints {
            let key = snapshot.joint_keys[index];
            let joint = &self.joints[key];
            let Some(body1) = snapshot.local(island, joint.body1) else {
                continue;
            };
            let (b1, b2) = self.joint_frames(key);

            output.clear();
            joint
                .kind
                .build_rows(&ctx, &b1, b2.as_ref(), joint.reversed, &mut output);
            let rows = system.push_joint(body1, snapshot.local(island, joint.body2), &output);
            joints.push((key, rows));
        }

        PreparedIsland {
            system,
            bodies,
            joints,
        }
    }

    /// Write solved velocities, advance poses and record feedback.
    fn apply_solution(&mut self, island: &PreparedIsland, solution: &IslandSolution, dt: Real) {
        let velocities = island.system.solved_velocities(&solution.lambda);
        for (&key, (linear, angular)) in island.bodies.iter().zip(velocities) {
            self.integrate_body(key, linear, angular, dt);
        }

        for (key, rows) in &island.joints {
            if let Some(joint) = self.joints.get_mut(*key) {
                joint.record_feedback(island.system.feedback(rows.clone(), &solution.lambda));
            }
        }
    }
}
