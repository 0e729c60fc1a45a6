//! Pairwise stepping: every joint is solved alone against its own two
//! bodies, and the island is relaxed over several substeps.
//!
//! Per island, with `h = dt / max_iterations`, each substep
//!
//! 1. adds `h M⁻¹ f_ext` to every body's velocity
//! 2. walks the joints in order; each builds its rows from the current
//!    poses, solves the one- or two-body system exactly and writes the new
//!    velocities back before the next joint sees them
//! 3. advances every pose by `h`
//!
//! Cost is linear in joint count per substep, so very large islands stay
//! cheap. Joints that share a body only see each other through the
//! velocities of earlier joints, so stiff loops and long chains sag more
//! than under a coupled solve. Joint feedback is the mean over substeps.
//!
//! Pairwise steps also wake disabled bodies only within
//! [`auto_enable_depth`](rigid_types::WorldConfig::auto_enable_depth) joint
//! hops of an enabled body; farther bodies wake on later steps.

use nalgebra::Vector3;
use rigid_constraint::{
    DirectSolver, Island, IslandSolver, IslandSystem, JointFeedback, JointOutput, RowContext,
    SolverBody,
};
use rigid_types::{BodyKey, JointKey, Real, Twist};

use crate::stepper::{ArenaSnapshot, StepMethod, StepReport};
use crate::world::World;

/// Totals of one island's pairwise solve.
#[derive(Debug, Default)]
pub(crate) struct PairwiseOutcome {
    /// Joints that produced rows.
    pub(crate) joints: usize,
    /// Rows per substep.
    pub(crate) rows: usize,
    /// Pivots summed over every joint and substep.
    pub(crate) iterations: usize,
    /// Whether any joint solve fell back on a degenerate system.
    pub(crate) degenerate: bool,
}

impl World {
    /// Advance the world by `dt`, solving each joint separately over
    /// `max_iterations` substeps.
    ///
    /// Cheaper than [`step`](Self::step) on large islands and less
    /// accurate on tightly coupled ones. More iterations trade speed for
    /// stiffness.
    ///
    /// # Errors
    ///
    /// Same as [`step`](Self::step), plus [`SimError::InvalidConfig`]
    /// when `max_iterations` is zero.
    ///
    /// [`SimError::InvalidConfig`]: rigid_types::SimError::InvalidConfig
    pub fn step_fast(
        &mut self,
        dt: Real,
        max_iterations: usize,
    ) -> rigid_types::Result<StepReport> {
        self.step_with(StepMethod::StepFast { max_iterations }, dt)
    }

    /// Relax one island joint by joint over `max_iterations` substeps.
    pub(crate) fn step_island_pairwise(
        &mut self,
        island: &Island,
        snapshot: &ArenaSnapshot,
        dt: Real,
        max_iterations: usize,
    ) -> PairwiseOutcome {
        let h = dt / max_iterations as Real;
        let config = self.config();
        let solver = DirectSolver::new(config.direct);
        let ctx = RowContext::new(h, config.erp, config.cfm)
            .with_max_correcting_vel(config.contact_max_correcting_vel)
            .with_surface_layer(config.contact_surface_layer);

        let bodies: Vec<BodyKey> = island
            .bodies
            .iter()
            .map(|&i| snapshot.body_keys[i])
            .collect();
        // Joints with their second body when it moves with this island.
        let joints: Vec<(JointKey, Option<BodyKey>)> = island
            .joints
            .iter()
            .map(|&i| snapshot.joint_keys[i])
            .filter(|&key| snapshot.local(island, self.joints[key].body1).is_some())
            .map(|key| {
                let body2 = self.joints[key].body2;
                let moving = snapshot.local(island, body2).and(body2);
                (key, moving)
            })
            .collect();

        let mut outcome = PairwiseOutcome {
            joints: joints.len(),
            ..PairwiseOutcome::default()
        };
        let mut feedback = vec![JointFeedback::default(); joints.len()];
        let mut output = JointOutput::new();

        for substep in 0..max_iterations {
            for &key in &bodies {
                let (force, torque) = self.external_load(key);
                let state = self.bodies[key].solver_state();
                let linear = state.linear_velocity + force * state.inv_mass * h;
                let angular = state.angular_velocity + state.inv_inertia * torque * h;
                self.bodies[key].state_mut().twist = Twist::new(linear, angular);
            }

            for (slot, &(key, body2)) in joints.iter().enumerate() {
                let (b1, b2) = self.joint_frames(key);
                let joint = &self.joints[key];
                let Some(body1) = joint.body1 else {
                    continue;
                };
                output.clear();
                joint
                    .kind
                    .build_rows(&ctx, &b1, b2.as_ref(), joint.reversed, &mut output);
                if substep == 0 {
                    outcome.rows += output.len();
                }
                if output.is_empty() {
                    continue;
                }

                let mut system = IslandSystem::new(h);
                let first =
                    system.push_body(SolverBody::new(&b1, Vector3::zeros(), Vector3::zeros()));
                let second = body2.zip(b2.as_ref()).map(|(_, state)| {
                    system.push_body(SolverBody::new(state, Vector3::zeros(), Vector3::zeros()))
                });
                let rows = system.push_joint(first, second, &output);

                let solution = solver.solve(&system);
                outcome.iterations += solution.iterations;
                outcome.degenerate |= solution.degenerate;

                let solved = system.feedback(rows, &solution.lambda);
                let mean = &mut feedback[slot];
                mean.force1 += solved.force1;
                mean.torque1 += solved.torque1;
                mean.force2 += solved.force2;
                mean.torque2 += solved.torque2;

                let velocities = system.solved_velocities(&solution.lambda);
                let pair = std::iter::once(body1).chain(body2);
                for (body, (linear, angular)) in pair.zip(velocities) {
                    self.bodies[body].state_mut().twist = Twist::new(linear, angular);
                }
            }

            for &key in &bodies {
                let twist = *self.bodies[key].twist();
                self.integrate_body(key, twist.linear, twist.angular, h);
            }
        }

        let scale = 1.0 / max_iterations as Real;
        for (&(key, _), solved) in joints.iter().zip(feedback) {
            if let Some(joint) = self.joints.get_mut(key) {
                joint.record_feedback(JointFeedback {
                    force1: solved.force1 * scale,
                    torque1: solved.torque1 * scale,
                    force2: solved.force2 * scale,
                    torque2: solved.torque2 * scale,
                });
            }
        }

        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use rigid_constraint::JointType;
    use rigid_types::{SimError, WorldConfig};

    fn pendulum(world: &mut World) -> (rigid_types::BodyId, rigid_types::JointId) {
        let bob = world.create_body_at(Point3::new(1.0, 0.0, 0.0));
        let j = world.create_joint(None, JointType::Ball).unwrap();
        world.attach_joint(j, Some(bob), None).unwrap();
        world.set_ball_anchor(j, Point3::origin()).unwrap();
        (bob, j)
    }

    #[test]
    fn test_free_fall_matches_direct_step() {
        let mut fast = World::new(WorldConfig::earth());
        let mut direct = World::new(WorldConfig::earth());
        let a = fast.create_body_at(Point3::new(0.0, 0.0, 10.0));
        let b = direct.create_body_at(Point3::new(0.0, 0.0, 10.0));

        fast.step_fast(0.01, 1).unwrap();
        direct.step(0.01).unwrap();

        let (a, b) = (fast.body(a).unwrap(), direct.body(b).unwrap());
        assert_relative_eq!(a.linear_vel(), b.linear_vel(), epsilon = 1e-12);
        assert_relative_eq!(a.position(), b.position(), epsilon = 1e-12);
    }

    #[test]
    fn test_single_joint_matches_direct_step() {
        // One joint is its own pair, so one substep solves the same system.
        let mut fast = World::new(WorldConfig::earth());
        let mut direct = World::new(WorldConfig::earth());
        let (a, _) = pendulum(&mut fast);
        let (b, _) = pendulum(&mut direct);

        for _ in 0..20 {
            fast.step_fast(0.01, 1).unwrap();
            direct.step(0.01).unwrap();
        }

        let (a, b) = (fast.body(a).unwrap(), direct.body(b).unwrap());
        assert_relative_eq!(a.position(), b.position(), epsilon = 1e-7);
        assert_relative_eq!(a.linear_vel(), b.linear_vel(), epsilon = 1e-7);
    }

    #[test]
    fn test_pendulum_keeps_anchor() {
        let mut world = World::new(WorldConfig::earth());
        let (bob, j) = pendulum(&mut world);

        for _ in 0..100 {
            world.step_fast(0.01, 4).unwrap();
        }

        let gap = (world.ball_anchor(j).unwrap() - world.ball_anchor2(j).unwrap()).norm();
        assert!(gap < 1e-2, "anchor gap {gap}");
        assert!(world.body(bob).unwrap().position().z < -0.1);
    }

    #[test]
    fn test_chain_holds_together() {
        let mut world = World::new(WorldConfig::earth());
        let mut previous = None;
        let mut joints = Vec::new();
        for i in 0..4 {
            let body = world.create_body_at(Point3::new((i + 1) as Real, 0.0, 0.0));
            let j = world.create_joint(None, JointType::Ball).unwrap();
            world.attach_joint(j, Some(body), previous).unwrap();
            world
                .set_ball_anchor(j, Point3::new(i as Real + 0.5, 0.0, 0.0))
                .unwrap();
            previous = Some(body);
            joints.push(j);
        }

        let report = world.step_fast(0.01, 10).unwrap();
        assert_eq!(report.method, StepMethod::StepFast { max_iterations: 10 });
        assert_eq!(report.islands, 1);
        assert_eq!(report.joints, 4);
        assert_eq!(report.rows, 12);

        for _ in 0..99 {
            world.step_fast(0.01, 10).unwrap();
        }
        for j in joints {
            let gap = (world.ball_anchor(j).unwrap() - world.ball_anchor2(j).unwrap()).norm();
            assert!(gap < 0.05, "anchor gap {gap}");
        }
    }

    #[test]
    fn test_feedback_averages_substeps() {
        let mut world = World::new(WorldConfig::earth());
        let bob = world.create_body_at(Point3::new(0.0, 0.0, -1.0));
        let j = world.create_joint(None, JointType::Ball).unwrap();
        world.attach_joint(j, Some(bob), None).unwrap();
        world.set_ball_anchor(j, Point3::origin()).unwrap();
        world.set_joint_feedback(j, true).unwrap();

        world.step_fast(0.01, 5).unwrap();

        let fb = world.joint_feedback(j).unwrap().unwrap();
        assert_relative_eq!(fb.force1.z, 9.81, epsilon = 1e-3);
        assert_eq!(fb.force2, Vector3::zeros());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut world = World::default();
        world.create_body();
        assert!(matches!(
            world.step_fast(0.01, 0),
            Err(SimError::InvalidConfig { .. })
        ));
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_wake_limited_to_auto_enable_depth() {
        let mut world = World::default();
        world.set_auto_enable_depth(1).unwrap();
        let chain: Vec<_> = (0..4)
            .map(|i| world.create_body_at(Point3::new(i as Real, 0.0, 0.0)))
            .collect();
        for pair in chain.windows(2) {
            let j = world.create_joint(None, JointType::Ball).unwrap();
            world.attach_joint(j, Some(pair[0]), Some(pair[1])).unwrap();
        }
        for &body in &chain[1..] {
            world.body_mut(body).unwrap().disable();
        }

        let report = world.step_fast(0.01, 2).unwrap();
        assert_eq!(report.woken, 1);
        assert!(world.body(chain[1]).unwrap().is_enabled());
        assert!(!world.body(chain[2]).unwrap().is_enabled());

        // Coupled steps wake the whole chain at once.
        let report = world.step(0.01).unwrap();
        assert_eq!(report.woken, 2);
    }
}
