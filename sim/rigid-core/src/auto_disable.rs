//! Auto-disable: idle tracking and wake propagation.
//!
//! A body is either enabled or disabled. Per step:
//!
//! ```text
//!   Disabled ──(joint to an enabled body, before islands)──▶ Enabled
//!              (pairwise steps: within auto_enable_depth hops)
//!   Disabled ──(enable() or a non-negligible added force)──▶ Enabled
//!   Enabled  ──(idle for idle_steps steps and idle_time)───▶ Disabled
//! ```
//!
//! "Idle" means linear and angular speed both at or below their
//! thresholds. Exceeding either threshold resets the counters. The
//! parameters come from the body's override when it has one and from the
//! world defaults otherwise.

use std::collections::VecDeque;

use rigid_types::{BodyKey, Real, Twist};
use tracing::trace;

use crate::world::World;

impl World {
    /// Enable every disabled body reachable through joints from an enabled
    /// body, at most `depth` joint hops away when a depth is given. Returns
    /// the number of bodies woken.
    pub(crate) fn wake_connected(&mut self, depth: Option<usize>) -> usize {
        let mut queue: VecDeque<(BodyKey, usize)> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.is_enabled())
            .map(|(k, _)| (k, 0))
            .collect();
        let mut woken = 0;

        while let Some((key, hops)) = queue.pop_front() {
            if depth.is_some_and(|limit| hops >= limit) {
                continue;
            }
            let joints = self.bodies[key].joints.clone();
            for joint in joints {
                let Some(joint) = self.joints.get(joint) else {
                    continue;
                };
                let other = if joint.body1 == Some(key) {
                    joint.body2
                } else {
                    joint.body1
                };
                let Some(other) = other else {
                    continue;
                };
                let body = &mut self.bodies[other];
                if !body.is_enabled() {
                    body.enable();
                    woken += 1;
                    queue.push_back((other, hops + 1));
                }
            }
        }

        if woken > 0 {
            trace!(woken, ?depth, "woke bodies joined to enabled bodies");
        }
        woken
    }

    /// Update idle counters of the bodies stepped this step and disable
    /// those idle long enough. Returns the number of bodies disabled.
    pub(crate) fn update_idle(&mut self, stepped: &[BodyKey], dt: Real) -> usize {
        let defaults = self.config().auto_disable;
        let mut disabled = 0;

        for &key in stepped {
            let Some(body) = self.bodies.get_mut(key) else {
                continue;
            };
            let params = body.auto_disable(&defaults);
            if !params.enabled || !body.is_enabled() {
                continue;
            }

            let twist = body.twist();
            let idle = twist.speed() <= params.linear_threshold
                && twist.angular_speed() <= params.angular_threshold;
            if !idle {
                body.reset_idle();
                continue;
            }

            let (steps, time) = body.record_idle(dt);
            if steps >= params.idle_steps && time >= params.idle_time {
                body.state_mut().twist = Twist::zero();
                body.disable();
                disabled += 1;
            }
        }

        if disabled > 0 {
            trace!(disabled, "auto-disabled idle bodies");
        }
        disabled
    }
}
