//! Connectivity queries over the body/joint graph.
//!
//! Every body keeps the joints attached to it, so these queries walk the
//! shorter of the two bodies' joint lists. A `None` body stands for the
//! static environment.

use rigid_constraint::JointType;
use rigid_types::{BodyId, BodyKey, JointId, JointKey};

use crate::world::World;

impl World {
    /// Joints of `a` whose other end is `b`, in attachment order.
    fn joints_between(
        &self,
        a: BodyKey,
        b: Option<BodyKey>,
    ) -> impl Iterator<Item = JointKey> + '_ {
        self.bodies[a].joints.iter().copied().filter(move |&key| {
            let joint = &self.joints[key];
            match (joint.body1, joint.body2) {
                (Some(x), y) if x == a => y == b,
                (x, Some(y)) if y == a => x == b,
                _ => false,
            }
        })
    }

    /// Resolve a pair of query bodies, putting a present body first.
    fn query_pair(
        &self,
        a: Option<BodyId>,
        b: Option<BodyId>,
    ) -> rigid_types::Result<Option<(BodyKey, Option<BodyKey>)>> {
        let a = a.map(|id| self.body_key(id)).transpose()?;
        let b = b.map(|id| self.body_key(id)).transpose()?;
        Ok(match (a, b) {
            (Some(a), b) => {
                // Pick the body with fewer joints to scan.
                match b {
                    Some(b) if self.bodies[b].joints.len() < self.bodies[a].joints.len() => {
                        Some((b, Some(a)))
                    }
                    _ => Some((a, b)),
                }
            }
            (None, Some(b)) => Some((b, None)),
            (None, None) => None,
        })
    }

    /// A joint directly connecting `a` and `b`, if any.
    pub fn connecting_joint(
        &self,
        a: Option<BodyId>,
        b: Option<BodyId>,
    ) -> rigid_types::Result<Option<JointId>> {
        let Some((a, b)) = self.query_pair(a, b)? else {
            return Ok(None);
        };
        Ok(self.joints_between(a, b).next().map(|k| self.joint_id(k)))
    }

    /// All joints directly connecting `a` and `b`.
    pub fn connecting_joints(
        &self,
        a: Option<BodyId>,
        b: Option<BodyId>,
    ) -> rigid_types::Result<Vec<JointId>> {
        let Some((a, b)) = self.query_pair(a, b)? else {
            return Ok(Vec::new());
        };
        Ok(self.joints_between(a, b).map(|k| self.joint_id(k)).collect())
    }

    /// Whether any joint directly connects two bodies.
    pub fn are_connected(&self, a: BodyId, b: BodyId) -> rigid_types::Result<bool> {
        Ok(self.connecting_joint(Some(a), Some(b))?.is_some())
    }

    /// Whether a joint other than one of type `excluded` directly connects
    /// two bodies. Typically used to skip contact generation between bodies
    /// already held together by a non-contact joint.
    pub fn are_connected_excluding(
        &self,
        a: BodyId,
        b: BodyId,
        excluded: JointType,
    ) -> rigid_types::Result<bool> {
        let Some((a, b)) = self.query_pair(Some(a), Some(b))? else {
            return Ok(false);
        };
        Ok(self
            .joints_between(a, b)
            .any(|k| self.joints[k].joint_type() != excluded))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_queries() {
        let mut world = World::default();
        let a = world.create_body();
        let b = world.create_body();
        let c = world.create_body();

        let contact = world.create_joint(None, JointType::Contact).unwrap();
        world.attach_joint(contact, Some(a), Some(b)).unwrap();

        assert!(world.are_connected(a, b).unwrap());
        assert!(world.are_connected(b, a).unwrap());
        assert!(!world.are_connected(a, c).unwrap());
        assert!(!world
            .are_connected_excluding(a, b, JointType::Contact)
            .unwrap());

        let hinge = world.create_joint(None, JointType::Hinge).unwrap();
        world.attach_joint(hinge, Some(b), Some(a)).unwrap();
        assert!(world
            .are_connected_excluding(a, b, JointType::Contact)
            .unwrap());
        assert_eq!(
            world.connecting_joints(Some(a), Some(b)).unwrap(),
            vec![contact, hinge]
        );
        assert_eq!(
            world.connecting_joint(Some(b), Some(a)).unwrap(),
            Some(contact)
        );
    }

    #[test]
    fn test_static_connections() {
        let mut world = World::default();
        let a = world.create_body();
        let b = world.create_body();
        let j = world.create_joint(None, JointType::Ball).unwrap();
        world.attach_joint(j, None, Some(a)).unwrap();

        assert_eq!(world.connecting_joint(Some(a), None).unwrap(), Some(j));
        assert_eq!(world.connecting_joint(None, Some(a)).unwrap(), Some(j));
        assert_eq!(world.connecting_joint(Some(b), None).unwrap(), None);
        assert_eq!(world.connecting_joint(None, None).unwrap(), None);
    }

    #[test]
    fn test_destroyed_joint_disconnects() {
        let mut world = World::default();
        let a = world.create_body();
        let b = world.create_body();
        let j = world.create_joint(None, JointType::Fixed).unwrap();
        world.attach_joint(j, Some(a), Some(b)).unwrap();
        world.destroy_joint(j).unwrap();

        assert!(!world.are_connected(a, b).unwrap());
    }
}
