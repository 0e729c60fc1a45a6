//! The simulation world: arenas of bodies, joints and joint groups.
//!
//! Every handle the world hands out carries the world's identity and a
//! generation-checked arena key. Lookups reject handles from another world
//! with [`SimError::ForeignHandle`] and handles whose object has been
//! destroyed with the matching `Invalid*` variant.

use nalgebra::{Point3, Vector3};
use rigid_types::{
    AutoDisableParams, BodyId, BodyKey, GroupKey, JointGroupId, JointId, JointKey, MassProperties,
    Real, RigidBodyState, SimError, WorldConfig, WorldId,
};
use slotmap::SlotMap;
use tracing::debug;

use crate::body::Body;
use crate::joint::Joint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A joint group: joints that are released together.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct JointGroup {
    pub(crate) joints: Vec<JointKey>,
}

/// The simulation world containing all bodies and joints.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct World {
    id: WorldId,
    config: WorldConfig,
    /// Simulated time.
    time: Real,
    /// Completed steps.
    step_count: u64,
    pub(crate) bodies: SlotMap<BodyKey, Body>,
    pub(crate) joints: SlotMap<JointKey, Joint>,
    pub(crate) groups: SlotMap<GroupKey, JointGroup>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    /// Create a new empty world with the given configuration.
    ///
    /// The configuration is taken as given; use [`World::try_new`] to
    /// validate it first.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        let id = WorldId::next();
        debug!(world = %id, "created world");
        Self {
            id,
            config,
            time: 0.0,
            step_count: 0,
            bodies: SlotMap::with_key(),
            joints: SlotMap::with_key(),
            groups: SlotMap::with_key(),
        }
    }

    /// Create a world after validating the configuration.
    pub fn try_new(config: WorldConfig) -> rigid_types::Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Identity of this world.
    #[must_use]
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Replace the whole configuration.
    pub fn set_config(&mut self, config: WorldConfig) -> rigid_types::Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Apply `edit` to a copy of the configuration and keep it if it
    /// validates.
    pub fn update_config(
        &mut self,
        edit: impl FnOnce(&mut WorldConfig),
    ) -> rigid_types::Result<()> {
        let mut config = self.config.clone();
        edit(&mut config);
        self.set_config(config)
    }

    /// Simulated time.
    #[must_use]
    pub fn time(&self) -> Real {
        self.time
    }

    /// Number of completed steps.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub(crate) fn advance_time(&mut self, dt: Real) {
        self.time += dt;
        self.step_count += 1;
    }

    /// Convert an impulse applied over one step of size `dt` into the force
    /// that produces it.
    #[must_use]
    pub fn impulse_to_force(dt: Real, impulse: &Vector3<Real>) -> Vector3<Real> {
        impulse / dt
    }

    /// Check configuration and that every body state is finite.
    pub fn validate(&self) -> rigid_types::Result<()> {
        self.config.validate()?;
        for body in self.bodies.values() {
            if !body.state().is_finite() {
                return Err(SimError::diverged(format!(
                    "non-finite state in {}",
                    body.id()
                )));
            }
        }
        Ok(())
    }

    // ---- global parameters ----

    /// Gravity.
    #[must_use]
    pub fn gravity(&self) -> Vector3<Real> {
        self.config.gravity
    }

    /// Set gravity.
    pub fn set_gravity(&mut self, gravity: Vector3<Real>) -> rigid_types::Result<()> {
        self.update_config(|c| c.gravity = gravity)
    }

    /// Global error-reduction parameter.
    #[must_use]
    pub fn erp(&self) -> Real {
        self.config.erp
    }

    /// Set the global error-reduction parameter.
    pub fn set_erp(&mut self, erp: Real) -> rigid_types::Result<()> {
        self.update_config(|c| c.erp = erp)
    }

    /// Global constraint force mixing.
    #[must_use]
    pub fn cfm(&self) -> Real {
        self.config.cfm
    }

    /// Set the global constraint force mixing.
    pub fn set_cfm(&mut self, cfm: Real) -> rigid_types::Result<()> {
        self.update_config(|c| c.cfm = cfm)
    }

    /// QuickStep sweep count.
    #[must_use]
    pub fn quick_step_iterations(&self) -> usize {
        self.config.quick_step.iterations
    }

    /// Set the QuickStep sweep count.
    pub fn set_quick_step_iterations(&mut self, iterations: usize) -> rigid_types::Result<()> {
        self.update_config(|c| c.quick_step.iterations = iterations)
    }

    /// QuickStep over-relaxation factor.
    #[must_use]
    pub fn quick_step_sor_w(&self) -> Real {
        self.config.quick_step.sor_w
    }

    /// Set the QuickStep over-relaxation factor.
    pub fn set_quick_step_sor_w(&mut self, sor_w: Real) -> rigid_types::Result<()> {
        self.update_config(|c| c.quick_step.sor_w = sor_w)
    }

    /// Bound on stabilization velocity.
    #[must_use]
    pub fn contact_max_correcting_vel(&self) -> Real {
        self.config.contact_max_correcting_vel
    }

    /// Set the bound on stabilization velocity.
    pub fn set_contact_max_correcting_vel(&mut self, vel: Real) -> rigid_types::Result<()> {
        self.update_config(|c| c.contact_max_correcting_vel = vel)
    }

    /// Contact surface layer depth.
    #[must_use]
    pub fn contact_surface_layer(&self) -> Real {
        self.config.contact_surface_layer
    }

    /// Set the contact surface layer depth.
    pub fn set_contact_surface_layer(&mut self, depth: Real) -> rigid_types::Result<()> {
        self.update_config(|c| c.contact_surface_layer = depth)
    }

    /// Joint hops [`step_fast`](Self::step_fast) wakes disabled bodies
    /// through.
    #[must_use]
    pub fn auto_enable_depth(&self) -> usize {
        self.config.auto_enable_depth
    }

    /// Set the wake depth of [`step_fast`](Self::step_fast).
    pub fn set_auto_enable_depth(&mut self, depth: usize) -> rigid_types::Result<()> {
        self.update_config(|c| c.auto_enable_depth = depth)
    }

    /// Auto-disable defaults bodies track unless overridden.
    #[must_use]
    pub fn auto_disable_defaults(&self) -> &AutoDisableParams {
        &self.config.auto_disable
    }

    /// Replace the auto-disable defaults.
    pub fn set_auto_disable_defaults(
        &mut self,
        params: AutoDisableParams,
    ) -> rigid_types::Result<()> {
        self.update_config(|c| c.auto_disable = params)
    }

    /// Default auto-disable flag.
    #[must_use]
    pub fn auto_disable_flag(&self) -> bool {
        self.config.auto_disable.enabled
    }

    /// Set the default auto-disable flag.
    pub fn set_auto_disable_flag(&mut self, enabled: bool) -> rigid_types::Result<()> {
        self.update_config(|c| c.auto_disable.enabled = enabled)
    }

    /// Default linear idle threshold.
    #[must_use]
    pub fn auto_disable_linear_threshold(&self) -> Real {
        self.config.auto_disable.linear_threshold
    }

    /// Set the default linear idle threshold.
    pub fn set_auto_disable_linear_threshold(&mut self, threshold: Real) -> rigid_types::Result<()> {
        self.update_config(|c| c.auto_disable.linear_threshold = threshold)
    }

    /// Default angular idle threshold.
    #[must_use]
    pub fn auto_disable_angular_threshold(&self) -> Real {
        self.config.auto_disable.angular_threshold
    }

    /// Set the default angular idle threshold.
    pub fn set_auto_disable_angular_threshold(
        &mut self,
        threshold: Real,
    ) -> rigid_types::Result<()> {
        self.update_config(|c| c.auto_disable.angular_threshold = threshold)
    }

    /// Default idle step count.
    #[must_use]
    pub fn auto_disable_steps(&self) -> u32 {
        self.config.auto_disable.idle_steps
    }

    /// Set the default idle step count.
    pub fn set_auto_disable_steps(&mut self, steps: u32) -> rigid_types::Result<()> {
        self.update_config(|c| c.auto_disable.idle_steps = steps)
    }

    /// Default idle time.
    #[must_use]
    pub fn auto_disable_time(&self) -> Real {
        self.config.auto_disable.idle_time
    }

    /// Set the default idle time.
    pub fn set_auto_disable_time(&mut self, time: Real) -> rigid_types::Result<()> {
        self.update_config(|c| c.auto_disable.idle_time = time)
    }

    // ---- handle resolution ----

    fn check_world(&self, handle_world: WorldId) -> rigid_types::Result<()> {
        if handle_world == self.id {
            Ok(())
        } else {
            Err(SimError::ForeignHandle {
                world: self.id,
                handle_world,
            })
        }
    }

    pub(crate) fn body_key(&self, id: BodyId) -> rigid_types::Result<BodyKey> {
        self.check_world(id.world())?;
        if self.bodies.contains_key(id.key()) {
            Ok(id.key())
        } else {
            Err(SimError::InvalidBody(id))
        }
    }

    pub(crate) fn joint_key(&self, id: JointId) -> rigid_types::Result<JointKey> {
        self.check_world(id.world())?;
        if self.joints.contains_key(id.key()) {
            Ok(id.key())
        } else {
            Err(SimError::InvalidJoint(id))
        }
    }

    pub(crate) fn group_key(&self, id: JointGroupId) -> rigid_types::Result<GroupKey> {
        self.check_world(id.world())?;
        if self.groups.contains_key(id.key()) {
            Ok(id.key())
        } else {
            Err(SimError::InvalidJointGroup(id))
        }
    }

    pub(crate) fn body_id(&self, key: BodyKey) -> BodyId {
        BodyId::new(self.id, key)
    }

    pub(crate) fn joint_id(&self, key: JointKey) -> JointId {
        JointId::new(self.id, key)
    }

    // ---- bodies ----

    /// Create a body at rest at the origin with unit sphere mass.
    ///
    /// The body tracks the world's auto-disable defaults until given its own.
    pub fn create_body(&mut self) -> BodyId {
        let world = self.id;
        let key = self
            .bodies
            .insert_with_key(|key| Body::new(BodyId::new(world, key)));
        self.body_id(key)
    }

    /// Create a body with the given state and mass.
    pub fn create_body_with(
        &mut self,
        state: RigidBodyState,
        mass: MassProperties,
    ) -> rigid_types::Result<BodyId> {
        let mut body = Body::new(BodyId::new(self.id, BodyKey::default()));
        body.set_mass(mass)?;
        *body.state_mut() = state;

        let world = self.id;
        let key = self.bodies.insert_with_key(|key| {
            body.set_id(BodyId::new(world, key));
            body
        });
        Ok(self.body_id(key))
    }

    /// Create a body at rest at `position`.
    pub fn create_body_at(&mut self, position: Point3<Real>) -> BodyId {
        let id = self.create_body();
        if let Some(body) = self.bodies.get_mut(id.key()) {
            body.set_position(position);
        }
        id
    }

    /// Destroy a body. Joints attached to it are detached from both ends
    /// and stay allocated in limbo.
    pub fn destroy_body(&mut self, id: BodyId) -> rigid_types::Result<()> {
        let key = self.body_key(id)?;
        let attached: Vec<JointKey> = self.bodies[key].joints.to_vec();
        for joint in attached {
            self.detach(joint);
        }
        self.bodies.remove(key);
        debug!(body = %id, "destroyed body");
        Ok(())
    }

    /// Look up a body.
    pub fn body(&self, id: BodyId) -> rigid_types::Result<&Body> {
        let key = self.body_key(id)?;
        Ok(&self.bodies[key])
    }

    /// Look up a body for modification.
    pub fn body_mut(&mut self, id: BodyId) -> rigid_types::Result<&mut Body> {
        let key = self.body_key(id)?;
        Ok(&mut self.bodies[key])
    }

    /// Check if `id` names a live body of this world.
    #[must_use]
    pub fn contains_body(&self, id: BodyId) -> bool {
        self.body_key(id).is_ok()
    }

    /// Iterate over all bodies.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    /// Iterate over all bodies mutably.
    pub fn bodies_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.bodies.values_mut()
    }

    /// Handles of all bodies.
    pub fn body_ids(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.bodies.keys().map(|key| self.body_id(key))
    }

    /// Number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Auto-disable parameters in effect for a body.
    pub fn body_auto_disable(&self, id: BodyId) -> rigid_types::Result<AutoDisableParams> {
        Ok(self.body(id)?.auto_disable(&self.config.auto_disable))
    }

    /// Edit a body's auto-disable parameters, starting from those in effect.
    /// The body stops tracking the world defaults.
    pub fn update_body_auto_disable(
        &mut self,
        id: BodyId,
        edit: impl FnOnce(&mut AutoDisableParams),
    ) -> rigid_types::Result<()> {
        let mut params = self.body_auto_disable(id)?;
        edit(&mut params);
        self.body_mut(id)?.set_auto_disable(params)
    }

    /// Number of joints attached to a body.
    pub fn body_joint_count(&self, id: BodyId) -> rigid_types::Result<usize> {
        Ok(self.body(id)?.num_joints())
    }

    /// Joint `index` among those attached to a body, in attachment order.
    pub fn body_joint(&self, id: BodyId, index: usize) -> rigid_types::Result<Option<JointId>> {
        Ok(self
            .body(id)?
            .joints
            .get(index)
            .map(|&key| self.joint_id(key)))
    }

    // ---- joint groups ----

    /// Create an empty joint group.
    pub fn create_joint_group(&mut self) -> JointGroupId {
        JointGroupId::new(self.id, self.groups.insert(JointGroup::default()))
    }

    /// Destroy every joint in a group. The group stays valid for reuse.
    pub fn empty_joint_group(&mut self, id: JointGroupId) -> rigid_types::Result<()> {
        let key = self.group_key(id)?;
        let joints = std::mem::take(&mut self.groups[key].joints);
        let count = joints.len();
        for joint in joints {
            self.remove_joint(joint);
        }
        debug!(group = %id, joints = count, "emptied joint group");
        Ok(())
    }

    /// Destroy every joint in a group, then the group itself.
    pub fn destroy_joint_group(&mut self, id: JointGroupId) -> rigid_types::Result<()> {
        self.empty_joint_group(id)?;
        self.groups.remove(id.key());
        Ok(())
    }

    /// Number of joints a group holds.
    pub fn joint_group_len(&self, id: JointGroupId) -> rigid_types::Result<usize> {
        let key = self.group_key(id)?;
        Ok(self.groups[key].joints.len())
    }

    /// Number of live joint groups.
    #[must_use]
    pub fn joint_group_count(&self) -> usize {
        self.groups.len()
    }
}
