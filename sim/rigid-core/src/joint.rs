//! Joints as owned by the world.
//!
//! A [`Joint`] wraps a [`JointKind`] model with its attachment: up to two
//! bodies, an optional owning group, an optional feedback record and user
//! data. The world methods here resolve handles, hand each model the
//! current [`BodyState`] of its bodies and translate between the caller's
//! view of the joint and its stored orientation.
//!
//! # Reversed joints
//!
//! Attaching a joint to `(None, Some(b))` stores `b` as body 1 against the
//! static environment and marks the joint reversed. Accessors keep the
//! caller's view: [`World::connected_body`] reports the bodies as given,
//! the two anchors swap, hinge/slider/hinge-2 angles, positions, rates and
//! torques change sign, universal axes swap with negated angles, and motor
//! axis frames anchored to body 1 or 2 swap. Stops and motor targets act on
//! the stored orientation.

use nalgebra::{Point3, Vector3};
use rigid_constraint::{
    AMotorMode, AxisFrame, BodyState, ContactJoint, JointFeedback, JointKind, JointType, Load,
    ParamKey, MAX_MOTOR_AXES,
};
use rigid_types::{BodyId, BodyKey, GroupKey, JointGroupId, JointId, JointKey, Real, SimError};
use tracing::debug;

use crate::world::World;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A joint and its attachment.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Joint {
    id: JointId,
    pub(crate) kind: JointKind,
    pub(crate) body1: Option<BodyKey>,
    pub(crate) body2: Option<BodyKey>,
    pub(crate) reversed: bool,
    group: Option<GroupKey>,
    feedback: Option<JointFeedback>,
    user_data: u64,
}

impl Joint {
    fn new(id: JointId, kind: JointKind, group: Option<GroupKey>) -> Self {
        Self {
            id,
            kind,
            body1: None,
            body2: None,
            reversed: false,
            group,
            feedback: None,
            user_data: 0,
        }
    }

    /// Handle of this joint.
    #[must_use]
    pub fn id(&self) -> JointId {
        self.id
    }

    /// Variant tag.
    #[must_use]
    pub fn joint_type(&self) -> JointType {
        self.kind.joint_type()
    }

    /// The joint model.
    #[must_use]
    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    /// Whether the only attached body was given as body 2.
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Whether the joint is attached to no body.
    #[must_use]
    pub fn is_limbo(&self) -> bool {
        self.body1.is_none() && self.body2.is_none()
    }

    /// Whether a joint group owns this joint.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.group.is_some()
    }

    /// Forces from the last step, if feedback is enabled.
    #[must_use]
    pub fn feedback(&self) -> Option<&JointFeedback> {
        self.feedback.as_ref()
    }

    /// Opaque value owned by the caller.
    #[must_use]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    /// Store solved forces, expressed for the caller's body order.
    pub(crate) fn record_feedback(&mut self, solved: JointFeedback) {
        if let Some(slot) = self.feedback.as_mut() {
            *slot = if self.reversed {
                JointFeedback {
                    force2: solved.force1,
                    torque2: solved.torque1,
                    ..JointFeedback::default()
                }
            } else {
                solved
            };
        }
    }
}

fn flip(value: Real, reversed: bool) -> Real {
    if reversed {
        -value
    } else {
        value
    }
}

fn frame_for(frame: AxisFrame, reversed: bool) -> AxisFrame {
    if reversed {
        frame.swapped()
    } else {
        frame
    }
}

impl World {
    // ---- lifecycle ----

    /// Create a joint in limbo, optionally owned by `group`.
    ///
    /// Stops and motors start with the world's ERP and CFM.
    pub fn create_joint(
        &mut self,
        group: Option<JointGroupId>,
        ty: JointType,
    ) -> rigid_types::Result<JointId> {
        let kind = JointKind::new(ty, self.erp(), self.cfm());
        self.insert_joint(group, kind)
    }

    /// Create a contact joint from its geometry and surface parameters.
    pub fn create_contact(
        &mut self,
        group: Option<JointGroupId>,
        contact: ContactJoint,
    ) -> rigid_types::Result<JointId> {
        self.insert_joint(group, JointKind::Contact(contact))
    }

    fn insert_joint(
        &mut self,
        group: Option<JointGroupId>,
        kind: JointKind,
    ) -> rigid_types::Result<JointId> {
        let group = group.map(|g| self.group_key(g)).transpose()?;
        let world = self.id();
        let key = self
            .joints
            .insert_with_key(|key| Joint::new(JointId::new(world, key), kind, group));
        if let Some(group) = group {
            self.groups[group].joints.push(key);
        }
        Ok(self.joint_id(key))
    }

    /// Destroy a joint. Joints owned by a group are released only with the
    /// group, so this is a no-op for them.
    pub fn destroy_joint(&mut self, id: JointId) -> rigid_types::Result<()> {
        let key = self.joint_key(id)?;
        if self.joints[key].is_grouped() {
            debug!(joint = %id, "ignoring destroy of grouped joint");
            return Ok(());
        }
        self.remove_joint(key);
        Ok(())
    }

    pub(crate) fn remove_joint(&mut self, key: JointKey) {
        self.detach(key);
        self.joints.remove(key);
    }

    /// Drop a joint from its bodies' joint lists and put it in limbo.
    pub(crate) fn detach(&mut self, key: JointKey) {
        let Some(joint) = self.joints.get_mut(key) else {
            return;
        };
        let ends = [joint.body1.take(), joint.body2.take()];
        joint.reversed = false;
        for body in ends.into_iter().flatten() {
            if let Some(body) = self.bodies.get_mut(body) {
                body.joints.retain(|j| *j != key);
            }
        }
    }

    /// Attach a joint to two bodies; `None` stands for the static
    /// environment and `(None, None)` puts the joint in limbo.
    ///
    /// Anchors and axes keep their world placement across the move.
    ///
    /// # Errors
    ///
    /// Fails on invalid handles, or with [`SimError::SelfAttachment`] when
    /// both ends are the same body.
    pub fn attach_joint(
        &mut self,
        id: JointId,
        body1: Option<BodyId>,
        body2: Option<BodyId>,
    ) -> rigid_types::Result<()> {
        let key = self.joint_key(id)?;
        let b1 = body1.map(|b| self.body_key(b)).transpose()?;
        let b2 = body2.map(|b| self.body_key(b)).transpose()?;
        if b1.is_some() && b1 == b2 {
            return Err(SimError::SelfAttachment(id));
        }
        let (new1, new2, reversed) = match (b1, b2) {
            (None, Some(b)) => (Some(b), None, true),
            (a, b) => (a, b, false),
        };

        let old = self.joint_frames(key);
        self.detach(key);
        for body in [new1, new2].into_iter().flatten() {
            self.bodies[body].joints.push(key);
        }
        let joint = &mut self.joints[key];
        joint.body1 = new1;
        joint.body2 = new2;
        joint.reversed = reversed;

        let new = self.joint_frames(key);
        self.joints[key]
            .kind
            .rebind((&old.0, old.1.as_ref()), (&new.0, new.1.as_ref()));
        Ok(())
    }

    /// Current states of a joint's stored body 1 and body 2.
    pub(crate) fn joint_frames(&self, key: JointKey) -> (BodyState, Option<BodyState>) {
        let joint = &self.joints[key];
        let state = |k: Option<BodyKey>| k.and_then(|k| self.bodies.get(k)).map(|b| b.solver_state());
        (
            state(joint.body1).unwrap_or_else(BodyState::fixed),
            state(joint.body2),
        )
    }

    // ---- lookup ----

    /// Look up a joint.
    pub fn joint(&self, id: JointId) -> rigid_types::Result<&Joint> {
        let key = self.joint_key(id)?;
        Ok(&self.joints[key])
    }

    /// Iterate over all joints.
    pub fn joints(&self) -> impl Iterator<Item = &Joint> {
        self.joints.values()
    }

    /// Handles of all joints.
    pub fn joint_ids(&self) -> impl Iterator<Item = JointId> + '_ {
        self.joints.keys().map(|key| self.joint_id(key))
    }

    /// Number of joints.
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Variant of a joint.
    pub fn joint_type(&self, id: JointId) -> rigid_types::Result<JointType> {
        Ok(self.joint(id)?.joint_type())
    }

    /// Body `index` (0 or 1) as given to [`attach_joint`](Self::attach_joint).
    pub fn connected_body(&self, id: JointId, index: usize) -> rigid_types::Result<Option<BodyId>> {
        let joint = self.joint(id)?;
        let (first, second) = if joint.reversed {
            (joint.body2, joint.body1)
        } else {
            (joint.body1, joint.body2)
        };
        let key = match index {
            0 => first,
            1 => second,
            _ => return Err(SimError::AxisOutOfRange { index, count: 2 }),
        };
        Ok(key.map(|k| self.body_id(k)))
    }

    /// Start or stop recording the forces this joint applies.
    pub fn set_joint_feedback(&mut self, id: JointId, enabled: bool) -> rigid_types::Result<()> {
        let key = self.joint_key(id)?;
        let joint = &mut self.joints[key];
        match (enabled, joint.feedback.is_some()) {
            (true, false) => joint.feedback = Some(JointFeedback::default()),
            (false, _) => joint.feedback = None,
            (true, true) => {}
        }
        Ok(())
    }

    /// Forces the joint applied in the last step, if feedback is enabled.
    pub fn joint_feedback(&self, id: JointId) -> rigid_types::Result<Option<JointFeedback>> {
        Ok(self.joint(id)?.feedback)
    }

    /// Opaque joint value.
    pub fn joint_user_data(&self, id: JointId) -> rigid_types::Result<u64> {
        Ok(self.joint(id)?.user_data)
    }

    /// Store an opaque joint value.
    pub fn set_joint_user_data(&mut self, id: JointId, data: u64) -> rigid_types::Result<()> {
        let key = self.joint_key(id)?;
        self.joints[key].user_data = data;
        Ok(())
    }

    // ---- parameters ----

    /// Read a limit, motor or suspension parameter.
    pub fn joint_param(&self, id: JointId, key: ParamKey) -> rigid_types::Result<Real> {
        self.joint(id)?.kind.param(key)
    }

    /// Write a limit, motor or suspension parameter.
    pub fn set_joint_param(
        &mut self,
        id: JointId,
        key: ParamKey,
        value: Real,
    ) -> rigid_types::Result<()> {
        let jk = self.joint_key(id)?;
        self.joints[jk].kind.set_param(key, value)
    }

    /// Read a parameter by integer code.
    pub fn joint_param_by_code(&self, id: JointId, code: i32) -> rigid_types::Result<Real> {
        self.joint(id)?.kind.param_by_code(code)
    }

    /// Write a parameter by integer code.
    pub fn set_joint_param_by_code(
        &mut self,
        id: JointId,
        code: i32,
        value: Real,
    ) -> rigid_types::Result<()> {
        let key = self.joint_key(id)?;
        self.joints[key].kind.set_param_by_code(code, value)
    }

    // ---- model access ----

    fn read_joint<T>(
        &self,
        id: JointId,
        read: impl FnOnce(&JointKind, &BodyState, Option<&BodyState>, bool) -> rigid_types::Result<T>,
    ) -> rigid_types::Result<T> {
        let key = self.joint_key(id)?;
        let (b1, b2) = self.joint_frames(key);
        let joint = &self.joints[key];
        read(&joint.kind, &b1, b2.as_ref(), joint.reversed)
    }

    fn write_joint<T>(
        &mut self,
        id: JointId,
        write: impl FnOnce(
            &mut JointKind,
            &BodyState,
            Option<&BodyState>,
            bool,
        ) -> rigid_types::Result<T>,
    ) -> rigid_types::Result<T> {
        let key = self.joint_key(id)?;
        let (b1, b2) = self.joint_frames(key);
        let joint = &mut self.joints[key];
        write(&mut joint.kind, &b1, b2.as_ref(), joint.reversed)
    }

    fn apply_joint_loads(
        &mut self,
        id: JointId,
        loads: impl FnOnce(
            &JointKind,
            &BodyState,
            Option<&BodyState>,
            bool,
        ) -> rigid_types::Result<(Load, Load)>,
    ) -> rigid_types::Result<()> {
        let (load1, load2) = self.read_joint(id, loads)?;
        let joint = &self.joints[id.key()];
        let ends = [(joint.body1, load1), (joint.body2, load2)];
        for (key, load) in ends {
            if let Some(body) = key.and_then(|k| self.bodies.get_mut(k)) {
                body.add_force(load.force);
                body.add_torque(load.torque);
            }
        }
        Ok(())
    }

    /// Contact model of a contact joint.
    pub fn contact(&self, id: JointId) -> rigid_types::Result<&ContactJoint> {
        self.joint(id)?.kind.as_contact()
    }

    /// Mutable contact model of a contact joint.
    pub fn contact_mut(&mut self, id: JointId) -> rigid_types::Result<&mut ContactJoint> {
        let key = self.joint_key(id)?;
        self.joints[key].kind.as_contact_mut()
    }

    // ---- ball ----

    /// Set the ball anchor from a world point.
    pub fn set_ball_anchor(&mut self, id: JointId, anchor: Point3<Real>) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, _| {
            k.as_ball_mut()?.set_anchor(b1, b2, &anchor);
            Ok(())
        })
    }

    /// Ball anchor as carried by body 1.
    pub fn ball_anchor(&self, id: JointId) -> rigid_types::Result<Point3<Real>> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_ball()?;
            Ok(if rev { j.anchor2(b2) } else { j.anchor(b1) })
        })
    }

    /// Ball anchor as carried by body 2.
    pub fn ball_anchor2(&self, id: JointId) -> rigid_types::Result<Point3<Real>> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_ball()?;
            Ok(if rev { j.anchor(b1) } else { j.anchor2(b2) })
        })
    }

    // ---- hinge ----

    /// Set the hinge anchor from a world point.
    pub fn set_hinge_anchor(&mut self, id: JointId, anchor: Point3<Real>) -> rigid_types::Result<()> {
        self.set_hinge_anchor_delta(id, anchor, Vector3::zeros())
    }

    /// Set the hinge anchor with body 1's copy displaced by `delta`.
    pub fn set_hinge_anchor_delta(
        &mut self,
        id: JointId,
        anchor: Point3<Real>,
        delta: Vector3<Real>,
    ) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, _| {
            k.as_hinge_mut()?.set_anchor_delta(b1, b2, &anchor, &delta);
            Ok(())
        })
    }

    /// Set the hinge axis from a world direction.
    pub fn set_hinge_axis(&mut self, id: JointId, axis: Vector3<Real>) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, _| k.as_hinge_mut()?.set_axis(b1, b2, &axis))
    }

    /// Hinge anchor as carried by body 1.
    pub fn hinge_anchor(&self, id: JointId) -> rigid_types::Result<Point3<Real>> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_hinge()?;
            Ok(if rev { j.anchor2(b2) } else { j.anchor(b1) })
        })
    }

    /// Hinge anchor as carried by body 2.
    pub fn hinge_anchor2(&self, id: JointId) -> rigid_types::Result<Point3<Real>> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_hinge()?;
            Ok(if rev { j.anchor(b1) } else { j.anchor2(b2) })
        })
    }

    /// Hinge axis in world coordinates.
    pub fn hinge_axis(&self, id: JointId) -> rigid_types::Result<Vector3<Real>> {
        self.read_joint(id, |k, b1, _, _| Ok(k.as_hinge()?.axis(b1)))
    }

    /// Hinge angle, zero where the axis was set.
    pub fn hinge_angle(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| Ok(flip(k.as_hinge()?.angle(b1, b2), rev)))
    }

    /// Hinge angular rate.
    pub fn hinge_angle_rate(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| {
            Ok(flip(k.as_hinge()?.angle_rate(b1, b2), rev))
        })
    }

    /// Apply equal and opposite torques about the hinge axis.
    pub fn add_hinge_torque(&mut self, id: JointId, torque: Real) -> rigid_types::Result<()> {
        self.apply_joint_loads(id, |k, b1, _, rev| {
            Ok(k.as_hinge()?.torque_loads(b1, flip(torque, rev)))
        })
    }

    // ---- slider ----

    /// Set the slider axis from a world direction.
    pub fn set_slider_axis(&mut self, id: JointId, axis: Vector3<Real>) -> rigid_types::Result<()> {
        self.set_slider_axis_delta(id, axis, Vector3::zeros())
    }

    /// Set the slider axis with position zero displaced by `delta`.
    pub fn set_slider_axis_delta(
        &mut self,
        id: JointId,
        axis: Vector3<Real>,
        delta: Vector3<Real>,
    ) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, _| {
            k.as_slider_mut()?.set_axis_delta(b1, b2, &axis, &delta)
        })
    }

    /// Slider axis in world coordinates.
    pub fn slider_axis(&self, id: JointId) -> rigid_types::Result<Vector3<Real>> {
        self.read_joint(id, |k, b1, _, _| Ok(k.as_slider()?.axis(b1)))
    }

    /// Slider displacement along the axis.
    pub fn slider_position(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| {
            Ok(flip(k.as_slider()?.position(b1, b2), rev))
        })
    }

    /// Slider displacement rate.
    pub fn slider_position_rate(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| {
            Ok(flip(k.as_slider()?.position_rate(b1, b2), rev))
        })
    }

    /// Apply equal and opposite forces along the slider axis.
    pub fn add_slider_force(&mut self, id: JointId, force: Real) -> rigid_types::Result<()> {
        self.apply_joint_loads(id, |k, b1, b2, rev| {
            Ok(k.as_slider()?.force_loads(b1, b2, flip(force, rev)))
        })
    }

    // ---- universal ----

    /// Set the universal anchor from a world point.
    pub fn set_universal_anchor(
        &mut self,
        id: JointId,
        anchor: Point3<Real>,
    ) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, _| {
            k.as_universal_mut()?.set_anchor(b1, b2, &anchor);
            Ok(())
        })
    }

    /// Set axis 1 (carried by body 1) from a world direction.
    pub fn set_universal_axis1(&mut self, id: JointId, axis: Vector3<Real>) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, rev| {
            let j = k.as_universal_mut()?;
            if rev {
                j.set_axis2(b1, b2, &axis)
            } else {
                j.set_axis1(b1, b2, &axis)
            }
        })
    }

    /// Set axis 2 (carried by body 2) from a world direction.
    pub fn set_universal_axis2(&mut self, id: JointId, axis: Vector3<Real>) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, rev| {
            let j = k.as_universal_mut()?;
            if rev {
                j.set_axis1(b1, b2, &axis)
            } else {
                j.set_axis2(b1, b2, &axis)
            }
        })
    }

    /// Universal anchor as carried by body 1.
    pub fn universal_anchor(&self, id: JointId) -> rigid_types::Result<Point3<Real>> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_universal()?;
            Ok(if rev { j.anchor2(b2) } else { j.anchor(b1) })
        })
    }

    /// Universal anchor as carried by body 2.
    pub fn universal_anchor2(&self, id: JointId) -> rigid_types::Result<Point3<Real>> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_universal()?;
            Ok(if rev { j.anchor(b1) } else { j.anchor2(b2) })
        })
    }

    /// Universal axis 1 in world coordinates.
    pub fn universal_axis1(&self, id: JointId) -> rigid_types::Result<Vector3<Real>> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_universal()?;
            Ok(if rev { j.axis2(b2) } else { j.axis1(b1) })
        })
    }

    /// Universal axis 2 in world coordinates.
    pub fn universal_axis2(&self, id: JointId) -> rigid_types::Result<Vector3<Real>> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_universal()?;
            Ok(if rev { j.axis1(b1) } else { j.axis2(b2) })
        })
    }

    /// Rotation about universal axis 1.
    pub fn universal_angle1(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_universal()?;
            Ok(if rev { -j.angle2(b1, b2) } else { j.angle1(b1, b2) })
        })
    }

    /// Rotation about universal axis 2.
    pub fn universal_angle2(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_universal()?;
            Ok(if rev { -j.angle1(b1, b2) } else { j.angle2(b1, b2) })
        })
    }

    /// Rate about universal axis 1.
    pub fn universal_angle1_rate(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_universal()?;
            Ok(if rev {
                -j.angle2_rate(b1, b2)
            } else {
                j.angle1_rate(b1, b2)
            })
        })
    }

    /// Rate about universal axis 2.
    pub fn universal_angle2_rate(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_universal()?;
            Ok(if rev {
                -j.angle1_rate(b1, b2)
            } else {
                j.angle2_rate(b1, b2)
            })
        })
    }

    /// Apply equal and opposite torques about both universal axes.
    pub fn add_universal_torques(
        &mut self,
        id: JointId,
        torque1: Real,
        torque2: Real,
    ) -> rigid_types::Result<()> {
        self.apply_joint_loads(id, |k, b1, b2, rev| {
            let j = k.as_universal()?;
            Ok(if rev {
                j.torque_loads(b1, b2, -torque2, -torque1)
            } else {
                j.torque_loads(b1, b2, torque1, torque2)
            })
        })
    }

    // ---- hinge-2 ----

    /// Set the hinge-2 anchor from a world point.
    pub fn set_hinge2_anchor(&mut self, id: JointId, anchor: Point3<Real>) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, _| {
            k.as_hinge2_mut()?.set_anchor(b1, b2, &anchor);
            Ok(())
        })
    }

    /// Set the steering axis from a world direction.
    pub fn set_hinge2_axis1(&mut self, id: JointId, axis: Vector3<Real>) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, _| k.as_hinge2_mut()?.set_axis1(b1, b2, &axis))
    }

    /// Set the spin axis from a world direction.
    pub fn set_hinge2_axis2(&mut self, id: JointId, axis: Vector3<Real>) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, _| k.as_hinge2_mut()?.set_axis2(b1, b2, &axis))
    }

    /// Hinge-2 anchor as carried by body 1.
    pub fn hinge2_anchor(&self, id: JointId) -> rigid_types::Result<Point3<Real>> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_hinge2()?;
            Ok(if rev { j.anchor2(b2) } else { j.anchor(b1) })
        })
    }

    /// Hinge-2 anchor as carried by body 2.
    pub fn hinge2_anchor2(&self, id: JointId) -> rigid_types::Result<Point3<Real>> {
        self.read_joint(id, |k, b1, b2, rev| {
            let j = k.as_hinge2()?;
            Ok(if rev { j.anchor(b1) } else { j.anchor2(b2) })
        })
    }

    /// Steering axis in world coordinates.
    pub fn hinge2_axis1(&self, id: JointId) -> rigid_types::Result<Vector3<Real>> {
        self.read_joint(id, |k, b1, _, _| Ok(k.as_hinge2()?.axis1(b1)))
    }

    /// Spin axis in world coordinates.
    pub fn hinge2_axis2(&self, id: JointId) -> rigid_types::Result<Vector3<Real>> {
        self.read_joint(id, |k, _, b2, _| Ok(k.as_hinge2()?.axis2(b2)))
    }

    /// Steering angle.
    pub fn hinge2_angle1(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| {
            Ok(flip(k.as_hinge2()?.angle1(b1, b2), rev))
        })
    }

    /// Steering rate.
    pub fn hinge2_angle1_rate(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| {
            Ok(flip(k.as_hinge2()?.angle1_rate(b1, b2), rev))
        })
    }

    /// Spin rate.
    pub fn hinge2_angle2_rate(&self, id: JointId) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, rev| {
            Ok(flip(k.as_hinge2()?.angle2_rate(b1, b2), rev))
        })
    }

    /// Apply equal and opposite torques about the steering and spin axes.
    pub fn add_hinge2_torques(
        &mut self,
        id: JointId,
        torque1: Real,
        torque2: Real,
    ) -> rigid_types::Result<()> {
        self.apply_joint_loads(id, |k, b1, b2, rev| {
            Ok(k.as_hinge2()?
                .torque_loads(b1, b2, flip(torque1, rev), flip(torque2, rev)))
        })
    }

    // ---- fixed ----

    /// Lock the current relative pose of a fixed joint's bodies.
    pub fn set_fixed(&mut self, id: JointId) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, _| {
            k.as_fixed_mut()?.set_fixed(b1, b2);
            Ok(())
        })
    }

    // ---- angular motor ----

    /// Angle mode of an angular motor.
    pub fn amotor_mode(&self, id: JointId) -> rigid_types::Result<AMotorMode> {
        Ok(self.joint(id)?.kind.as_amotor()?.mode())
    }

    /// Set the angle mode of an angular motor.
    pub fn set_amotor_mode(&mut self, id: JointId, mode: AMotorMode) -> rigid_types::Result<()> {
        self.write_joint(id, |k, _, _, _| {
            k.as_amotor_mut()?.set_mode(mode);
            Ok(())
        })
    }

    /// Number of active angular motor axes.
    pub fn amotor_num_axes(&self, id: JointId) -> rigid_types::Result<usize> {
        Ok(self.joint(id)?.kind.as_amotor()?.num_axes())
    }

    /// Set the number of active angular motor axes.
    pub fn set_amotor_num_axes(&mut self, id: JointId, num: usize) -> rigid_types::Result<()> {
        self.write_joint(id, |k, _, _, _| k.as_amotor_mut()?.set_num_axes(num))
    }

    /// Set angular motor axis `index` from a world direction anchored to
    /// `frame`.
    pub fn set_amotor_axis(
        &mut self,
        id: JointId,
        index: usize,
        frame: AxisFrame,
        axis: Vector3<Real>,
    ) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, rev| {
            k.as_amotor_mut()?
                .set_axis(index, frame_for(frame, rev), &axis, b1, b2)
        })
    }

    /// Angular motor axis `index` in world coordinates.
    pub fn amotor_axis(&self, id: JointId, index: usize) -> rigid_types::Result<Vector3<Real>> {
        self.read_joint(id, |k, b1, b2, _| k.as_amotor()?.axis(index, b1, b2))
    }

    /// Frame angular motor axis `index` is anchored to.
    pub fn amotor_axis_frame(&self, id: JointId, index: usize) -> rigid_types::Result<AxisFrame> {
        self.read_joint(id, |k, _, _, rev| {
            Ok(frame_for(k.as_amotor()?.motor_axis(index)?.frame, rev))
        })
    }

    /// Supply the angle of axis `index` (user mode).
    pub fn set_amotor_angle(
        &mut self,
        id: JointId,
        index: usize,
        angle: Real,
    ) -> rigid_types::Result<()> {
        self.write_joint(id, |k, _, _, _| k.as_amotor_mut()?.set_angle(index, angle))
    }

    /// Angle of axis `index`: as supplied in user mode, measured in Euler
    /// mode.
    pub fn amotor_angle(&self, id: JointId, index: usize) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, _| k.as_amotor()?.angle(index, b1, b2))
    }

    /// Angular rate about axis `index`.
    pub fn amotor_angle_rate(&self, id: JointId, index: usize) -> rigid_types::Result<Real> {
        self.read_joint(id, |k, b1, b2, _| k.as_amotor()?.angle_rate(index, b1, b2))
    }

    /// Apply torques about the active angular motor axes.
    pub fn add_amotor_torques(
        &mut self,
        id: JointId,
        torques: [Real; MAX_MOTOR_AXES],
    ) -> rigid_types::Result<()> {
        self.apply_joint_loads(id, |k, b1, b2, _| Ok(k.as_amotor()?.torque_loads(b1, b2, torques)))
    }

    // ---- linear motor ----

    /// Number of active linear motor axes.
    pub fn lmotor_num_axes(&self, id: JointId) -> rigid_types::Result<usize> {
        Ok(self.joint(id)?.kind.as_lmotor()?.num_axes())
    }

    /// Set the number of active linear motor axes.
    pub fn set_lmotor_num_axes(&mut self, id: JointId, num: usize) -> rigid_types::Result<()> {
        self.write_joint(id, |k, _, _, _| k.as_lmotor_mut()?.set_num_axes(num))
    }

    /// Set linear motor axis `index` from a world direction anchored to
    /// `frame`.
    pub fn set_lmotor_axis(
        &mut self,
        id: JointId,
        index: usize,
        frame: AxisFrame,
        axis: Vector3<Real>,
    ) -> rigid_types::Result<()> {
        self.write_joint(id, |k, b1, b2, rev| {
            k.as_lmotor_mut()?
                .set_axis(index, frame_for(frame, rev), &axis, b1, b2)
        })
    }

    /// Linear motor axis `index` in world coordinates.
    pub fn lmotor_axis(&self, id: JointId, index: usize) -> rigid_types::Result<Vector3<Real>> {
        self.read_joint(id, |k, b1, b2, _| k.as_lmotor()?.axis(index, b1, b2))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rigid_constraint::{ContactGeom, Param, SurfaceParams};

    fn two_bodies(world: &mut World) -> (BodyId, BodyId) {
        let a = world.create_body_at(Point3::new(0.0, 0.0, 0.0));
        let b = world.create_body_at(Point3::new(1.0, 0.0, 0.0));
        (a, b)
    }

    #[test]
    fn test_new_joint_is_limbo() {
        let mut world = World::default();
        let j = world.create_joint(None, JointType::Hinge).unwrap();
        let joint = world.joint(j).unwrap();

        assert!(joint.is_limbo());
        assert!(!joint.is_grouped());
        assert_eq!(joint.joint_type(), JointType::Hinge);
        assert_eq!(world.connected_body(j, 0).unwrap(), None);
        assert_eq!(world.connected_body(j, 1).unwrap(), None);
    }

    #[test]
    fn test_attach_and_connected_bodies() {
        let mut world = World::default();
        let (a, b) = two_bodies(&mut world);
        let j = world.create_joint(None, JointType::Ball).unwrap();
        world.attach_joint(j, Some(a), Some(b)).unwrap();

        assert_eq!(world.connected_body(j, 0).unwrap(), Some(a));
        assert_eq!(world.connected_body(j, 1).unwrap(), Some(b));
        assert!(world.connected_body(j, 2).is_err());
        assert_eq!(world.body_joint(a, 0).unwrap(), Some(j));
        assert_eq!(world.body_joint(a, 1).unwrap(), None);
    }

    #[test]
    fn test_reversed_attachment_keeps_caller_view() {
        let mut world = World::default();
        let (_, b) = two_bodies(&mut world);
        let j = world.create_joint(None, JointType::Hinge).unwrap();
        world.attach_joint(j, None, Some(b)).unwrap();

        assert!(world.joint(j).unwrap().is_reversed());
        assert_eq!(world.connected_body(j, 0).unwrap(), None);
        assert_eq!(world.connected_body(j, 1).unwrap(), Some(b));

        world.set_hinge_anchor(j, Point3::new(1.0, 0.0, 0.0)).unwrap();
        world.set_hinge_axis(j, Vector3::z()).unwrap();
        world
            .body_mut(b)
            .unwrap()
            .set_angular_vel(Vector3::new(0.0, 0.0, 2.0));

        // Body 2 turning +z is body 1 (the environment) turning -z relative to it.
        assert_relative_eq!(world.hinge_angle_rate(j).unwrap(), -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_self_attachment_rejected() {
        let mut world = World::default();
        let (a, _) = two_bodies(&mut world);
        let j = world.create_joint(None, JointType::Ball).unwrap();

        let err = world.attach_joint(j, Some(a), Some(a)).unwrap_err();
        assert_eq!(err, SimError::SelfAttachment(j));
    }

    #[test]
    fn test_reattach_moves_adjacency() {
        let mut world = World::default();
        let (a, b) = two_bodies(&mut world);
        let j = world.create_joint(None, JointType::Ball).unwrap();
        world.attach_joint(j, Some(a), None).unwrap();
        world.attach_joint(j, Some(b), None).unwrap();

        assert_eq!(world.body_joint_count(a).unwrap(), 0);
        assert_eq!(world.body_joint_count(b).unwrap(), 1);

        world.attach_joint(j, None, None).unwrap();
        assert!(world.joint(j).unwrap().is_limbo());
        assert_eq!(world.body_joint_count(b).unwrap(), 0);
    }

    #[test]
    fn test_reattach_keeps_world_anchor() {
        let mut world = World::default();
        let (a, b) = two_bodies(&mut world);
        let j = world.create_joint(None, JointType::Ball).unwrap();
        world.set_ball_anchor(j, Point3::new(0.5, 0.0, 0.0)).unwrap();
        world.attach_joint(j, Some(a), Some(b)).unwrap();

        assert_relative_eq!(
            world.ball_anchor(j).unwrap(),
            Point3::new(0.5, 0.0, 0.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            world.ball_anchor2(j).unwrap(),
            Point3::new(0.5, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_destroy_grouped_joint_is_noop() {
        let mut world = World::default();
        let group = world.create_joint_group();
        let j = world.create_joint(Some(group), JointType::Ball).unwrap();

        world.destroy_joint(j).unwrap();
        assert!(world.joint(j).is_ok());

        let free = world.create_joint(None, JointType::Ball).unwrap();
        world.destroy_joint(free).unwrap();
        assert!(matches!(world.joint(free), Err(SimError::InvalidJoint(_))));
    }

    #[test]
    fn test_variant_mismatch() {
        let mut world = World::default();
        let j = world.create_joint(None, JointType::Ball).unwrap();

        let err = world.hinge_angle(j).unwrap_err();
        assert_eq!(err, SimError::joint_type_mismatch("hinge", "ball"));
    }

    #[test]
    fn test_params_through_world() {
        let mut world = World::default();
        let j = world.create_joint(None, JointType::Hinge).unwrap();

        world
            .set_joint_param(j, ParamKey::from(Param::HiStop), 0.5)
            .unwrap();
        world.set_joint_param_by_code(j, Param::LoStop as i32, -0.5).unwrap();
        assert_eq!(world.joint_param(j, Param::HiStop.into()).unwrap(), 0.5);
        assert_eq!(world.joint_param_by_code(j, Param::LoStop as i32).unwrap(), -0.5);

        let err = world.set_joint_param(j, Param::LoStop.into(), 1.0).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameterValue { .. }));
    }

    #[test]
    fn test_hinge_torque_loads_bodies() {
        let mut world = World::default();
        let (a, b) = two_bodies(&mut world);
        let j = world.create_joint(None, JointType::Hinge).unwrap();
        world.attach_joint(j, Some(a), Some(b)).unwrap();
        world.set_hinge_axis(j, Vector3::z()).unwrap();

        world.add_hinge_torque(j, 3.0).unwrap();
        assert_relative_eq!(world.body(a).unwrap().torque(), Vector3::new(0.0, 0.0, 3.0));
        assert_relative_eq!(world.body(b).unwrap().torque(), Vector3::new(0.0, 0.0, -3.0));
    }

    #[test]
    fn test_slider_force_loads_bodies() {
        let mut world = World::default();
        let (a, b) = two_bodies(&mut world);
        let j = world.create_joint(None, JointType::Slider).unwrap();
        world.attach_joint(j, Some(a), Some(b)).unwrap();
        world.set_slider_axis(j, Vector3::x()).unwrap();

        world.add_slider_force(j, 2.0).unwrap();
        assert_relative_eq!(world.body(a).unwrap().force(), Vector3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(world.body(b).unwrap().force(), Vector3::new(-2.0, 0.0, 0.0));
        assert_relative_eq!(world.slider_position(j).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_universal_axes_swap_when_reversed() {
        let mut world = World::default();
        let (a, _) = two_bodies(&mut world);
        let j = world.create_joint(None, JointType::Universal).unwrap();
        world.attach_joint(j, None, Some(a)).unwrap();
        world.set_universal_anchor(j, Point3::origin()).unwrap();
        world.set_universal_axis1(j, Vector3::x()).unwrap();
        world.set_universal_axis2(j, Vector3::y()).unwrap();

        assert_relative_eq!(world.universal_axis1(j).unwrap(), Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(world.universal_axis2(j).unwrap(), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(world.universal_angle1(j).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_amotor_frames_swap_when_reversed() {
        let mut world = World::default();
        let (a, _) = two_bodies(&mut world);
        let j = world.create_joint(None, JointType::AngularMotor).unwrap();
        world.attach_joint(j, None, Some(a)).unwrap();
        world.set_amotor_num_axes(j, 1).unwrap();
        world
            .set_amotor_axis(j, 0, AxisFrame::Body2, Vector3::z())
            .unwrap();

        assert_eq!(world.amotor_axis_frame(j, 0).unwrap(), AxisFrame::Body2);
        assert_eq!(
            world.joint(j).unwrap().kind().as_amotor().unwrap().motor_axis(0).unwrap().frame,
            AxisFrame::Body1
        );
        assert!(world.set_amotor_num_axes(j, 4).is_err());
    }

    #[test]
    fn test_lmotor_axes() {
        let mut world = World::default();
        let (a, b) = two_bodies(&mut world);
        let j = world.create_joint(None, JointType::LinearMotor).unwrap();
        world.attach_joint(j, Some(a), Some(b)).unwrap();
        world.set_lmotor_num_axes(j, 2).unwrap();
        world
            .set_lmotor_axis(j, 1, AxisFrame::Global, Vector3::new(0.0, 2.0, 0.0))
            .unwrap();

        assert_eq!(world.lmotor_num_axes(j).unwrap(), 2);
        assert_relative_eq!(world.lmotor_axis(j, 1).unwrap(), Vector3::y(), epsilon = 1e-12);
        assert!(matches!(
            world.set_lmotor_axis(j, 0, AxisFrame::Global, Vector3::zeros()),
            Err(SimError::DegenerateAxis(_))
        ));
    }

    #[test]
    fn test_contact_access() {
        let mut world = World::default();
        let contact = ContactJoint::new(
            ContactGeom::new(Point3::origin(), Vector3::z(), 0.01),
            SurfaceParams::with_friction(0.5),
        );
        let j = world.create_contact(None, contact).unwrap();

        assert_eq!(world.joint_type(j).unwrap(), JointType::Contact);
        world.contact_mut(j).unwrap().geom.depth = 0.02;
        assert_eq!(world.contact(j).unwrap().geom.depth, 0.02);
    }

    #[test]
    fn test_feedback_toggle_and_user_data() {
        let mut world = World::default();
        let j = world.create_joint(None, JointType::Fixed).unwrap();

        assert_eq!(world.joint_feedback(j).unwrap(), None);
        world.set_joint_feedback(j, true).unwrap();
        assert_eq!(world.joint_feedback(j).unwrap(), Some(JointFeedback::default()));
        world.set_joint_feedback(j, false).unwrap();
        assert_eq!(world.joint_feedback(j).unwrap(), None);

        world.set_joint_user_data(j, 42).unwrap();
        assert_eq!(world.joint_user_data(j).unwrap(), 42);
    }
}
