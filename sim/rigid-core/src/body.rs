//! Rigid bodies.
//!
//! A [`Body`] is owned by its [`World`](crate::World) and reached through a
//! [`BodyId`]. Position is the center of mass; orientation is a unit
//! quaternion whose rotation matrix is derived on demand, so the two can
//! never disagree.

use nalgebra::{Matrix3, Point3, Rotation3, UnitQuaternion, Vector3};
use rigid_constraint::BodyState;
use rigid_types::{
    AutoDisableParams, BodyId, JointKey, MassProperties, Pose, Real, RigidBodyState, Twist,
};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Forces and torques with a norm at or below this leave a disabled body
/// disabled.
const WAKE_THRESHOLD: Real = 1e-10;

/// A rigid body in the simulation world.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Body {
    id: BodyId,
    state: RigidBodyState,
    mass: MassProperties,
    /// Body-frame inverse inertia, cached from `mass`.
    inv_inertia: Matrix3<Real>,
    force: Vector3<Real>,
    torque: Vector3<Real>,
    enabled: bool,
    /// `None` while the body tracks the world defaults.
    auto_disable: Option<AutoDisableParams>,
    idle_steps: u32,
    idle_time: Real,
    finite_rotation: bool,
    finite_rotation_axis: Vector3<Real>,
    gravity_mode: bool,
    user_data: u64,
    /// Joints attached to this body, in attachment order.
    pub(crate) joints: SmallVec<[JointKey; 4]>,
}

impl Body {
    /// New body at rest at the origin.
    pub(crate) fn new(id: BodyId) -> Self {
        let mass = MassProperties::default();
        Self {
            id,
            state: RigidBodyState::default(),
            inv_inertia: mass.inverse_inertia().unwrap_or_else(Matrix3::zeros),
            mass,
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            enabled: true,
            auto_disable: None,
            idle_steps: 0,
            idle_time: 0.0,
            finite_rotation: false,
            finite_rotation_axis: Vector3::zeros(),
            gravity_mode: true,
            user_data: 0,
            joints: SmallVec::new(),
        }
    }

    /// Handle of this body.
    #[must_use]
    pub fn id(&self) -> BodyId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: BodyId) {
        self.id = id;
    }

    // ---- kinematic state ----

    /// Position of the center of mass.
    #[must_use]
    pub fn position(&self) -> Point3<Real> {
        self.state.pose.position
    }

    /// Set the position of the center of mass.
    pub fn set_position(&mut self, position: Point3<Real>) {
        self.state.pose.position = position;
    }

    /// Orientation.
    #[must_use]
    pub fn quaternion(&self) -> UnitQuaternion<Real> {
        self.state.pose.rotation
    }

    /// Set the orientation.
    pub fn set_quaternion(&mut self, rotation: UnitQuaternion<Real>) {
        self.state.pose.rotation = rotation;
    }

    /// Orientation as a rotation matrix.
    #[must_use]
    pub fn rotation(&self) -> Matrix3<Real> {
        self.state.pose.rotation_matrix()
    }

    /// Set the orientation from a rotation matrix.
    ///
    /// The matrix is re-orthonormalized before conversion.
    pub fn set_rotation(&mut self, rotation: &Matrix3<Real>) {
        let r = Rotation3::from_matrix(rotation);
        self.state.pose.rotation = UnitQuaternion::from_rotation_matrix(&r);
    }

    /// Position and orientation.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        &self.state.pose
    }

    /// Linear velocity of the center of mass.
    #[must_use]
    pub fn linear_vel(&self) -> Vector3<Real> {
        self.state.twist.linear
    }

    /// Set the linear velocity.
    pub fn set_linear_vel(&mut self, v: Vector3<Real>) {
        self.state.twist.linear = v;
    }

    /// Angular velocity in world coordinates.
    #[must_use]
    pub fn angular_vel(&self) -> Vector3<Real> {
        self.state.twist.angular
    }

    /// Set the angular velocity.
    pub fn set_angular_vel(&mut self, w: Vector3<Real>) {
        self.state.twist.angular = w;
    }

    /// Linear and angular velocity.
    #[must_use]
    pub fn twist(&self) -> &Twist {
        &self.state.twist
    }

    /// Pose and velocity together.
    #[must_use]
    pub fn state(&self) -> &RigidBodyState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut RigidBodyState {
        &mut self.state
    }

    // ---- mass ----

    /// Mass properties.
    #[must_use]
    pub fn mass(&self) -> &MassProperties {
        &self.mass
    }

    /// Replace the mass properties.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidMassProperties`](rigid_types::SimError::InvalidMassProperties)
    /// unless the mass is positive and the inertia symmetric positive definite.
    pub fn set_mass(&mut self, mass: MassProperties) -> rigid_types::Result<()> {
        mass.validate()?;
        let inv = mass
            .inverse_inertia()
            .ok_or_else(|| rigid_types::SimError::invalid_mass("inertia tensor is singular"))?;
        self.mass = mass;
        self.inv_inertia = inv;
        Ok(())
    }

    /// Snapshot for joint geometry and the solver.
    pub(crate) fn solver_state(&self) -> BodyState {
        BodyState::new(
            &self.state.pose,
            &self.state.twist,
            self.mass.inverse_mass(),
            &self.inv_inertia,
        )
    }

    // ---- force accumulators ----

    /// Accumulated force for the next step.
    #[must_use]
    pub fn force(&self) -> Vector3<Real> {
        self.force
    }

    /// Accumulated torque for the next step.
    #[must_use]
    pub fn torque(&self) -> Vector3<Real> {
        self.torque
    }

    /// Overwrite the force accumulator.
    pub fn set_force(&mut self, force: Vector3<Real>) {
        self.force = force;
    }

    /// Overwrite the torque accumulator.
    pub fn set_torque(&mut self, torque: Vector3<Real>) {
        self.torque = torque;
    }

    /// Add a world-frame force at the center of mass.
    ///
    /// A non-negligible force re-enables a disabled body.
    pub fn add_force(&mut self, force: Vector3<Real>) {
        self.force += force;
        self.wake_on(&force);
    }

    /// Add a world-frame torque.
    ///
    /// A non-negligible torque re-enables a disabled body.
    pub fn add_torque(&mut self, torque: Vector3<Real>) {
        self.torque += torque;
        self.wake_on(&torque);
    }

    /// Add a body-frame force at the center of mass.
    pub fn add_rel_force(&mut self, force: Vector3<Real>) {
        self.add_force(self.vector_to_world(&force));
    }

    /// Add a body-frame torque.
    pub fn add_rel_torque(&mut self, torque: Vector3<Real>) {
        self.add_torque(self.vector_to_world(&torque));
    }

    /// Add a world-frame force at a world point.
    pub fn add_force_at_pos(&mut self, force: Vector3<Real>, pos: Point3<Real>) {
        let r = pos - self.state.pose.position;
        self.add_force(force);
        self.add_torque(r.cross(&force));
    }

    /// Add a world-frame force at a body-frame point.
    pub fn add_force_at_rel_pos(&mut self, force: Vector3<Real>, pos: Point3<Real>) {
        let r = self.vector_to_world(&pos.coords);
        self.add_force(force);
        self.add_torque(r.cross(&force));
    }

    /// Add a body-frame force at a world point.
    pub fn add_rel_force_at_pos(&mut self, force: Vector3<Real>, pos: Point3<Real>) {
        self.add_force_at_pos(self.vector_to_world(&force), pos);
    }

    /// Add a body-frame force at a body-frame point.
    pub fn add_rel_force_at_rel_pos(&mut self, force: Vector3<Real>, pos: Point3<Real>) {
        self.add_force_at_rel_pos(self.vector_to_world(&force), pos);
    }

    pub(crate) fn clear_forces(&mut self) {
        self.force = Vector3::zeros();
        self.torque = Vector3::zeros();
    }

    fn wake_on(&mut self, load: &Vector3<Real>) {
        if !self.enabled && load.norm() > WAKE_THRESHOLD {
            self.enable();
        }
    }

    // ---- coordinate helpers ----

    /// Body-frame point to world.
    #[must_use]
    pub fn rel_point_pos(&self, local: &Point3<Real>) -> Point3<Real> {
        self.state.pose.transform_point(local)
    }

    /// World velocity of a body-frame point.
    #[must_use]
    pub fn rel_point_vel(&self, local: &Point3<Real>) -> Vector3<Real> {
        let r = self.vector_to_world(&local.coords);
        self.state.twist.velocity_at_point(&r)
    }

    /// World velocity of the body point currently at `world`.
    #[must_use]
    pub fn point_vel(&self, world: &Point3<Real>) -> Vector3<Real> {
        self.state
            .twist
            .velocity_at_point(&(world - self.state.pose.position))
    }

    /// World point to body frame.
    #[must_use]
    pub fn pos_rel_point(&self, world: &Point3<Real>) -> Point3<Real> {
        self.state.pose.inverse_transform_point(world)
    }

    /// Body-frame vector to world.
    #[must_use]
    pub fn vector_to_world(&self, local: &Vector3<Real>) -> Vector3<Real> {
        self.state.pose.transform_vector(local)
    }

    /// World vector to body frame.
    #[must_use]
    pub fn vector_from_world(&self, world: &Vector3<Real>) -> Vector3<Real> {
        self.state.pose.inverse_transform_vector(world)
    }

    // ---- enable state ----

    /// Whether the body takes part in stepping.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable the body and restart its idle counters.
    pub fn enable(&mut self) {
        self.enabled = true;
        self.reset_idle();
    }

    /// Disable the body. Its velocity is kept for when it wakes.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub(crate) fn reset_idle(&mut self) {
        self.idle_steps = 0;
        self.idle_time = 0.0;
    }

    /// Count one idle step of length `dt`; returns the totals so far.
    pub(crate) fn record_idle(&mut self, dt: Real) -> (u32, Real) {
        self.idle_steps = self.idle_steps.saturating_add(1);
        self.idle_time += dt;
        (self.idle_steps, self.idle_time)
    }

    /// Consecutive idle steps counted so far.
    #[must_use]
    pub fn idle_steps(&self) -> u32 {
        self.idle_steps
    }

    /// Idle time accumulated so far.
    #[must_use]
    pub fn idle_time(&self) -> Real {
        self.idle_time
    }

    // ---- auto-disable overrides ----

    /// Per-body auto-disable parameters, `None` while tracking the world
    /// defaults.
    #[must_use]
    pub fn auto_disable_override(&self) -> Option<&AutoDisableParams> {
        self.auto_disable.as_ref()
    }

    /// Parameters in effect given the world defaults.
    #[must_use]
    pub fn auto_disable(&self, defaults: &AutoDisableParams) -> AutoDisableParams {
        self.auto_disable.unwrap_or(*defaults)
    }

    /// Give this body its own auto-disable parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`](rigid_types::SimError::InvalidConfig)
    /// for negative thresholds or idle time.
    pub fn set_auto_disable(&mut self, params: AutoDisableParams) -> rigid_types::Result<()> {
        params.validate()?;
        self.auto_disable = Some(params);
        self.reset_idle();
        Ok(())
    }

    /// Track the world defaults again.
    pub fn reset_auto_disable_defaults(&mut self) {
        self.auto_disable = None;
        self.reset_idle();
    }

    // ---- integration options ----

    /// Whether orientation uses the finite rotation update.
    #[must_use]
    pub fn finite_rotation_mode(&self) -> bool {
        self.finite_rotation
    }

    /// Select the finite (`true`) or infinitesimal (`false`) rotation update.
    pub fn set_finite_rotation_mode(&mut self, finite: bool) {
        self.finite_rotation = finite;
    }

    /// Axis of the finite rotation update, in world coordinates. Zero means
    /// the whole angular velocity is integrated as a finite rotation.
    #[must_use]
    pub fn finite_rotation_axis(&self) -> Vector3<Real> {
        self.finite_rotation_axis
    }

    /// Set the finite rotation axis; it is normalized, and a zero vector
    /// selects the full finite update.
    pub fn set_finite_rotation_axis(&mut self, axis: Vector3<Real>) {
        self.finite_rotation_axis = axis.try_normalize(Real::EPSILON).unwrap_or_else(Vector3::zeros);
    }

    /// Whether world gravity acts on this body.
    #[must_use]
    pub fn gravity_mode(&self) -> bool {
        self.gravity_mode
    }

    /// Switch world gravity on or off for this body.
    pub fn set_gravity_mode(&mut self, enabled: bool) {
        self.gravity_mode = enabled;
    }

    // ---- bookkeeping ----

    /// Number of joints attached to this body.
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    /// Opaque value owned by the caller.
    #[must_use]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    /// Store an opaque value.
    pub fn set_user_data(&mut self, data: u64) {
        self.user_data = data;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rigid_types::{BodyKey, WorldId};
    use slotmap::SlotMap;

    fn make_body() -> Body {
        let mut keys: SlotMap<BodyKey, ()> = SlotMap::with_key();
        Body::new(BodyId::new(WorldId::next(), keys.insert(())))
    }

    #[test]
    fn test_new_body_defaults() {
        let body = make_body();
        assert!(body.is_enabled());
        assert!(body.gravity_mode());
        assert!(!body.finite_rotation_mode());
        assert!(body.auto_disable_override().is_none());
        assert_eq!(body.mass().mass, 1.0);
        assert_eq!(body.position(), Point3::origin());
    }

    #[test]
    fn test_force_at_pos_adds_torque() {
        let mut body = make_body();
        body.add_force_at_pos(Vector3::new(0.0, 1.0, 0.0), Point3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(body.force(), Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(body.torque(), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_relative_force_follows_orientation() {
        let mut body = make_body();
        body.set_quaternion(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2 as Real));
        body.add_rel_force(Vector3::x());

        assert_relative_eq!(body.force(), Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_point_helpers_round_trip() {
        let mut body = make_body();
        body.set_position(Point3::new(1.0, 2.0, 3.0));
        body.set_quaternion(UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.3));
        body.set_angular_vel(Vector3::new(0.0, 0.0, 2.0));

        let local = Point3::new(0.5, -0.2, 0.1);
        let world = body.rel_point_pos(&local);
        assert_relative_eq!(body.pos_rel_point(&world), local, epsilon = 1e-12);
        assert_relative_eq!(body.rel_point_vel(&local), body.point_vel(&world), epsilon = 1e-12);

        let v = Vector3::new(0.3, 0.4, -1.0);
        assert_relative_eq!(
            body.vector_from_world(&body.vector_to_world(&v)),
            v,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_set_rotation_matrix() {
        let mut body = make_body();
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.7);
        body.set_rotation(q.to_rotation_matrix().matrix());

        assert_relative_eq!(body.quaternion().angle_to(&q), 0.0, epsilon = 1e-10);
        assert_relative_eq!(body.quaternion().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_force_wakes_disabled_body() {
        let mut body = make_body();
        body.disable();

        body.add_force(Vector3::new(0.0, 0.0, 1e-12));
        assert!(!body.is_enabled());

        body.add_torque(Vector3::new(0.0, 0.0, 1.0));
        assert!(body.is_enabled());
    }

    #[test]
    fn test_set_force_does_not_wake() {
        let mut body = make_body();
        body.disable();
        body.set_force(Vector3::new(5.0, 0.0, 0.0));

        assert!(!body.is_enabled());
        assert_eq!(body.force(), Vector3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_invalid_mass_rejected() {
        let mut body = make_body();
        let err = body.set_mass(MassProperties::sphere(-1.0, 1.0)).unwrap_err();
        assert!(matches!(err, rigid_types::SimError::InvalidMassProperties { .. }));
        assert_eq!(body.mass().mass, 1.0);

        body.set_mass(MassProperties::box_shape(2.0, Vector3::new(1.0, 0.5, 0.25)))
            .unwrap();
        assert_eq!(body.mass().mass, 2.0);
    }

    #[test]
    fn test_auto_disable_override_and_reset() {
        let mut body = make_body();
        let defaults = AutoDisableParams::default();
        assert_eq!(body.auto_disable(&defaults), defaults);

        let custom = AutoDisableParams::enabled().with_idle_steps(3);
        body.set_auto_disable(custom).unwrap();
        assert_eq!(body.auto_disable(&defaults), custom);

        body.reset_auto_disable_defaults();
        assert_eq!(body.auto_disable(&defaults), defaults);
    }

    #[test]
    fn test_finite_rotation_axis_is_normalized() {
        let mut body = make_body();
        body.set_finite_rotation_axis(Vector3::new(0.0, 0.0, 4.0));
        assert_relative_eq!(body.finite_rotation_axis(), Vector3::z(), epsilon = 1e-12);

        body.set_finite_rotation_axis(Vector3::zeros());
        assert_eq!(body.finite_rotation_axis(), Vector3::zeros());
    }
}
