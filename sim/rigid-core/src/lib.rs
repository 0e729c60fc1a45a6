//! World, bodies, joints and stepping for constraint-based rigid body
//! dynamics.
//!
//! This crate owns the simulation state and drives the solvers in
//! `rigid-constraint` once per step.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         World                              │
//! │   bodies: SlotMap<BodyKey, Body>                           │
//! │   joints: SlotMap<JointKey, Joint>   groups: JointGroup    │
//! └────────────────────────────┬───────────────────────────────┘
//!                              │ step / quick_step / step_fast
//!          ┌───────────────────┼────────────────────┐
//!          ▼                   ▼                    ▼
//!   wake propagation   ConstraintIslands    per island: rows,
//!   (auto_disable)     (rigid-constraint)   solve, integrate
//!                                                   │
//!                                                   ▼
//!                                       idle update, clear forces
//! ```
//!
//! # Handles
//!
//! Bodies, joints and joint groups are reached through [`BodyId`],
//! [`JointId`] and [`JointGroupId`]. Each carries its world's identity and a
//! generation-checked key, so a handle to a destroyed object or another
//! world is rejected with a [`SimError`] instead of aliasing a new object.
//!
//! # Quick Start
//!
//! ```
//! use rigid_core::{JointType, World};
//! use rigid_types::WorldConfig;
//! use nalgebra::{Point3, Vector3};
//!
//! let mut world = World::new(WorldConfig::earth());
//!
//! // A pendulum: one body hanging from a hinge on the environment.
//! let bob = world.create_body_at(Point3::new(1.0, 0.0, 0.0));
//! let hinge = world.create_joint(None, JointType::Hinge).unwrap();
//! world.attach_joint(hinge, Some(bob), None).unwrap();
//! world.set_hinge_anchor(hinge, Point3::origin()).unwrap();
//! world.set_hinge_axis(hinge, Vector3::y()).unwrap();
//!
//! for _ in 0..50 {
//!     world.quick_step(0.01).unwrap();
//! }
//!
//! let bob = world.body(bob).unwrap();
//! assert!(bob.position().z < 0.0);
//! assert!((bob.position().coords.norm() - 1.0).abs() < 0.05);
//! ```
//!
//! # Features
//!
//! - `serde`: serialization of the world and its configuration
//! - `single-precision`: `f32` scalars
//! - `parallel`: solve islands on the rayon thread pool

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to Real is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
    clippy::module_name_repetitions,
)]

mod auto_disable;
mod body;
mod graph;
pub mod integrators;
mod joint;
mod stepfast;
mod stepper;
mod world;

pub use body::Body;
pub use joint::Joint;
pub use stepper::{StepMethod, StepReport};
pub use world::World;

// Re-export the types callers need alongside the world.
pub use rigid_constraint::{
    AMotorMode, AxisFrame, Bounce, ContactGeom, ContactJoint, FrictionModel, JointFeedback,
    JointKind, JointType, Param, ParamKey, SurfaceParams, MAX_MOTOR_AXES,
};
pub use rigid_types::{
    AutoDisableParams, BodyId, JointGroupId, JointId, MassProperties, Pose, Real,
    RigidBodyState, SimError, Twist, WorldConfig,
};
