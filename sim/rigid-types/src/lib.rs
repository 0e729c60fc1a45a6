//! Core value types for constraint-based rigid body dynamics.
//!
//! This crate provides the foundational types shared by the constraint
//! solvers and the world:
//!
//! - [`Real`] - The scalar type, `f64` unless `single-precision` is enabled
//! - [`BodyId`], [`JointId`], [`JointGroupId`] - Generation-checked handles
//! - [`Pose`], [`Twist`], [`RigidBodyState`] - Body configuration and velocity
//! - [`MassProperties`] - Mass and body-frame inertia about the center of mass
//! - [`WorldConfig`] - Gravity, ERP/CFM, solver and auto-disable settings
//! - [`SimError`] - Typed errors for handle misuse and bad configuration
//!
//! # Design Philosophy
//!
//! These types are **pure data**. Joint models and solvers live in
//! `rigid-constraint`, the world and stepping in `rigid-core`.
//!
//! # Coordinate System
//!
//! Right-handed, Z up. Body positions are taken at the center of mass, so a
//! body's local frame origin and its center of mass always coincide.
//!
//! # Example
//!
//! ```
//! use rigid_types::{RigidBodyState, Pose, Twist};
//! use nalgebra::Point3;
//!
//! let state = RigidBodyState::new(
//!     Pose::from_position(Point3::new(0.0, 0.0, 1.0)),
//!     Twist::zero(),
//! );
//!
//! assert_eq!(state.pose.position.z, 1.0);
//! assert!(state.twist.linear.norm() < 1e-10);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to Real is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod error;
mod handle;

pub use body::{MassProperties, Pose, RigidBodyState, Twist};
pub use config::{
    AutoDisableParams, DirectSolverConfig, QuickStepConfig, WorldConfig,
    DEFAULT_AUTO_ENABLE_DEPTH, DEFAULT_CFM, DEFAULT_ERP,
};
pub use error::SimError;
pub use handle::{BodyId, BodyKey, GroupKey, JointGroupId, JointId, JointKey, WorldId};

/// Scalar type used throughout the dynamics core.
#[cfg(not(feature = "single-precision"))]
pub type Real = f64;

/// Scalar type used throughout the dynamics core.
#[cfg(feature = "single-precision")]
pub type Real = f32;

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
