//! Joint models, constraint rows and LCP solvers for rigid body dynamics.
//!
//! This crate turns joints into velocity-level constraint rows and solves
//! them island by island. It works on dense island-local body indices and
//! knows nothing about how the world stores its bodies.
//!
//! # Joint Types
//!
//! [`JointKind`] is a closed sum over every model:
//!
//! - [`BallJoint`]: shared point (3 rows)
//! - [`HingeJoint`]: shared point and axis (5 rows)
//! - [`SliderJoint`]: locked orientation, translation along one axis (5 rows)
//! - [`UniversalJoint`]: shared point, two perpendicular axes (4 rows)
//! - [`Hinge2Joint`]: steering axis with suspension plus a spin axis (4 rows)
//! - [`FixedJoint`]: locked relative pose (6 rows)
//! - [`ContactJoint`]: one-sided normal row plus up to two friction rows
//! - [`AngularMotorJoint`] and [`LinearMotorJoint`]: one row per active axis
//! - `Null`: no rows
//!
//! Limited or powered axes carry a [`LimitMotor`] addressed through the
//! integer parameter table ([`ParamKey`]).
//!
//! # Constraint Formulation
//!
//! Each row constrains the relative velocity of its two bodies:
//!
//! ```text
//! J · v = rhs - cfm · λ,    lo <= λ <= hi
//! ```
//!
//! `rhs` carries the stabilization bias `erp · error / h`, so positional
//! drift is pulled out over a few steps rather than corrected exactly.
//!
//! # Solvers
//!
//! - [`DirectSolver`]: exact active-set pivoting, `O(m³)` per pivot and
//!   `O(m⁴)` worst case per island
//! - [`QuickStepSolver`]: fixed number of SOR sweeps, `O(m · iterations)`
//!
//! # Example
//!
//! ```
//! use rigid_constraint::{BodyState, JointKind, JointOutput, JointType, RowContext};
//! use nalgebra::Point3;
//!
//! let body = BodyState::fixed();
//! let mut joint = JointKind::new(JointType::Ball, 0.2, 1e-10);
//! joint.as_ball_mut().unwrap().set_anchor(&body, None, &Point3::origin());
//!
//! let ctx = RowContext::new(0.01, 0.2, 1e-10);
//! let mut out = JointOutput::new();
//! joint.build_rows(&ctx, &body, None, false, &mut out);
//! assert_eq!(out.len(), 3);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::suboptimal_flops,
    clippy::needless_range_loop,
    clippy::many_single_char_names,
)]

mod dense;
mod geometry;
mod islands;
mod joint;
mod limits;
mod quickstep;
mod row;
mod system;
mod types;

pub use dense::DirectSolver;
pub use geometry::{plane_space, wrap_angle};
pub use islands::{ConstraintIslands, Island, IslandStatistics, JointLink};
pub use joint::{
    AMotorMode, AngularMotorJoint, AxisFrame, BallJoint, Bounce, ContactGeom, ContactJoint,
    FixedJoint, FrictionModel, Hinge2Joint, HingeJoint, JointKind, JointType, LinearMotorJoint,
    MotorAxis, SliderJoint, SurfaceParams, UniversalJoint, MAX_MOTOR_AXES,
};
pub use limits::{AxisKind, LimitMotor, LimitState, Param, ParamKey, PARAM_GROUP};
pub use quickstep::QuickStepSolver;
pub use row::{ConstraintRow, JointOutput, RowContext};
pub use system::{
    IslandSolution, IslandSolver, IslandSystem, RowResponse, SolverBody, SolverRow,
};
pub use types::{BodyState, JointFeedback, Load};
