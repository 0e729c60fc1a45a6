//! Error types for simulation operations.

use thiserror::Error;

use crate::{BodyId, JointGroupId, JointId, Real, WorldId};

/// Errors that can occur during simulation.
///
/// Physical degeneracy (singular constraint systems, slow convergence) is
/// never reported here. These variants describe programmer errors: stale or
/// foreign handles, invalid configuration and misuse of joint accessors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Body handle refers to a destroyed body.
    #[error("stale or unknown body handle: {0}")]
    InvalidBody(BodyId),

    /// Joint handle refers to a destroyed joint, possibly one released by
    /// emptying its group.
    #[error("stale or unknown joint handle: {0}")]
    InvalidJoint(JointId),

    /// Joint group handle refers to a destroyed group.
    #[error("stale or unknown joint group handle: {0}")]
    InvalidJointGroup(JointGroupId),

    /// A handle issued by one world was presented to another.
    #[error("handle belongs to {handle_world}, not {world}")]
    ForeignHandle {
        /// World that received the handle.
        world: WorldId,
        /// World that issued the handle.
        handle_world: WorldId,
    },

    /// A joint was attached to the same body at both ends.
    #[error("joint {0} cannot connect a body to itself")]
    SelfAttachment(JointId),

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(Real),

    /// Simulation diverged (`NaN` or `Inf` detected).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// A variant-specific accessor was used on a joint of another variant.
    #[error("joint type mismatch: expected {expected}, got {actual}")]
    JointTypeMismatch {
        /// Variant the accessor works on.
        expected: &'static str,
        /// Variant of the joint.
        actual: &'static str,
    },

    /// The joint variant has no parameter with this code.
    #[error("{joint} joint has no parameter {code:#x}")]
    UnsupportedParameter {
        /// Variant of the joint.
        joint: &'static str,
        /// Integer parameter code.
        code: i32,
    },

    /// The parameter value is outside its valid range.
    #[error("invalid value {value} for parameter {code:#x}: {reason}")]
    InvalidParameterValue {
        /// Integer parameter code.
        code: i32,
        /// Rejected value.
        value: Real,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A joint axis was zero or not finite.
    #[error("degenerate joint axis {0:?}")]
    DegenerateAxis([Real; 3]),

    /// A motor axis index is out of range.
    #[error("axis index {index} out of range for {count} axes")]
    AxisOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of axes available.
        count: usize,
    },
}

impl SimError {
    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create a joint type mismatch error.
    #[must_use]
    pub fn joint_type_mismatch(expected: &'static str, actual: &'static str) -> Self {
        Self::JointTypeMismatch { expected, actual }
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Check if this error comes from an invalid handle.
    #[must_use]
    pub fn is_handle_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBody(_)
                | Self::InvalidJoint(_)
                | Self::InvalidJointGroup(_)
                | Self::ForeignHandle { .. }
        )
    }
}
