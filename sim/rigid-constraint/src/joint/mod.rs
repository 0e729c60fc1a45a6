//! Joint variants.
//!
//! [`JointKind`] is a closed sum over every joint model. Each variant owns its
//! geometry in body-local coordinates and knows how to emit its constraint
//! rows; the world supplies the current [`BodyState`] of both ends.

mod amotor;
mod ball;
mod contact;
mod fixed;
mod hinge;
mod hinge2;
mod lmotor;
mod slider;
mod universal;

pub use amotor::{AMotorMode, AngularMotorJoint, AxisFrame, MotorAxis, MAX_MOTOR_AXES};
pub use ball::BallJoint;
pub use contact::{Bounce, ContactGeom, ContactJoint, FrictionModel, SurfaceParams};
pub use fixed::FixedJoint;
pub use hinge::HingeJoint;
pub use hinge2::Hinge2Joint;
pub use lmotor::LinearMotorJoint;
pub use slider::SliderJoint;
pub use universal::UniversalJoint;

use rigid_types::{Real, SimError};

use crate::limits::{LimitMotor, ParamKey};
use crate::row::{JointOutput, RowContext};
use crate::types::BodyState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Joint variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointType {
    /// Ball-and-socket.
    Ball,
    /// Hinge.
    Hinge,
    /// Slider.
    Slider,
    /// Contact.
    Contact,
    /// Hinge-2.
    Hinge2,
    /// Universal.
    Universal,
    /// Fixed.
    Fixed,
    /// No constraint.
    Null,
    /// Angular motor.
    AngularMotor,
    /// Linear motor.
    LinearMotor,
}

impl JointType {
    /// Every variant.
    pub const ALL: [Self; 10] = [
        Self::Ball,
        Self::Hinge,
        Self::Slider,
        Self::Contact,
        Self::Hinge2,
        Self::Universal,
        Self::Fixed,
        Self::Null,
        Self::AngularMotor,
        Self::LinearMotor,
    ];

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ball => "ball",
            Self::Hinge => "hinge",
            Self::Slider => "slider",
            Self::Contact => "contact",
            Self::Hinge2 => "hinge2",
            Self::Universal => "universal",
            Self::Fixed => "fixed",
            Self::Null => "null",
            Self::AngularMotor => "amotor",
            Self::LinearMotor => "lmotor",
        }
    }
}

impl std::fmt::Display for JointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A joint model of any variant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointKind {
    /// Ball-and-socket.
    Ball(BallJoint),
    /// Hinge.
    Hinge(HingeJoint),
    /// Slider.
    Slider(SliderJoint),
    /// Contact.
    Contact(ContactJoint),
    /// Hinge-2.
    Hinge2(Hinge2Joint),
    /// Universal.
    Universal(UniversalJoint),
    /// Fixed.
    Fixed(FixedJoint),
    /// No constraint.
    Null,
    /// Angular motor.
    AngularMotor(AngularMotorJoint),
    /// Linear motor.
    LinearMotor(LinearMotorJoint),
}

macro_rules! accessors {
    ($($variant:ident => $ty:ty, $get:ident, $get_mut:ident, $name:literal;)*) => {
        $(
            #[doc = concat!("The ", $name, " model, or a type mismatch error.")]
            pub fn $get(&self) -> rigid_types::Result<&$ty> {
                match self {
                    Self::$variant(j) => Ok(j),
                    other => Err(SimError::joint_type_mismatch($name, other.joint_type().name())),
                }
            }

            #[doc = concat!("Mutable ", $name, " model, or a type mismatch error.")]
            pub fn $get_mut(&mut self) -> rigid_types::Result<&mut $ty> {
                match self {
                    Self::$variant(j) => Ok(j),
                    other => Err(SimError::joint_type_mismatch($name, other.joint_type().name())),
                }
            }
        )*
    };
}

impl JointKind {
    /// Fresh joint of type `ty`. Limits and motors take their stop ERP/CFM
    /// from `erp` and `cfm`.
    #[must_use]
    pub fn new(ty: JointType, erp: Real, cfm: Real) -> Self {
        match ty {
            JointType::Ball => Self::Ball(BallJoint::new()),
            JointType::Hinge => Self::Hinge(HingeJoint::new(erp, cfm)),
            JointType::Slider => Self::Slider(SliderJoint::new(erp, cfm)),
            JointType::Contact => Self::Contact(ContactJoint::default()),
            JointType::Hinge2 => Self::Hinge2(Hinge2Joint::new(erp, cfm)),
            JointType::Universal => Self::Universal(UniversalJoint::new(erp, cfm)),
            JointType::Fixed => Self::Fixed(FixedJoint::new()),
            JointType::Null => Self::Null,
            JointType::AngularMotor => Self::AngularMotor(AngularMotorJoint::new(erp, cfm)),
            JointType::LinearMotor => Self::LinearMotor(LinearMotorJoint::new(erp, cfm)),
        }
    }

    /// Variant tag.
    #[must_use]
    pub fn joint_type(&self) -> JointType {
        match self {
            Self::Ball(_) => JointType::Ball,
            Self::Hinge(_) => JointType::Hinge,
            Self::Slider(_) => JointType::Slider,
            Self::Contact(_) => JointType::Contact,
            Self::Hinge2(_) => JointType::Hinge2,
            Self::Universal(_) => JointType::Universal,
            Self::Fixed(_) => JointType::Fixed,
            Self::Null => JointType::Null,
            Self::AngularMotor(_) => JointType::AngularMotor,
            Self::LinearMotor(_) => JointType::LinearMotor,
        }
    }

    /// Append this joint's rows and direct loads for the current step.
    ///
    /// `b2 = None` constrains body 1 against the static environment.
    /// `reversed` is set when the only attached body was given as body 2.
    pub fn build_rows(
        &self,
        ctx: &RowContext,
        b1: &BodyState,
        b2: Option<&BodyState>,
        reversed: bool,
        out: &mut JointOutput,
    ) {
        match self {
            Self::Ball(j) => j.build_rows(ctx, b1, b2, out),
            Self::Hinge(j) => j.build_rows(ctx, b1, b2, out),
            Self::Slider(j) => j.build_rows(ctx, b1, b2, out),
            Self::Contact(j) => j.build_rows(ctx, b1, b2, reversed, out),
            Self::Hinge2(j) => j.build_rows(ctx, b1, b2, out),
            Self::Universal(j) => j.build_rows(ctx, b1, b2, out),
            Self::Fixed(j) => j.build_rows(ctx, b1, b2, out),
            Self::Null => {}
            Self::AngularMotor(j) => j.build_rows(ctx, b1, b2, out),
            Self::LinearMotor(j) => j.build_rows(ctx, b1, b2, out),
        }
    }

    /// Re-express stored geometry after the joint moved to other bodies,
    /// keeping its world-space anchors and axes.
    pub fn rebind(
        &mut self,
        old: (&BodyState, Option<&BodyState>),
        new: (&BodyState, Option<&BodyState>),
    ) {
        match self {
            Self::Ball(j) => j.rebind(old, new),
            Self::Hinge(j) => j.rebind(old, new),
            Self::Slider(j) => j.rebind(old, new),
            Self::Hinge2(j) => j.rebind(old, new),
            Self::Universal(j) => j.rebind(old, new),
            Self::Fixed(j) => j.set_fixed(new.0, new.1),
            Self::AngularMotor(j) => j.rebind(old, new),
            Self::LinearMotor(j) => j.rebind(old, new),
            Self::Contact(_) | Self::Null => {}
        }
    }

    fn limot(&self, axis: usize) -> Option<&LimitMotor> {
        match self {
            Self::Hinge(j) if axis == 0 => Some(&j.limot),
            Self::Slider(j) if axis == 0 => Some(&j.limot),
            Self::Universal(j) => match axis {
                0 => Some(&j.limot1),
                1 => Some(&j.limot2),
                _ => None,
            },
            Self::AngularMotor(j) => j.limots.get(axis),
            Self::LinearMotor(j) => j.limots.get(axis),
            _ => None,
        }
    }

    fn limot_mut(&mut self, axis: usize) -> Option<&mut LimitMotor> {
        match self {
            Self::Hinge(j) if axis == 0 => Some(&mut j.limot),
            Self::Slider(j) if axis == 0 => Some(&mut j.limot),
            Self::Universal(j) => match axis {
                0 => Some(&mut j.limot1),
                1 => Some(&mut j.limot2),
                _ => None,
            },
            Self::AngularMotor(j) => j.limots.get_mut(axis),
            Self::LinearMotor(j) => j.limots.get_mut(axis),
            _ => None,
        }
    }

    fn unsupported(&self, key: ParamKey) -> SimError {
        SimError::UnsupportedParameter {
            joint: self.joint_type().name(),
            code: key.code(),
        }
    }

    /// Read a parameter.
    pub fn param(&self, key: ParamKey) -> rigid_types::Result<Real> {
        let value = match self {
            Self::Hinge2(j) => j.param(key),
            _ => self.limot(key.axis).and_then(|l| l.get(key.param)),
        };
        value.ok_or_else(|| self.unsupported(key))
    }

    /// Write a parameter.
    pub fn set_param(&mut self, key: ParamKey, value: Real) -> rigid_types::Result<()> {
        let handled = match self {
            Self::Hinge2(j) => j.set_param(key, value)?,
            _ => match self.limot_mut(key.axis) {
                Some(limot) => limot.set(key, value)?,
                None => false,
            },
        };
        if handled {
            Ok(())
        } else {
            Err(self.unsupported(key))
        }
    }

    /// Read a parameter by integer code (`axis * 0x100 + param`).
    pub fn param_by_code(&self, code: i32) -> rigid_types::Result<Real> {
        match ParamKey::from_code(code) {
            Some(key) => self.param(key),
            None => Err(SimError::UnsupportedParameter {
                joint: self.joint_type().name(),
                code,
            }),
        }
    }

    /// Write a parameter by integer code.
    pub fn set_param_by_code(&mut self, code: i32, value: Real) -> rigid_types::Result<()> {
        match ParamKey::from_code(code) {
            Some(key) => self.set_param(key, value),
            None => Err(SimError::UnsupportedParameter {
                joint: self.joint_type().name(),
                code,
            }),
        }
    }

    accessors! {
        Ball => BallJoint, as_ball, as_ball_mut, "ball";
        Hinge => HingeJoint, as_hinge, as_hinge_mut, "hinge";
        Slider => SliderJoint, as_slider, as_slider_mut, "slider";
        Contact => ContactJoint, as_contact, as_contact_mut, "contact";
        Hinge2 => Hinge2Joint, as_hinge2, as_hinge2_mut, "hinge2";
        Universal => UniversalJoint, as_universal, as_universal_mut, "universal";
        Fixed => FixedJoint, as_fixed, as_fixed_mut, "fixed";
        AngularMotor => AngularMotorJoint, as_amotor, as_amotor_mut, "amotor";
        LinearMotor => LinearMotorJoint, as_lmotor, as_lmotor_mut, "lmotor";
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::limits::Param;

    #[test]
    fn test_type_round_trip() {
        for ty in JointType::ALL {
            assert_eq!(JointKind::new(ty, 0.2, 1e-10).joint_type(), ty);
        }
        assert_eq!(JointType::AngularMotor.to_string(), "amotor");
    }

    #[test]
    fn test_limits_start_from_world_softness() {
        let j = JointKind::new(JointType::Hinge, 0.3, 1e-6);
        assert_eq!(j.param(Param::StopErp.into()).unwrap(), 0.3);
        assert_eq!(j.param(Param::StopCfm.into()).unwrap(), 1e-6);
        assert_eq!(j.param(Param::Cfm.into()).unwrap(), 1e-6);
        assert_eq!(j.param(Param::LoStop.into()).unwrap(), -Real::INFINITY);
    }

    #[test]
    fn test_param_codes_route_to_axes() {
        let mut j = JointKind::new(JointType::Universal, 0.2, 1e-10);
        j.set_param_by_code(0x102, 3.0).unwrap();
        assert_eq!(j.as_universal().unwrap().limot2.vel, 3.0);
        assert_eq!(j.as_universal().unwrap().limot1.vel, 0.0);
        assert!(j.set_param_by_code(0x202, 1.0).is_err());
    }

    #[test]
    fn test_unsupported_parameters() {
        let mut ball = JointKind::new(JointType::Ball, 0.2, 1e-10);
        assert!(matches!(
            ball.set_param(Param::Vel.into(), 1.0),
            Err(SimError::UnsupportedParameter { joint: "ball", code: 2 })
        ));

        let mut hinge = JointKind::new(JointType::Hinge, 0.2, 1e-10);
        assert!(hinge.set_param(Param::SuspensionErp.into(), 0.5).is_err());

        let mut hinge2 = JointKind::new(JointType::Hinge2, 0.2, 1e-10);
        hinge2.set_param(Param::SuspensionErp.into(), 0.5).unwrap();
        assert_eq!(hinge2.param(Param::SuspensionErp.into()).unwrap(), 0.5);
    }

    #[test]
    fn test_accessor_mismatch() {
        let j = JointKind::new(JointType::Slider, 0.2, 1e-10);
        assert!(j.as_slider().is_ok());
        assert!(matches!(
            j.as_hinge(),
            Err(SimError::JointTypeMismatch { expected: "hinge", actual: "slider" })
        ));
    }

    #[test]
    fn test_null_joint_emits_nothing() {
        let mut out = JointOutput::new();
        JointKind::Null.build_rows(
            &RowContext::new(0.01, 0.2, 1e-10),
            &BodyState::fixed(),
            None,
            false,
            &mut out,
        );
        assert!(out.is_empty());
    }
}
