//! Joint stops, motors and the integer-keyed parameter table.
//!
//! Every limited or powered degree of freedom carries a [`LimitMotor`]. It
//! emits at most one row per step:
//!
//! - a **motor row** driving the relative velocity toward `vel` with force
//!   bounded by `fmax`, or
//! - a **limit row** pushing the joint back inside `[lo_stop, hi_stop]`
//!   with its own ERP/CFM and optional bounce.
//!
//! Parameters are addressed by [`ParamKey`], whose integer code is
//! `axis * 0x100 + param`.

use nalgebra::Vector3;
use rigid_types::{Real, SimError, DEFAULT_CFM, DEFAULT_ERP};

use crate::row::{ConstraintRow, JointOutput, RowContext};
use crate::types::BodyState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stride between parameter groups of successive axes.
pub const PARAM_GROUP: i32 = 0x100;

/// Joint parameter names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(i32)]
pub enum Param {
    /// Low stop (angle or position).
    LoStop = 0,
    /// High stop.
    HiStop = 1,
    /// Motor target velocity.
    Vel = 2,
    /// Maximum motor force or torque.
    FMax = 3,
    /// Fraction of motor force applied when powering away from a stop.
    FudgeFactor = 4,
    /// Restitution of the stops.
    Bounce = 5,
    /// CFM used when not at a stop.
    Cfm = 6,
    /// ERP used at the stops.
    StopErp = 7,
    /// CFM used at the stops.
    StopCfm = 8,
    /// ERP of the hinge-2 suspension.
    SuspensionErp = 9,
    /// CFM of the hinge-2 suspension.
    SuspensionCfm = 10,
}

impl Param {
    const ALL: [Self; 11] = [
        Self::LoStop,
        Self::HiStop,
        Self::Vel,
        Self::FMax,
        Self::FudgeFactor,
        Self::Bounce,
        Self::Cfm,
        Self::StopErp,
        Self::StopCfm,
        Self::SuspensionErp,
        Self::SuspensionCfm,
    ];
}

/// A parameter on a specific axis of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParamKey {
    /// Which parameter.
    pub param: Param,
    /// Zero-based axis.
    pub axis: usize,
}

impl ParamKey {
    /// Key for `param` on `axis`.
    #[must_use]
    pub const fn new(param: Param, axis: usize) -> Self {
        Self { param, axis }
    }

    /// Integer code of this key.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub const fn code(self) -> i32 {
        self.axis as i32 * PARAM_GROUP + self.param as i32
    }

    /// Decode an integer parameter code.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn from_code(code: i32) -> Option<Self> {
        if code < 0 {
            return None;
        }
        let axis = (code / PARAM_GROUP) as usize;
        let index = (code % PARAM_GROUP) as usize;
        Param::ALL.get(index).map(|&param| Self { param, axis })
    }
}

impl From<Param> for ParamKey {
    fn from(param: Param) -> Self {
        Self::new(param, 0)
    }
}

/// Whether a joint coordinate is inside or beyond its stops.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LimitState {
    /// Between the stops.
    Free,
    /// At or below the low stop; holds `position - lo_stop` (non-positive).
    AtLower(Real),
    /// At or above the high stop; holds `position - hi_stop` (non-negative).
    AtUpper(Real),
}

impl LimitState {
    /// Check if the coordinate is at either stop.
    #[must_use]
    pub fn is_at_limit(&self) -> bool {
        !matches!(self, Self::Free)
    }

    /// Signed distance beyond the active stop, 0 if free.
    #[must_use]
    pub fn error(&self) -> Real {
        match self {
            Self::Free => 0.0,
            Self::AtLower(e) | Self::AtUpper(e) => *e,
        }
    }
}

/// Whether a limit/motor acts on rotation or translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    /// Torque about the axis.
    Angular,
    /// Force along the axis.
    Linear,
}

/// Stops and motor of one joint degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LimitMotor {
    /// Motor target velocity.
    pub vel: Real,
    /// Maximum motor force; 0 switches the motor off.
    pub fmax: Real,
    /// Fraction of `fmax` applied when powering away from a stop.
    pub fudge_factor: Real,
    /// Low stop.
    pub lo_stop: Real,
    /// High stop.
    pub hi_stop: Real,
    /// Restitution at the stops.
    pub bounce: Real,
    /// CFM of the motor row.
    pub normal_cfm: Real,
    /// ERP at the stops.
    pub stop_erp: Real,
    /// CFM at the stops.
    pub stop_cfm: Real,
}

impl Default for LimitMotor {
    fn default() -> Self {
        Self::new(DEFAULT_ERP, DEFAULT_CFM)
    }
}

impl LimitMotor {
    /// Unlimited, unpowered block taking softness from the world.
    #[must_use]
    pub fn new(erp: Real, cfm: Real) -> Self {
        Self {
            vel: 0.0,
            fmax: 0.0,
            fudge_factor: 1.0,
            lo_stop: -Real::INFINITY,
            hi_stop: Real::INFINITY,
            bounce: 0.0,
            normal_cfm: cfm,
            stop_erp: erp,
            stop_cfm: cfm,
        }
    }

    /// Read a parameter; `None` for parameters this block does not hold.
    #[must_use]
    pub fn get(&self, param: Param) -> Option<Real> {
        match param {
            Param::LoStop => Some(self.lo_stop),
            Param::HiStop => Some(self.hi_stop),
            Param::Vel => Some(self.vel),
            Param::FMax => Some(self.fmax),
            Param::FudgeFactor => Some(self.fudge_factor),
            Param::Bounce => Some(self.bounce),
            Param::Cfm => Some(self.normal_cfm),
            Param::StopErp => Some(self.stop_erp),
            Param::StopCfm => Some(self.stop_cfm),
            Param::SuspensionErp | Param::SuspensionCfm => None,
        }
    }

    /// Write a parameter.
    ///
    /// Returns `Ok(false)` for parameters this block does not hold, so the
    /// owning joint can try its own fields.
    pub fn set(&mut self, key: ParamKey, value: Real) -> rigid_types::Result<bool> {
        let invalid = |reason| SimError::InvalidParameterValue {
            code: key.code(),
            value,
            reason,
        };
        if value.is_nan() {
            return Err(invalid("value is NaN"));
        }
        match key.param {
            Param::LoStop => {
                if value > self.hi_stop {
                    return Err(invalid("low stop above high stop"));
                }
                self.lo_stop = value;
            }
            Param::HiStop => {
                if value < self.lo_stop {
                    return Err(invalid("high stop below low stop"));
                }
                self.hi_stop = value;
            }
            Param::Vel => self.vel = value,
            Param::FMax => {
                if value < 0.0 {
                    return Err(invalid("maximum force must be non-negative"));
                }
                self.fmax = value;
            }
            Param::FudgeFactor => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(invalid("fudge factor must be in [0, 1]"));
                }
                self.fudge_factor = value;
            }
            Param::Bounce => self.bounce = value,
            Param::Cfm => self.normal_cfm = value,
            Param::StopErp => self.stop_erp = value,
            Param::StopCfm => self.stop_cfm = value,
            Param::SuspensionErp | Param::SuspensionCfm => return Ok(false),
        }
        Ok(true)
    }

    /// Whether either stop is finite.
    #[must_use]
    pub fn has_stops(&self) -> bool {
        self.lo_stop > -Real::INFINITY || self.hi_stop < Real::INFINITY
    }

    /// Whether the motor is switched on.
    #[must_use]
    pub fn is_powered(&self) -> bool {
        self.fmax > 0.0
    }

    /// Classify a joint coordinate against the stops.
    #[must_use]
    pub fn limit_state(&self, position: Real) -> LimitState {
        if !self.has_stops() {
            LimitState::Free
        } else if position <= self.lo_stop {
            LimitState::AtLower(position - self.lo_stop)
        } else if position >= self.hi_stop {
            LimitState::AtUpper(position - self.hi_stop)
        } else {
            LimitState::Free
        }
    }

    /// Whether a row is needed in this state.
    #[must_use]
    pub fn needs_row(&self, state: LimitState) -> bool {
        self.is_powered() || state.is_at_limit()
    }

    /// Emit the motor or limit row along `axis` (world frame), if any.
    ///
    /// Returns the number of rows emitted (0 or 1).
    pub fn add_row(
        &self,
        ctx: &RowContext,
        state: LimitState,
        axis: &Vector3<Real>,
        kind: AxisKind,
        b1: &BodyState,
        b2: Option<&BodyState>,
        out: &mut JointOutput,
    ) -> usize {
        if !self.needs_row(state) {
            return 0;
        }

        let mut row = ConstraintRow::new(ctx.cfm);
        // Linear forces act at the midpoint between the two centers so that
        // the pair of forces creates no torque couple.
        let mut midpoint_torque = Vector3::zeros();
        match kind {
            AxisKind::Angular => {
                row.j1_angular = *axis;
                row.j2_angular = -axis;
            }
            AxisKind::Linear => {
                row.j1_linear = *axis;
                row.j2_linear = -axis;
                if let Some(b2) = b2 {
                    midpoint_torque = 0.5 * (b2.position - b1.position).cross(axis);
                    row.j1_angular = midpoint_torque;
                    row.j2_angular = midpoint_torque;
                }
            }
        }

        let limited = state.is_at_limit();
        let locked = limited && self.lo_stop == self.hi_stop;
        let powered = self.is_powered() && !locked;

        if powered {
            row.cfm = self.normal_cfm;
            if limited {
                // A motor pushing against a stop is applied directly at full
                // force; pushing away from it, only the fudge fraction.
                let mut fm = if self.vel > 0.0 { -self.fmax } else { self.fmax };
                let away = matches!(state, LimitState::AtLower(_)) && self.vel > 0.0
                    || matches!(state, LimitState::AtUpper(_)) && self.vel < 0.0;
                if away {
                    fm *= self.fudge_factor;
                }
                let push = axis * fm;
                match kind {
                    AxisKind::Angular => {
                        out.load1.torque -= push;
                        out.load2.torque += push;
                    }
                    AxisKind::Linear => {
                        out.load1.force -= push;
                        out.load2.force += push;
                        out.load1.torque -= midpoint_torque * fm;
                        out.load2.torque -= midpoint_torque * fm;
                    }
                }
            } else {
                row.rhs = self.vel;
                row.lo = -self.fmax;
                row.hi = self.fmax;
            }
        }

        if limited {
            row.rhs = -ctx.correction(self.stop_erp, state.error());
            row.cfm = self.stop_cfm;
            if locked {
                row.lo = -Real::INFINITY;
                row.hi = Real::INFINITY;
            } else {
                let velocity = match kind {
                    AxisKind::Angular => {
                        axis.dot(&b1.angular_velocity)
                            - b2.map_or(0.0, |b| axis.dot(&b.angular_velocity))
                    }
                    AxisKind::Linear => {
                        axis.dot(&b1.linear_velocity)
                            - b2.map_or(0.0, |b| axis.dot(&b.linear_velocity))
                    }
                };
                if let LimitState::AtLower(_) = state {
                    row.lo = 0.0;
                    row.hi = Real::INFINITY;
                    if self.bounce > 0.0 && velocity < 0.0 {
                        row.rhs = row.rhs.max(-self.bounce * velocity);
                    }
                } else {
                    row.lo = -Real::INFINITY;
                    row.hi = 0.0;
                    if self.bounce > 0.0 && velocity > 0.0 {
                        row.rhs = row.rhs.min(-self.bounce * velocity);
                    }
                }
            }
        }

        out.rows.push(row);
        1
    }
}
