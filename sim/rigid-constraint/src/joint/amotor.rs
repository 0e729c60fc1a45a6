//! Angular motor: up to three powered or limited rotation axes.

use nalgebra::Vector3;
use rigid_types::{Real, SimError};

use crate::geometry::{frame_or_static, plane_space, try_unit, unit_axis};
use crate::limits::{AxisKind, LimitMotor};
use crate::row::{JointOutput, RowContext};
use crate::types::{BodyState, Load};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of motor axes.
pub const MAX_MOTOR_AXES: usize = 3;

/// Frame a motor axis is fixed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AxisFrame {
    /// Fixed in the world.
    #[default]
    Global,
    /// Rotates with body 1.
    Body1,
    /// Rotates with body 2 (the world when body 2 is absent).
    Body2,
}

impl AxisFrame {
    /// The same anchoring seen from the other end of a reversed joint.
    #[must_use]
    pub fn swapped(self) -> Self {
        match self {
            Self::Global => Self::Global,
            Self::Body1 => Self::Body2,
            Self::Body2 => Self::Body1,
        }
    }
}

/// A unit axis stored in the coordinates of its anchoring frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorAxis {
    /// Anchoring frame.
    pub frame: AxisFrame,
    /// Direction in `frame` coordinates.
    pub local: Vector3<Real>,
}

impl Default for MotorAxis {
    fn default() -> Self {
        Self {
            frame: AxisFrame::Global,
            local: Vector3::x(),
        }
    }
}

impl MotorAxis {
    /// Store a world direction in the coordinates of `frame`.
    pub fn new(
        frame: AxisFrame,
        world: &Vector3<Real>,
        b1: &BodyState,
        b2: Option<&BodyState>,
    ) -> rigid_types::Result<Self> {
        let axis = unit_axis(world)?;
        let local = match frame {
            AxisFrame::Global => axis,
            AxisFrame::Body1 => b1.to_local(&axis),
            AxisFrame::Body2 => frame_or_static(b2).to_local(&axis),
        };
        Ok(Self { frame, local })
    }

    /// Direction in world coordinates.
    #[must_use]
    pub fn world(&self, b1: &BodyState, b2: Option<&BodyState>) -> Vector3<Real> {
        match self.frame {
            AxisFrame::Global => self.local,
            AxisFrame::Body1 => b1.to_world(&self.local),
            AxisFrame::Body2 => frame_or_static(b2).to_world(&self.local),
        }
    }
}

pub(crate) fn check_axis_index(index: usize) -> rigid_types::Result<()> {
    if index < MAX_MOTOR_AXES {
        Ok(())
    } else {
        Err(SimError::AxisOutOfRange {
            index,
            count: MAX_MOTOR_AXES,
        })
    }
}

/// How an angular motor obtains its axis angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AMotorMode {
    /// Angles are supplied by the caller each step.
    #[default]
    User,
    /// Angles are the Euler angles of the relative orientation; axis 0 is
    /// fixed in body 1, axis 2 in body 2 and axis 1 is derived.
    Euler,
}

/// Angular motor joint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AngularMotorJoint {
    mode: AMotorMode,
    num_axes: usize,
    axes: [MotorAxis; MAX_MOTOR_AXES],
    /// User-supplied angles.
    angles: [Real; MAX_MOTOR_AXES],
    /// Axis 2 in body 1 coordinates at zero angle (Euler mode).
    reference1: Vector3<Real>,
    /// Axis 0 in body 2 coordinates at zero angle (Euler mode).
    reference2: Vector3<Real>,
    /// Stops and motor per axis.
    pub limots: [LimitMotor; MAX_MOTOR_AXES],
}

impl AngularMotorJoint {
    /// Motor in user mode with no axes.
    #[must_use]
    pub fn new(erp: Real, cfm: Real) -> Self {
        Self {
            mode: AMotorMode::User,
            num_axes: 0,
            axes: [MotorAxis::default(); MAX_MOTOR_AXES],
            angles: [0.0; MAX_MOTOR_AXES],
            reference1: Vector3::z(),
            reference2: Vector3::x(),
            limots: [LimitMotor::new(erp, cfm); MAX_MOTOR_AXES],
        }
    }

    /// Angle mode.
    #[must_use]
    pub fn mode(&self) -> AMotorMode {
        self.mode
    }

    /// Set the angle mode. Euler mode always uses three axes.
    pub fn set_mode(&mut self, mode: AMotorMode) {
        self.mode = mode;
        if mode == AMotorMode::Euler {
            self.num_axes = MAX_MOTOR_AXES;
        }
    }

    /// Number of active axes.
    #[must_use]
    pub fn num_axes(&self) -> usize {
        self.num_axes
    }

    /// Set the number of active axes (0 to 3; fixed at 3 in Euler mode).
    pub fn set_num_axes(&mut self, num: usize) -> rigid_types::Result<()> {
        if num > MAX_MOTOR_AXES {
            return Err(SimError::AxisOutOfRange {
                index: num,
                count: MAX_MOTOR_AXES,
            });
        }
        self.num_axes = if self.mode == AMotorMode::Euler {
            MAX_MOTOR_AXES
        } else {
            num
        };
        Ok(())
    }

    /// Set axis `index` from a world direction anchored to `frame`.
    pub fn set_axis(
        &mut self,
        index: usize,
        frame: AxisFrame,
        axis: &Vector3<Real>,
        b1: &BodyState,
        b2: Option<&BodyState>,
    ) -> rigid_types::Result<()> {
        check_axis_index(index)?;
        self.axes[index] = MotorAxis::new(frame, axis, b1, b2)?;
        if self.mode == AMotorMode::Euler {
            self.set_euler_references(b1, b2);
        }
        Ok(())
    }

    /// Stored axis `index`.
    pub fn motor_axis(&self, index: usize) -> rigid_types::Result<MotorAxis> {
        check_axis_index(index)?;
        Ok(self.axes[index])
    }

    /// Axis `index` in world coordinates. In Euler mode axis 1 is derived
    /// from the other two.
    pub fn axis(
        &self,
        index: usize,
        b1: &BodyState,
        b2: Option<&BodyState>,
    ) -> rigid_types::Result<Vector3<Real>> {
        check_axis_index(index)?;
        Ok(self.world_axes(b1, b2)[index])
    }

    /// Supply the angle of axis `index` (user mode).
    pub fn set_angle(&mut self, index: usize, angle: Real) -> rigid_types::Result<()> {
        check_axis_index(index)?;
        self.angles[index] = angle;
        Ok(())
    }

    /// Current angle of axis `index`.
    pub fn angle(
        &self,
        index: usize,
        b1: &BodyState,
        b2: Option<&BodyState>,
    ) -> rigid_types::Result<Real> {
        check_axis_index(index)?;
        Ok(self.current_angles(b1, b2)[index])
    }

    /// Rate of change of the angle of axis `index`.
    pub fn angle_rate(
        &self,
        index: usize,
        b1: &BodyState,
        b2: Option<&BodyState>,
    ) -> rigid_types::Result<Real> {
        check_axis_index(index)?;
        let axis = self.world_axes(b1, b2)[index];
        Ok(axis.dot(&(b1.angular_velocity - frame_or_static(b2).angular_velocity)))
    }

    /// Equal and opposite torques about the active axes.
    #[must_use]
    pub fn torque_loads(
        &self,
        b1: &BodyState,
        b2: Option<&BodyState>,
        torques: [Real; MAX_MOTOR_AXES],
    ) -> (Load, Load) {
        let axes = self.world_axes(b1, b2);
        let t = axes
            .iter()
            .zip(torques)
            .take(self.num_axes)
            .fold(Vector3::zeros(), |acc, (axis, t)| acc + axis * t);
        (
            Load { force: Vector3::zeros(), torque: t },
            Load { force: Vector3::zeros(), torque: -t },
        )
    }

    fn set_euler_references(&mut self, b1: &BodyState, b2: Option<&BodyState>) {
        let frame2 = frame_or_static(b2);
        let axis0 = self.axes[0].local;
        let axis2 = self.axes[2].local;
        self.reference1 = b1.to_local(&frame2.to_world(&axis2));
        self.reference2 = frame2.to_local(&b1.to_world(&axis0));
    }

    fn world_axes(&self, b1: &BodyState, b2: Option<&BodyState>) -> [Vector3<Real>; MAX_MOTOR_AXES] {
        match self.mode {
            AMotorMode::User => [
                self.axes[0].world(b1, b2),
                self.axes[1].world(b1, b2),
                self.axes[2].world(b1, b2),
            ],
            AMotorMode::Euler => {
                let ax0 = b1.to_world(&self.axes[0].local);
                let ax2 = frame_or_static(b2).to_world(&self.axes[2].local);
                let ax1 = try_unit(&ax2.cross(&ax0)).unwrap_or_else(|| plane_space(&ax0).0);
                [ax0, ax1, ax2]
            }
        }
    }

    fn current_angles(&self, b1: &BodyState, b2: Option<&BodyState>) -> [Real; MAX_MOTOR_AXES] {
        match self.mode {
            AMotorMode::User => self.angles,
            AMotorMode::Euler => {
                let [ax0, ax1, ax2] = self.world_axes(b1, b2);
                let ref1 = b1.to_world(&self.reference1);
                let ref2 = frame_or_static(b2).to_world(&self.reference2);

                let q = ax0.cross(&ref1);
                let angle0 = -ax2.dot(&q).atan2(ax2.dot(&ref1));
                let q = ax0.cross(&ax1);
                let angle1 = -ax2.dot(&ax0).atan2(ax2.dot(&q));
                let q = ax1.cross(&ax2);
                let angle2 = -ref2.dot(&ax1).atan2(ref2.dot(&q));
                [angle0, angle1, angle2]
            }
        }
    }

    pub(crate) fn build_rows(
        &self,
        ctx: &RowContext,
        b1: &BodyState,
        b2: Option<&BodyState>,
        out: &mut JointOutput,
    ) {
        let axes = self.world_axes(b1, b2);
        let angles = self.current_angles(b1, b2);
        for i in 0..self.num_axes {
            let limot = &self.limots[i];
            let state = limot.limit_state(angles[i]);
            limot.add_row(ctx, state, &axes[i], AxisKind::Angular, b1, b2, out);
        }
    }

    pub(crate) fn rebind(
        &mut self,
        old: (&BodyState, Option<&BodyState>),
        new: (&BodyState, Option<&BodyState>),
    ) {
        for axis in &mut self.axes {
            let world = axis.world(old.0, old.1);
            if let Ok(rebound) = MotorAxis::new(axis.frame, &world, new.0, new.1) {
                *axis = rebound;
            }
        }
        if self.mode == AMotorMode::Euler {
            self.set_euler_references(new.0, new.1);
        }
    }
}
