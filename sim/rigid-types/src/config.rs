//! Configuration types for the dynamics world.
//!
//! [`WorldConfig`] carries every global parameter of a world: gravity, the
//! error-reduction and constraint-force-mixing defaults, solver settings,
//! contact correction limits and the auto-disable defaults new bodies track.

use nalgebra::Vector3;

use crate::Real;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default error-reduction parameter.
pub const DEFAULT_ERP: Real = 0.2;

/// Default number of joint hops a pairwise step wakes disabled bodies
/// through.
pub const DEFAULT_AUTO_ENABLE_DEPTH: usize = 3;

/// Default constraint force mixing.
#[cfg(not(feature = "single-precision"))]
pub const DEFAULT_CFM: Real = 1e-10;

/// Default constraint force mixing.
#[cfg(feature = "single-precision")]
pub const DEFAULT_CFM: Real = 1e-5;

/// Global configuration of a world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldConfig {
    /// Gravity acceleration applied to bodies with gravity mode on.
    pub gravity: Vector3<Real>,
    /// Fraction of joint error corrected per step, in `[0, 1]`.
    pub erp: Real,
    /// Softness added to every row diagonal unless a joint overrides it.
    pub cfm: Real,
    /// Settings for the iterative solver.
    pub quick_step: QuickStepConfig,
    /// Settings for the dense solver.
    pub direct: DirectSolverConfig,
    /// Upper bound on stabilization velocity, unbounded by default.
    pub contact_max_correcting_vel: Real,
    /// Penetration depth tolerated before contacts push back.
    pub contact_surface_layer: Real,
    /// Auto-disable parameters bodies use unless overridden.
    pub auto_disable: AutoDisableParams,
    /// Joint hops a pairwise step wakes disabled bodies through, counted
    /// from the nearest enabled body.
    pub auto_enable_depth: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vector3::zeros(),
            erp: DEFAULT_ERP,
            cfm: DEFAULT_CFM,
            quick_step: QuickStepConfig::default(),
            direct: DirectSolverConfig::default(),
            contact_max_correcting_vel: Real::INFINITY,
            contact_surface_layer: 0.0,
            auto_disable: AutoDisableParams::default(),
            auto_enable_depth: DEFAULT_AUTO_ENABLE_DEPTH,
        }
    }
}

impl WorldConfig {
    /// Configuration with standard earth gravity along -Z.
    #[must_use]
    pub fn earth() -> Self {
        Self::default().with_gravity(Vector3::new(0.0, 0.0, -9.81))
    }

    /// Configuration without gravity.
    #[must_use]
    pub fn zero_gravity() -> Self {
        Self::default()
    }

    /// Set the gravity vector.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vector3<Real>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the global ERP.
    #[must_use]
    pub fn with_erp(mut self, erp: Real) -> Self {
        self.erp = erp;
        self
    }

    /// Set the global CFM.
    #[must_use]
    pub fn with_cfm(mut self, cfm: Real) -> Self {
        self.cfm = cfm;
        self
    }

    /// Set the iterative solver settings.
    #[must_use]
    pub fn with_quick_step(mut self, quick_step: QuickStepConfig) -> Self {
        self.quick_step = quick_step;
        self
    }

    /// Set the dense solver settings.
    #[must_use]
    pub fn with_direct(mut self, direct: DirectSolverConfig) -> Self {
        self.direct = direct;
        self
    }

    /// Set the contact correction velocity bound.
    #[must_use]
    pub fn with_contact_max_correcting_vel(mut self, vel: Real) -> Self {
        self.contact_max_correcting_vel = vel;
        self
    }

    /// Set the contact surface layer depth.
    #[must_use]
    pub fn with_contact_surface_layer(mut self, depth: Real) -> Self {
        self.contact_surface_layer = depth;
        self
    }

    /// Set the auto-disable defaults.
    #[must_use]
    pub fn with_auto_disable(mut self, params: AutoDisableParams) -> Self {
        self.auto_disable = params;
        self
    }

    /// Set the wake depth used by pairwise stepping.
    #[must_use]
    pub fn with_auto_enable_depth(mut self, depth: usize) -> Self {
        self.auto_enable_depth = depth;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }
        if !(0.0..=1.0).contains(&self.erp) {
            return Err(crate::SimError::invalid_config("erp must be in [0, 1]"));
        }
        if !self.cfm.is_finite() || self.cfm < 0.0 {
            return Err(crate::SimError::invalid_config(
                "cfm must be non-negative and finite",
            ));
        }
        if self.contact_max_correcting_vel.is_nan() || self.contact_max_correcting_vel < 0.0 {
            return Err(crate::SimError::invalid_config(
                "contact max correcting velocity must be non-negative",
            ));
        }
        if !self.contact_surface_layer.is_finite() || self.contact_surface_layer < 0.0 {
            return Err(crate::SimError::invalid_config(
                "contact surface layer must be non-negative and finite",
            ));
        }
        self.quick_step.validate()?;
        self.direct.validate()?;
        self.auto_disable.validate()
    }
}

/// Settings for the successive-over-relaxation solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuickStepConfig {
    /// Number of sweeps over all rows per step. Always run in full.
    pub iterations: usize,
    /// Over-relaxation factor w.
    pub sor_w: Real,
}

impl Default for QuickStepConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            sor_w: 1.3,
        }
    }
}

impl QuickStepConfig {
    /// More sweeps, plain Gauss-Seidel.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            iterations: 100,
            sor_w: 1.0,
        }
    }

    /// Few sweeps for large scenes.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            iterations: 8,
            sor_w: 1.3,
        }
    }

    /// Set the sweep count.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the relaxation factor.
    #[must_use]
    pub fn with_sor_w(mut self, sor_w: Real) -> Self {
        self.sor_w = sor_w;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.sor_w > 0.0 && self.sor_w < 2.0) {
            return Err(crate::SimError::invalid_config(
                "SOR factor must be in (0, 2)",
            ));
        }
        Ok(())
    }
}

/// Settings for the dense direct solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DirectSolverConfig {
    /// Maximum active-set changes per LCP solve, in multiples of the row count.
    pub pivot_budget_factor: usize,
    /// Maximum fixed-point passes over friction bounds.
    pub friction_iterations: usize,
    /// Relative change in friction bounds below which refinement stops.
    pub friction_tolerance: Real,
}

impl Default for DirectSolverConfig {
    fn default() -> Self {
        Self {
            pivot_budget_factor: 4,
            friction_iterations: 16,
            friction_tolerance: 1e-6,
        }
    }
}

impl DirectSolverConfig {
    /// Set the friction refinement limits.
    #[must_use]
    pub fn with_friction_refinement(mut self, iterations: usize, tolerance: Real) -> Self {
        self.friction_iterations = iterations;
        self.friction_tolerance = tolerance;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.pivot_budget_factor == 0 {
            return Err(crate::SimError::invalid_config(
                "pivot budget factor must be positive",
            ));
        }
        if self.friction_iterations == 0 {
            return Err(crate::SimError::invalid_config(
                "friction refinement needs at least one pass",
            ));
        }
        if !self.friction_tolerance.is_finite() || self.friction_tolerance <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "friction tolerance must be positive",
            ));
        }
        Ok(())
    }
}

/// Auto-disable parameters for one body, or the world defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AutoDisableParams {
    /// Whether idle bodies are disabled automatically.
    pub enabled: bool,
    /// Linear speed at or below which a body counts as idle.
    pub linear_threshold: Real,
    /// Angular speed at or below which a body counts as idle.
    pub angular_threshold: Real,
    /// Consecutive idle steps required before disabling.
    pub idle_steps: u32,
    /// Cumulative idle time required before disabling.
    pub idle_time: Real,
}

impl Default for AutoDisableParams {
    fn default() -> Self {
        Self {
            enabled: false,
            linear_threshold: 0.01,
            angular_threshold: 0.01,
            idle_steps: 10,
            idle_time: 0.0,
        }
    }
}

impl AutoDisableParams {
    /// Default thresholds with auto-disable switched on.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Set the flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set both velocity thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, linear: Real, angular: Real) -> Self {
        self.linear_threshold = linear;
        self.angular_threshold = angular;
        self
    }

    /// Set the idle step count.
    #[must_use]
    pub fn with_idle_steps(mut self, steps: u32) -> Self {
        self.idle_steps = steps;
        self
    }

    /// Set the idle time.
    #[must_use]
    pub fn with_idle_time(mut self, time: Real) -> Self {
        self.idle_time = time;
        self
    }

    /// Validate the parameters.
    pub fn validate(&self) -> crate::Result<()> {
        if self.linear_threshold.is_nan() || self.linear_threshold < 0.0 {
            return Err(crate::SimError::invalid_config(
                "linear threshold must be non-negative",
            ));
        }
        if self.angular_threshold.is_nan() || self.angular_threshold < 0.0 {
            return Err(crate::SimError::invalid_config(
                "angular threshold must be non-negative",
            ));
        }
        if !self.idle_time.is_finite() || self.idle_time < 0.0 {
            return Err(crate::SimError::invalid_config(
                "idle time must be non-negative and finite",
            ));
        }
        Ok(())
    }
}
