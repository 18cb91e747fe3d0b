use crate::{
    Direction, Error, MAX_SPEED_RPM, MAX_STEPS, MIN_SPEED_RPM, MIN_STEPS, MicrosteppingMode,
    frequency::{FrequencyPlan, achievable_frequency},
};

/// Everything the host knows about how the motor should be driven.
///
/// The control lines `reset`, `enable` and `sleep` are written to the driver
/// as-is, and the driver treats all three as active low: `reset: true` means
/// "not in reset" and `enable: false` means "outputs enabled".
///
/// Fields that depend on the motor or on a calculation are `None` until they
/// are known, so a frame is never built from a placeholder value. The
/// frequency plan and its inputs are only reachable through setters, which
/// keep the plan in step with the mode, speed and step angle.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ControlState {
    microstepping: MicrosteppingMode,
    pub reset: bool,
    pub enable: bool,
    pub sleep: bool,
    pub direction: Direction,
    speed_rpm: Option<f64>,
    pub steps: Option<u16>,
    degrees_per_step: Option<f64>,
    frequency: Option<FrequencyPlan>,
    pub halted: bool,
}

impl Default for ControlState {
    /// The controller's power-on configuration: full step, out of reset,
    /// outputs enabled, awake.
    fn default() -> Self {
        Self {
            microstepping: MicrosteppingMode::Full,
            reset: true,
            enable: false,
            sleep: true,
            direction: Direction::CounterClockwise,
            speed_rpm: None,
            steps: None,
            degrees_per_step: None,
            frequency: None,
            halted: false,
        }
    }
}

impl ControlState {
    /// Creates a default state for a motor with the given step angle.
    #[must_use]
    pub fn for_motor(degrees_per_step: f64) -> Self {
        Self {
            degrees_per_step: Some(degrees_per_step),
            ..Default::default()
        }
    }

    /// Default state with a fixed timer counter and no motor, used to probe
    /// the link without touching the caller's configuration.
    pub(crate) fn with_timer_counter(timer_counter: u32) -> Self {
        let hz = achievable_frequency(timer_counter);
        Self {
            frequency: Some(FrequencyPlan {
                required_hz: hz,
                achievable_hz: hz,
                timer_counter,
            }),
            ..Default::default()
        }
    }

    /// Microstepping mode sent with the next SETUP.
    #[must_use]
    pub const fn microstepping(&self) -> MicrosteppingMode {
        self.microstepping
    }

    /// Requested speed, once set.
    #[must_use]
    pub const fn speed_rpm(&self) -> Option<f64> {
        self.speed_rpm
    }

    /// Motor step angle, once known.
    #[must_use]
    pub const fn degrees_per_step(&self) -> Option<f64> {
        self.degrees_per_step
    }

    /// The plan derived from the current speed, mode and step angle.
    #[must_use]
    pub const fn frequency(&self) -> Option<FrequencyPlan> {
        self.frequency
    }

    /// Records the motor's step angle, re-deriving the frequency if a speed is set.
    ///
    /// # Errors
    /// See [`ControlState::derive_frequency`].
    pub fn set_degrees_per_step(&mut self, degrees_per_step: f64) -> Result<(), Error> {
        self.degrees_per_step = Some(degrees_per_step);
        if self.speed_rpm.is_some() {
            self.derive_frequency()?;
        } else {
            self.frequency = None;
        }
        Ok(())
    }

    /// Sets the requested speed and derives the timer configuration for it.
    ///
    /// # Errors
    /// See [`ControlState::derive_frequency`].
    pub fn set_speed(&mut self, speed_rpm: f64) -> Result<FrequencyPlan, Error> {
        self.speed_rpm = Some(speed_rpm);
        self.derive_frequency()
    }

    /// Changes the microstepping mode, re-deriving the frequency if a speed is set.
    ///
    /// # Errors
    /// See [`ControlState::derive_frequency`].
    pub fn set_microstepping(&mut self, mode: MicrosteppingMode) -> Result<(), Error> {
        self.microstepping = mode;
        if self.speed_rpm.is_some() {
            self.derive_frequency()?;
        } else {
            self.frequency = None;
        }
        Ok(())
    }

    /// Sets the number of steps for the next STEP command.
    ///
    /// # Errors
    /// Returns `Error::LimitExceeded` if `steps` exceeds `MAX_STEPS`.
    pub fn set_steps(&mut self, steps: u16) -> Result<(), Error> {
        validate_steps(steps)?;
        self.steps = Some(steps);
        Ok(())
    }

    /// Computes and stores the frequency plan for the current speed and mode.
    ///
    /// A failed derivation clears any previously stored plan.
    ///
    /// # Errors
    /// - `Error::Unset` if the speed or the motor step angle is missing.
    /// - `Error::LimitExceeded` if the speed is outside `MIN_SPEED_RPM..=MAX_SPEED_RPM`.
    /// - `Error::InvalidFrequency` if no positive frequency results.
    pub fn derive_frequency(&mut self) -> Result<FrequencyPlan, Error> {
        self.frequency = None;
        let degrees_per_step = self.degrees_per_step.ok_or(Error::Unset("degrees_per_step"))?;
        let speed_rpm = self.speed_rpm.ok_or(Error::Unset("speed_rpm"))?;
        validate_speed(speed_rpm)?;

        let plan = FrequencyPlan::new(
            speed_rpm,
            degrees_per_step,
            self.microstepping.multiplier(),
        )?;
        self.frequency = Some(plan);
        Ok(plan)
    }

    /// Timer counter of the stored plan, if one has been derived.
    #[must_use]
    pub fn timer_counter(&self) -> Option<u32> {
        self.frequency.map(|plan| plan.timer_counter)
    }
}

/// Checks a speed against the controller's software limits.
///
/// # Errors
/// Returns `Error::LimitExceeded` outside `MIN_SPEED_RPM..=MAX_SPEED_RPM`.
pub fn validate_speed(speed_rpm: f64) -> Result<(), Error> {
    if (MIN_SPEED_RPM..=MAX_SPEED_RPM).contains(&speed_rpm) {
        Ok(())
    } else {
        Err(Error::LimitExceeded)
    }
}

/// Checks a step count against the controller's step register.
///
/// # Errors
/// Returns `Error::LimitExceeded` outside `MIN_STEPS..=MAX_STEPS`.
pub fn validate_steps(steps: u16) -> Result<(), Error> {
    if (MIN_STEPS..=MAX_STEPS).contains(&steps) {
        Ok(())
    } else {
        Err(Error::LimitExceeded)
    }
}
