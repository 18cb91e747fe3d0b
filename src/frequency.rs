//! Pulse frequency planning for the controller's 16-bit timer.
//!
//! The controller toggles the STEP line from a timer interrupt running off
//! `CLOCK_HZ / PRESCALER`, so only frequencies of the form
//! `CLOCK_HZ / (2 * PRESCALER * (1 + counter))` are reachable.
//!
//! Also converts shaft angles into STEP pulse counts.

use crate::{CLOCK_HZ, Error, MAX_STEPS, PRESCALER};

const CLOCK: f64 = CLOCK_HZ as f64;
const DIVIDER: f64 = 2.0 * PRESCALER as f64;

/// The frequency a requested speed needs and what the timer can actually do.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrequencyPlan {
    /// Pulse frequency the requested speed calls for, in Hz.
    pub required_hz: f64,
    /// Pulse frequency the timer produces with `timer_counter`, in Hz.
    pub achievable_hz: f64,
    /// Value loaded into the timer compare register.
    pub timer_counter: u32,
}

impl FrequencyPlan {
    /// Plans the timer for `speed_rpm` on a motor turning `degrees_per_step`
    /// per full step, with `multiplier` microsteps per full step.
    ///
    /// The counter is rounded half away from zero. It is not limited to 16 bits
    /// here; packing it into a SETUP frame is what enforces the register width.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrequency` if the inputs do not give a finite,
    /// positive frequency, or the frequency is above what the timer reaches
    /// with a zero counter.
    pub fn new(speed_rpm: f64, degrees_per_step: f64, multiplier: u32) -> Result<Self, Error> {
        let required_hz = required_frequency(speed_rpm, degrees_per_step, multiplier)?;

        let exact_counter = CLOCK / (required_hz * DIVIDER) - 1.0;
        let rounded = exact_counter + 0.5;
        if !(0.0..=f64::from(u32::MAX)).contains(&rounded) {
            return Err(Error::InvalidFrequency);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let timer_counter = rounded as u32;

        Ok(Self {
            required_hz,
            achievable_hz: achievable_frequency(timer_counter),
            timer_counter,
        })
    }

    /// Difference between what the timer does and what was asked for, in Hz.
    #[must_use]
    pub fn error_hz(&self) -> f64 {
        self.achievable_hz - self.required_hz
    }
}

/// Step pulse frequency, in Hz, for a speed in revolutions per minute.
///
/// # Errors
/// Returns `Error::InvalidFrequency` unless the result is finite and positive.
pub fn required_frequency(
    speed_rpm: f64,
    degrees_per_step: f64,
    multiplier: u32,
) -> Result<f64, Error> {
    let hz = (speed_rpm * 360.0 * f64::from(multiplier)) / (60.0 * degrees_per_step);
    if hz.is_finite() && hz > 0.0 {
        Ok(hz)
    } else {
        Err(Error::InvalidFrequency)
    }
}

/// Frequency the timer produces for a given counter.
#[must_use]
pub fn achievable_frequency(timer_counter: u32) -> f64 {
    CLOCK / (DIVIDER * (1.0 + f64::from(timer_counter)))
}

/// Number of STEP pulses that turn the shaft by `angle` degrees, rounded to
/// the nearest pulse.
///
/// # Errors
/// Returns `Error::LimitExceeded` if the count is not a finite value within
/// `0..=MAX_STEPS`.
pub fn angle_to_steps(angle: f64, degrees_per_step: f64, multiplier: u32) -> Result<u16, Error> {
    let pulses = angle * f64::from(multiplier) / degrees_per_step + 0.5;
    if !(0.0..f64::from(MAX_STEPS) + 1.0).contains(&pulses) {
        return Err(Error::LimitExceeded);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let steps = pulses as u16;
    Ok(steps)
}
