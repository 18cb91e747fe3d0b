//! Safety framework for hardware tests
//!
//! Limits kept well inside the controller's software limits so a test run
//! cannot drive a mounted motor far.

/// Step angle of the test motor (48 steps per revolution)
pub const TEST_DEGREES_PER_STEP: f64 = 3.75;

/// Maximum speed for movement tests
pub const MAX_SAFE_SPEED_RPM: f64 = 10.0;

/// Maximum steps for a single movement test (a quarter turn at full step)
pub const MAX_SAFE_STEPS: u16 = 12;

/// Commands that should never run unattended
pub const DANGEROUS_OPERATIONS: &[(&str, &str)] = &[
    (
        "setup_with_reset",
        "Holding the driver in reset loses the microstep position",
    ),
    (
        "step_full_range",
        "32767 steps is several hundred revolutions",
    ),
];

/// Check if an operation should be skipped during testing
pub fn should_skip(operation: &str) -> bool {
    DANGEROUS_OPERATIONS
        .iter()
        .any(|(name, _)| *name == operation)
}

/// Validate speed parameter is within safe limits
pub fn validate_safe_speed(speed_rpm: f64) -> Result<(), String> {
    if speed_rpm > MAX_SAFE_SPEED_RPM {
        Err(format!(
            "Speed {} rpm exceeds safe limit of {} rpm",
            speed_rpm, MAX_SAFE_SPEED_RPM
        ))
    } else {
        Ok(())
    }
}

/// Validate step count is within safe limits
pub fn validate_safe_steps(steps: u16) -> Result<(), String> {
    if steps > MAX_SAFE_STEPS {
        Err(format!(
            "{} steps exceeds safe limit of {} steps",
            steps, MAX_SAFE_STEPS
        ))
    } else {
        Ok(())
    }
}
