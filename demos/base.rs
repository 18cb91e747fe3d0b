//! Basic example driving a stepper controller over a serial port.
//!
//! This example shows how to:
//! - Open the port and wait for the board to boot
//! - Check the connection
//! - Configure the controller for 10 rpm
//! - Step one full turn clockwise
//!
//! Set `SMCC_SERIAL_PORT` to your serial port path and optionally
//! `SMCC_DEGREES_PER_STEP` to your motor's step angle. Run with
//! `RUST_LOG=debug` to see every frame on the wire.

use smcc_rs::frequency::angle_to_steps;
use smcc_rs::{Direction, Driver, SerialChannel, SerialConfig};
use std::env;
use std::error::Error;
use std::thread;
use std::time::Duration;

/// Step angle used when `SMCC_DEGREES_PER_STEP` is not set
const DEFAULT_DEGREES_PER_STEP: f64 = 3.75;

/// Target speed
const SPEED_RPM: f64 = 10.0;

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let config = SerialConfig::from_env()?;
    let degrees_per_step = match env::var("SMCC_DEGREES_PER_STEP") {
        Ok(value) => value.trim().parse()?,
        Err(_) => DEFAULT_DEGREES_PER_STEP,
    };

    println!("Connecting to: {}", config.port);
    let channel = SerialChannel::open(&config)?;

    println!("Waiting {:?} for the controller to reboot...", config.settle_time);
    thread::sleep(config.settle_time);

    let mut driver = Driver::new(channel);
    driver.set_degrees_per_step(degrees_per_step)?;

    // === Connection ===
    println!("\n=== Connection check ===");
    driver.check_connection()?;
    println!("Controller is talking to the host");

    // === Setup ===
    println!("\n=== Setup for {SPEED_RPM} rpm ===");
    let plan = driver.set_speed(SPEED_RPM)?;
    println!("Required frequency: {:.4} Hz", plan.required_hz);
    println!("Achievable frequency: {:.4} Hz", plan.achievable_hz);
    println!("Timer counter: {}", plan.timer_counter);

    let echo = driver.setup()?;
    println!("Setup echo: {echo}");

    // === One turn clockwise ===
    println!("\n=== One turn clockwise ===");
    let multiplier = driver.state().microstepping().multiplier();
    let steps_per_turn = angle_to_steps(360.0, degrees_per_step, multiplier)?;
    let echo = driver.step(Direction::Clockwise, steps_per_turn)?;
    println!("Step echo: {echo}");

    let turn_time = Duration::from_secs_f64(60.0 / SPEED_RPM);
    println!("Waiting {turn_time:?} for the move to finish...");
    thread::sleep(turn_time + Duration::from_secs(1));

    let info = driver.info()?;
    println!("Controller info: {info:?}");

    println!("\n=== Done ===");
    Ok(())
}
