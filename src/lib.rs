//! A `no_std` host-side driver for serial **stepper-motor controllers**.
//!
//! The controller (an Arduino-class board with a 16 MHz clock driving a
//! microstepping driver chip) understands four fixed 3-byte commands:
//!
//! | Command | Byte 0, bits 0-1 | Rest of byte 0 | Bytes 1-2 | Reply |
//! |---|---|---|---|---|
//! | SETUP | `10` | microstep select, reset, enable, sleep | timer counter | echo |
//! | STEP | `00` | direction | step count | echo |
//! | INFO | `01` | - | - | SETUP echo + STEP echo |
//! | HALT | `11` | - | - | see [`Revision`] |
//!
//! Bits are numbered from the most significant end and multi-byte fields are
//! big-endian. Every SETUP and STEP is acknowledged by echoing it back, and a
//! reply that differs from the command is reported as [`Error::EchoMismatch`].
//!
//! The crate builds frames and runs the exchange over any [`Channel`]. With
//! the `std` feature it also provides a [`SerialChannel`] over the `serial`
//! crate and environment based [`SerialConfig`].

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod codec;
pub mod command;
#[cfg(feature = "std")]
pub mod config;
pub mod direction;
mod errors;
pub mod frequency;
pub mod microstepping;
pub mod response;
#[cfg(feature = "std")]
pub mod serial_channel;
pub mod state;
pub mod transport;

pub use command::{CommandFrame, CommandKind, Revision};
#[cfg(feature = "std")]
pub use config::{ConfigError, SerialConfig};
pub use direction::Direction;
pub use errors::Error;
pub use frequency::FrequencyPlan;
pub use microstepping::MicrosteppingMode;
pub use response::{ControllerInfo, ResponseFrame, SetupEcho, StepEcho};
#[cfg(feature = "std")]
pub use serial_channel::SerialChannel;
pub use state::ControlState;
pub use transport::{Channel, send};

use log::{info, warn};

/// Controller CPU clock.
pub const CLOCK_HZ: u32 = 16_000_000;
/// Prescaler in front of the step timer.
pub const PRESCALER: u32 = 64;

/// Slowest speed the controller is specified for.
pub const MIN_SPEED_RPM: f64 = 1.0;
/// Fastest speed the controller is specified for.
pub const MAX_SPEED_RPM: f64 = 50.0;
/// Smallest step count accepted by STEP.
pub const MIN_STEPS: u16 = 0;
/// Largest step count accepted by STEP (the controller's signed step register).
pub const MAX_STEPS: u16 = 0x7FFF;

/// Every command frame is this long.
pub const FRAME_SIZE: usize = 3;

type Result<T> = core::result::Result<T, Error>;

/// A session with one controller.
///
/// Owns the [`ControlState`] and, once attached, the channel. Every method
/// takes `&mut self`, so a driver never has more than one command in flight.
///
/// After a timeout or an echo mismatch the channel may still hold part of the
/// failed reply, so the next command first discards any pending input.
#[derive(Debug)]
pub struct Driver<C> {
    channel: Option<C>,
    state: ControlState,
    revision: Revision,
    resync: bool,
}

impl<C> Default for Driver<C> {
    /// Creates a disconnected driver with a default control state.
    fn default() -> Self {
        Self {
            channel: None,
            state: ControlState::default(),
            revision: Revision::default(),
            resync: false,
        }
    }
}

impl<C: Channel> Driver<C> {
    /// Creates a driver talking over `channel`.
    #[must_use]
    pub fn new(channel: C) -> Self {
        Self {
            channel: Some(channel),
            ..Default::default()
        }
    }

    /// Selects the controller firmware revision.
    #[must_use]
    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    /// Attaches a channel, returning the previous one if any.
    pub fn connect(&mut self, channel: C) -> Option<C> {
        self.resync = false;
        self.channel.replace(channel)
    }

    /// Detaches and returns the channel.
    pub fn disconnect(&mut self) -> Option<C> {
        self.channel.take()
    }

    /// Whether a channel is attached.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// The host-side view of the controller configuration.
    #[must_use]
    pub const fn state(&self) -> &ControlState {
        &self.state
    }

    /// Mutable access to the control state. Changes take effect on the next
    /// [`Driver::setup`] or [`Driver::step`].
    pub const fn state_mut(&mut self) -> &mut ControlState {
        &mut self.state
    }

    /// The firmware revision HALT replies are read for.
    #[must_use]
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// Records the motor's step angle. Any stored frequency plan is re-derived.
    ///
    /// # Errors
    /// See [`ControlState::derive_frequency`].
    pub fn set_degrees_per_step(&mut self, degrees_per_step: f64) -> Result<()> {
        self.state.set_degrees_per_step(degrees_per_step)
    }

    /// Sets the target speed and derives the timer counter for it.
    ///
    /// Nothing is sent; call [`Driver::setup`] to apply it.
    ///
    /// # Errors
    /// See [`ControlState::derive_frequency`].
    pub fn set_speed(&mut self, speed_rpm: f64) -> Result<FrequencyPlan> {
        let plan = self.state.set_speed(speed_rpm)?;
        info!(
            "{speed_rpm} rpm at {}: required {:.4} Hz, achievable {:.4} Hz, counter {}",
            self.state.microstepping(),
            plan.required_hz,
            plan.achievable_hz,
            plan.timer_counter
        );
        Ok(plan)
    }

    /// Sends a SETUP built from a default state and checks the echo.
    ///
    /// The probe leaves the controller in its power-on configuration. The
    /// driver's own state is not touched.
    ///
    /// # Errors
    /// - `Error::NotConnected` without a channel.
    /// - `Error::TransportTimeout` or `Error::EchoMismatch` if the controller
    ///   does not answer correctly.
    pub fn check_connection(&mut self) -> Result<()> {
        let frame = CommandFrame::setup(&ControlState::with_timer_counter(0))?;
        self.transmit(&frame)?;
        info!("Controller answered the connection check");
        Ok(())
    }

    /// Sends the current setup: microstepping, control lines and timer counter.
    ///
    /// Clears the halt flag once the controller has echoed the frame.
    ///
    /// # Errors
    /// Frame building errors from [`CommandFrame::setup`] and transport errors
    /// from [`send`].
    pub fn setup(&mut self) -> Result<ResponseFrame> {
        let frame = CommandFrame::setup(&self.state)?;
        let response = self.transmit(&frame)?;
        self.state.halted = false;
        Ok(response)
    }

    /// Records direction and step count, then sends a STEP.
    ///
    /// # Errors
    /// `Error::LimitExceeded` for more than `MAX_STEPS` steps, and transport
    /// errors from [`send`].
    pub fn step(&mut self, direction: Direction, steps: u16) -> Result<ResponseFrame> {
        self.state.set_steps(steps)?;
        self.state.direction = direction;
        let frame = CommandFrame::step(&self.state)?;
        self.transmit(&frame)
    }

    /// Asks the controller for its current setup and step counter.
    ///
    /// # Errors
    /// Transport errors from [`send`], or `Error::InvalidResponse` if the
    /// reply cannot be decoded.
    pub fn info(&mut self) -> Result<ControllerInfo> {
        self.transmit(&CommandFrame::INFO)?.controller_info()
    }

    /// Stops the motor and marks the state as halted.
    ///
    /// # Errors
    /// Transport errors from [`send`].
    pub fn halt(&mut self) -> Result<ResponseFrame> {
        let response = self.transmit(&CommandFrame::halt(self.revision))?;
        self.state.halted = true;
        Ok(response)
    }

    fn transmit(&mut self, frame: &CommandFrame) -> Result<ResponseFrame> {
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        if self.resync {
            let dropped = channel.discard_input()?;
            if dropped > 0 {
                warn!("Discarded {dropped} bytes left over from a failed exchange");
            }
            self.resync = false;
        }
        let result = send(channel, frame);
        if matches!(
            result,
            Err(Error::TransportTimeout { .. } | Error::EchoMismatch { .. })
        ) {
            self.resync = true;
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Answers every frame with a fixed byte pattern.
    #[derive(Debug)]
    struct Mirror;

    impl Channel for Mirror {
        fn write_all(&mut self, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }

        fn read_exact(&mut self, buf: &mut [u8]) -> Result<usize> {
            buf.fill(0);
            Ok(buf.len())
        }
    }

    #[test]
    fn test_default_is_disconnected() {
        let mut driver = Driver::<Mirror>::default();
        assert!(!driver.is_connected());
        assert_eq!(driver.check_connection(), Err(Error::NotConnected));
        assert_eq!(driver.halt(), Err(Error::NotConnected));
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut driver = Driver::default();
        assert!(driver.connect(Mirror).is_none());
        assert!(driver.is_connected());
        assert!(driver.disconnect().is_some());
        assert!(!driver.is_connected());
    }

    #[test]
    fn test_set_speed_needs_motor() {
        let mut driver = Driver::new(Mirror);
        assert_eq!(
            driver.set_speed(10.0),
            Err(Error::Unset("degrees_per_step"))
        );
        driver.set_degrees_per_step(3.75).unwrap();
        assert_eq!(driver.set_speed(10.0).unwrap().timer_counter, 7812);
    }

    #[test]
    fn test_changing_motor_rederives() {
        let mut driver = Driver::new(Mirror);
        driver.set_degrees_per_step(3.75).unwrap();
        driver.set_speed(10.0).unwrap();
        driver.set_degrees_per_step(1.875).unwrap();
        assert_eq!(driver.state().timer_counter(), Some(3905));
    }

    #[test]
    fn test_halt_sets_flag_without_echo() {
        let mut driver = Driver::new(Mirror);
        driver.halt().unwrap();
        assert!(driver.state().halted);
    }

    #[test]
    fn test_zero_reply_fails_echo() {
        let mut driver = Driver::new(Mirror);
        assert!(matches!(
            driver.check_connection(),
            Err(Error::EchoMismatch { .. })
        ));
    }

    /// Echoes writes with the last byte corrupted until `fixed`, and counts
    /// how often pending input is discarded.
    #[derive(Debug, Default)]
    struct Flaky {
        last: [u8; FRAME_SIZE],
        fixed: bool,
        discards: usize,
    }

    impl Channel for Flaky {
        fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
            self.last.copy_from_slice(bytes);
            if !self.fixed {
                self.last[2] ^= 0x01;
            }
            Ok(())
        }

        fn read_exact(&mut self, buf: &mut [u8]) -> Result<usize> {
            buf.copy_from_slice(&self.last[..buf.len()]);
            Ok(buf.len())
        }

        fn discard_input(&mut self) -> Result<usize> {
            self.discards += 1;
            Ok(0)
        }
    }

    #[test]
    fn test_failed_exchange_discards_once() {
        let mut driver = Driver::new(Flaky::default());
        assert!(matches!(
            driver.step(Direction::Clockwise, 96),
            Err(Error::EchoMismatch { .. })
        ));
        assert_eq!(driver.channel.as_ref().unwrap().discards, 0);

        driver.channel.as_mut().unwrap().fixed = true;
        driver.step(Direction::Clockwise, 96).unwrap();
        driver.step(Direction::Clockwise, 96).unwrap();
        assert_eq!(driver.channel.as_ref().unwrap().discards, 1);
    }

    #[test]
    fn test_constants() {
        assert_eq!(CLOCK_HZ / (2 * PRESCALER), 125_000);
        assert_eq!(MAX_STEPS, 32767);
    }
}
