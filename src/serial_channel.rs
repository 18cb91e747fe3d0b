//! [`Channel`] over a serial port, using the `serial` crate.

use core::time::Duration;
use std::io::{self, Read, Write};
use std::time::Instant;

use log::{debug, error, info};
use serial::{SerialPort, SerialPortSettings};

use crate::{Channel, Error, SerialConfig};

/// How long a single drain read waits for more input.
const DRAIN_WINDOW: Duration = Duration::from_millis(50);
/// Upper bound on the time spent draining, for a device that never goes quiet.
const DRAIN_BUDGET: Duration = Duration::from_millis(500);

/// A serial port with an overall timeout per reply.
///
/// The port's own timeout applies to each `read` call; this wrapper keeps
/// re-arming it with whatever is left of the reply deadline.
#[derive(Debug)]
pub struct SerialChannel<P> {
    port: P,
    timeout: Duration,
}

impl SerialChannel<serial::SystemPort> {
    /// Opens `config.port` at `config.baud_rate`, 8N1 without flow control.
    ///
    /// Opening the port resets most boards; wait `config.settle_time` before
    /// sending the first command.
    ///
    /// # Errors
    /// Returns the `serial` error if the port cannot be opened or configured.
    pub fn open(config: &SerialConfig) -> serial::Result<Self> {
        info!("Opening {} at {} baud", config.port, config.baud_rate);
        let mut port = serial::open(&config.port)?;
        let baud_rate = serial::BaudRate::from_speed(config.baud_rate);
        port.reconfigure(&|settings: &mut dyn SerialPortSettings| {
            settings.set_baud_rate(baud_rate)?;
            settings.set_char_size(serial::Bits8);
            settings.set_parity(serial::ParityNone);
            settings.set_stop_bits(serial::Stop1);
            settings.set_flow_control(serial::FlowNone);
            Ok(())
        })?;
        port.set_timeout(config.timeout)?;
        Ok(Self::new(port, config.timeout))
    }
}

impl<P: SerialPort> SerialChannel<P> {
    /// Wraps an already configured port.
    #[must_use]
    pub const fn new(port: P, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    /// Time allowed for a whole reply.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub const fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Gives back the port.
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Discards anything already waiting in the input buffer, such as a boot
    /// banner or a reply that arrived after its timeout. Returns the number
    /// of bytes dropped.
    ///
    /// Gives up after half a second even if the device is still sending.
    ///
    /// # Errors
    /// Returns `Error::Transport` if the port fails.
    pub fn clear_input(&mut self) -> Result<usize, Error> {
        let drained =
            drain_input(&mut self.port, DRAIN_BUDGET, arm_timeout).map_err(transport_error)?;
        if drained > 0 {
            debug!("Drained {drained} stale bytes");
        }
        Ok(drained)
    }
}

impl<P: SerialPort> Channel for SerialChannel<P> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        Write::write_all(&mut self.port, bytes)
            .and_then(|()| self.port.flush())
            .map_err(transport_error)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        read_until_deadline(&mut self.port, buf, self.timeout, arm_timeout)
            .map_err(transport_error)
    }

    fn discard_input(&mut self) -> Result<usize, Error> {
        self.clear_input()
    }
}

fn arm_timeout<P: SerialPort>(port: &mut P, remaining: Duration) -> io::Result<()> {
    port.set_timeout(remaining).map_err(io::Error::from)
}

fn transport_error(err: io::Error) -> Error {
    error!("Serial I/O failed: {err}");
    Error::Transport
}

/// Reads into `buf` until it is full, the stream ends, or `timeout` has passed.
///
/// `arm` is called before every read with the time left, so that a single
/// slow read cannot overrun the deadline.
fn read_until_deadline<R, F>(
    reader: &mut R,
    buf: &mut [u8],
    timeout: Duration,
    mut arm: F,
) -> io::Result<usize>
where
    R: Read,
    F: FnMut(&mut R, Duration) -> io::Result<()>,
{
    let deadline = Instant::now() + timeout;
    let mut filled = 0;
    while filled < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        arm(reader, remaining)?;
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads and drops input until a read comes back short or `budget` is spent.
fn drain_input<R, F>(reader: &mut R, budget: Duration, mut arm: F) -> io::Result<usize>
where
    R: Read,
    F: FnMut(&mut R, Duration) -> io::Result<()>,
{
    let deadline = Instant::now() + budget;
    let mut scratch = [0u8; 64];
    let mut drained = 0;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let n = read_until_deadline(reader, &mut scratch, remaining.min(DRAIN_WINDOW), &mut arm)?;
        drained += n;
        if n < scratch.len() {
            break;
        }
    }
    Ok(drained)
}
