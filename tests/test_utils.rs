//! Test utilities: simulated controllers and the hardware test context.
#![allow(dead_code)]

use smcc_rs::{
    Channel, CommandKind, Driver, Error, FRAME_SIZE, SerialChannel, SerialConfig,
};
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use lazy_static::lazy_static;
use std::sync::Mutex;

use dotenvy::dotenv;
pub fn init_env() {
    // Load .env file silently (ignore if not found)
    let _ = dotenv().ok();
    let _ = pretty_env_logger::try_init();
}

// Global mutex to ensure hardware tests run serially
lazy_static! {
    pub static ref TEST_MUTEX: Mutex<()> = Mutex::new(());
}

/// Timeout for hardware replies
pub const HARDWARE_TIMEOUT: Duration = Duration::from_secs(2);

/// Long pause for movement operations
pub const LONG_PAUSE: Duration = Duration::from_secs(2);

/// Test result type
pub type TestResult<T> = Result<T, TestError>;

/// Test error type
#[derive(Debug)]
pub enum TestError {
    Serial(String),
    Controller(Error),
    Config(String),
    Safety(String),
}

impl From<String> for TestError {
    fn from(err: String) -> Self {
        Self::Safety(err)
    }
}

impl From<serial::Error> for TestError {
    fn from(err: serial::Error) -> Self {
        Self::Serial(err.to_string())
    }
}

impl From<Error> for TestError {
    fn from(err: Error) -> Self {
        Self::Controller(err)
    }
}

impl From<smcc_rs::ConfigError> for TestError {
    fn from(err: smcc_rs::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Behaves like the controller firmware: echoes SETUP and STEP, remembers
/// them for INFO, and acknowledges HALT with `halt_reply`.
#[derive(Debug)]
pub struct SimulatedController {
    pub written: Vec<u8>,
    pub last_setup: [u8; FRAME_SIZE],
    pub last_step: [u8; FRAME_SIZE],
    pub halt_reply: Vec<u8>,
    /// Bytes thrown away by `discard_input`.
    pub discarded: usize,
    /// Hands out only this many bytes on the next read; the rest of the
    /// reply arrives too late and waits in `pending`.
    stall_after: Option<usize>,
    pending: VecDeque<u8>,
    inbox: Vec<u8>,
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self {
            written: Vec::new(),
            last_setup: [0x85, 0x00, 0x00],
            last_step: [0x00, 0x00, 0x00],
            halt_reply: vec![0x00],
            discarded: 0,
            stall_after: None,
            pending: VecDeque::new(),
            inbox: Vec::new(),
        }
    }
}

impl SimulatedController {
    /// Firmware that echoes HALT instead of acknowledging it with one byte.
    pub fn echoing_halt() -> Self {
        Self {
            halt_reply: vec![0xC0, 0x00, 0x00],
            ..Default::default()
        }
    }

    /// Firmware whose first reply only gets `delivered` bytes out in time.
    pub fn stalling(delivered: usize) -> Self {
        Self {
            stall_after: Some(delivered),
            ..Default::default()
        }
    }

    fn handle(&mut self, frame: [u8; FRAME_SIZE]) {
        match CommandKind::from_byte(frame[0]) {
            CommandKind::Setup => {
                self.last_setup = frame;
                self.pending.extend(frame);
            }
            CommandKind::Step => {
                self.last_step = frame;
                self.pending.extend(frame);
            }
            CommandKind::Info => {
                self.pending.extend(self.last_setup);
                self.pending.extend(self.last_step);
            }
            CommandKind::Halt => {
                self.last_step[1] = 0;
                self.last_step[2] = 0;
                self.pending.extend(self.halt_reply.iter().copied());
            }
        }
    }
}

impl Channel for SimulatedController {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.written.extend_from_slice(bytes);
        self.inbox.extend_from_slice(bytes);
        while self.inbox.len() >= FRAME_SIZE {
            let frame: Vec<u8> = self.inbox.drain(..FRAME_SIZE).collect();
            self.handle([frame[0], frame[1], frame[2]]);
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let limit = self.stall_after.take().unwrap_or(buf.len()).min(buf.len());
        let mut n = 0;
        while n < limit {
            match self.pending.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn discard_input(&mut self) -> Result<usize, Error> {
        let n = self.pending.len();
        self.pending.clear();
        self.discarded += n;
        Ok(n)
    }
}

/// Echoes every write, flipping `mask` in the byte at `index` of each reply.
#[derive(Debug, Default)]
pub struct BitFlipChannel {
    pub index: usize,
    pub mask: u8,
    pending: VecDeque<u8>,
}

impl BitFlipChannel {
    pub fn new(index: usize, mask: u8) -> Self {
        Self {
            index,
            mask,
            pending: VecDeque::new(),
        }
    }
}

impl Channel for BitFlipChannel {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for (i, &byte) in bytes.iter().enumerate() {
            let byte = if i == self.index { byte ^ self.mask } else { byte };
            self.pending.push_back(byte);
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn discard_input(&mut self) -> Result<usize, Error> {
        let n = self.pending.len();
        self.pending.clear();
        Ok(n)
    }
}

/// Accepts writes and never answers, or answers with only `partial` bytes.
#[derive(Debug, Default)]
pub struct SilentChannel {
    pub partial: Vec<u8>,
    pub writes: usize,
}

impl Channel for SilentChannel {
    fn write_all(&mut self, _bytes: &[u8]) -> Result<(), Error> {
        self.writes += 1;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let n = buf.len().min(self.partial.len());
        buf[..n].copy_from_slice(&self.partial[..n]);
        self.partial.drain(..n);
        Ok(n)
    }
}

/// Channel whose stream is broken.
#[derive(Debug, Default)]
pub struct BrokenChannel;

impl Channel for BrokenChannel {
    fn write_all(&mut self, _bytes: &[u8]) -> Result<(), Error> {
        Err(Error::Transport)
    }

    fn read_exact(&mut self, _buf: &mut [u8]) -> Result<usize, Error> {
        Err(Error::Transport)
    }
}

/// Driver connected to real hardware
pub struct TestContext {
    pub driver: Driver<SerialChannel<serial::SystemPort>>,
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("state", self.driver.state())
            .finish()
    }
}

impl TestContext {
    /// Connect using `SMCC_SERIAL_PORT`, or `None` when no controller is configured.
    pub fn from_env() -> TestResult<Option<Self>> {
        let mut config = match SerialConfig::from_env() {
            Ok(config) => config,
            Err(smcc_rs::ConfigError::Missing(var)) => {
                println!("{var} not set, skipping hardware test");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        config.timeout = HARDWARE_TIMEOUT;

        println!("Connecting to serial port: {}", config.port);
        let mut channel = SerialChannel::open(&config)?;

        println!("Waiting {:?} for the controller to boot", config.settle_time);
        thread::sleep(config.settle_time);
        channel.clear_input()?;

        Ok(Some(Self {
            driver: Driver::new(channel),
        }))
    }
}
