use core::fmt;

use crate::{
    CommandKind, Direction, Error, FRAME_SIZE, MicrosteppingMode,
    codec::{Bits, get_bit, unpack_bits},
    command::INFO_RESPONSE_SIZE,
};

/// Longest reply the controller ever sends (the INFO reply).
pub const MAX_RESPONSE_SIZE: usize = INFO_RESPONSE_SIZE;

/// Bytes read back from the controller for one command.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    buffer: [u8; MAX_RESPONSE_SIZE],
    len: usize,
}

impl ResponseFrame {
    /// Wraps a received reply.
    ///
    /// # Errors
    /// Returns `Error::InvalidResponse` if `bytes` is longer than any reply.
    pub fn new(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() > MAX_RESPONSE_SIZE {
            return Err(Error::InvalidResponse);
        }
        let mut buffer = [0u8; MAX_RESPONSE_SIZE];
        buffer[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            buffer,
            len: bytes.len(),
        })
    }

    /// The bytes actually received.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Number of bytes received.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Each byte split into bits, for diagnostics.
    pub fn bits(&self) -> impl Iterator<Item = [bool; 8]> + '_ {
        self.as_bytes().iter().map(|&b| unpack_bits(b))
    }

    /// Interprets the reply to an INFO command.
    ///
    /// # Errors
    /// Returns `Error::InvalidResponse` if the reply is not six bytes made of a
    /// SETUP echo followed by a STEP echo.
    pub fn controller_info(&self) -> Result<ControllerInfo, Error> {
        let bytes = self.as_bytes();
        if bytes.len() != INFO_RESPONSE_SIZE {
            return Err(Error::InvalidResponse);
        }
        let (setup, step) = bytes.split_at(FRAME_SIZE);
        Ok(ControllerInfo {
            setup: SetupEcho::parse(setup)?,
            step: StepEcho::parse(step)?,
        })
    }
}

impl fmt::Debug for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResponseFrame")
            .field(&self.as_bytes())
            .finish()
    }
}

impl fmt::Display for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Bits(self.as_bytes()), f)
    }
}

/// What the controller reports about its configuration and motion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ControllerInfo {
    pub setup: SetupEcho,
    pub step: StepEcho,
}

/// The last SETUP the controller accepted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SetupEcho {
    pub microstepping: MicrosteppingMode,
    pub reset: bool,
    pub enable: bool,
    pub sleep: bool,
    pub timer_counter: u16,
}

impl SetupEcho {
    fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let &[head, high, low] = bytes else {
            return Err(Error::InvalidResponse);
        };
        if CommandKind::from_byte(head) != CommandKind::Setup {
            return Err(Error::InvalidResponse);
        }
        Ok(Self {
            microstepping: MicrosteppingMode::from_byte(head),
            reset: get_bit(head, 5),
            enable: get_bit(head, 6),
            sleep: get_bit(head, 7),
            timer_counter: u16::from_be_bytes([high, low]),
        })
    }
}

/// The controller's STEP register: direction and step counter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StepEcho {
    pub direction: Direction,
    pub steps: u16,
}

impl StepEcho {
    fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let &[head, high, low] = bytes else {
            return Err(Error::InvalidResponse);
        };
        if CommandKind::from_byte(head) != CommandKind::Step {
            return Err(Error::InvalidResponse);
        }
        Ok(Self {
            direction: Direction::from(get_bit(head, 7)),
            steps: u16::from_be_bytes([high, low]),
        })
    }
}
