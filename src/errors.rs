use core::fmt;

use crate::FRAME_SIZE;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// The required pulse frequency is zero, negative or not finite, or the
    /// controller timer cannot produce it.
    InvalidFrequency,
    /// Boolean flags do not fit in a byte from the requested offset.
    BitRangeOverflow,
    /// An integer needs more bits than the field it is packed into.
    ValueTooWide,
    /// Speed or step count outside the controller's software limits.
    LimitExceeded,
    /// A field the operation depends on has not been set or derived yet.
    Unset(&'static str),
    /// The channel delivered fewer bytes than expected before its timeout.
    TransportTimeout { expected: usize, received: usize },
    /// The controller echoed something other than the command it was sent.
    EchoMismatch {
        sent: [u8; FRAME_SIZE],
        received: [u8; FRAME_SIZE],
    },
    /// No channel is attached to the driver.
    NotConnected,
    /// A response does not follow the expected layout.
    InvalidResponse,
    /// The underlying channel failed to read or write.
    Transport,
}

impl Error {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFrequency => "Invalid frequency",
            Self::BitRangeOverflow => "Flags overflow the byte",
            Self::ValueTooWide => "Value too wide for field",
            Self::LimitExceeded => "Software limit exceeded",
            Self::Unset(_) => "Required field not set",
            Self::TransportTimeout { .. } => "Timed out waiting for response",
            Self::EchoMismatch { .. } => "Echo mismatch",
            Self::NotConnected => "Not connected",
            Self::InvalidResponse => "Invalid response format",
            Self::Transport => "Channel I/O failure",
        }
    }

    /// Whether the caller may reasonably resend the same command.
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::TransportTimeout { .. } | Self::Transport)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Unset(field) => write!(f, "{}: {field}", self.as_str()),
            Self::TransportTimeout { expected, received } => write!(
                f,
                "{}: received {received} of {expected} bytes",
                self.as_str()
            ),
            Self::EchoMismatch { sent, received } => write!(
                f,
                "{}: sent {sent:02x?}, received {received:02x?}",
                self.as_str()
            ),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
