use crate::{
    ControlState, Error, FRAME_SIZE,
    codec::{fill_bool, pack_uint},
    state::validate_steps,
};

mod opcode {
    pub(super) const STEP: u8 = 0b0000_0000;
    pub(super) const INFO: u8 = 0b0100_0000;
    pub(super) const SETUP: u8 = 0b1000_0000;
    pub(super) const HALT: u8 = 0b1100_0000;
    pub(super) const MASK: u8 = 0b1100_0000;
}

/// Bit offset of the reset, enable and sleep flags in a SETUP frame.
const SETUP_FLAGS_OFFSET: usize = 5;
/// Bit offset of the direction flag in a STEP frame.
const DIRECTION_OFFSET: usize = 7;

/// Response length of SETUP and STEP: the echoed frame.
pub const ECHO_RESPONSE_SIZE: usize = FRAME_SIZE;
/// Response length of INFO: the last SETUP echo followed by the last STEP echo.
pub const INFO_RESPONSE_SIZE: usize = 2 * FRAME_SIZE;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Setup,
    Step,
    Info,
    Halt,
}

impl CommandKind {
    /// Decodes the opcode held in the top two bits of byte 0.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte & opcode::MASK {
            opcode::SETUP => Self::Setup,
            opcode::INFO => Self::Info,
            opcode::HALT => Self::Halt,
            _ => Self::Step,
        }
    }

    /// The opcode bits as they sit in byte 0.
    #[must_use]
    pub const fn opcode(self) -> u8 {
        match self {
            Self::Setup => opcode::SETUP,
            Self::Step => opcode::STEP,
            Self::Info => opcode::INFO,
            Self::Halt => opcode::HALT,
        }
    }
}

/// Controller firmware revision, which decides how HALT is acknowledged.
///
/// Both revisions echo SETUP and STEP and answer INFO with six bytes. They
/// differ only in the HALT reply.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Revision {
    /// HALT is acknowledged with a single byte that is not checked.
    #[default]
    Acknowledge,
    /// HALT is echoed like SETUP and STEP and the echo is verified.
    Echoed,
}

impl Revision {
    /// Length of the HALT reply under this revision.
    #[must_use]
    pub const fn halt_response_size(self) -> usize {
        match self {
            Self::Acknowledge => 1,
            Self::Echoed => FRAME_SIZE,
        }
    }
}

/// One command ready for the wire, plus how many bytes the controller answers with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommandFrame {
    kind: CommandKind,
    bytes: [u8; FRAME_SIZE],
    response_size: usize,
}

impl CommandFrame {
    /// Requests the controller's current setup and step counters.
    pub const INFO: Self = Self {
        kind: CommandKind::Info,
        bytes: [opcode::INFO, 0x00, 0x00],
        response_size: INFO_RESPONSE_SIZE,
    };

    /// Builds the HALT frame as understood by `revision`.
    #[must_use]
    pub const fn halt(revision: Revision) -> Self {
        Self {
            kind: CommandKind::Halt,
            bytes: [opcode::HALT, 0x00, 0x00],
            response_size: revision.halt_response_size(),
        }
    }

    /// Builds a SETUP frame from the microstepping mode, control lines and
    /// derived timer counter of `state`.
    ///
    /// # Errors
    /// - `Error::Unset` if no frequency plan has been derived.
    /// - `Error::ValueTooWide` if the timer counter does not fit in 16 bits.
    pub fn setup(state: &ControlState) -> Result<Self, Error> {
        let counter = state.timer_counter().ok_or(Error::Unset("timer_counter"))?;
        let [high, low] = pack_uint::<2>(counter)?;
        let flags = fill_bool(&[state.reset, state.enable, state.sleep], SETUP_FLAGS_OFFSET)?;
        Ok(Self {
            kind: CommandKind::Setup,
            bytes: [opcode::SETUP | state.microstepping() as u8 | flags, high, low],
            response_size: ECHO_RESPONSE_SIZE,
        })
    }

    /// Builds a STEP frame from the direction and step count of `state`.
    ///
    /// # Errors
    /// - `Error::Unset` if no step count has been set.
    /// - `Error::LimitExceeded` if the step count is above `MAX_STEPS`.
    pub fn step(state: &ControlState) -> Result<Self, Error> {
        let steps = state.steps.ok_or(Error::Unset("steps"))?;
        validate_steps(steps)?;
        let [high, low] = pack_uint::<2>(u32::from(steps))?;
        let flags = fill_bool(&[state.direction.is_set()], DIRECTION_OFFSET)?;
        Ok(Self {
            kind: CommandKind::Step,
            bytes: [opcode::STEP | flags, high, low],
            response_size: ECHO_RESPONSE_SIZE,
        })
    }

    /// Which command this frame carries.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        self.kind
    }

    /// The frame exactly as it goes on the wire.
    #[must_use]
    pub const fn bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.bytes
    }

    /// Number of bytes the controller sends back for this frame.
    #[must_use]
    pub const fn response_size(&self) -> usize {
        self.response_size
    }

    /// Whether the controller answers with this exact frame.
    #[must_use]
    pub const fn expects_echo(&self) -> bool {
        !matches!(self.kind, CommandKind::Info) && self.response_size == FRAME_SIZE
    }
}
