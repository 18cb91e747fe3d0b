/// Driver microstepping selection.
///
/// The discriminant is the 3-bit select code already shifted into bits 2-4 of
/// byte 0 of a SETUP frame (bit 0 being the most significant bit).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MicrosteppingMode {
    #[default]
    Full = 0b0000_0000,
    Half = 0b0000_1000,
    Quarter = 0b0001_0000,
    Eighth = 0b0001_1000,
    Sixteenth = 0b0010_0000,
    ThirtyTwo = 0b0011_1000,
}

/// Mask of the microstep select field within byte 0.
pub const SELECT_MASK: u8 = 0b0011_1000;

impl MicrosteppingMode {
    /// Every mode, coarsest first.
    pub const ALL: [Self; 6] = [
        Self::Full,
        Self::Half,
        Self::Quarter,
        Self::Eighth,
        Self::Sixteenth,
        Self::ThirtyTwo,
    ];

    /// Human-readable name, e.g. `1/16 Step`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Full => "Full-Step",
            Self::Half => "Half-Step",
            Self::Quarter => "1/4 Step",
            Self::Eighth => "1/8 Step",
            Self::Sixteenth => "1/16 Step",
            Self::ThirtyTwo => "1/32 Step",
        }
    }

    /// The raw 3-bit driver select code (`MS1 MS2 MS3`).
    #[must_use]
    pub const fn select_code(self) -> u8 {
        (self as u8) >> 3
    }

    /// Microsteps per full step.
    #[must_use]
    pub const fn multiplier(self) -> u32 {
        match self {
            Self::Full => 1,
            Self::Half => 2,
            Self::Quarter => 4,
            Self::Eighth => 8,
            Self::Sixteenth => 16,
            Self::ThirtyTwo => 32,
        }
    }

    /// Recovers the mode from byte 0 of a SETUP frame or its echo.
    ///
    /// The driver chip treats codes `101` and `110` as 1/32 step too.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match (byte & SELECT_MASK) >> 3 {
            0b000 => Self::Full,
            0b001 => Self::Half,
            0b010 => Self::Quarter,
            0b011 => Self::Eighth,
            0b100 => Self::Sixteenth,
            _ => Self::ThirtyTwo,
        }
    }
}

impl core::fmt::Display for MicrosteppingMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}
