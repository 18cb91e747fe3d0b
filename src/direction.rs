/// Motor rotation direction.
///
/// The discriminant is the direction bit as it sits in byte 0 of a STEP frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Direction line high.
    Clockwise = 0x01,
    /// Direction line low.
    #[default]
    CounterClockwise = 0x00,
}

impl Direction {
    /// Whether the direction bit is set in a STEP frame.
    #[must_use]
    pub const fn is_set(self) -> bool {
        matches!(self, Self::Clockwise)
    }
}

impl From<bool> for Direction {
    fn from(clockwise: bool) -> Self {
        if clockwise {
            Self::Clockwise
        } else {
            Self::CounterClockwise
        }
    }
}
