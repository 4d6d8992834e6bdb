//! Status words (SW1 SW2)
//!
//! Only the generic ISO/IEC 7816-4 classes are interpreted here. Command
//! specific meanings live in the per-command status tables of the `calypso`
//! crate.

use std::fmt;

use tracing::Level;

/// Status word closing every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusWord {
    /// First status byte
    pub sw1: u8,
    /// Second status byte
    pub sw2: u8,
}

impl StatusWord {
    /// Status word from its two bytes
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Status word from its `SW1SW2` value
    pub const fn from_u16(status: u16) -> Self {
        let [sw1, sw2] = status.to_be_bytes();
        Self { sw1, sw2 }
    }

    /// `SW1SW2` value
    pub const fn to_u16(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    /// 90 00
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// 62 XX or 63 XX
    pub const fn is_warning(&self) -> bool {
        matches!(self.sw1, 0x62 | 0x63)
    }

    /// Level at which a response with this status is worth logging
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() {
            Level::DEBUG
        } else if self.is_warning() {
            Level::INFO
        } else {
            Level::WARN
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Self::new(sw1, sw2)
    }
}

impl From<u16> for StatusWord {
    fn from(status: u16) -> Self {
        Self::from_u16(status)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.to_u16())
    }
}

/// Status words the session engine acts upon
pub mod common {
    use super::StatusWord;

    /// Success (90 00)
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);

    /// Conditions of use not satisfied (69 85)
    pub const CONDITIONS_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x85);

    /// Incorrect signature (69 88)
    pub const INCORRECT_SIGNATURE: StatusWord = StatusWord::new(0x69, 0x88);

    /// Record not found (6A 83)
    pub const RECORD_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x83);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let sw = StatusWord::from_u16(0x6988);
        assert_eq!((sw.sw1, sw.sw2), (0x69, 0x88));
        assert_eq!(sw.to_u16(), 0x6988);
        assert_eq!(sw, common::INCORRECT_SIGNATURE);
        assert_eq!(StatusWord::from((0x6A, 0x83)), common::RECORD_NOT_FOUND);
        assert_eq!(sw.to_string(), "6988");
    }

    #[test]
    fn test_tracing_level() {
        assert_eq!(common::SUCCESS.tracing_level(), Level::DEBUG);
        assert_eq!(StatusWord::new(0x62, 0x81).tracing_level(), Level::INFO);
        assert_eq!(common::CONDITIONS_NOT_SATISFIED.tracing_level(), Level::WARN);
    }
}
