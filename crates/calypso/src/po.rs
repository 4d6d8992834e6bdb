//! The card taking part in a transaction

use bytes::Bytes;
use derive_more::Display;

use crate::constants::SERIAL_NUMBER_LENGTH;
use crate::error::{Error, Result};
use crate::revision::PoRevision;

/// Capacity of the card buffer recording the modifications of a session
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionModifications {
    /// Capacity in bytes; each modification costs its data length plus 6
    #[display("{_0} bytes")]
    Bytes(usize),
    /// Capacity in modification commands
    #[display("{_0} operations")]
    Operations(usize),
}

impl SessionModifications {
    /// Total capacity, in the unit of the buffer
    pub const fn capacity(self) -> usize {
        match self {
            Self::Bytes(n) | Self::Operations(n) => n,
        }
    }
}

/// How the card is connected to the terminal
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransmissionMode {
    /// Contact interface
    #[display("contacts")]
    Contacts,
    /// Contactless interface
    #[default]
    #[display("contactless")]
    Contactless,
}

/// A selected Calypso card
///
/// The values come from the card selection, which happens before the
/// transaction starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalypsoPo {
    revision: PoRevision,
    serial_number: Bytes,
    modifications: SessionModifications,
    transmission_mode: TransmissionMode,
}

impl CalypsoPo {
    /// Describe a card by revision, 8 byte application serial number and
    /// session buffer capacity
    pub fn new(
        revision: PoRevision,
        serial_number: impl Into<Bytes>,
        modifications: SessionModifications,
    ) -> Result<Self> {
        let serial_number = serial_number.into();
        if serial_number.len() != SERIAL_NUMBER_LENGTH {
            return Err(Error::config(format!(
                "serial number must be {SERIAL_NUMBER_LENGTH} bytes, got {}",
                serial_number.len()
            )));
        }
        if modifications.capacity() == 0 {
            return Err(Error::config("session buffer capacity cannot be 0"));
        }
        Ok(Self {
            revision,
            serial_number,
            modifications,
            transmission_mode: TransmissionMode::default(),
        })
    }

    /// Set the transmission mode
    pub const fn with_transmission_mode(mut self, mode: TransmissionMode) -> Self {
        self.transmission_mode = mode;
        self
    }

    /// Card revision
    pub const fn revision(&self) -> PoRevision {
        self.revision
    }

    /// Application serial number, used as SAM diversifier
    pub const fn serial_number(&self) -> &Bytes {
        &self.serial_number
    }

    /// Session buffer capacity
    pub const fn modifications(&self) -> SessionModifications {
        self.modifications
    }

    /// Transmission mode
    pub const fn transmission_mode(&self) -> TransmissionMode {
        self.transmission_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(CalypsoPo::new(PoRevision::Rev3_1, vec![0u8; 8], SessionModifications::Bytes(215)).is_ok());
        assert!(CalypsoPo::new(PoRevision::Rev3_1, vec![0u8; 4], SessionModifications::Bytes(215)).is_err());
        assert!(CalypsoPo::new(PoRevision::Rev3_1, vec![0u8; 8], SessionModifications::Operations(0)).is_err());
    }

    #[test]
    fn test_defaults() {
        let po = CalypsoPo::new(PoRevision::Rev2_4, vec![1u8; 8], SessionModifications::Operations(3))
            .unwrap()
            .with_transmission_mode(TransmissionMode::Contacts);
        assert_eq!(po.transmission_mode(), TransmissionMode::Contacts);
        assert_eq!(po.modifications().to_string(), "3 operations");
    }
}
