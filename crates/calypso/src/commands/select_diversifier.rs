use bytes::Bytes;
use calypso_apdu_core::{ApduCommand, Response};

use super::CalypsoCommand;
use crate::constants::sam_ins;
use crate::error::{Error, Result};
use crate::revision::SamRevision;
use crate::status::{self, CommandKind};

/// SELECT DIVERSIFIER command: derive the SAM work keys for one card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectDiversifier {
    cla: u8,
    diversifier: Bytes,
}

impl SelectDiversifier {
    /// Diversify with the card serial number (4 or 8 bytes)
    pub fn new(revision: SamRevision, diversifier: Bytes) -> Result<Self> {
        if !matches!(diversifier.len(), 4 | 8) {
            return Err(Error::config(format!(
                "diversifier must be 4 or 8 bytes, got {}",
                diversifier.len()
            )));
        }
        Ok(Self {
            cla: revision.cla(),
            diversifier,
        })
    }
}

impl ApduCommand for SelectDiversifier {
    type Success = ();
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        sam_ins::SELECT_DIVERSIFIER
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.diversifier)
    }

    fn expected_length(&self) -> Option<u8> {
        None
    }

    fn parse_response(&self, response: Response) -> Result<Self::Success> {
        status::check(Self::KIND, &response)
    }
}

impl CalypsoCommand for SelectDiversifier {
    const KIND: CommandKind = CommandKind::SelectDiversifier;
}
