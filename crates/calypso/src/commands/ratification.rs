use calypso_apdu_core::{ApduCommand, Response};

use super::CalypsoCommand;
use crate::constants::ins;
use crate::error::{Error, Result};
use crate::revision::PoRevision;
use crate::status::{self, CommandKind};

/// Command sent after a session closed without ratification
///
/// Any command received by the card ratifies the session. A read of record 0
/// is used, and whatever the card answers is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratification {
    cla: u8,
}

impl Ratification {
    /// Create the ratification command for a card revision
    pub const fn new(revision: PoRevision) -> Self {
        Self {
            cla: revision.cla(),
        }
    }
}

impl ApduCommand for Ratification {
    type Success = ();
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        ins::READ_RECORDS
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        None
    }

    fn expected_length(&self) -> Option<u8> {
        Some(0x00)
    }

    fn parse_response(&self, response: Response) -> Result<Self::Success> {
        status::check(Self::KIND, &response)
    }
}

impl CalypsoCommand for Ratification {
    const KIND: CommandKind = CommandKind::Ratification;
}
