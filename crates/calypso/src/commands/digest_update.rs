use bytes::Bytes;
use calypso_apdu_core::command::MAX_DATA_LENGTH;
use calypso_apdu_core::{ApduCommand, Response};

use super::CalypsoCommand;
use crate::constants::sam_ins;
use crate::error::{Error, Result};
use crate::revision::SamRevision;
use crate::status::{self, CommandKind};

/// DIGEST UPDATE command: feed one card command or response to the digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestUpdate {
    cla: u8,
    data: Bytes,
}

impl DigestUpdate {
    /// Feed raw APDU bytes (responses include their status word)
    pub fn new(revision: SamRevision, data: Bytes) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::config("nothing to digest"));
        }
        if data.len() > MAX_DATA_LENGTH {
            return Err(calypso_apdu_core::Error::DataTooLong(data.len()).into());
        }
        Ok(Self {
            cla: revision.cla(),
            data,
        })
    }
}

impl ApduCommand for DigestUpdate {
    type Success = ();
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        sam_ins::DIGEST_UPDATE
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<u8> {
        None
    }

    fn parse_response(&self, response: Response) -> Result<Self::Success> {
        status::check(Self::KIND, &response)
    }
}

impl CalypsoCommand for DigestUpdate {
    const KIND: CommandKind = CommandKind::DigestUpdate;
}
