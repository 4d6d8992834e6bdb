use bytes::Bytes;
use calypso_apdu_core::{ApduCommand, ApduResponse, Response};

use super::CalypsoCommand;
use crate::constants::sam_ins;
use crate::error::{Error, Result};
use crate::revision::SamRevision;
use crate::status::{self, CommandKind};

/// GET CHALLENGE command: the terminal challenge given to the card at opening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetChallenge {
    cla: u8,
    length: u8,
}

impl GetChallenge {
    /// Request a 4 byte challenge, or 8 bytes for an extended mode session
    pub const fn new(revision: SamRevision, extended: bool) -> Self {
        Self {
            cla: revision.cla(),
            length: if extended { 8 } else { 4 },
        }
    }
}

impl ApduCommand for GetChallenge {
    type Success = Bytes;
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        sam_ins::GET_CHALLENGE
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
        Some(self.length)
    }

    fn parse_response(&self, response: Response) -> Result<Self::Success> {
        status::check(Self::KIND, &response)?;
        let challenge = response.payload();
        if challenge.len() != self.length as usize {
            return Err(Error::decode(
                Self::KIND,
                "unexpected challenge length",
                challenge.len(),
            ));
        }
        Ok(challenge.clone())
    }
}

impl CalypsoCommand for GetChallenge {
    const KIND: CommandKind = CommandKind::GetChallenge;
}
