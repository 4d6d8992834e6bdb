use bytes::Bytes;
use calypso_apdu_core::{ApduCommand, ApduResponse, Response};

use super::CalypsoCommand;
use crate::constants::ins;
use crate::error::{Error, Result};
use crate::revision::PoRevision;
use crate::session::{CloseSessionData, parse_close_session};
use crate::status::{self, CommandKind};

/// CLOSE SECURE SESSION command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseSession {
    cla: u8,
    p1: u8,
    signature: Option<Bytes>,
}

impl CloseSession {
    /// Close the session with the terminal half signature
    ///
    /// When `ratify` is set the card considers the session ratified as soon
    /// as it answers; otherwise ratification needs a following command.
    pub fn new(revision: PoRevision, ratify: bool, signature_hi: Bytes) -> Result<Self> {
        if !matches!(signature_hi.len(), 4 | 8) {
            return Err(Error::config(format!(
                "terminal signature must be 4 or 8 bytes, got {}",
                signature_hi.len()
            )));
        }
        Ok(Self {
            cla: revision.cla(),
            p1: if ratify { 0x80 } else { 0x00 },
            signature: Some(signature_hi),
        })
    }

    /// Abort the session: the card cancels every modification made in it
    pub const fn abort(revision: PoRevision) -> Self {
        Self {
            cla: revision.cla(),
            p1: 0x00,
            signature: None,
        }
    }

    /// Whether this is the abort form
    pub const fn is_abort(&self) -> bool {
        self.signature.is_none()
    }
}

impl ApduCommand for CloseSession {
    type Success = CloseSessionData;
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        ins::CLOSE_SESSION
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    fn expected_length(&self) -> Option<u8> {
        self.signature.as_ref().map(|_| 0x00)
    }

    fn parse_response(&self, response: Response) -> Result<Self::Success> {
        status::check(Self::KIND, &response)?;
        let data = parse_close_session(response.payload())?;
        if self.is_abort() != data.is_abort() {
            return Err(Error::decode(
                Self::KIND,
                if self.is_abort() {
                    "unexpected data in response to session abort"
                } else {
                    "missing card signature"
                },
                response.payload().len(),
            ));
        }
        Ok(data)
    }
}

impl CalypsoCommand for CloseSession {
    const KIND: CommandKind = CommandKind::CloseSession;
}
