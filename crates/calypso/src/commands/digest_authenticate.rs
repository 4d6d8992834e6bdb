use bytes::Bytes;
use calypso_apdu_core::{ApduCommand, ApduResponse, Response};
use calypso_apdu_core::response::status::common::INCORRECT_SIGNATURE;

use super::CalypsoCommand;
use crate::constants::sam_ins;
use crate::error::{Error, Result};
use crate::revision::SamRevision;
use crate::status::{self, CommandKind};

/// DIGEST AUTHENTICATE command: verify the card half signature
///
/// Succeeds with `false` when the SAM rejects the signature; any other
/// anomaly is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestAuthenticate {
    cla: u8,
    signature: Bytes,
}

impl DigestAuthenticate {
    /// Verify the 4 or 8 byte card signature
    pub fn new(revision: SamRevision, signature_lo: Bytes) -> Result<Self> {
        if !matches!(signature_lo.len(), 4 | 8) {
            return Err(Error::config(format!(
                "card signature must be 4 or 8 bytes, got {}",
                signature_lo.len()
            )));
        }
        Ok(Self {
            cla: revision.cla(),
            signature: signature_lo,
        })
    }
}

impl ApduCommand for DigestAuthenticate {
    type Success = bool;
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        sam_ins::DIGEST_AUTHENTICATE
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.signature)
    }

    fn expected_length(&self) -> Option<u8> {
        None
    }

    fn parse_response(&self, response: Response) -> Result<Self::Success> {
        if response.status() == INCORRECT_SIGNATURE {
            return Ok(false);
        }
        status::check(Self::KIND, &response)?;
        Ok(true)
    }
}

impl CalypsoCommand for DigestAuthenticate {
    const KIND: CommandKind = CommandKind::DigestAuthenticate;
}
