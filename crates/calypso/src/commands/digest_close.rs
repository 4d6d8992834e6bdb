use bytes::Bytes;
use calypso_apdu_core::{ApduCommand, ApduResponse, Response};

use super::CalypsoCommand;
use crate::constants::sam_ins;
use crate::error::{Error, Result};
use crate::revision::SamRevision;
use crate::status::{self, CommandKind};

/// DIGEST CLOSE command: end the digest and get the terminal half signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestClose {
    cla: u8,
    length: u8,
}

impl DigestClose {
    /// Request a 4 byte signature, or 8 bytes for an extended mode session
    pub const fn new(revision: SamRevision, extended: bool) -> Self {
        Self {
            cla: revision.cla(),
            length: if extended { 8 } else { 4 },
        }
    }
}

impl ApduCommand for DigestClose {
    type Success = Bytes;
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        sam_ins::DIGEST_CLOSE
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
        let signature = response.payload();
        if signature.len() != self.length as usize {
            return Err(Error::decode(
                Self::KIND,
                "unexpected signature length",
                signature.len(),
            ));
        }
        Ok(signature.clone())
    }
}

impl CalypsoCommand for DigestClose {
    const KIND: CommandKind = CommandKind::DigestClose;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_signature() {
        let cmd = DigestClose::new(SamRevision::C1, false);
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("808E000004"));
        assert_eq!(
            cmd.parse_response_raw(&hex!("112233449000")).unwrap().as_ref(),
            &hex!("11223344")
        );
        assert!(cmd.parse_response_raw(&hex!("11223344AABBCCDD9000")).is_err());

        let cmd = DigestClose::new(SamRevision::C1, true);
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("808E000008"));
    }
}
