use bytes::{BufMut, Bytes, BytesMut};
use calypso_apdu_core::{ApduCommand, ApduResponse, Response};

use super::{CalypsoCommand, check_sfi};
use crate::constants::ins;
use crate::error::{Error, Result};
use crate::revision::PoRevision;
use crate::session::{AccessLevel, SecureSessionData, parse_open_session};
use crate::status::{self, CommandKind};

/// OPEN SECURE SESSION command
///
/// The encoding follows the layout the session is opened with:
///
/// | layout | CLA | P1 | P2 | data | Le |
/// |---|---|---|---|---|---|
/// | 1.0 | 94 | rec*8 + key | sfi*8 | challenge(4) | - |
/// | 2.4 | 94 | 80 + rec*8 + key | sfi*8 | challenge(4) | - |
/// | 3.1 | 00 | rec*8 + key | sfi*8 + 1 | challenge(4) | 00 |
/// | 3.2 | 00 | rec*8 + key | sfi*8 + 2 | 00 challenge(8) | 00 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    layout: PoRevision,
    p1: u8,
    p2: u8,
    data: Bytes,
}

impl OpenSession {
    /// Open a session, reading `record` of `sfi` at the same time
    ///
    /// A record number of 0 reads nothing.
    pub fn new(
        layout: PoRevision,
        access_level: AccessLevel,
        sfi: u8,
        record: u8,
        terminal_challenge: &[u8],
    ) -> Result<Self> {
        let sfi = check_sfi(sfi)?;
        let max_record = match layout {
            PoRevision::Rev2_4 => 0x0F,
            _ => 0x1F,
        };
        if record > max_record {
            return Err(Error::config(format!(
                "record number {record} cannot be read at opening with a revision {layout} card"
            )));
        }

        let expected = Self::challenge_length(layout);
        if terminal_challenge.len() != expected {
            return Err(Error::config(format!(
                "terminal challenge must be {expected} bytes, got {}",
                terminal_challenge.len()
            )));
        }

        let key_index = access_level.key_index();
        let (p1, p2, data) = match layout {
            PoRevision::Rev1_0 => (
                record * 8 + key_index,
                sfi * 8,
                Bytes::copy_from_slice(terminal_challenge),
            ),
            PoRevision::Rev2_4 => (
                0x80 + record * 8 + key_index,
                sfi * 8,
                Bytes::copy_from_slice(terminal_challenge),
            ),
            PoRevision::Rev3_1 => (
                record * 8 + key_index,
                sfi * 8 + 1,
                Bytes::copy_from_slice(terminal_challenge),
            ),
            PoRevision::Rev3_2 => {
                let mut data = BytesMut::with_capacity(1 + terminal_challenge.len());
                data.put_u8(0x00);
                data.put_slice(terminal_challenge);
                (record * 8 + key_index, sfi * 8 + 2, data.freeze())
            }
        };

        Ok(Self {
            layout,
            p1,
            p2,
            data,
        })
    }

    /// Terminal challenge length expected by a layout
    pub const fn challenge_length(layout: PoRevision) -> usize {
        match layout {
            PoRevision::Rev3_2 => 8,
            _ => 4,
        }
    }
}

impl ApduCommand for OpenSession {
    type Success = SecureSessionData;
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.layout.cla()
    }

    fn instruction(&self) -> u8 {
        ins::OPEN_SESSION
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.p2
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<u8> {
        match self.layout {
            PoRevision::Rev1_0 | PoRevision::Rev2_4 => None,
            PoRevision::Rev3_1 | PoRevision::Rev3_2 => Some(0x00),
        }
    }

    fn parse_response(&self, response: Response) -> Result<Self::Success> {
        status::check(Self::KIND, &response)?;
        parse_open_session(self.layout, response.payload())
    }
}

impl CalypsoCommand for OpenSession {
    const KIND: CommandKind = CommandKind::OpenSession;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_encoding_per_layout() {
        let challenge = hex!("C1C2C3C4");

        let cmd = OpenSession::new(PoRevision::Rev1_0, AccessLevel::Debit, 0x07, 1, &challenge)
            .unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("948A0B3804C1C2C3C4"));

        let cmd = OpenSession::new(PoRevision::Rev2_4, AccessLevel::Debit, 0x07, 1, &challenge)
            .unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("948A8B3804C1C2C3C4"));

        let cmd = OpenSession::new(PoRevision::Rev3_1, AccessLevel::Load, 0x07, 1, &challenge)
            .unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("008A0A3904C1C2C3C400"));

        let challenge = hex!("C1C2C3C4C5C6C7C8");
        let cmd = OpenSession::new(
            PoRevision::Rev3_2,
            AccessLevel::Personalization,
            0x07,
            0,
            &challenge,
        )
        .unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("008A013A0900C1C2C3C4C5C6C7C800"));
    }

    #[test]
    fn test_invalid_arguments() {
        let challenge = hex!("C1C2C3C4");
        assert!(
            OpenSession::new(PoRevision::Rev3_2, AccessLevel::Debit, 1, 1, &challenge).is_err()
        );
        assert!(
            OpenSession::new(PoRevision::Rev2_4, AccessLevel::Debit, 1, 16, &challenge).is_err()
        );
        assert!(
            OpenSession::new(PoRevision::Rev3_1, AccessLevel::Debit, 0x1F, 1, &challenge).is_err()
        );
    }

    #[test]
    fn test_parse_response() {
        let cmd = OpenSession::new(PoRevision::Rev3_1, AccessLevel::Debit, 0, 0, &[0; 4]).unwrap();

        let data = cmd.parse_response_raw(&hex!("00007EC1001234009000")).unwrap();
        assert_eq!(data.kif(), 0x12);

        let err = cmd.parse_response_raw(&hex!("6985")).unwrap_err();
        assert!(matches!(err, Error::CardStatus { command: CommandKind::OpenSession, .. }));

        let err = cmd.parse_response_raw(&hex!("00007EC1009000")).unwrap_err();
        assert!(matches!(err, Error::Decode { length: 5, .. }));
    }
}
