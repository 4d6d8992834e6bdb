use bytes::Bytes;
use calypso_apdu_core::{ApduCommand, Response};

use super::update_record::check_record_data;
use super::{CalypsoCommand, check_sfi};
use crate::constants::ins;
use crate::error::{Error, Result};
use crate::revision::PoRevision;
use crate::status::{self, CommandKind};

/// APPEND RECORD command, for cyclic files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRecord {
    cla: u8,
    sfi: u8,
    data: Bytes,
}

impl AppendRecord {
    /// Add a record at the head of the cyclic file `sfi` (0 for the current file)
    pub fn new(revision: PoRevision, sfi: u8, data: Bytes) -> Result<Self> {
        check_record_data(&data)?;
        Ok(Self {
            cla: revision.cla(),
            sfi: check_sfi(sfi)?,
            data,
        })
    }

    /// Data written
    pub const fn record_data(&self) -> &Bytes {
        &self.data
    }
}

impl ApduCommand for AppendRecord {
    type Success = ();
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        ins::APPEND_RECORD
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        self.sfi * 8
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

impl CalypsoCommand for AppendRecord {
    const KIND: CommandKind = CommandKind::AppendRecord;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_encoding() {
        let cmd = AppendRecord::new(PoRevision::Rev3_2, 0x14, Bytes::from_static(&hex!("AABBCC")))
            .unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("00E200A003AABBCC"));
    }

    #[test]
    fn test_not_cyclic() {
        let cmd = AppendRecord::new(PoRevision::Rev3_2, 0x14, Bytes::from_static(&[0x01]))
            .unwrap();
        let err = cmd.parse_response_raw(&hex!("6981")).unwrap_err();
        assert!(!err.is_fatal());
    }
}
