use bytes::Bytes;
use calypso_apdu_core::{ApduCommand, Response};

use super::{CalypsoCommand, check_record_number, check_sfi};
use crate::constants::ins;
use crate::error::{Error, Result};
use crate::revision::PoRevision;
use crate::status::{self, CommandKind};

/// Largest record content written in one command
pub const MAX_RECORD_DATA_LENGTH: usize = 250;

pub(crate) fn check_record_data(data: &Bytes) -> Result<()> {
    if data.is_empty() || data.len() > MAX_RECORD_DATA_LENGTH {
        return Err(Error::config(format!(
            "record data must be 1 to {MAX_RECORD_DATA_LENGTH} bytes, got {}",
            data.len()
        )));
    }
    Ok(())
}

/// UPDATE RECORD command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    cla: u8,
    sfi: u8,
    record: u8,
    data: Bytes,
}

impl UpdateRecord {
    /// Replace the content of `record` in file `sfi` (0 for the current file)
    pub fn new(revision: PoRevision, sfi: u8, record: u8, data: Bytes) -> Result<Self> {
        check_record_data(&data)?;
        Ok(Self {
            cla: revision.cla(),
            sfi: check_sfi(sfi)?,
            record: check_record_number(record)?,
            data,
        })
    }

    /// Data written
    pub const fn record_data(&self) -> &Bytes {
        &self.data
    }
}

impl ApduCommand for UpdateRecord {
    type Success = ();
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        ins::UPDATE_RECORD
    }

    fn p1(&self) -> u8 {
        self.record
    }

    fn p2(&self) -> u8 {
        self.sfi * 8 + 0x04
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

impl CalypsoCommand for UpdateRecord {
    const KIND: CommandKind = CommandKind::UpdateRecord;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_encoding() {
        let cmd = UpdateRecord::new(
            PoRevision::Rev3_1,
            0x08,
            1,
            Bytes::from_static(&hex!("0102")),
        )
        .unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("00DC0144020102"));

        let cmd = UpdateRecord::new(PoRevision::Rev1_0, 0, 2, Bytes::from_static(&[0xFF]))
            .unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("94DC020401FF"));

        assert!(UpdateRecord::new(PoRevision::Rev3_1, 0x08, 1, Bytes::new()).is_err());
    }

    #[test]
    fn test_too_many_modifications() {
        let cmd = UpdateRecord::new(PoRevision::Rev3_1, 0x08, 1, Bytes::from_static(&[0x00]))
            .unwrap();
        let err = cmd.parse_response_raw(&hex!("6400")).unwrap_err();
        assert_eq!(
            err.kind(),
            Some(crate::status::ErrorKind::SessionBufferOverflow)
        );
    }
}
