use std::collections::BTreeMap;

use bytes::Bytes;
use calypso_apdu_core::{ApduCommand, ApduResponse, Response};

use super::{CalypsoCommand, check_record_number, check_sfi};
use crate::constants::ins;
use crate::error::{Error, Result};
use crate::revision::PoRevision;
use crate::status::{self, CommandKind};

/// Records read from a file, by record number
pub type Records = BTreeMap<u8, Bytes>;

/// How many records a READ RECORDS command returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Only the requested record
    OneRecord,
    /// The requested record and the following ones, as many as fit
    MultipleRecords,
}

/// READ RECORDS command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecords {
    cla: u8,
    sfi: u8,
    record: u8,
    mode: ReadMode,
}

impl ReadRecords {
    /// Read from `record` of the file `sfi` (0 for the current file)
    pub fn new(revision: PoRevision, sfi: u8, record: u8, mode: ReadMode) -> Result<Self> {
        Ok(Self {
            cla: revision.cla(),
            sfi: check_sfi(sfi)?,
            record: check_record_number(record)?,
            mode,
        })
    }

    /// Read mode of the command
    pub const fn mode(&self) -> ReadMode {
        self.mode
    }
}

/// Split a multiple records response: `[number][length][data]...`
fn parse_multiple(payload: &Bytes) -> Result<Records> {
    let mut records = Records::new();
    let mut index = 0;
    while index < payload.len() {
        let header = payload.get(index..index + 2).ok_or_else(|| truncated(payload))?;
        let (number, length) = (header[0], header[1] as usize);
        let start = index + 2;
        if start + length > payload.len() {
            return Err(truncated(payload));
        }
        records.insert(number, payload.slice(start..start + length));
        index = start + length;
    }
    Ok(records)
}

fn truncated(payload: &Bytes) -> Error {
    Error::decode(
        CommandKind::ReadRecords,
        "truncated multiple records response",
        payload.len(),
    )
}

impl ApduCommand for ReadRecords {
    type Success = Records;
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
        self.record
    }

    fn p2(&self) -> u8 {
        let read_mode = match self.mode {
            ReadMode::OneRecord => 0x04,
            ReadMode::MultipleRecords => 0x05,
        };
        self.sfi * 8 + read_mode
    }

    fn data(&self) -> Option<&[u8]> {
        None
    }

    fn expected_length(&self) -> Option<u8> {
        Some(0x00)
    }

    fn parse_response(&self, response: Response) -> Result<Self::Success> {
        status::check(Self::KIND, &response)?;
        match self.mode {
            ReadMode::OneRecord => Ok(Records::from([(self.record, response.payload().clone())])),
            ReadMode::MultipleRecords => parse_multiple(response.payload()),
        }
    }
}

impl CalypsoCommand for ReadRecords {
    const KIND: CommandKind = CommandKind::ReadRecords;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_encoding() {
        let cmd = ReadRecords::new(PoRevision::Rev3_1, 0x07, 1, ReadMode::OneRecord).unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("00B2013C00"));

        let cmd = ReadRecords::new(PoRevision::Rev2_4, 0x08, 2, ReadMode::MultipleRecords)
            .unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), &hex!("94B2024500"));

        let cmd = ReadRecords::new(PoRevision::Rev3_1, 0, 1, ReadMode::OneRecord).unwrap();
        assert_eq!(cmd.p2(), 0x04);

        assert!(ReadRecords::new(PoRevision::Rev3_1, 0x07, 0, ReadMode::OneRecord).is_err());
    }

    #[test]
    fn test_parse_one_record() {
        let cmd = ReadRecords::new(PoRevision::Rev3_1, 0x07, 3, ReadMode::OneRecord).unwrap();
        let records = cmd.parse_response_raw(&hex!("AABBCC9000")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[&3].as_ref(), &hex!("AABBCC"));
    }

    #[test]
    fn test_parse_multiple_records() {
        let cmd = ReadRecords::new(PoRevision::Rev3_1, 0x07, 1, ReadMode::MultipleRecords)
            .unwrap();
        let records = cmd
            .parse_response_raw(&hex!("01 02 AABB 02 03 CCDDEE 03 00 9000"))
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[&1].as_ref(), &hex!("AABB"));
        assert_eq!(records[&2].as_ref(), &hex!("CCDDEE"));
        assert!(records[&3].is_empty());

        let err = cmd.parse_response_raw(&hex!("01 05 AABB 9000")).unwrap_err();
        assert!(matches!(err, Error::Decode { length: 4, .. }));

        let err = cmd.parse_response_raw(&hex!("01 02 AABB 02 9000")).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_record_not_found() {
        let cmd = ReadRecords::new(PoRevision::Rev3_1, 0x07, 9, ReadMode::OneRecord).unwrap();
        let err = cmd.parse_response_raw(&hex!("6A83")).unwrap_err();
        assert!(matches!(
            err,
            Error::CardStatus {
                command: CommandKind::ReadRecords,
                ..
            }
        ));
    }
}
