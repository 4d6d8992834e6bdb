use bytes::{BufMut, Bytes, BytesMut};
use calypso_apdu_core::command::MAX_DATA_LENGTH;
use calypso_apdu_core::{ApduCommand, Response};
use derive_more::Display;

use super::CalypsoCommand;
use crate::constants::sam_ins;
use crate::error::{Error, Result};
use crate::revision::SamRevision;
use crate::status::{self, CommandKind};

/// Key the SAM uses to compute the session signature
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum WorkKey {
    /// Key designated by its identifier and version
    #[display("KIF {kif:#04X} KVC {kvc:#04X}")]
    Kif {
        /// Key identifier
        kif: u8,
        /// Key version
        kvc: u8,
    },
    /// Key designated by its record number in the SAM
    #[display("key record {_0}")]
    Record(u8),
}

/// DIGEST INIT command: start the session digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestInit {
    cla: u8,
    p1: u8,
    p2: u8,
    data: Bytes,
}

impl DigestInit {
    /// Seed the digest with the Open Secure Session response payload
    pub fn new(revision: SamRevision, extended: bool, key: WorkKey, seed: &[u8]) -> Result<Self> {
        let (p2, data) = match key {
            WorkKey::Kif { kif, kvc } => {
                let mut data = BytesMut::with_capacity(2 + seed.len());
                data.put_u8(kif);
                data.put_u8(kvc);
                data.put_slice(seed);
                (0xFF, data.freeze())
            }
            WorkKey::Record(record) => (record, Bytes::copy_from_slice(seed)),
        };
        if data.len() > MAX_DATA_LENGTH {
            return Err(calypso_apdu_core::Error::DataTooLong(data.len()).into());
        }

        Ok(Self {
            cla: revision.cla(),
            p1: if extended { 0x02 } else { 0x00 },
            p2,
            data,
        })
    }
}

impl ApduCommand for DigestInit {
    type Success = ();
    type Error = Error;

    fn convert_error(error: calypso_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        sam_ins::DIGEST_INIT
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
        None
    }

    fn parse_response(&self, response: Response) -> Result<Self::Success> {
        status::check(Self::KIND, &response)
    }
}

impl CalypsoCommand for DigestInit {
    const KIND: CommandKind = CommandKind::DigestInit;
}
