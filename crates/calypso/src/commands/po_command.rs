use bytes::Bytes;
use calypso_apdu_core::{ApduCommand, Response};

use super::{AppendRecord, CalypsoCommand, ReadMode, ReadRecords, Records, UpdateRecord};
use crate::constants::SESSION_BUFFER_CMD_OVERHEAD;
use crate::error::Result;
use crate::po::SessionModifications;
use crate::revision::PoRevision;
use crate::status::CommandKind;

/// A card command processed by a transaction, in or out of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoCommand {
    /// Read one or several records
    ReadRecords {
        /// File identifier, 0 for the current file
        sfi: u8,
        /// First record to read
        record: u8,
        /// Number of records returned
        mode: ReadMode,
    },
    /// Replace the content of a record
    UpdateRecord {
        /// File identifier, 0 for the current file
        sfi: u8,
        /// Record to write
        record: u8,
        /// New content
        data: Bytes,
    },
    /// Add a record to a cyclic file
    AppendRecord {
        /// File identifier, 0 for the current file
        sfi: u8,
        /// Content of the new record
        data: Bytes,
    },
}

/// Result of a [`PoCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoResponse {
    /// Records read
    Records(Records),
    /// Record updated
    Updated,
    /// Record appended
    Appended,
}

impl PoResponse {
    /// Records read, if this is the response to a read
    pub const fn records(&self) -> Option<&Records> {
        match self {
            Self::Records(records) => Some(records),
            _ => None,
        }
    }
}

impl PoCommand {
    /// Read a single record
    pub const fn read_record(sfi: u8, record: u8) -> Self {
        Self::ReadRecords {
            sfi,
            record,
            mode: ReadMode::OneRecord,
        }
    }

    /// Read records starting at `first`, as many as the card returns
    pub const fn read_records(sfi: u8, first: u8) -> Self {
        Self::ReadRecords {
            sfi,
            record: first,
            mode: ReadMode::MultipleRecords,
        }
    }

    /// Replace the content of a record
    pub fn update_record(sfi: u8, record: u8, data: impl Into<Bytes>) -> Self {
        Self::UpdateRecord {
            sfi,
            record,
            data: data.into(),
        }
    }

    /// Add a record to a cyclic file
    pub fn append_record(sfi: u8, data: impl Into<Bytes>) -> Self {
        Self::AppendRecord {
            sfi,
            data: data.into(),
        }
    }

    /// Kind of the command
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::ReadRecords { .. } => CommandKind::ReadRecords,
            Self::UpdateRecord { .. } => CommandKind::UpdateRecord,
            Self::AppendRecord { .. } => CommandKind::AppendRecord,
        }
    }

    /// Session buffer units consumed by the command
    pub fn session_cost(&self, modifications: SessionModifications) -> usize {
        let data = match self {
            Self::ReadRecords { .. } => return 0,
            Self::UpdateRecord { data, .. } | Self::AppendRecord { data, .. } => data,
        };
        match modifications {
            SessionModifications::Bytes(_) => data.len() + SESSION_BUFFER_CMD_OVERHEAD,
            SessionModifications::Operations(_) => 1,
        }
    }

    /// Build the APDU for a card revision
    pub(crate) fn prepare(&self, revision: PoRevision) -> Result<PreparedCommand> {
        Ok(match self {
            Self::ReadRecords { sfi, record, mode } => {
                PreparedCommand::Read(ReadRecords::new(revision, *sfi, *record, *mode)?)
            }
            Self::UpdateRecord { sfi, record, data } => PreparedCommand::Update(
                UpdateRecord::new(revision, *sfi, *record, data.clone())?,
            ),
            Self::AppendRecord { sfi, data } => {
                PreparedCommand::Append(AppendRecord::new(revision, *sfi, data.clone())?)
            }
        })
    }
}

/// A [`PoCommand`] encoded for a given card
#[derive(Debug)]
pub(crate) enum PreparedCommand {
    Read(ReadRecords),
    Update(UpdateRecord),
    Append(AppendRecord),
}

impl PreparedCommand {
    pub(crate) fn to_bytes(&self) -> Bytes {
        match self {
            Self::Read(cmd) => cmd.to_bytes(),
            Self::Update(cmd) => cmd.to_bytes(),
            Self::Append(cmd) => cmd.to_bytes(),
        }
    }

    pub(crate) const fn kind(&self) -> CommandKind {
        match self {
            Self::Read(_) => ReadRecords::KIND,
            Self::Update(_) => UpdateRecord::KIND,
            Self::Append(_) => AppendRecord::KIND,
        }
    }

    pub(crate) fn parse_response(&self, response: Response) -> Result<PoResponse> {
        match self {
            Self::Read(cmd) => cmd.parse_response(response).map(PoResponse::Records),
            Self::Update(cmd) => cmd.parse_response(response).map(|()| PoResponse::Updated),
            Self::Append(cmd) => cmd.parse_response(response).map(|()| PoResponse::Appended),
        }
    }
}
