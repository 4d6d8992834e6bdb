//! Per-command status word tables
//!
//! Each command kind has a table mapping the status words it can return to an
//! entry telling whether the command succeeded, what the status means for
//! this particular command and, for failures, the kind of error. The lookup is
//! total: unmapped status words resolve to the table's default entry.

use calypso_apdu_core::{ApduResponse, Response, StatusWord};
use derive_more::Display;
use tracing::{Level, debug, info, warn};

use self::ErrorKind::*;
use crate::error::Error;

/// Every command the engine sends, card and SAM alike
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Open Secure Session (card)
    #[display("Open Secure Session")]
    OpenSession,
    /// Close Secure Session (card)
    #[display("Close Secure Session")]
    CloseSession,
    /// Ratification (card)
    #[display("Ratification")]
    Ratification,
    /// Read Records (card)
    #[display("Read Records")]
    ReadRecords,
    /// Update Record (card)
    #[display("Update Record")]
    UpdateRecord,
    /// Append Record (card)
    #[display("Append Record")]
    AppendRecord,
    /// Select Diversifier (SAM)
    #[display("Select Diversifier")]
    SelectDiversifier,
    /// Get Challenge (SAM)
    #[display("Get Challenge")]
    GetChallenge,
    /// Digest Init (SAM)
    #[display("Digest Init")]
    DigestInit,
    /// Digest Update (SAM)
    #[display("Digest Update")]
    DigestUpdate,
    /// Digest Close (SAM)
    #[display("Digest Close")]
    DigestClose,
    /// Digest Authenticate (SAM)
    #[display("Digest Authenticate")]
    DigestAuthenticate,
}

impl CommandKind {
    /// Whether the command is addressed to the SAM
    pub const fn is_sam(self) -> bool {
        matches!(
            self,
            Self::SelectDiversifier
                | Self::GetChallenge
                | Self::DigestInit
                | Self::DigestUpdate
                | Self::DigestClose
                | Self::DigestAuthenticate
        )
    }

    /// Status table of the command
    pub const fn status_table(self) -> &'static StatusTable {
        match self {
            Self::OpenSession => &OPEN_SESSION,
            Self::CloseSession => &CLOSE_SESSION,
            Self::Ratification => &RATIFICATION,
            Self::ReadRecords => &READ_RECORDS,
            Self::UpdateRecord => &UPDATE_RECORD,
            Self::AppendRecord => &APPEND_RECORD,
            Self::SelectDiversifier => &SELECT_DIVERSIFIER,
            Self::GetChallenge => &GET_CHALLENGE,
            Self::DigestInit => &DIGEST_INIT,
            Self::DigestUpdate => &DIGEST_UPDATE,
            Self::DigestClose => &DIGEST_CLOSE,
            Self::DigestAuthenticate => &DIGEST_AUTHENTICATE,
        }
    }
}

/// Kind of a status word anomaly
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Access forbidden by the file or session conditions
    #[display("access forbidden")]
    Access,
    /// Security conditions not fulfilled
    #[display("security")]
    Security,
    /// Referenced file or record unusable
    #[display("data access")]
    DataAccess,
    /// P1, P2 or Lc rejected
    #[display("illegal parameter")]
    IllegalParameter,
    /// Command data rejected
    #[display("illegal argument")]
    IllegalArgument,
    /// Too many modifications within the session
    #[display("session buffer overflow")]
    SessionBufferOverflow,
    /// Application or counter exhausted
    #[display("terminated")]
    Terminated,
    /// Status word not documented for the command
    #[display("unknown")]
    Unknown,
}

/// Whether an anomaly leaves the device usable for further commands
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The device state is unchanged, the caller may try something else
    Recoverable,
    /// The device state is unknown or unusable
    Fatal,
}

impl ErrorKind {
    /// Severity of this kind of anomaly
    pub const fn severity(self) -> Severity {
        match self {
            Self::Access
            | Self::DataAccess
            | Self::IllegalParameter
            | Self::IllegalArgument
            | Self::SessionBufferOverflow => Severity::Recoverable,
            Self::Security | Self::Terminated | Self::Unknown => Severity::Fatal,
        }
    }
}

/// Meaning of one status word for one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry {
    /// Whether the command completed successfully
    pub successful: bool,
    /// Command specific description
    pub message: &'static str,
    /// Anomaly kind, `None` for successful entries
    pub kind: Option<ErrorKind>,
}

impl StatusEntry {
    /// Entry for a successful status
    pub const fn success(message: &'static str) -> Self {
        Self {
            successful: true,
            message,
            kind: None,
        }
    }

    /// Entry for an anomaly
    pub const fn error(message: &'static str, kind: ErrorKind) -> Self {
        Self {
            successful: false,
            message,
            kind: Some(kind),
        }
    }

    /// Severity of the entry, `None` for successful entries
    pub fn severity(&self) -> Option<Severity> {
        self.kind.map(ErrorKind::severity)
    }
}

/// Entry used when a status word is not in a table
pub const UNEXPECTED_STATUS: StatusEntry =
    StatusEntry::error("Unexpected status word", ErrorKind::Unknown);

const SUCCESS: (u16, StatusEntry) = (0x9000, StatusEntry::success("Success"));

/// Status words of one command with their meaning
#[derive(Debug, Clone, Copy)]
pub struct StatusTable {
    entries: &'static [(u16, StatusEntry)],
    default: StatusEntry,
}

impl StatusTable {
    /// Table falling back to [`UNEXPECTED_STATUS`]
    pub const fn new(entries: &'static [(u16, StatusEntry)]) -> Self {
        Self {
            entries,
            default: UNEXPECTED_STATUS,
        }
    }

    /// Override the entry used for unmapped status words
    pub const fn with_default(mut self, default: StatusEntry) -> Self {
        self.default = default;
        self
    }

    /// Entry for a status word, or the default entry
    pub fn lookup(&self, status: StatusWord) -> &StatusEntry {
        let code = status.to_u16();
        self.entries
            .iter()
            .find(|(sw, _)| *sw == code)
            .map_or(&self.default, |(_, entry)| entry)
    }

    /// Entry used for unmapped status words
    pub const fn default_entry(&self) -> &StatusEntry {
        &self.default
    }
}

/// Interpret a status word for a command
pub fn lookup(kind: CommandKind, status: StatusWord) -> &'static StatusEntry {
    kind.status_table().lookup(status)
}

/// Check a response against the status table of its command
///
/// SAM anomalies and card anomalies are reported as distinct errors.
pub(crate) fn check(kind: CommandKind, response: &Response) -> Result<(), Error> {
    let status = response.status();
    let entry = lookup(kind, status);
    if entry.successful {
        if !status.is_success() {
            debug!(command = %kind, %status, message = entry.message, "Status word accepted");
        }
        return Ok(());
    }

    if status.tracing_level() == Level::WARN {
        warn!(command = %kind, %status, message = entry.message, "Status word anomaly");
    } else {
        info!(command = %kind, %status, message = entry.message, "Status word anomaly");
    }
    if kind.is_sam() {
        Err(Error::SamStatus {
            command: kind,
            status,
            entry: *entry,
        })
    } else {
        Err(Error::CardStatus {
            command: kind,
            status,
            entry: *entry,
        })
    }
}

const OPEN_SESSION: StatusTable = StatusTable::new(OPEN_SESSION_STATUS);
const CLOSE_SESSION: StatusTable = StatusTable::new(CLOSE_SESSION_STATUS);
// The card may answer anything: the ratification is only the next command.
const RATIFICATION: StatusTable = StatusTable::new(RATIFICATION_STATUS)
    .with_default(StatusEntry::success("Ratification sent"));
const READ_RECORDS: StatusTable = StatusTable::new(READ_RECORDS_STATUS);
const UPDATE_RECORD: StatusTable = StatusTable::new(UPDATE_RECORD_STATUS);
const APPEND_RECORD: StatusTable = StatusTable::new(APPEND_RECORD_STATUS);
const SELECT_DIVERSIFIER: StatusTable = StatusTable::new(SELECT_DIVERSIFIER_STATUS);
const GET_CHALLENGE: StatusTable = StatusTable::new(GET_CHALLENGE_STATUS);
const DIGEST_INIT: StatusTable = StatusTable::new(DIGEST_INIT_STATUS);
const DIGEST_UPDATE: StatusTable = StatusTable::new(DIGEST_UPDATE_STATUS);
const DIGEST_CLOSE: StatusTable = StatusTable::new(DIGEST_CLOSE_STATUS);
const DIGEST_AUTHENTICATE: StatusTable = StatusTable::new(DIGEST_AUTHENTICATE_STATUS);

const OPEN_SESSION_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (0x6700, StatusEntry::error("Lc value not supported", IllegalParameter)),
    (0x6900, StatusEntry::error("Transaction counter is 0", Terminated)),
    (
        0x6981,
        StatusEntry::error(
            "Command forbidden (read requested and current EF is a binary file)",
            DataAccess,
        ),
    ),
    (
        0x6982,
        StatusEntry::error(
            "Security conditions not fulfilled (PIN code not presented, encryption required)",
            Security,
        ),
    ),
    (
        0x6985,
        StatusEntry::error(
            "Access forbidden (never access mode, session already opened)",
            Access,
        ),
    ),
    (
        0x6986,
        StatusEntry::error(
            "Command not allowed (read requested and no current EF)",
            DataAccess,
        ),
    ),
    (0x6A81, StatusEntry::error("Wrong key index", IllegalParameter)),
    (0x6A82, StatusEntry::error("File not found", DataAccess)),
    (
        0x6A83,
        StatusEntry::error("Record not found (record index is above NumRec)", DataAccess),
    ),
    (
        0x6B00,
        StatusEntry::error("P1 or P2 value not supported", IllegalParameter),
    ),
];

const CLOSE_SESSION_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (
        0x6700,
        StatusEntry::error("Lc signatureLo not supported", IllegalParameter),
    ),
    (
        0x6B00,
        StatusEntry::error("P1 or P2 signatureLo not supported", IllegalParameter),
    ),
    (0x6988, StatusEntry::error("Incorrect signatureLo", Security)),
    (0x6985, StatusEntry::error("No session was opened", Access)),
];

const RATIFICATION_STATUS: &[(u16, StatusEntry)] = &[SUCCESS];

const READ_RECORDS_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (
        0x6981,
        StatusEntry::error("Command forbidden on binary files", DataAccess),
    ),
    (
        0x6982,
        StatusEntry::error(
            "Security conditions not fulfilled (PIN code not presented, encryption required)",
            Security,
        ),
    ),
    (
        0x6985,
        StatusEntry::error(
            "Access forbidden (never access mode, stored value log file and a stored value operation was done during the current session)",
            Access,
        ),
    ),
    (
        0x6986,
        StatusEntry::error("Command not allowed (no current EF)", DataAccess),
    ),
    (0x6A82, StatusEntry::error("File not found", DataAccess)),
    (
        0x6A83,
        StatusEntry::error(
            "Record not found (record index is 0, or above NumRec)",
            DataAccess,
        ),
    ),
    (0x6B00, StatusEntry::error("P2 value not supported", IllegalParameter)),
];

const UPDATE_RECORD_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (
        0x6400,
        StatusEntry::error("Too many modifications in session", SessionBufferOverflow),
    ),
    (0x6700, StatusEntry::error("Lc value not supported", IllegalParameter)),
    (
        0x6981,
        StatusEntry::error(
            "Command forbidden on cyclic files when the record exists and is not record 01h, and on binary files",
            DataAccess,
        ),
    ),
    (
        0x6982,
        StatusEntry::error(
            "Security conditions not fulfilled (no session, wrong key, encryption required)",
            Security,
        ),
    ),
    (
        0x6985,
        StatusEntry::error(
            "Access forbidden (never access mode, DF is invalidated)",
            Access,
        ),
    ),
    (
        0x6986,
        StatusEntry::error("Command not allowed (no current EF)", DataAccess),
    ),
    (0x6A82, StatusEntry::error("File not found", DataAccess)),
    (
        0x6A83,
        StatusEntry::error(
            "Record is not found (record index is 0 or above NumRec)",
            DataAccess,
        ),
    ),
    (0x6B00, StatusEntry::error("P2 value not supported", IllegalParameter)),
];

const APPEND_RECORD_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (
        0x6400,
        StatusEntry::error("Too many modifications in session", SessionBufferOverflow),
    ),
    (0x6700, StatusEntry::error("Lc value not supported", IllegalParameter)),
    (
        0x6981,
        StatusEntry::error("The current EF is not a cyclic EF", DataAccess),
    ),
    (
        0x6982,
        StatusEntry::error(
            "Security conditions not fulfilled (no session, wrong key)",
            Security,
        ),
    ),
    (
        0x6985,
        StatusEntry::error(
            "Access forbidden (never access mode, DF is invalidated)",
            Access,
        ),
    ),
    (
        0x6986,
        StatusEntry::error("Command not allowed (no current EF)", DataAccess),
    ),
    (0x6A82, StatusEntry::error("File not found", DataAccess)),
    (
        0x6B00,
        StatusEntry::error("P1 or P2 value not supported", IllegalParameter),
    ),
];

const SELECT_DIVERSIFIER_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (0x6700, StatusEntry::error("Lc value not supported", IllegalParameter)),
    (
        0x6985,
        StatusEntry::error("Preconditions not satisfied (SAM locked)", Access),
    ),
];

const GET_CHALLENGE_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (0x6700, StatusEntry::error("Le value not supported", IllegalParameter)),
    (0x6B00, StatusEntry::error("Incorrect P1 or P2", IllegalParameter)),
];

const DIGEST_INIT_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (0x6700, StatusEntry::error("Incorrect Lc", IllegalParameter)),
    (
        0x6900,
        StatusEntry::error("An event counter cannot be incremented", Terminated),
    ),
    (0x6985, StatusEntry::error("Preconditions not satisfied", Access)),
    (0x6A00, StatusEntry::error("Incorrect P1 or P2", IllegalParameter)),
    (
        0x6A83,
        StatusEntry::error("Record not found: signing key not found", DataAccess),
    ),
    (0x6B00, StatusEntry::error("Incorrect P1", IllegalParameter)),
];

const DIGEST_UPDATE_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (0x6700, StatusEntry::error("Lc value not supported", IllegalParameter)),
    (0x6985, StatusEntry::error("Preconditions not satisfied", Access)),
    (0x6A00, StatusEntry::error("Incorrect P2", IllegalParameter)),
    (0x6B00, StatusEntry::error("Incorrect P1", IllegalParameter)),
];

const DIGEST_CLOSE_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (0x6700, StatusEntry::error("Lc value not supported", IllegalParameter)),
    (0x6985, StatusEntry::error("Preconditions not satisfied", Access)),
];

const DIGEST_AUTHENTICATE_STATUS: &[(u16, StatusEntry)] = &[
    SUCCESS,
    (0x6700, StatusEntry::error("Incorrect Lc", IllegalParameter)),
    (0x6985, StatusEntry::error("Preconditions not satisfied", Access)),
    (0x6988, StatusEntry::error("Incorrect signature", Security)),
];
