//! Error taxonomy of the secure session engine

use calypso_apdu_core::{StatusWord, TransportError};
use derive_more::Display;

use crate::sam::PoolError;
use crate::session::SessionState;
use crate::status::{CommandKind, ErrorKind, Severity, StatusEntry};

/// Result type for Calypso operations
pub type Result<T> = std::result::Result<T, Error>;

/// Device on the other side of a transport
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The card
    #[display("card")]
    Po,
    /// The SAM
    #[display("SAM")]
    Sam,
}

/// Error type for Calypso operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A response could not be decoded
    #[error("{command}: {reason} (payload length {length})")]
    Decode {
        /// Command whose response is malformed
        command: CommandKind,
        /// What is wrong with it
        reason: &'static str,
        /// Payload length received, status word excluded
        length: usize,
    },

    /// The card answered with a status word that is not a success
    #[error("{command}: card status {status}: {}", .entry.message)]
    CardStatus {
        /// Command concerned
        command: CommandKind,
        /// Status word received
        status: StatusWord,
        /// Meaning of the status word for this command
        entry: StatusEntry,
    },

    /// The SAM answered with a status word that is not a success
    #[error("{command}: SAM status {status}: {}", .entry.message)]
    SamStatus {
        /// Command concerned
        command: CommandKind,
        /// Status word received
        status: StatusWord,
        /// Meaning of the status word for this command
        entry: StatusEntry,
    },

    /// The exchange with a device failed
    #[error("{target} transport fault after {} responses: {source}", .source.received())]
    Transport {
        /// Device concerned
        target: Target,
        /// Underlying fault, with the responses received before it
        #[source]
        source: TransportError,
    },

    /// The operation is not allowed in the current session state
    #[error("cannot {operation} while the session is {state}")]
    IllegalState {
        /// Operation attempted
        operation: &'static str,
        /// State at the time of the attempt
        state: SessionState,
    },

    /// A digest operation was attempted before Digest Init
    #[error("no session digest in progress")]
    NoDigest,

    /// The commands would exceed the card session buffer
    #[error("session buffer overflow: {required} needed, {available} available")]
    SessionBufferOverflow {
        /// Units needed by the commands
        required: usize,
        /// Units left in the session buffer
        available: usize,
    },

    /// Invalid configuration or argument
    #[error("invalid configuration: {0}")]
    Config(String),

    /// SAM resource pool misuse
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// APDU codec error
    #[error(transparent)]
    Apdu(#[from] calypso_apdu_core::Error),
}

impl Error {
    pub(crate) const fn decode(command: CommandKind, reason: &'static str, length: usize) -> Self {
        Self::Decode {
            command,
            reason,
            length,
        }
    }

    pub(crate) const fn po_transport(source: TransportError) -> Self {
        Self::Transport {
            target: Target::Po,
            source,
        }
    }

    pub(crate) const fn sam_transport(source: TransportError) -> Self {
        Self::Transport {
            target: Target::Sam,
            source,
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Anomaly kind for status word errors
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::CardStatus { entry, .. } | Self::SamStatus { entry, .. } => entry.kind,
            Self::SessionBufferOverflow { .. } => Some(ErrorKind::SessionBufferOverflow),
            _ => None,
        }
    }

    /// Whether the error leaves the devices in an unknown state
    ///
    /// Decode errors and transport faults are always fatal; status word
    /// anomalies follow the severity of their kind.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Decode { .. } | Self::Transport { .. } | Self::Apdu(_) => true,
            Self::CardStatus { entry, .. } | Self::SamStatus { entry, .. } => {
                entry.severity() != Some(Severity::Recoverable)
            }
            _ => false,
        }
    }

    /// Number of responses received before a transport fault
    pub fn responses_received(&self) -> Option<usize> {
        match self {
            Self::Transport { source, .. } => Some(source.received()),
            _ => None,
        }
    }
}
