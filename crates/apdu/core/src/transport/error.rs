//! Error types specific to card transport

use bytes::Bytes;
use thiserror::Error;

/// Transport error type
///
/// Batch failures keep the responses that did arrive so callers can assess
/// what the card may already have executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection error
    #[error("Failed to connect to device")]
    Connection,

    /// Transmission error
    #[error("Failed to transmit data")]
    Transmission,

    /// Device error
    #[error("Device error")]
    Device,

    /// No card (or SAM) present in the reader
    #[error("No card present")]
    NoCard,

    /// Driver error (with code)
    #[error("Driver error code: {0}")]
    Driver(i32),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Cancelled operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The number of responses does not match the number of commands sent
    #[error(
        "Desynchronized exchange: {expected} commands sent, {} responses received",
        .partial.len()
    )]
    Desynchronized {
        /// Number of commands sent
        expected: usize,
        /// Responses actually received
        partial: Vec<Bytes>,
    },

    /// A fault occurred in the middle of a batch
    #[error(
        "Exchange interrupted after {} of {expected} responses: {source}",
        .partial.len()
    )]
    Interrupted {
        /// Number of commands in the batch
        expected: usize,
        /// Responses received before the fault
        partial: Vec<Bytes>,
        /// The fault itself
        source: Box<Self>,
    },

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a new driver error
    pub const fn driver(code: i32) -> Self {
        Self::Driver(code)
    }

    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }

    /// Responses received before the fault (empty for single-command faults)
    pub fn partial_responses(&self) -> &[Bytes] {
        match self {
            Self::Desynchronized { partial, .. } | Self::Interrupted { partial, .. } => partial,
            _ => &[],
        }
    }

    /// Number of responses actually received before the fault
    pub fn received(&self) -> usize {
        self.partial_responses().len()
    }

    /// Whether the card was lost (as opposed to a protocol level fault)
    pub fn is_card_lost(&self) -> bool {
        match self {
            Self::NoCard | Self::Connection => true,
            Self::Interrupted { source, .. } => source.is_card_lost(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_responses() {
        let err = TransportError::Interrupted {
            expected: 3,
            partial: vec![Bytes::from_static(&[0x90, 0x00])],
            source: Box::new(TransportError::NoCard),
        };
        assert_eq!(err.received(), 1);
        assert!(err.is_card_lost());
        assert_eq!(
            err.to_string(),
            "Exchange interrupted after 1 of 3 responses: No card present"
        );

        let err = TransportError::Desynchronized {
            expected: 2,
            partial: Vec::new(),
        };
        assert_eq!(err.received(), 0);
        assert!(!err.is_card_lost());
        assert_eq!(TransportError::Timeout.received(), 0);
    }
}
