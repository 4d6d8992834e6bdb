//! Error types for the PC/SC crate

use calypso_apdu_core::TransportError;
use thiserror::Error;

/// Errors raised by PC/SC readers and the directory
#[derive(Debug, Error)]
pub enum PcscError {
    /// Error reported by the PC/SC service
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// The requested reader is not connected
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// No card in the reader
    #[error("No card present in reader {0}")]
    NoCard(String),

    /// The reader monitor thread could not be started
    #[error("Failed to spawn reader monitor: {0}")]
    Monitor(#[from] std::io::Error),
}

impl From<PcscError> for TransportError {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::Pcsc(e) => transport_error(e),
            PcscError::ReaderNotFound(_) => Self::Connection,
            PcscError::NoCard(_) => Self::NoCard,
            PcscError::Monitor(e) => Self::Other(e.to_string()),
        }
    }
}

/// Map a PC/SC service error onto a transport fault
pub(crate) fn transport_error(error: pcsc::Error) -> TransportError {
    match error {
        pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard => TransportError::NoCard,
        pcsc::Error::UnknownReader
        | pcsc::Error::ReaderUnavailable
        | pcsc::Error::NoReadersAvailable => TransportError::Connection,
        pcsc::Error::Timeout => TransportError::Timeout,
        pcsc::Error::Cancelled => TransportError::Cancelled,
        pcsc::Error::UnpoweredCard | pcsc::Error::UnresponsiveCard => TransportError::Device,
        other => TransportError::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_mapping() {
        assert_eq!(
            TransportError::from(PcscError::Pcsc(pcsc::Error::RemovedCard)),
            TransportError::NoCard
        );
        assert_eq!(
            TransportError::from(PcscError::ReaderNotFound("SAM reader".into())),
            TransportError::Connection
        );
        assert!(TransportError::from(PcscError::Pcsc(pcsc::Error::NoSmartcard)).is_card_lost());
        assert_eq!(
            TransportError::from(PcscError::Pcsc(pcsc::Error::Timeout)),
            TransportError::Timeout
        );
    }
}
