//! APDU responses: a payload followed by a status word

pub mod status;
pub mod utils;

use bytes::Bytes;
use tracing::trace;

use crate::Error;
use status::StatusWord;

/// Common view of decoded responses
pub trait ApduResponse {
    /// Response data, empty when the card only returned a status word
    fn payload(&self) -> &Bytes;

    /// Status word
    fn status(&self) -> StatusWord;

    /// Whether the status word is 90 00
    fn is_success(&self) -> bool {
        self.status().is_success()
    }
}

/// A decoded response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Bytes,
    status: StatusWord,
}

impl Response {
    /// Response with payload and status
    pub fn new(payload: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload: payload.into(),
            status: status.into(),
        }
    }

    /// Successful response carrying `payload`
    pub const fn success(payload: Bytes) -> Self {
        Self {
            payload,
            status: status::common::SUCCESS,
        }
    }

    /// Response made of a status word only
    pub fn error(status: impl Into<StatusWord>) -> Self {
        Self::new(Bytes::new(), status)
    }

    /// Decode raw bytes, status word included
    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        let (status, payload) = utils::split_status(raw)?;
        trace!(%status, length = payload.len(), "Decoded response");
        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
            status,
        })
    }

    /// Length of the payload, status word excluded
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl ApduResponse for Response {
    fn payload(&self) -> &Bytes {
        &self.payload
    }

    fn status(&self) -> StatusWord {
        self.status
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(raw: &[u8]) -> Result<Self, Error> {
        Self::from_bytes(raw)
    }
}
