//! Command/response pairs as exchanged on the wire

use std::fmt;

use bytes::Bytes;

use crate::{Error, Response};

/// One command and the response it produced, both as raw bytes
///
/// The response keeps its trailing status word: this is the form in which
/// exchanges are fed to a session digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduExchange {
    command: Bytes,
    response: Bytes,
}

impl ApduExchange {
    /// Pair a command with its response
    pub const fn new(command: Bytes, response: Bytes) -> Self {
        Self { command, response }
    }

    /// Raw command bytes
    pub const fn command(&self) -> &Bytes {
        &self.command
    }

    /// Raw response bytes, status word included
    pub const fn response(&self) -> &Bytes {
        &self.response
    }

    /// Decode the response into payload and status word
    pub fn decode(&self) -> Result<Response, Error> {
        Response::from_bytes(&self.response)
    }

    /// Split into (command, response)
    pub fn into_parts(self) -> (Bytes, Bytes) {
        (self.command, self.response)
    }
}

impl fmt::Display for ApduExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            hex::encode_upper(&self.command),
            hex::encode_upper(&self.response)
        )
    }
}
