//! Scripted transport used by test suites

use std::collections::VecDeque;

use bytes::Bytes;

use super::{CardTransport, TransportError};

/// Transport replaying scripted responses and recording the commands it receives
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    /// Responses still to be returned, in order
    responses: VecDeque<Bytes>,
    /// Commands that were sent
    commands: Vec<Bytes>,
    /// Fault returned once the scripted responses run out
    exhausted: Option<TransportError>,
    /// Whether the transport is connected
    connected: bool,
}

impl MockTransport {
    /// Create a new mock transport with the given responses
    pub fn new(responses: Vec<Bytes>) -> Self {
        Self {
            responses: responses.into(),
            commands: Vec::new(),
            exhausted: None,
            connected: true,
        }
    }

    /// Create a new mock transport from hex encoded responses
    pub fn from_hex<'a>(responses: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            responses
                .into_iter()
                .map(|r| Bytes::from(hex::decode(r.replace(' ', "")).unwrap_or_default()))
                .collect(),
        )
    }

    /// Create a new mock transport that returns a single success (90 00)
    pub fn with_success() -> Self {
        Self::new(vec![Bytes::from_static(&[0x90, 0x00])])
    }

    /// Append a response to the script
    pub fn push_response(&mut self, response: impl Into<Bytes>) -> &mut Self {
        self.responses.push_back(response.into());
        self
    }

    /// Return this fault when the script runs out instead of `Transmission`
    pub fn fail_with(mut self, error: TransportError) -> Self {
        self.exhausted = Some(error);
        self
    }

    /// Mark the transport as disconnected
    pub const fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Commands received so far
    pub fn commands(&self) -> &[Bytes] {
        &self.commands
    }

    /// Instruction bytes of the commands received so far
    pub fn instructions(&self) -> Vec<u8> {
        self.commands
            .iter()
            .filter_map(|c| c.get(1).copied())
            .collect()
    }

    /// Responses not consumed yet
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl CardTransport for MockTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::Connection);
        }

        self.commands.push(Bytes::copy_from_slice(command));

        self.responses.pop_front().ok_or_else(|| {
            self.exhausted
                .clone()
                .unwrap_or(TransportError::Transmission)
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        self.commands.clear();
        Ok(())
    }
}
