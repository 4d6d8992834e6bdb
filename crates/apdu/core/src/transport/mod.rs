//! Transport traits for APDU communication with cards
//!
//! This module provides abstractions for communicating with smart cards and
//! SAMs through different transport mechanisms.

pub mod error;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, instrument, trace};

/// Trait for basic card transports
///
/// A transport is responsible for sending and receiving raw APDU bytes.
/// It has no knowledge of command structure, sessions, or protocol details.
pub trait CardTransport: Send + fmt::Debug {
    /// Send raw APDU bytes to card and return response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode_upper(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Send an ordered list of commands and return the ordered list of responses
    ///
    /// Fails with [`TransportError::Desynchronized`] when the number of responses
    /// differs from the number of commands, and with
    /// [`TransportError::Interrupted`] when a fault occurs mid-batch. Both carry
    /// the responses received so far.
    #[instrument(level = "trace", skip_all, fields(count = commands.len()))]
    fn transmit(&mut self, commands: &[Bytes]) -> Result<Vec<Bytes>, TransportError> {
        let responses = self.do_transmit(commands)?;
        check_response_count(commands.len(), responses)
    }

    /// Internal implementation of transmit
    ///
    /// The default sends commands one at a time. Transports able to batch
    /// natively may override it.
    fn do_transmit(&mut self, commands: &[Bytes]) -> Result<Vec<Bytes>, TransportError> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            match self.transmit_raw(command) {
                Ok(response) => responses.push(response),
                Err(source) => {
                    return Err(TransportError::Interrupted {
                        expected: commands.len(),
                        partial: responses,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(responses)
    }

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool;

    /// Reset the transport connection
    fn reset(&mut self) -> Result<(), TransportError>;
}

/// Check that a batch got exactly one response per command
///
/// Callers indexing into a batch result use this rather than trusting the
/// transport, since `transmit` may be overridden.
pub fn check_response_count(
    expected: usize,
    responses: Vec<Bytes>,
) -> Result<Vec<Bytes>, TransportError> {
    if responses.len() != expected {
        debug!(expected, received = responses.len(), "Desynchronized exchange");
        return Err(TransportError::Desynchronized {
            expected,
            partial: responses,
        });
    }
    Ok(responses)
}

impl<T: CardTransport + ?Sized> CardTransport for &mut T {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn transmit(&mut self, commands: &[Bytes]) -> Result<Vec<Bytes>, TransportError> {
        (**self).transmit(commands)
    }

    fn do_transmit(&mut self, commands: &[Bytes]) -> Result<Vec<Bytes>, TransportError> {
        (**self).do_transmit(commands)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }
}

#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmit_batch() {
        let mut transport = MockTransport::new(vec![
            Bytes::from_static(&[0x01, 0x90, 0x00]),
            Bytes::from_static(&[0x6A, 0x82]),
        ]);

        let commands = vec![
            Bytes::from_static(&[0x00, 0xB2, 0x01, 0x0C, 0x00]),
            Bytes::from_static(&[0x00, 0xB2, 0x02, 0x0C, 0x00]),
        ];
        let responses = transport.transmit(&commands).unwrap();

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1].as_ref(), &[0x6A, 0x82]);
        assert_eq!(transport.commands(), commands.as_slice());
    }

    #[test]
    fn test_transmit_batch_interrupted() {
        let mut transport = MockTransport::new(vec![Bytes::from_static(&[0x90, 0x00])]);

        let commands = vec![
            Bytes::from_static(&[0x80, 0x8C, 0x00, 0x00, 0x01, 0xAA]),
            Bytes::from_static(&[0x80, 0x8C, 0x00, 0x00, 0x01, 0xBB]),
        ];
        let err = transport.transmit(&commands).unwrap_err();

        assert!(matches!(err, TransportError::Interrupted { expected: 2, .. }));
        assert_eq!(err.received(), 1);
    }

    /// Drops the last response of every batch
    #[derive(Debug)]
    struct LossyTransport(MockTransport);

    impl CardTransport for LossyTransport {
        fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
            self.0.do_transmit_raw(command)
        }

        fn do_transmit(&mut self, commands: &[Bytes]) -> Result<Vec<Bytes>, TransportError> {
            let mut responses = self.0.do_transmit(commands)?;
            responses.pop();
            Ok(responses)
        }

        fn is_connected(&self) -> bool {
            self.0.is_connected()
        }

        fn reset(&mut self) -> Result<(), TransportError> {
            self.0.reset()
        }
    }

    #[test]
    fn test_transmit_batch_desynchronized() {
        let mut transport = LossyTransport(MockTransport::from_hex(["9000", "9000", "9000"]));

        let commands = vec![
            Bytes::from_static(&[0x80, 0x14, 0x00, 0x00]),
            Bytes::from_static(&[0x80, 0x84, 0x00, 0x00, 0x04]),
            Bytes::from_static(&[0x80, 0x8A, 0x00, 0xFF]),
        ];
        let err = transport.transmit(&commands).unwrap_err();

        match &err {
            TransportError::Desynchronized { expected, partial } => {
                assert_eq!(*expected, 3);
                assert_eq!(partial.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.received(), 2);
        assert!(!err.is_card_lost());
    }

    #[test]
    fn test_check_response_count() {
        let responses = vec![Bytes::from_static(&[0x90, 0x00])];
        assert_eq!(check_response_count(1, responses.clone()).unwrap(), responses);
        assert_eq!(check_response_count(2, responses).unwrap_err().received(), 1);
        assert!(check_response_count(0, Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_transmit_through_mut_ref() {
        fn get_challenge<T: CardTransport>(mut transport: T) -> Result<Bytes, TransportError> {
            transport.transmit_raw(&[0x00, 0x84, 0x00, 0x00, 0x04])
        }

        let mut transport = MockTransport::with_success();
        assert!(get_challenge(&mut transport).is_ok());
        assert_eq!(transport.commands().len(), 1);
    }
}
