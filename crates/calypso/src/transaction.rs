//! Secure transaction between a card and a SAM
//!
//! A [`PoTransaction`] owns one card transport and one SAM transport and
//! drives them through the session states:
//!
//! ```text
//! NotIdentified --identify--> Identified --open_session--> Open --close_session--> Closed
//!                                                           |  ^
//!                                                           +--+ process_po_commands
//! ```
//!
//! Any decode error, status word anomaly or transport fault moves the
//! transaction to `Closed` and marks it failed. Nothing is retried.

use bytes::Bytes;
use calypso_apdu_core::transport::check_response_count;
use calypso_apdu_core::{
    ApduCommand, ApduExchange, ApduResponse, CardTransport, Response, ResultExt, TransportError,
};
use tracing::{debug, info, instrument, warn};

use crate::commands::po_command::PreparedCommand;
use crate::commands::{
    CloseSession, GetChallenge, OpenSession, PoCommand, PoResponse, Ratification,
    SelectDiversifier,
};
use crate::config::{RatificationMode, SecuritySettings};
use crate::digest::DigestAccumulator;
use crate::error::{Error, Result};
use crate::po::{CalypsoPo, TransmissionMode};
use crate::revision::{PoRevision, SamRevision};
use crate::session::{AccessLevel, CloseSessionData, SecureSessionData, SessionOutcome, SessionState};

/// A secure transaction with one card
#[derive(Debug)]
pub struct PoTransaction<P: CardTransport, S: CardTransport> {
    po_transport: P,
    sam_transport: S,
    po: CalypsoPo,
    sam_revision: SamRevision,
    settings: SecuritySettings,
    state: SessionState,
    failed: bool,
    terminal_challenge: Option<Bytes>,
    session: Option<SecureSessionData>,
    close_data: Option<CloseSessionData>,
    digest: DigestAccumulator,
    /// Session buffer units consumed in the current session
    modifications_used: usize,
}

impl<P: CardTransport, S: CardTransport> PoTransaction<P, S> {
    /// Create a transaction for a selected card and a SAM
    pub fn new(
        po_transport: P,
        po: CalypsoPo,
        sam_transport: S,
        sam_revision: SamRevision,
        settings: SecuritySettings,
    ) -> Self {
        let extended = po.revision() == PoRevision::Rev3_2 && settings.extended_mode();
        let digest = DigestAccumulator::new(sam_revision, settings.digest_mode(), extended);
        Self {
            po_transport,
            sam_transport,
            po,
            sam_revision,
            settings,
            state: SessionState::NotIdentified,
            failed: false,
            terminal_challenge: None,
            session: None,
            close_data: None,
            digest,
            modifications_used: 0,
        }
    }

    /// Current state
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the transaction was aborted
    pub const fn is_failed(&self) -> bool {
        self.failed
    }

    /// The card of this transaction
    pub const fn po(&self) -> &CalypsoPo {
        &self.po
    }

    /// Data returned by the card at opening
    pub const fn session_data(&self) -> Option<&SecureSessionData> {
        self.session.as_ref()
    }

    /// Data returned by the card at closing
    pub const fn close_data(&self) -> Option<&CloseSessionData> {
        self.close_data.as_ref()
    }

    /// Card exchanges fed to the session digest so far
    pub fn exchanges(&self) -> &[ApduExchange] {
        self.digest.exchanges()
    }

    /// Session buffer units still available in the open session
    pub const fn modifications_available(&self) -> usize {
        self.po
            .modifications()
            .capacity()
            .saturating_sub(self.modifications_used)
    }

    /// Give the transports back
    pub fn into_transports(self) -> (P, S) {
        (self.po_transport, self.sam_transport)
    }

    /// Whether the session runs in revision 3.2 extended mode
    fn extended(&self) -> bool {
        self.po.revision() == PoRevision::Rev3_2 && self.settings.extended_mode()
    }

    /// Layout of the Open Secure Session exchange
    fn layout(&self) -> PoRevision {
        match self.po.revision() {
            PoRevision::Rev3_2 if !self.extended() => PoRevision::Rev3_1,
            revision => revision,
        }
    }

    fn expect_state(&self, expected: SessionState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(Error::IllegalState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(next >= self.state, "session states only move forward");
        debug!(from = %self.state, to = %next, "Session state change");
        self.state = next;
    }

    /// Abort on error: the transaction ends closed and failed
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            warn!(%error, state = %self.state, "Transaction aborted");
            self.digest.discard();
            self.failed = true;
            self.advance(SessionState::Closed);
        }
        result
    }

    /// Prepare the SAM: select the card diversifier and get the terminal
    /// challenge
    #[instrument(level = "debug", skip(self), fields(serial = %hex::encode_upper(self.po.serial_number())))]
    pub fn identify(&mut self) -> Result<()> {
        self.expect_state(SessionState::NotIdentified, "identify the card")?;
        let result = self.exchange_identify();
        self.guard(result)?;
        self.advance(SessionState::Identified);
        Ok(())
    }

    fn exchange_identify(&mut self) -> Result<()> {
        let diversifier = SelectDiversifier::new(self.sam_revision, self.po.serial_number().clone())?;
        let challenge = GetChallenge::new(self.sam_revision, self.extended());

        let responses = self
            .sam_transport
            .transmit(&[diversifier.to_bytes(), challenge.to_bytes()])
            .map_err(Error::sam_transport)?;
        let [diversifier_response, challenge_response] = <[Bytes; 2]>::try_from(responses)
            .map_err(|partial| {
                Error::sam_transport(TransportError::Desynchronized {
                    expected: 2,
                    partial,
                })
            })?;
        diversifier.parse_response_raw(&diversifier_response)?;
        let challenge = challenge.parse_response_raw(&challenge_response)?;

        debug!(challenge = %hex::encode_upper(&challenge), "Terminal challenge received");
        self.terminal_challenge = Some(challenge);
        Ok(())
    }

    /// Open a secure session, reading `record` of `sfi` at the same time
    /// (record 0 reads nothing)
    #[instrument(level = "debug", skip(self))]
    pub fn open_session(
        &mut self,
        access_level: AccessLevel,
        sfi: u8,
        record: u8,
    ) -> Result<SecureSessionData> {
        self.expect_state(SessionState::Identified, "open a session")?;
        let challenge = self.terminal_challenge.clone().ok_or(Error::IllegalState {
            operation: "open a session",
            state: self.state,
        })?;
        let command = OpenSession::new(self.layout(), access_level, sfi, record, &challenge)?;

        let result = self.exchange_open(&command, access_level);
        let data = self.guard(result)?;
        self.modifications_used = 0;
        self.session = Some(data.clone());
        self.advance(SessionState::Open);
        info!(
            counter = data.transaction_counter(),
            ratified = data.previous_session_ratified(),
            "Secure session opened"
        );
        Ok(data)
    }

    fn exchange_open(
        &mut self,
        command: &OpenSession,
        access_level: AccessLevel,
    ) -> Result<SecureSessionData> {
        let raw = self
            .po_transport
            .transmit_raw(&command.to_bytes())
            .map_err(Error::po_transport)?;
        let data = command.parse_response_raw(&raw)?;

        let key = self.settings.work_key(access_level, data.kif(), data.kvc());
        self.digest
            .init(&mut self.sam_transport, key, data.raw_payload())?;
        Ok(data)
    }

    /// Send card commands
    ///
    /// Inside a session every exchange is added to the session digest, and
    /// modifications are checked against the card session buffer before
    /// anything is sent. Outside a session the commands are sent as is.
    #[instrument(level = "debug", skip_all, fields(count = commands.len()))]
    pub fn process_po_commands(&mut self, commands: Vec<PoCommand>) -> Result<Vec<PoResponse>> {
        if self.state == SessionState::Closed {
            return Err(Error::IllegalState {
                operation: "process card commands",
                state: self.state,
            });
        }

        let prepared = commands
            .iter()
            .map(|command| command.prepare(self.po.revision()))
            .collect::<Result<Vec<_>>>()?;

        if self.state == SessionState::Open {
            let modifications = self.po.modifications();
            let required: usize = commands
                .iter()
                .map(|command| command.session_cost(modifications))
                .sum();
            let available = self.modifications_available();
            if required > available {
                warn!(required, available, "Session buffer overflow");
                return Err(Error::SessionBufferOverflow {
                    required,
                    available,
                });
            }
            self.modifications_used += required;
        }

        let result = self.exchange_po_commands(&prepared);
        self.guard(result)
    }

    fn exchange_po_commands(&mut self, prepared: &[PreparedCommand]) -> Result<Vec<PoResponse>> {
        if prepared.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<Bytes> = prepared.iter().map(PreparedCommand::to_bytes).collect();
        let raw_responses = self
            .po_transport
            .transmit(&requests)
            .and_then(|responses| check_response_count(requests.len(), responses))
            .map_err(Error::po_transport)?;

        let in_session = self.state == SessionState::Open;
        let mut responses = Vec::with_capacity(prepared.len());
        for ((command, request), raw) in prepared.iter().zip(requests).zip(raw_responses) {
            let response = Response::from_bytes(&raw).context(command.kind().to_string())?;
            if in_session {
                self.digest
                    .update(&mut self.sam_transport, ApduExchange::new(request, raw))?;
            }
            debug!(command = %command.kind(), status = %response.status(), "Card command processed");
            responses.push(command.parse_response(response)?);
        }
        Ok(responses)
    }

    /// Close the session and have the SAM verify the card signature
    ///
    /// The transaction succeeds exactly when the SAM accepts the card
    /// signature; a rejected signature is reported as
    /// [`SessionOutcome::Unauthenticated`], not as an error.
    #[instrument(level = "debug", skip(self))]
    pub fn close_session(&mut self) -> Result<SessionOutcome> {
        self.expect_state(SessionState::Open, "close the session")?;
        let result = self.exchange_close();
        let outcome = self.guard(result)?;
        self.advance(SessionState::Closed);
        info!(%outcome, "Secure session closed");
        Ok(outcome)
    }

    fn exchange_close(&mut self) -> Result<SessionOutcome> {
        let signature_hi = self.digest.close(&mut self.sam_transport)?;

        let ratify = self.settings.ratification_mode() == RatificationMode::CloseRatified;
        let command = CloseSession::new(self.po.revision(), ratify, signature_hi)?;
        let raw = self
            .po_transport
            .transmit_raw(&command.to_bytes())
            .map_err(Error::po_transport)?;
        let close_data = command.parse_response_raw(&raw)?;

        if !ratify && self.po.transmission_mode() == TransmissionMode::Contactless {
            self.ratify();
        }

        let signature_lo = close_data.signature_lo().clone();
        self.close_data = Some(close_data);
        let authenticated = self
            .digest
            .authenticate(&mut self.sam_transport, signature_lo)?;
        Ok(if authenticated {
            SessionOutcome::Authenticated
        } else {
            SessionOutcome::Unauthenticated
        })
    }

    /// Send the ratification command
    ///
    /// The card may already be gone: the session is closed regardless, only
    /// unratified, so failures are logged and ignored.
    fn ratify(&mut self) {
        let command = Ratification::new(self.po.revision());
        match self.po_transport.transmit_raw(&command.to_bytes()) {
            Ok(raw) => {
                if let Err(error) = command.parse_response_raw(&raw) {
                    debug!(%error, "Ratification response ignored");
                }
            }
            Err(error) => debug!(%error, "Ratification not delivered"),
        }
    }

    /// Abort the open session: the card cancels every modification made in it
    ///
    /// The transaction ends closed and failed.
    #[instrument(level = "debug", skip(self))]
    pub fn abort_session(&mut self) -> Result<()> {
        self.expect_state(SessionState::Open, "abort the session")?;
        let command = CloseSession::abort(self.po.revision());
        let result = self
            .po_transport
            .transmit_raw(&command.to_bytes())
            .map_err(Error::po_transport)
            .and_then(|raw| command.parse_response_raw(&raw));
        let close_data = self.guard(result)?;

        self.close_data = Some(close_data);
        self.digest.discard();
        self.failed = true;
        self.advance(SessionState::Closed);
        info!("Secure session aborted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::po::SessionModifications;
    use calypso_apdu_core::transport::MockTransport;

    fn transaction(
        revision: PoRevision,
        po: MockTransport,
        sam: MockTransport,
    ) -> PoTransaction<MockTransport, MockTransport> {
        let po_info =
            CalypsoPo::new(revision, vec![0x11; 8], SessionModifications::Bytes(215)).unwrap();
        PoTransaction::new(po, po_info, sam, SamRevision::C1, SecuritySettings::default())
    }

    #[test]
    fn test_illegal_state_does_not_abort() {
        let mut tx = transaction(
            PoRevision::Rev3_1,
            MockTransport::default(),
            MockTransport::default(),
        );
        assert!(matches!(
            tx.close_session(),
            Err(Error::IllegalState {
                state: SessionState::NotIdentified,
                ..
            })
        ));
        assert!(matches!(
            tx.open_session(AccessLevel::Debit, 0x07, 1),
            Err(Error::IllegalState { .. })
        ));
        assert_eq!(tx.state(), SessionState::NotIdentified);
        assert!(!tx.is_failed());
    }

    #[test]
    fn test_identify_failure_aborts() {
        let sam = MockTransport::from_hex(["9000", "6B00"]);
        let mut tx = transaction(PoRevision::Rev3_1, MockTransport::default(), sam);

        let err = tx.identify().unwrap_err();
        assert!(matches!(err, Error::SamStatus { .. }));
        assert_eq!(tx.state(), SessionState::Closed);
        assert!(tx.is_failed());
        assert!(matches!(
            tx.identify(),
            Err(Error::IllegalState {
                state: SessionState::Closed,
                ..
            })
        ));
    }

    #[test]
    fn test_extended_mode_selection() {
        let sam = MockTransport::from_hex(["9000", "C1C2C3C4C5C6C7C8 9000"]);
        let mut tx = transaction(PoRevision::Rev3_2, MockTransport::default(), sam);
        tx.identify().unwrap();
        assert!(tx.extended());
        assert_eq!(tx.layout(), PoRevision::Rev3_2);

        let (_, sam) = tx.into_transports();
        assert_eq!(sam.commands()[1].as_ref(), &[0x80, 0x84, 0x00, 0x00, 0x08]);
    }

    #[test]
    fn test_reads_outside_session_skip_digest() {
        let po = MockTransport::from_hex(["AABB 9000"]);
        let mut tx = transaction(PoRevision::Rev3_1, po, MockTransport::default());

        let responses = tx
            .process_po_commands(vec![PoCommand::read_record(0x07, 1)])
            .unwrap();
        assert_eq!(responses[0].records().unwrap()[&1].as_ref(), &[0xAA, 0xBB]);
        assert!(tx.exchanges().is_empty());
        assert_eq!(tx.state(), SessionState::NotIdentified);
    }
}
