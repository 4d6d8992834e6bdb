//! Session digest accumulation
//!
//! Every card command exchanged inside a secure session, and every response,
//! is fed to the SAM so that it can compute the terminal half of the session
//! signature and verify the card half. The accumulator owns the ordered list
//! of exchanges since Digest Init and the SAM commands not sent yet.

use std::mem;

use bytes::Bytes;
use calypso_apdu_core::transport::check_response_count;
use calypso_apdu_core::{ApduCommand, ApduExchange, CardTransport, Response, ResultExt};
use tracing::{debug, trace, warn};

use crate::commands::{
    CalypsoCommand, DigestAuthenticate, DigestClose, DigestInit, DigestUpdate, WorkKey,
};
use crate::config::DigestMode;
use crate::error::{Error, Result};
use crate::revision::SamRevision;
use crate::status::{self, CommandKind};

/// Digest of one secure session
#[derive(Debug)]
pub struct DigestAccumulator {
    revision: SamRevision,
    mode: DigestMode,
    extended: bool,
    /// SAM commands built but not sent yet
    pending: Vec<(CommandKind, Bytes)>,
    /// Card exchanges since Digest Init
    exchanges: Vec<ApduExchange>,
    started: bool,
}

impl DigestAccumulator {
    /// Create an idle accumulator
    ///
    /// `extended` selects 8 byte signatures (revision 3.2 extended mode).
    pub const fn new(revision: SamRevision, mode: DigestMode, extended: bool) -> Self {
        Self {
            revision,
            mode,
            extended,
            pending: Vec::new(),
            exchanges: Vec::new(),
            started: false,
        }
    }

    /// Whether a digest is in progress
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Card exchanges fed to the digest so far
    pub fn exchanges(&self) -> &[ApduExchange] {
        &self.exchanges
    }

    /// Number of SAM commands waiting to be sent
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Start a digest seeded with the Open Secure Session response payload
    pub fn init<S: CardTransport>(&mut self, sam: &mut S, key: WorkKey, seed: &[u8]) -> Result<()> {
        if self.started {
            warn!("Discarding unfinished session digest");
        }
        self.discard();

        debug!(%key, "Initializing session digest");
        let command = DigestInit::new(self.revision, self.extended, key, seed)?;
        self.pending.push((DigestInit::KIND, command.to_bytes()));
        self.started = true;
        self.dispatch(sam)
    }

    /// Feed one card exchange: the request, then the response
    pub fn update<S: CardTransport>(&mut self, sam: &mut S, exchange: ApduExchange) -> Result<()> {
        if !self.started {
            return Err(Error::NoDigest);
        }

        trace!(%exchange, "Adding exchange to session digest");
        let request = DigestUpdate::new(self.revision, exchange.command().clone())?;
        let response = DigestUpdate::new(self.revision, exchange.response().clone())?;
        self.pending.push((DigestUpdate::KIND, request.to_bytes()));
        self.pending.push((DigestUpdate::KIND, response.to_bytes()));
        self.exchanges.push(exchange);
        self.dispatch(sam)
    }

    /// Finish the digest and return the terminal half signature
    ///
    /// Sends every pending command, Digest Close last.
    pub fn close<S: CardTransport>(&mut self, sam: &mut S) -> Result<Bytes> {
        if !self.started {
            return Err(Error::NoDigest);
        }

        let command = DigestClose::new(self.revision, self.extended);
        self.pending.push((DigestClose::KIND, command.to_bytes()));
        let last = self.flush(sam)?.ok_or(Error::NoDigest)?;
        let signature = command.parse_response(last)?;
        debug!(exchanges = self.exchanges.len(), "Session digest closed");
        Ok(signature)
    }

    /// Have the SAM verify the card half signature
    ///
    /// Returns `false` when the SAM rejects the signature. The digest is over
    /// either way.
    pub fn authenticate<S: CardTransport>(
        &mut self,
        sam: &mut S,
        signature_lo: Bytes,
    ) -> Result<bool> {
        self.started = false;
        let command = DigestAuthenticate::new(self.revision, signature_lo)?;
        let raw = sam.transmit_raw(&command.to_bytes()).map_err(Error::sam_transport)?;
        let authenticated = command.parse_response_raw(&raw)?;
        if authenticated {
            debug!("Card signature verified");
        } else {
            warn!("Card signature rejected by the SAM");
        }
        Ok(authenticated)
    }

    /// Drop the digest in progress without sending anything
    pub fn discard(&mut self) {
        self.pending.clear();
        self.exchanges.clear();
        self.started = false;
    }

    fn dispatch<S: CardTransport>(&mut self, sam: &mut S) -> Result<()> {
        match self.mode {
            DigestMode::Deferred => Ok(()),
            DigestMode::Immediate => self.flush(sam).map(|_| ()),
        }
    }

    /// Send the pending commands as one batch, returning the last response
    fn flush<S: CardTransport>(&mut self, sam: &mut S) -> Result<Option<Response>> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let pending = mem::take(&mut self.pending);
        let commands: Vec<Bytes> = pending.iter().map(|(_, command)| command.clone()).collect();
        debug!(count = commands.len(), "Sending digest commands");
        let responses = sam
            .transmit(&commands)
            .and_then(|responses| check_response_count(commands.len(), responses))
            .map_err(Error::sam_transport)?;

        let mut last = None;
        for ((kind, _), raw) in pending.iter().zip(responses) {
            let response = Response::from_bytes(&raw).context(kind.to_string())?;
            status::check(*kind, &response)?;
            last = Some(response);
        }
        Ok(last)
    }
}
