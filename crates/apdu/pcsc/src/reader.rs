//! Reader handles for PC/SC devices

use std::ffi::CString;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use calypso_apdu_core::{Bytes, CardTransport, ReaderHandle, TransportError};
use parking_lot::Mutex;
use pcsc::{Card, Context, Disposition, MAX_BUFFER_SIZE, ReaderState, State};
use tracing::{debug, warn};

use crate::config::PcscConfig;
use crate::error::transport_error;

/// Handle to one PC/SC reader
///
/// Clones share the card connection and the lock serializing transmission
/// and presence checks, so a SAM can be polled from one thread while another
/// is exchanging APDUs with it.
#[derive(Clone)]
pub struct PcscReader {
    inner: Arc<ReaderInner>,
}

struct ReaderInner {
    /// Reader name as known to the PC/SC service
    name: CString,
    /// Lossy UTF-8 rendition of the name
    display_name: String,
    context: Context,
    config: PcscConfig,
    /// Card connection, established on first use
    card: Mutex<Option<Card>>,
}

impl PcscReader {
    pub(crate) fn new(context: Context, name: CString, config: PcscConfig) -> Self {
        let display_name = name.to_string_lossy().into_owned();
        Self {
            inner: Arc::new(ReaderInner {
                name,
                display_name,
                context,
                config,
                card: Mutex::new(None),
            }),
        }
    }

    /// Answer To Reset of the card in the reader, if any
    pub fn atr(&self) -> Option<Vec<u8>> {
        let _guard = self.inner.card.lock();
        let state = self.read_state()?;
        is_present(&state).then(|| state.atr().to_vec())
    }

    /// Query the reader state without waiting
    ///
    /// Callers must hold the card lock.
    fn read_state(&self) -> Option<ReaderState> {
        let mut states = [ReaderState::new(self.inner.name.clone(), State::UNAWARE)];
        match self
            .inner
            .context
            .get_status_change(Duration::ZERO, &mut states)
        {
            Ok(()) => {
                let [state] = states;
                Some(state)
            }
            Err(e) => {
                debug!(reader = %self.inner.display_name, error = %e, "Reader status unavailable");
                None
            }
        }
    }

    fn connect(&self) -> Result<Card, TransportError> {
        debug!(reader = %self.inner.display_name, "Connecting to card");
        self.inner
            .context
            .connect(
                &self.inner.name,
                self.inner.config.share_mode.into(),
                self.inner.config.protocols,
            )
            .map_err(transport_error)
    }
}

fn is_present(state: &ReaderState) -> bool {
    let event = state.event_state();
    event.contains(State::PRESENT) && !event.contains(State::EMPTY)
}

impl CardTransport for PcscReader {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        let mut slot = self.inner.card.lock();
        if slot.is_none() {
            *slot = Some(self.connect()?);
        }
        let Some(card) = slot.as_mut() else {
            return Err(TransportError::Connection);
        };

        let mut buffer = [0u8; MAX_BUFFER_SIZE];
        match card.transmit(command, &mut buffer) {
            Ok(response) => Ok(Bytes::copy_from_slice(response)),
            Err(pcsc::Error::ResetCard) if self.inner.config.auto_reconnect => {
                // The command was not executed; reconnect for the next exchange only.
                warn!(reader = %self.inner.display_name, "Card was reset, reconnecting");
                card.reconnect(
                    self.inner.config.share_mode.into(),
                    self.inner.config.protocols,
                    Disposition::LeaveCard,
                )
                .map_err(transport_error)?;
                Err(TransportError::Transmission)
            }
            Err(e) => {
                let error = transport_error(e);
                if error.is_card_lost() {
                    *slot = None;
                }
                Err(error)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.card.lock().is_some()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        let mut slot = self.inner.card.lock();
        match slot.as_mut() {
            Some(card) => card
                .reconnect(
                    self.inner.config.share_mode.into(),
                    self.inner.config.protocols,
                    Disposition::ResetCard,
                )
                .map_err(transport_error),
            None => {
                *slot = Some(self.connect()?);
                Ok(())
            }
        }
    }
}

impl ReaderHandle for PcscReader {
    fn name(&self) -> &str {
        &self.inner.display_name
    }

    fn is_card_present(&self) -> bool {
        let _guard = self.inner.card.lock();
        self.read_state().is_some_and(|state| is_present(&state))
    }
}

impl PartialEq for PcscReader {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
    }
}

impl Eq for PcscReader {}

impl Hash for PcscReader {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.name.hash(state);
    }
}

impl fmt::Debug for PcscReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscReader")
            .field("name", &self.inner.display_name)
            .finish_non_exhaustive()
    }
}
