use bytes::Bytes;

use crate::constants::KIF_UNDEFINED;

/// Data returned by the card when a secure session opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureSessionData {
    pub(super) card_challenge: Bytes,
    pub(super) transaction_counter: u32,
    pub(super) previous_session_ratified: bool,
    pub(super) session_management_authorized: bool,
    pub(super) kif: u8,
    pub(super) kvc: Option<u8>,
    pub(super) record_data: Bytes,
    pub(super) raw_payload: Bytes,
}

impl SecureSessionData {
    /// Card challenge (1 byte, or 5 in extended mode)
    pub const fn card_challenge(&self) -> &Bytes {
        &self.card_challenge
    }

    /// Transaction counter, 3 bytes big endian
    pub const fn transaction_counter(&self) -> u32 {
        self.transaction_counter
    }

    /// Whether the previous session was ratified
    pub const fn previous_session_ratified(&self) -> bool {
        self.previous_session_ratified
    }

    /// Whether the card authorizes session management
    pub const fn session_management_authorized(&self) -> bool {
        self.session_management_authorized
    }

    /// Key identifier, `0xFF` when the card did not send one
    pub const fn kif(&self) -> u8 {
        self.kif
    }

    /// Whether the card sent a key identifier
    pub const fn has_kif(&self) -> bool {
        self.kif != KIF_UNDEFINED
    }

    /// Key version, when the card sent one
    pub const fn kvc(&self) -> Option<u8> {
        self.kvc
    }

    /// Content of the record read at opening (possibly empty)
    pub const fn record_data(&self) -> &Bytes {
        &self.record_data
    }

    /// The complete response payload, used to seed the session digest
    pub const fn raw_payload(&self) -> &Bytes {
        &self.raw_payload
    }
}

/// Data returned by the card when a secure session closes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseSessionData {
    pub(super) signature_lo: Bytes,
    pub(super) postponed_data: Bytes,
}

impl CloseSessionData {
    /// Card half of the session signature (empty for an aborted session)
    pub const fn signature_lo(&self) -> &Bytes {
        &self.signature_lo
    }

    /// Postponed data (0 to 3 bytes)
    pub const fn postponed_data(&self) -> &Bytes {
        &self.postponed_data
    }

    /// Whether the card reported an aborted session
    pub fn is_abort(&self) -> bool {
        self.signature_lo.is_empty()
    }
}
