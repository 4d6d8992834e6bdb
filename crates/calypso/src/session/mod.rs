//! Secure session data and its codec

mod data;
mod parser;

use derive_more::Display;

pub use data::{CloseSessionData, SecureSessionData};
pub use parser::{parse_close_session, parse_open_session};

/// Progress of a secure transaction
///
/// States are ordered and a transaction only ever moves forward.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    /// The SAM has not been prepared for this card yet
    #[display("not identified")]
    NotIdentified,
    /// The SAM holds the card diversifier and the terminal challenge
    #[display("identified")]
    Identified,
    /// A secure session is open on the card
    #[display("open")]
    Open,
    /// The session ended, normally or not
    #[display("closed")]
    Closed,
}

/// Access level of a session, selecting the key used to open it
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessLevel {
    /// Personalization key
    #[display("personalization")]
    Personalization,
    /// Load key
    #[display("load")]
    Load,
    /// Debit key
    #[display("debit")]
    Debit,
}

impl AccessLevel {
    /// Key index sent in Open Secure Session
    pub const fn key_index(self) -> u8 {
        match self {
            Self::Personalization => 0x01,
            Self::Load => 0x02,
            Self::Debit => 0x03,
        }
    }
}

/// How a session ended
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The SAM verified the card signature
    #[display("authenticated")]
    Authenticated,
    /// The exchange completed but the SAM rejected the card signature
    #[display("unauthenticated")]
    Unauthenticated,
}

impl SessionOutcome {
    /// Whether the transaction succeeded
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        assert!(SessionState::NotIdentified < SessionState::Identified);
        assert!(SessionState::Identified < SessionState::Open);
        assert!(SessionState::Open < SessionState::Closed);
    }

    #[test]
    fn test_key_index() {
        assert_eq!(AccessLevel::Personalization.key_index(), 1);
        assert_eq!(AccessLevel::Load.key_index(), 2);
        assert_eq!(AccessLevel::Debit.key_index(), 3);
    }
}
