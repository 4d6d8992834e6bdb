//! Calypso secure session engine
//!
//! Runs authenticated read/write sessions between a terminal, a Calypso card
//! (PO) and a SAM. Every card exchange made inside a session is fed to the
//! SAM session digest; the session only counts as successful when the SAM
//! verifies the signature the card returns at closing.
//!
//! ```no_run
//! use calypso::prelude::*;
//! # fn run<P: CardTransport, S: CardTransport>(po: P, sam: S) -> calypso::Result<()> {
//! let card = CalypsoPo::new(
//!     PoRevision::Rev3_1,
//!     vec![0x00, 0x00, 0x00, 0x00, 0x12, 0x34, 0x56, 0x78],
//!     SessionModifications::Bytes(215),
//! )?;
//! let mut transaction =
//!     PoTransaction::new(po, card, sam, SamRevision::C1, SecuritySettings::default());
//!
//! transaction.identify()?;
//! transaction.open_session(AccessLevel::Debit, 0x07, 1)?;
//! transaction.process_po_commands(vec![PoCommand::append_record(0x08, vec![0u8; 29])])?;
//! let outcome = transaction.close_session()?;
//! assert!(outcome.is_authenticated());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

pub mod commands;
pub mod config;
pub mod constants;
pub mod digest;
mod error;
pub mod po;
pub mod revision;
pub mod sam;
pub mod session;
pub mod status;
pub mod transaction;

pub use config::{DigestMode, RatificationMode, SecuritySettings, SecuritySettingsBuilder};
pub use digest::DigestAccumulator;
pub use error::{Error, Result, Target};
pub use po::{CalypsoPo, SessionModifications, TransmissionMode};
pub use revision::{PoRevision, SamRevision};
pub use sam::{AllocationMode, PoolError, SamFilter, SamIdentifier, SamResource, SamResourcePool};
pub use session::{AccessLevel, CloseSessionData, SecureSessionData, SessionOutcome, SessionState};
pub use status::{CommandKind, ErrorKind, Severity, StatusEntry};
pub use transaction::PoTransaction;

pub use calypso_apdu_core::{CardTransport, ReaderEvent, ReaderHandle, ResourceDirectory};

/// Everything needed to run a transaction
pub mod prelude {
    pub use crate::commands::{PoCommand, PoResponse, ReadMode, WorkKey};
    pub use crate::{
        AccessLevel, AllocationMode, CalypsoPo, CardTransport, Error, PoRevision, PoTransaction,
        Result, SamFilter, SamResourcePool, SamRevision, SecuritySettings, SessionModifications,
        SessionOutcome, SessionState, TransmissionMode,
    };
}
