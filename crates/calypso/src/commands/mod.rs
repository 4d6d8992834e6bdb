//! Commands sent to the card and to the SAM
//!
//! Each command builds its APDU for a given revision and decodes its response
//! after checking the status word against the command's status table.

use calypso_apdu_core::ApduCommand;

use crate::error::Error;
use crate::status::CommandKind;

pub mod append_record;
pub use append_record::*;
pub mod close_session;
pub use close_session::*;
pub mod digest_authenticate;
pub use digest_authenticate::*;
pub mod digest_close;
pub use digest_close::*;
pub mod digest_init;
pub use digest_init::*;
pub mod digest_update;
pub use digest_update::*;
pub mod get_challenge;
pub use get_challenge::*;
pub mod open_session;
pub use open_session::*;
pub mod po_command;
pub use po_command::*;
pub mod ratification;
pub use ratification::*;
pub mod read_records;
pub use read_records::*;
pub mod select_diversifier;
pub use select_diversifier::*;
pub mod update_record;
pub use update_record::*;

/// A command of the Calypso command set
pub trait CalypsoCommand: ApduCommand<Error = Error> {
    /// Kind of the command, selecting its status table
    const KIND: CommandKind;
}

/// Largest SFI value
pub(crate) const MAX_SFI: u8 = 0x1E;

/// Largest record number addressable in P1
pub(crate) const MAX_RECORD_NUMBER: u8 = 0xFA;

pub(crate) fn check_sfi(sfi: u8) -> Result<u8, Error> {
    if sfi > MAX_SFI {
        return Err(Error::config(format!("SFI out of range: {sfi:#04X}")));
    }
    Ok(sfi)
}

pub(crate) fn check_record_number(record: u8) -> Result<u8, Error> {
    if record == 0 || record > MAX_RECORD_NUMBER {
        return Err(Error::config(format!("record number out of range: {record}")));
    }
    Ok(record)
}
