//! Instruction codes and class bytes

/// Class byte of Calypso revision 1 and 2 cards
pub const CLA_PO_LEGACY: u8 = 0x94;
/// Class byte of Calypso revision 3 cards (ISO)
pub const CLA_PO_ISO: u8 = 0x00;
/// Class byte of C1 and S1E SAMs
pub const CLA_SAM: u8 = 0x80;
/// Class byte of S1D SAMs
pub const CLA_SAM_LEGACY: u8 = 0x94;

/// Instruction codes sent to the card
pub mod ins {
    /// Open Secure Session
    pub const OPEN_SESSION: u8 = 0x8A;
    /// Close Secure Session
    pub const CLOSE_SESSION: u8 = 0x8E;
    /// Read Records (also used for ratification)
    pub const READ_RECORDS: u8 = 0xB2;
    /// Update Record
    pub const UPDATE_RECORD: u8 = 0xDC;
    /// Append Record
    pub const APPEND_RECORD: u8 = 0xE2;
}

/// Instruction codes sent to the SAM
pub mod sam_ins {
    /// Select Diversifier
    pub const SELECT_DIVERSIFIER: u8 = 0x14;
    /// Get Challenge
    pub const GET_CHALLENGE: u8 = 0x84;
    /// Digest Init
    pub const DIGEST_INIT: u8 = 0x8A;
    /// Digest Update
    pub const DIGEST_UPDATE: u8 = 0x8C;
    /// Digest Close
    pub const DIGEST_CLOSE: u8 = 0x8E;
    /// Digest Authenticate
    pub const DIGEST_AUTHENTICATE: u8 = 0x82;
}

/// KIF value meaning "no key identifier"
pub const KIF_UNDEFINED: u8 = 0xFF;

/// Overhead, in session buffer bytes, of one record modification
pub const SESSION_BUFFER_CMD_OVERHEAD: usize = 6;

/// Length of a full card serial number
pub const SERIAL_NUMBER_LENGTH: usize = 8;
