//! Card and SAM revisions

use derive_more::Display;

use crate::constants::{CLA_PO_ISO, CLA_PO_LEGACY, CLA_SAM, CLA_SAM_LEGACY};

/// Revision of the Calypso card (PO)
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PoRevision {
    /// Revision 1.0
    #[display("1.0")]
    Rev1_0,
    /// Revision 2.4
    #[display("2.4")]
    Rev2_4,
    /// Revision 3.1
    #[display("3.1")]
    Rev3_1,
    /// Revision 3.2, supporting the extended session mode
    #[display("3.2")]
    Rev3_2,
}

impl PoRevision {
    /// Class byte used for every command sent to a card of this revision
    pub const fn cla(self) -> u8 {
        match self {
            Self::Rev1_0 | Self::Rev2_4 => CLA_PO_LEGACY,
            Self::Rev3_1 | Self::Rev3_2 => CLA_PO_ISO,
        }
    }
}

/// Revision of the SAM
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SamRevision {
    /// SAM C1
    C1,
    /// SAM S1E
    S1E,
    /// SAM S1D
    S1D,
}

impl SamRevision {
    /// Class byte used for every command sent to a SAM of this revision
    pub const fn cla(self) -> u8 {
        match self {
            Self::C1 | Self::S1E => CLA_SAM,
            Self::S1D => CLA_SAM_LEGACY,
        }
    }

    /// Revision announced by the application subtype byte of the ATR
    pub const fn from_application_subtype(subtype: u8) -> Option<Self> {
        match subtype {
            0xC1 => Some(Self::C1),
            0xD0..=0xD2 => Some(Self::S1D),
            0xE1 => Some(Self::S1E),
            _ => None,
        }
    }
}
