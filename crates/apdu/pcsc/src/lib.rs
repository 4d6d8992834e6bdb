//! PC/SC implementation of the reader contracts of `calypso-apdu-core`
//!
//! [`PcscReader`] is a cloneable handle to one reader: it connects to the card
//! lazily and serializes transmission and presence checks through a lock
//! shared by all clones. [`PcscDirectory`] enumerates readers and, once
//! subscribed to, runs a monitor thread publishing connect/disconnect events.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod config;
mod directory;
mod error;
mod reader;

pub use config::{PcscConfig, ShareMode};
pub use directory::PcscDirectory;
pub use error::PcscError;
pub use reader::PcscReader;
