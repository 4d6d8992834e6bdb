//! Core types for APDU exchanges with cards and security modules
//!
//! - Short APDU commands ([`ApduCommand`], [`Command`]) and responses
//!   ([`Response`], [`StatusWord`])
//! - Single and batch transmission through a [`CardTransport`], whose faults
//!   keep the responses received so far
//! - Reader enumeration and connection events through a
//!   [`ResourceDirectory`]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod error;
pub mod exchange;
pub mod reader;
pub mod response;
pub mod transport;

pub use command::{ApduCommand, Command};
pub use error::{Error, ResultExt};
pub use exchange::ApduExchange;
pub use reader::{ReaderEvent, ReaderHandle, ResourceDirectory};
pub use response::status::StatusWord;
pub use response::{ApduResponse, Response};
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::command::{ApduCommand, Command};
    pub use crate::exchange::ApduExchange;
    pub use crate::reader::{ReaderEvent, ReaderHandle, ResourceDirectory};
    pub use crate::response::status::{StatusWord, common as status};
    pub use crate::response::{ApduResponse, Response, utils};
    pub use crate::transport::{CardTransport, TransportError};
    pub use crate::{Bytes, BytesMut, Error, ResultExt};
}
