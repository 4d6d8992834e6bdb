//! Reader handles and the resource directory contract
//!
//! A resource directory enumerates the readers currently connected to the
//! terminal and publishes connect/disconnect notifications on a channel.
//! Consumers subscribe to the channel instead of registering callbacks, so no
//! notification is ever delivered while the consumer holds one of its own
//! locks.

pub mod channel;

use std::fmt;
use std::hash::Hash;

pub use channel::{ReaderEventReceiver, ReaderEventSender, reader_event_channel};

use crate::transport::CardTransport;

/// A cloneable handle to one physical reader
///
/// Clones refer to the same reader: equality and hashing follow the reader
/// identity, not the handle instance. Transmission through any clone is
/// serialized with the other clones by the implementation.
pub trait ReaderHandle: CardTransport + Clone + Eq + Hash + Sync + 'static {
    /// Name of the reader as reported by the driver
    fn name(&self) -> &str;

    /// Check whether a card (or SAM) is present in the reader
    ///
    /// Must not interleave with an exchange in progress on the same reader.
    fn is_card_present(&self) -> bool;
}

/// Events related to reader connection/disconnection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent<H> {
    /// Reader was connected to the system
    Connected(H),
    /// Reader was disconnected from the system
    Disconnected(H),
}

impl<H: ReaderHandle> ReaderEvent<H> {
    /// The reader this event is about
    pub const fn handle(&self) -> &H {
        match self {
            Self::Connected(handle) | Self::Disconnected(handle) => handle,
        }
    }
}

impl<H: ReaderHandle> fmt::Display for ReaderEvent<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(handle) => write!(f, "reader connected: {}", handle.name()),
            Self::Disconnected(handle) => write!(f, "reader disconnected: {}", handle.name()),
        }
    }
}

/// Directory of currently connected readers
pub trait ResourceDirectory: fmt::Debug {
    /// Handle type for the readers of this directory
    type Handle: ReaderHandle;

    /// Error type for enumeration failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Enumerate the readers currently connected
    fn list_readers(&self) -> Result<Vec<Self::Handle>, Self::Error>;

    /// Subscribe to connect/disconnect events
    ///
    /// Returns `None` for directories whose reader set never changes, in which
    /// case `list_readers` is authoritative for the directory lifetime.
    fn subscribe(&self) -> Option<ReaderEventReceiver<Self::Handle>>;
}
