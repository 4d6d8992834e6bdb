//! SAM identification and the shared SAM resource pool

mod identifier;
mod pool;

pub use identifier::{SamFilter, SamIdentifier};
pub use pool::{AllocationMode, SamResource, SamResourcePool};

/// Errors returned by the SAM resource pool
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The resource was not allocated from this pool
    #[error("resource for reader {0} was not allocated from this pool")]
    UnknownResource(String),

    /// Invalid serial number pattern
    #[error("invalid serial number pattern {0:?}: expected 8 hex digits or '.'")]
    InvalidPattern(String),
}
