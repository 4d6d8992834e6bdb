//! Codec errors
//!
//! Transport failures have their own type ([`crate::transport::TransportError`])
//! because they carry the responses received before the fault.

/// Error raised while encoding a command or decoding a response
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Response shorter than a status word
    #[error("Incomplete response: {0} bytes")]
    IncompleteResponse(usize),

    /// Raw command whose length does not match its Lc byte
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Command data does not fit a short APDU
    #[error("Data too long: {0} bytes (max 255)")]
    DataTooLong(usize),

    /// Command data present but empty, which a short APDU cannot encode
    #[error("Empty command data")]
    EmptyData,

    /// Error with the operation that was being performed
    #[error("{context}: {source}")]
    Context {
        /// What was being done
        context: String,
        /// Underlying error
        source: Box<Self>,
    },
}

impl Error {
    /// Wrap the error with the operation that was being performed
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip context layers and return the innermost error
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Extension trait adding context to codec results
pub trait ResultExt<T> {
    /// Wrap the error, if any, with the operation that was being performed
    fn context<S: Into<String>>(self, context: S) -> Result<T, Error>;
}

impl<T> ResultExt<T> for Result<T, Error> {
    fn context<S: Into<String>>(self, context: S) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}
