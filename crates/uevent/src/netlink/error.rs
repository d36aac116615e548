//! Error types for uevent operations.

use std::io;

/// Result type for uevent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while receiving and decoding uevents.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket create/bind/read failure.
    #[error("{operation}: {source}")]
    Transport {
        /// The socket operation that failed.
        operation: &'static str,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The datagram is not a valid uevent.
    #[error("invalid uevent: {0}")]
    Format(#[from] FormatError),

    /// The matcher could not prepare its match state.
    #[error("matcher compile failed: {0}")]
    MatcherCompile(String),

    /// An operation was called with arguments it cannot use.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Reasons a datagram fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The udev monitor header carries the wrong magic.
    #[error("udev header magic mismatch (got {found:#010x})")]
    MagicMismatch {
        /// Magic found at bytes 8..12.
        found: u32,
    },

    /// The properties offset points outside the datagram.
    #[error("invalid properties offset {offset} for {len}-byte datagram")]
    InvalidOffset {
        /// Offset read from the header.
        offset: u32,
        /// Datagram length.
        len: usize,
    },

    /// The `action@devpath` header line is malformed.
    #[error("malformed header {0:?}")]
    MalformedHeader(String),

    /// A `KEY=VALUE` field is malformed.
    #[error("malformed env field {0:?}")]
    MalformedField(String),

    /// The action is not one of the kernel kobject actions.
    #[error("unknown kobject action {0:?}")]
    UnknownAction(String),
}

impl Error {
    /// Wrap an OS error with the socket operation that produced it.
    pub fn transport(operation: &'static str, source: io::Error) -> Self {
        Self::Transport { operation, source }
    }

    /// Create a matcher compile error.
    pub fn matcher_compile(message: impl Into<String>) -> Self {
        Self::MatcherCompile(message.into())
    }

    /// Check if this is a socket-level failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if this is a decoding failure.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    /// Check if a monitor loop may skip this error and keep reading.
    ///
    /// Only decoding failures are recoverable; everything else ends the
    /// operation in progress.
    pub fn is_recoverable(&self) -> bool {
        self.is_format()
    }

    /// Get the OS errno if this is a transport error.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Transport { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
