//! Error types for the sensorlink library.

use thiserror::Error;

/// The main error type for sensorlink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The device could not be reached or the handshake failed.
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// A message could not be written to an open connection.
    #[error("failed to send {message:?}: {reason}")]
    Send { message: String, reason: String },

    /// Connecting timed out.
    #[error("connect timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,

    /// The command is not allowed in the current session state.
    #[error("command rejected: {0}")]
    Rejected(#[from] Rejection),

    /// Channel send error.
    #[error("channel send error")]
    ChannelSend,

    /// Channel receive error.
    #[error("channel closed")]
    ChannelClosed,
}

impl Error {
    /// Returns true if the error ends the current connection.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Send { .. })
    }
}

/// Reasons a command is refused by the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The command needs an open connection.
    #[error("not connected")]
    NotConnected,

    /// Connect was requested while already connected.
    #[error("already connected")]
    AlreadyConnected,

    /// Lamp commands are ignored while the device runs in automatic mode.
    #[error("automatic mode is active")]
    AutomaticModeActive,
}

/// Result type alias for sensorlink operations.
pub type Result<T> = std::result::Result<T, Error>;
