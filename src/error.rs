//! Crate error types
//!
//! All fallible library operations return [`Result`]. Per-message and
//! per-connection failures are handled locally where they occur and never
//! surface through these types; see the module docs for the recovery rules.

use crate::channel::ChannelError;
use crate::fix::ParseError;

/// Convenience alias for results produced by this crate
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Top-level error type for bridge operations
#[derive(Debug)]
pub enum BridgeError {
    /// Socket-level I/O failure (bind, accept, read)
    Io(std::io::Error),
    /// Inbound message could not be decoded as a location fix
    Parse(ParseError),
    /// Channel registry rejected an operation
    Channel(ChannelError),
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::Io(e) => write!(f, "I/O error: {}", e),
            BridgeError::Parse(e) => write!(f, "Parse error: {}", e),
            BridgeError::Channel(e) => write!(f, "Channel error: {}", e),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Io(e) => Some(e),
            BridgeError::Parse(e) => Some(e),
            BridgeError::Channel(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Io(e)
    }
}

impl From<ParseError> for BridgeError {
    fn from(e: ParseError) -> Self {
        BridgeError::Parse(e)
    }
}

impl From<ChannelError> for BridgeError {
    fn from(e: ChannelError) -> Self {
        BridgeError::Channel(e)
    }
}
