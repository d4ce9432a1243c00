//! Channel identifiers and published messages

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Opaque handle for a declared channel
///
/// Assigned by the registry at declaration time and immutable for the
/// process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(u32);

impl ChannelId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message fanned out to channel subscribers
///
/// Cheap to clone: the payload is reference-counted, not copied.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    /// Channel the message was published on
    pub channel_id: ChannelId,
    /// Capture timestamp, nanoseconds since the Unix epoch
    pub log_time: u64,
    /// Encoded payload in the channel's declared encoding
    pub payload: Bytes,
}

impl ChannelMessage {
    /// Create a new message
    pub fn new(channel_id: ChannelId, log_time: u64, payload: Bytes) -> Self {
        Self {
            channel_id,
            log_time,
            payload,
        }
    }
}
