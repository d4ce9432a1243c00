//! Registry error types

use super::message::ChannelId;

/// Error type for registry operations
#[derive(Debug, Clone)]
pub enum ChannelError {
    /// No channel with this id has been declared
    ChannelNotFound(ChannelId),
    /// A channel with this topic already exists
    TopicAlreadyDeclared(String),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::ChannelNotFound(id) => write!(f, "Channel not found: {}", id),
            ChannelError::TopicAlreadyDeclared(topic) => {
                write!(f, "Topic already declared: {}", topic)
            }
        }
    }
}

impl std::error::Error for ChannelError {}
