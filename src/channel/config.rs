//! Registry configuration

/// Configuration options for the channel registry
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Capacity of each channel's broadcast buffer
    ///
    /// A subscriber that falls more than this many messages behind starts
    /// losing the oldest ones (lagged receiver).
    pub broadcast_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 1024,
        }
    }
}

impl ChannelConfig {
    /// Set the broadcast buffer capacity
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChannelConfig::default();
        assert_eq!(config.broadcast_capacity, 1024);
    }

    #[test]
    fn test_builder() {
        let config = ChannelConfig::default().broadcast_capacity(16);
        assert_eq!(config.broadcast_capacity, 16);
    }
}
