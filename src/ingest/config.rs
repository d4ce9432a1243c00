//! Ingestion server configuration

use std::net::SocketAddr;

/// Default ingestion bind address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:9001";

/// Ingestion server configuration options
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Address to bind the ingestion socket to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Per-connection read buffer size
    pub read_buffer_size: usize,

    /// Enable TCP_NODELAY on accepted sockets
    pub tcp_nodelay: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.parse().unwrap(),
            max_connections: 0, // Unlimited
            read_buffer_size: 8 * 1024,
            tcp_nodelay: true,
        }
    }
}

impl IngestConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-connection read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();

        assert_eq!(config.bind_addr.port(), 9001);
        assert!(config.bind_addr.ip().is_loopback());
        assert_eq!(config.max_connections, 0);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9010".parse().unwrap();
        let config = IngestConfig::default()
            .bind(addr)
            .max_connections(32)
            .read_buffer_size(4096);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.read_buffer_size, 4096);
    }
}
