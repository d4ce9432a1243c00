//! Fix hand-off seam
//!
//! The ingestion loop is generic over a [`FixHandler`] so the publish side
//! can be swapped out (the bridge installs a handler that publishes to the
//! declared channel; tests install recording handlers).

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use crate::fix::LocationFix;

/// Context passed to handler callbacks
///
/// Read-only view of the connection the fix arrived on.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Unique connection id
    pub connection_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// When the connection was accepted
    pub connected_at: Instant,
}

impl ConnectionContext {
    /// Create a new context
    pub fn new(connection_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            connection_id,
            peer_addr,
            connected_at: Instant::now(),
        }
    }
}

/// Receiver for enriched fixes
///
/// `on_fix` is awaited before the connection reads its next line, so calls
/// for one connection arrive in the exact order the lines were received.
/// Calls from different connections may interleave arbitrarily.
pub trait FixHandler: Send + Sync + 'static {
    /// Called once per successfully enriched fix
    ///
    /// `log_time` is the capture timestamp in nanoseconds since the Unix
    /// epoch, read at enrichment time. Failures on the publish side must be
    /// handled here; the ingestion loop drops nothing it has handed off.
    fn on_fix(
        &self,
        ctx: &ConnectionContext,
        fix: &LocationFix,
        log_time: u64,
    ) -> impl Future<Output = ()> + Send;
}
