//! Per-connection read loop
//!
//! Reads newline-delimited JSON from one client, enriches each line and
//! hands the result to the handler. Malformed lines are dropped with a log
//! line; only end-of-stream, a read error, or shutdown end the loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;

use super::config::IngestConfig;
use super::handler::{ConnectionContext, FixHandler};
use super::session::ConnectionState;
use crate::fix;

/// One accepted ingestion connection
pub struct Connection<S, H> {
    state: ConnectionState,
    stream: S,
    config: IngestConfig,
    handler: Arc<H>,
    token: CancellationToken,
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + Unpin + Send,
    H: FixHandler,
{
    /// Create a connection around an accepted stream
    pub fn new(
        id: u64,
        stream: S,
        peer_addr: SocketAddr,
        config: IngestConfig,
        handler: Arc<H>,
        token: CancellationToken,
    ) -> Self {
        Self {
            state: ConnectionState::new(id, peer_addr),
            stream,
            config,
            handler,
            token,
        }
    }

    /// Drive the read loop until end-of-stream, read error or shutdown
    ///
    /// Each fix is handed off before the next line is read, so the handler
    /// sees this connection's fixes in receive order.
    pub async fn run(self) -> ConnectionState {
        let Self {
            mut state,
            stream,
            config,
            handler,
            token,
        } = self;

        let ctx = ConnectionContext::new(state.id, state.peer_addr);
        let mut lines = BufReader::with_capacity(config.read_buffer_size, stream).lines();

        state.start_reading();

        loop {
            // Cancellation may drop a partially read line; the connection
            // is closing anyway.
            let next = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(
                        connection_id = state.id,
                        peer = %state.peer_addr,
                        "Connection stopping on shutdown"
                    );
                    state.close_clean();
                    return state;
                }
                next = lines.next_line() => next,
            };

            match next {
                Ok(Some(line)) => {
                    state.on_line();

                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match fix::enrich(trimmed) {
                        Ok(fix) => {
                            let log_time = fix::now_nanos();
                            handler.on_fix(&ctx, &fix, log_time).await;
                            state.on_fix();
                        }
                        Err(e) => {
                            state.on_parse_error();
                            tracing::warn!(
                                connection_id = state.id,
                                peer = %state.peer_addr,
                                line = trimmed,
                                error = %e,
                                "Dropping malformed line"
                            );
                        }
                    }
                }
                Ok(None) => {
                    state.close_clean();
                    return state;
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = state.id,
                        peer = %state.peer_addr,
                        error = %e,
                        "Connection read error"
                    );
                    state.close_error();
                    return state;
                }
            }
        }
    }
}
