//! Ingestion server listener
//!
//! Handles the TCP accept loop and spawns connection read loops.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::config::IngestConfig;
use super::connection::Connection;
use super::handler::FixHandler;
use crate::error::Result;

/// TCP ingestion server
pub struct IngestServer<H: FixHandler> {
    config: IngestConfig,
    handler: Arc<H>,
    listener: TcpListener,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<H: FixHandler> IngestServer<H> {
    /// Bind the ingestion socket
    ///
    /// Binding is separate from running so the coordinator can finish
    /// declaring the channel before any connection is accepted.
    pub async fn bind(config: IngestConfig, handler: H) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        tracing::info!(addr = %config.bind_addr, "Ingestion server listening");

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            config,
            handler: Arc::new(handler),
            listener,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// Get the actual bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop until the token is cancelled
    ///
    /// Accept errors are logged and the loop continues; cancellation is the
    /// only way out and is not an error. Active connections observe the
    /// same token and wind down on their own.
    pub async fn run_until(&self, token: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Ingestion server stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr, &token);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr, token: &CancellationToken) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            connection_id = connection_id,
            peer = %peer_addr,
            "Connection opened"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let connection = Connection::new(
            connection_id,
            socket,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.handler),
            token.clone(),
        );

        tokio::spawn(async move {
            // Hold the limit permit for the connection's lifetime
            let _permit = permit;

            let state = connection.run().await;

            tracing::info!(
                connection_id = state.id,
                peer = %state.peer_addr,
                reason = ?state.close_reason,
                lines = state.lines_read,
                fixes = state.fixes_forwarded,
                parse_errors = state.parse_errors,
                "Connection closed"
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use tokio_test::assert_ok;

    use super::super::handler::ConnectionContext;
    use super::*;
    use crate::fix::LocationFix;

    #[derive(Default)]
    struct RecordingHandler {
        records: Mutex<Vec<(u64, f64, f64)>>,
    }

    impl RecordingHandler {
        fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }
    }

    impl FixHandler for RecordingHandler {
        async fn on_fix(&self, ctx: &ConnectionContext, fix: &LocationFix, _log_time: u64) {
            self.records
                .lock()
                .unwrap()
                .push((ctx.connection_id, fix.latitude, fix.longitude));
        }
    }

    async fn ephemeral_server(
        handler: Arc<RecordingHandler>,
    ) -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<Result<()>>) {
        let config = IngestConfig::default().bind("127.0.0.1:0".parse().unwrap());
        // The server owns an Arc clone so tests keep their own handle
        let server = IngestServer::bind(config, ArcHandler(handler)).await.unwrap();
        let addr = server.local_addr().unwrap();

        let token = CancellationToken::new();
        let run_token = token.clone();
        let task = tokio::spawn(async move { server.run_until(run_token).await });

        (addr, token, task)
    }

    /// Delegating wrapper so tests can share one recording handler
    struct ArcHandler(Arc<RecordingHandler>);

    impl FixHandler for ArcHandler {
        async fn on_fix(&self, ctx: &ConnectionContext, fix: &LocationFix, log_time: u64) {
            self.0.on_fix(ctx, fix, log_time).await;
        }
    }

    async fn wait_for_records(handler: &RecordingHandler, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while handler.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected records did not arrive");
    }

    #[tokio::test]
    async fn test_concurrent_connections_do_not_mix_fixes() {
        let handler = Arc::new(RecordingHandler::default());
        let (addr, token, task) = ephemeral_server(handler.clone()).await;

        let mut a = TcpStream::connect(addr).await.unwrap();
        let mut b = TcpStream::connect(addr).await.unwrap();

        a.write_all(b"{\"latitude\": 1.0, \"longitude\": 10.0}\n")
            .await
            .unwrap();
        b.write_all(b"{\"latitude\": 2.0, \"longitude\": 20.0}\n")
            .await
            .unwrap();

        wait_for_records(&handler, 2).await;

        let records = handler.records.lock().unwrap().clone();
        assert_eq!(records.len(), 2);

        // Each record keeps its own connection's coordinates
        for (_, latitude, longitude) in &records {
            assert_eq!(*longitude, latitude * 10.0);
        }
        // Two distinct connections
        assert_ne!(records[0].0, records[1].0);

        drop(a);
        drop(b);
        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_client_disconnect_keeps_listener_alive() {
        let handler = Arc::new(RecordingHandler::default());
        let (addr, token, task) = ephemeral_server(handler.clone()).await;

        {
            let mut early = TcpStream::connect(addr).await.unwrap();
            early.write_all(b"garbage\n").await.unwrap();
        } // dropped: abrupt disconnect

        let mut late = TcpStream::connect(addr).await.unwrap();
        late.write_all(b"{\"latitude\": 3.0, \"longitude\": 30.0}\n")
            .await
            .unwrap();

        wait_for_records(&handler, 1).await;
        assert_eq!(handler.records.lock().unwrap()[0].1, 3.0);

        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_stops_accept_loop() {
        let handler = Arc::new(RecordingHandler::default());
        let (_addr, token, task) = ephemeral_server(handler).await;

        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("accept loop did not stop on cancellation")
            .unwrap();
        assert_ok!(result);
    }
}
