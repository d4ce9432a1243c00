//! WebSocket transport server
//!
//! Accepts subscriber clients, advertises the declared channels and fans
//! published messages out per subscription. Each client gets a writer task
//! fed by a queue plus one forwarder task per active subscription; a slow
//! or broken client never affects other clients or the publish side.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::protocol::{self, ClientMessage, ServerMessage, SUBPROTOCOL};
use crate::channel::{ChannelId, ChannelMessage, ChannelRegistry};
use crate::error::Result;

/// Default transport bind address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8765";

/// Transport server configuration options
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Address to bind the WebSocket listener to
    pub bind_addr: SocketAddr,

    /// Per-client outbound queue capacity
    pub send_queue_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.parse().unwrap(),
            send_queue_size: 128,
        }
    }
}

impl TransportConfig {
    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the per-client outbound queue capacity
    pub fn send_queue_size(mut self, size: usize) -> Self {
        self.send_queue_size = size;
        self
    }
}

/// Subscriber-facing WebSocket server
pub struct WsServer {
    config: TransportConfig,
    registry: Arc<ChannelRegistry>,
    listener: TcpListener,
    next_client_id: AtomicU64,
}

impl WsServer {
    /// Bind the transport socket
    pub async fn bind(config: TransportConfig, registry: Arc<ChannelRegistry>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        tracing::info!(addr = %config.bind_addr, "Transport server listening");

        Ok(Self {
            config,
            registry,
            listener,
            next_client_id: AtomicU64::new(1),
        })
    }

    /// Get the actual bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop until the token is cancelled
    pub async fn run_until(&self, token: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Transport server stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
                        let registry = Arc::clone(&self.registry);
                        let config = self.config.clone();
                        let token = token.clone();

                        tokio::spawn(handle_client(
                            client_id, socket, peer_addr, registry, config, token,
                        ));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept client");
                    }
                }
            }
        }
    }
}

/// A client subscription being serviced by a forwarder task
struct ActiveSubscription {
    channel_id: ChannelId,
    forwarder: JoinHandle<()>,
}

fn negotiate_subprotocol(
    req: &Request,
    mut resp: Response,
) -> std::result::Result<Response, ErrorResponse> {
    let requested = req
        .headers()
        .get("Sec-WebSocket-Protocol")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|p| p.trim() == SUBPROTOCOL))
        .unwrap_or(false);

    if requested {
        resp.headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));
    }

    Ok(resp)
}

fn encode_control<T: serde::Serialize>(msg: &T) -> Option<String> {
    serde_json::to_string(msg)
        .map_err(|e| tracing::warn!(error = %e, "Failed to encode control message"))
        .ok()
}

async fn handle_client(
    client_id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ChannelRegistry>,
    config: TransportConfig,
    token: CancellationToken,
) {
    let ws_stream = match accept_hdr_async(socket, negotiate_subprotocol).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(
                client_id = client_id,
                peer = %peer_addr,
                error = %e,
                "WebSocket handshake failed"
            );
            return;
        }
    };

    tracing::info!(client_id = client_id, peer = %peer_addr, "Client connected");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Writer task owns the sink; control, data and pongs all go through
    // the same queue so frames are never interleaved.
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(config.send_queue_size);
    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Greet: server info, then the channel advertisement
    let advert = registry.advertisement().await;
    let greeting = [
        encode_control(&ServerMessage::server_info()),
        encode_control(&ServerMessage::Advertise { channels: &advert }),
    ];
    for text in greeting.into_iter().flatten() {
        if out_tx.send(Message::Text(text)).await.is_err() {
            writer.abort();
            return;
        }
    }

    let mut subscriptions: HashMap<u32, ActiveSubscription> = HashMap::new();

    loop {
        let msg = tokio::select! {
            _ = token.cancelled() => break,
            msg = ws_receiver.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Subscribe { subscriptions: subs }) => {
                    for sub in subs {
                        if subscriptions.contains_key(&sub.id) {
                            tracing::warn!(
                                client_id = client_id,
                                subscription_id = sub.id,
                                "Duplicate subscription id"
                            );
                            continue;
                        }

                        match registry.subscribe(sub.channel_id).await {
                            Ok(rx) => {
                                let forwarder =
                                    tokio::spawn(forward_messages(sub.id, rx, out_tx.clone()));
                                subscriptions.insert(
                                    sub.id,
                                    ActiveSubscription {
                                        channel_id: sub.channel_id,
                                        forwarder,
                                    },
                                );
                                tracing::info!(
                                    client_id = client_id,
                                    subscription_id = sub.id,
                                    channel = %sub.channel_id,
                                    "Client subscribed"
                                );
                            }
                            Err(e) => {
                                tracing::warn!(
                                    client_id = client_id,
                                    error = %e,
                                    "Rejecting subscription"
                                );
                            }
                        }
                    }
                }
                Ok(ClientMessage::Unsubscribe { subscription_ids }) => {
                    for id in subscription_ids {
                        match subscriptions.remove(&id) {
                            Some(active) => {
                                active.forwarder.abort();
                                registry.unsubscribe(active.channel_id).await;
                                tracing::info!(
                                    client_id = client_id,
                                    subscription_id = id,
                                    "Client unsubscribed"
                                );
                            }
                            None => {
                                tracing::debug!(
                                    client_id = client_id,
                                    subscription_id = id,
                                    "Unsubscribe for unknown subscription"
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        client_id = client_id,
                        error = %e,
                        "Ignoring malformed client message"
                    );
                }
            },
            Some(Ok(Message::Ping(data))) => {
                let _ = out_tx.send(Message::Pong(data)).await;
            }
            Some(Ok(Message::Close(_))) => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::debug!(client_id = client_id, error = %e, "Client read error");
                break;
            }
            None => break,
        }
    }

    // Teardown: stop forwarders and release registry subscriptions
    for (id, active) in subscriptions {
        active.forwarder.abort();
        registry.unsubscribe(active.channel_id).await;
        tracing::debug!(client_id = client_id, subscription_id = id, "Subscription released");
    }
    writer.abort();

    tracing::info!(client_id = client_id, peer = %peer_addr, "Client disconnected");
}

/// Drain one subscription's broadcast stream into the client queue
///
/// A lagged receiver drops the oldest messages and keeps going; the
/// publish side is never stalled by a slow client.
async fn forward_messages(
    subscription_id: u32,
    mut rx: broadcast::Receiver<ChannelMessage>,
    out_tx: mpsc::Sender<Message>,
) {
    loop {
        match rx.recv().await {
            Ok(msg) => {
                let frame = protocol::encode_message_data(subscription_id, &msg);
                if out_tx.send(Message::Binary(frame.to_vec())).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    subscription_id = subscription_id,
                    skipped = skipped,
                    "Subscriber lagging, dropping messages"
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
