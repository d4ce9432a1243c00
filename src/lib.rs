//! # gps-bridge
//!
//! A protocol bridge that accepts newline-delimited JSON location fixes
//! over plain TCP and republishes each fix, enriched with a fixed
//! covariance block, to any number of WebSocket subscribers over a
//! schema-declared pub/sub channel.
//!
//! ```text
//! [producer] --TCP, one JSON fix per line--> [ingest] --enrich--> [channel]
//!                                                                    │
//!                                              fan-out ┌─────────────┤
//!                                                      ▼             ▼
//!                                                [subscriber]  [subscriber]
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gps_bridge::{Bridge, BridgeConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> gps_bridge::Result<()> {
//!     let shutdown = CancellationToken::new();
//!
//!     let interrupt = shutdown.clone();
//!     tokio::spawn(async move {
//!         if tokio::signal::ctrl_c().await.is_ok() {
//!             interrupt.cancel();
//!         }
//!     });
//!
//!     Bridge::new(BridgeConfig::default()).run(shutdown).await
//! }
//! ```
//!
//! Malformed lines, peer disconnects and publish failures are all local
//! failures: they are logged and recovered where they occur. The process
//! only exits on the external termination signal, after a bounded
//! shutdown of the background tasks.

pub mod bridge;
pub mod channel;
pub mod error;
pub mod fix;
pub mod ingest;
pub mod transport;

pub use bridge::{Bridge, BridgeConfig, FixPublisher};
pub use channel::{ChannelId, ChannelRegistry, SubscriptionListener};
pub use error::{BridgeError, Result};
pub use fix::{enrich, LocationFix, ParseError};
pub use ingest::{FixHandler, IngestConfig, IngestServer};
pub use transport::{TransportConfig, WsServer};
