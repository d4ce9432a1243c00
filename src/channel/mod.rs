//! Channel registry for pub/sub fan-out
//!
//! The registry manages declared channels and routes published payloads to
//! subscribers. It uses `tokio::sync::broadcast` for efficient zero-copy
//! fan-out to multiple subscribers.
//!
//! # Architecture
//!
//! ```text
//!                     Arc<ChannelRegistry>
//!                ┌──────────────────────────┐
//!                │ channels: HashMap<Id,    │
//!                │   ChannelEntry {         │
//!                │     schema,              │
//!                │     tx: broadcast::Tx,   │
//!                │   }                      │
//!                │ >                        │
//!                └────────────┬─────────────┘
//!                             │
//!        ┌────────────────────┼────────────────────┐
//!        │                    │                    │
//!        ▼                    ▼                    ▼
//!   [Publisher]         [Subscriber]         [Subscriber]
//!   on_fix()            msg_rx.recv()        msg_rx.recv()
//!        │                    │                    │
//!        └──► registry.publish() ──► binary frame ──► WebSocket
//! ```
//!
//! # Zero-Copy Design
//!
//! `bytes::Bytes` uses reference counting, so all subscribers share the same
//! payload allocation. The broadcast channel clones the `ChannelMessage`, but
//! the inner `Bytes` data is only reference-counted, not copied.

pub mod config;
mod entry;
pub mod error;
pub mod message;
pub mod registry;
pub mod schema;

pub use config::ChannelConfig;
pub use error::ChannelError;
pub use message::{ChannelId, ChannelMessage};
pub use registry::{ChannelRegistry, SubscriptionListener};
pub use schema::{ChannelInfo, ChannelSchema};
