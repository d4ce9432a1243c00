//! Subscriber-facing WebSocket transport
//!
//! Speaks the visualization pub/sub wire protocol: JSON control messages
//! (`serverInfo`, `advertise`, `subscribe`, `unsubscribe`) plus a binary
//! frame for channel data. The bridge core never touches WebSocket types;
//! this module is the only consumer of the registry's subscribe side.

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, Subscription, SUBPROTOCOL};
pub use server::{TransportConfig, WsServer};
