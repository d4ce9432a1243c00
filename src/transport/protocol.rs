//! Wire protocol messages and framing
//!
//! Control messages are JSON text frames. Channel data is a binary frame:
//!
//! ```text
//! +--------+----------------------+------------------------+---------+
//! | 0x01   | subscription id      | receive timestamp      | payload |
//! | 1 byte | u32, little-endian   | u64 ns, little-endian  | ...     |
//! +--------+----------------------+------------------------+---------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelId, ChannelInfo, ChannelMessage};

/// WebSocket subprotocol spoken by this server
pub const SUBPROTOCOL: &str = "foxglove.websocket.v1";

/// Server name sent in the `serverInfo` greeting
pub const SERVER_NAME: &str = "gps-bridge";

/// Opcode for binary channel data frames
pub const MESSAGE_DATA_OPCODE: u8 = 0x01;

/// Payload encodings this server supports
pub const SUPPORTED_ENCODINGS: [&str; 1] = ["json"];

/// Server-to-client control messages
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ServerMessage<'a> {
    #[serde(rename_all = "camelCase")]
    ServerInfo {
        name: &'a str,
        capabilities: &'a [&'a str],
        supported_encodings: &'a [&'a str],
    },
    Advertise { channels: &'a [ChannelInfo] },
}

impl ServerMessage<'_> {
    /// The greeting sent to every client on connect
    pub fn server_info() -> ServerMessage<'static> {
        ServerMessage::ServerInfo {
            name: SERVER_NAME,
            capabilities: &[],
            supported_encodings: &SUPPORTED_ENCODINGS,
        }
    }
}

/// One requested subscription: client-chosen id bound to a channel
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: u32,
    pub channel_id: ChannelId,
}

/// Client-to-server control messages
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ClientMessage {
    Subscribe { subscriptions: Vec<Subscription> },
    #[serde(rename_all = "camelCase")]
    Unsubscribe { subscription_ids: Vec<u32> },
}

/// Encode a channel message as a binary data frame for one subscription
pub fn encode_message_data(subscription_id: u32, msg: &ChannelMessage) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + 4 + 8 + msg.payload.len());

    buf.put_u8(MESSAGE_DATA_OPCODE);
    buf.put_u32_le(subscription_id);
    buf.put_u64_le(msg.log_time);
    buf.extend_from_slice(&msg.payload);

    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_info_wire_shape() {
        let value = serde_json::to_value(ServerMessage::server_info()).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "op": "serverInfo",
                "name": "gps-bridge",
                "capabilities": [],
                "supportedEncodings": ["json"],
            })
        );
    }

    #[test]
    fn test_advertise_wire_shape() {
        let schema = crate::channel::ChannelSchema::new("/gps/fix", "json", "x.Fix", "{}");
        let channels = [ChannelInfo::new(ChannelId::new(0), &schema)];
        let value = serde_json::to_value(ServerMessage::Advertise {
            channels: &channels,
        })
        .unwrap();

        assert_eq!(value["op"], "advertise");
        assert_eq!(value["channels"][0]["id"], 0);
        assert_eq!(value["channels"][0]["topic"], "/gps/fix");
    }

    #[test]
    fn test_parse_subscribe() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"op": "subscribe", "subscriptions": [{"id": 1, "channelId": 0}]}"#,
        )
        .unwrap();

        match msg {
            ClientMessage::Subscribe { subscriptions } => {
                assert_eq!(subscriptions.len(), 1);
                assert_eq!(subscriptions[0].id, 1);
                assert_eq!(subscriptions[0].channel_id, ChannelId::new(0));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unsubscribe() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"op": "unsubscribe", "subscriptionIds": [1, 2]}"#).unwrap();

        match msg {
            ClientMessage::Unsubscribe { subscription_ids } => {
                assert_eq!(subscription_ids, vec![1, 2]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_op_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"op": "login"}"#).is_err());
    }

    #[test]
    fn test_message_data_frame_layout() {
        let msg = ChannelMessage::new(
            ChannelId::new(0),
            0x0102030405060708,
            Bytes::from_static(b"{\"latitude\":1.0}"),
        );
        let frame = encode_message_data(7, &msg);

        assert_eq!(frame[0], MESSAGE_DATA_OPCODE);
        assert_eq!(&frame[1..5], &7u32.to_le_bytes());
        assert_eq!(&frame[5..13], &0x0102030405060708u64.to_le_bytes());
        assert_eq!(&frame[13..], b"{\"latitude\":1.0}");
    }
}
