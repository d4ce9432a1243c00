//! Channel declarations and advertisement info

use serde::Serialize;

use super::message::ChannelId;

/// Schema encoding advertised for declared channels
pub const SCHEMA_ENCODING: &str = "jsonschema";

/// Declaration of a channel: topic, payload encoding and schema
///
/// Declared once at startup, before any publish, and never mutated.
#[derive(Debug, Clone)]
pub struct ChannelSchema {
    /// Topic the channel publishes on (e.g. "/gps/fix")
    pub topic: String,
    /// Payload encoding; this bridge supports exactly one ("json")
    pub encoding: String,
    /// Name of the schema describing the payload
    pub schema_name: String,
    /// Schema body, JSON Schema encoded
    pub schema: String,
}

impl ChannelSchema {
    /// Create a new channel declaration
    pub fn new(
        topic: impl Into<String>,
        encoding: impl Into<String>,
        schema_name: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            encoding: encoding.into(),
            schema_name: schema_name.into(),
            schema: schema.into(),
        }
    }
}

/// Advertised view of a declared channel, as sent to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub topic: String,
    pub encoding: String,
    pub schema_name: String,
    pub schema: String,
    pub schema_encoding: String,
}

impl ChannelInfo {
    pub(crate) fn new(id: ChannelId, schema: &ChannelSchema) -> Self {
        Self {
            id,
            topic: schema.topic.clone(),
            encoding: schema.encoding.clone(),
            schema_name: schema.schema_name.clone(),
            schema: schema.schema.clone(),
            schema_encoding: SCHEMA_ENCODING.to_string(),
        }
    }
}
