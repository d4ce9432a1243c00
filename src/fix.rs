//! Location fix parsing and enrichment
//!
//! Decodes one line of inbound JSON into a [`LocationFix`] and injects the
//! fixed covariance block that makes the published position visually
//! distinguishable downstream. Pure transformation: no I/O, no logging.
//!
//! Inbound keys beyond the known fields are passed through to the published
//! payload unchanged. Inbound values for the two covariance keys are always
//! discarded and replaced with the constants below.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::channel::ChannelSchema;

/// Covariance diagonal injected into every published fix
pub const POSITION_COVARIANCE: [f64; 9] = [700.0, 0.0, 0.0, 0.0, 700.0, 0.0, 0.0, 0.0, 700.0];

/// Covariance type tag for a diagonal-known covariance matrix
pub const POSITION_COVARIANCE_TYPE: u8 = 2;

/// Topic the fix channel is published on
pub const FIX_TOPIC: &str = "/gps/fix";

/// Schema name advertised for the fix channel
pub const FIX_SCHEMA_NAME: &str = "foxglove.LocationFix";

/// Error type for fix decoding
#[derive(Debug)]
pub enum ParseError {
    /// Input was not syntactically valid JSON
    Syntax(serde_json::Error),
    /// Valid JSON that is missing required fields or has mistyped values
    Shape(serde_json::Error),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Syntax(e) => write!(f, "Invalid JSON: {}", e),
            ParseError::Shape(e) => write!(f, "Not a location fix: {}", e),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Syntax(e) | ParseError::Shape(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        match e.classify() {
            serde_json::error::Category::Data => ParseError::Shape(e),
            _ => ParseError::Syntax(e),
        }
    }
}

/// Inbound message shape before enrichment
///
/// `latitude` and `longitude` are required and must be numeric; everything
/// else is collected for passthrough.
#[derive(Debug, Deserialize)]
struct RawFix {
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// An enriched geospatial record, ready for publishing
#[derive(Debug, Clone, Serialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Always the constant diagonal, never read from input
    pub position_covariance: [f64; 9],
    /// Always `2`, never read from input
    pub position_covariance_type: u8,
    /// Unrecognized inbound keys, passed through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LocationFix {
    /// Serialize to the channel's JSON encoding
    pub fn to_payload(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

/// Decode one trimmed, non-empty line into an enriched fix
///
/// Overwrites any inbound covariance fields with the fixed constants.
/// Callers are expected to skip empty lines rather than call this.
pub fn enrich(line: &str) -> Result<LocationFix, ParseError> {
    let mut raw: RawFix = serde_json::from_str(line)?;

    // Overwrite, not merge: inbound covariance values are dropped.
    raw.extra.remove("position_covariance");
    raw.extra.remove("position_covariance_type");

    Ok(LocationFix {
        latitude: raw.latitude,
        longitude: raw.longitude,
        altitude: raw.altitude,
        position_covariance: POSITION_COVARIANCE,
        position_covariance_type: POSITION_COVARIANCE_TYPE,
        extra: raw.extra,
    })
}

/// Current wall-clock time in nanoseconds since the Unix epoch
///
/// Capture timestamps are always read here, never parsed from input.
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Build the channel declaration for the fix topic
///
/// One channel, JSON encoding, schema requiring numeric latitude/longitude
/// with optional altitude and the injected covariance fields.
pub fn location_fix_schema() -> ChannelSchema {
    let schema = serde_json::json!({
        "type": "object",
        "properties": {
            "altitude": {"type": "number"},
            "latitude": {"type": "number"},
            "longitude": {"type": "number"},
            "position_covariance": {
                "type": "array",
                "items": {"type": "number"},
                "minItems": 9,
                "maxItems": 9,
            },
            "position_covariance_type": {"type": "integer"},
        },
        "required": ["latitude", "longitude"],
    });

    ChannelSchema::new(FIX_TOPIC, "json", FIX_SCHEMA_NAME, schema.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrich_minimal_fix() {
        let fix = enrich(r#"{"latitude": 37.5, "longitude": -122.3}"#).unwrap();

        assert_eq!(fix.latitude, 37.5);
        assert_eq!(fix.longitude, -122.3);
        assert_eq!(fix.altitude, None);
        assert_eq!(fix.position_covariance, POSITION_COVARIANCE);
        assert_eq!(fix.position_covariance_type, 2);
        assert!(fix.extra.is_empty());
    }

    #[test]
    fn test_enrich_with_altitude() {
        let fix = enrich(r#"{"latitude": 1.0, "longitude": 2.0, "altitude": 30.5}"#).unwrap();

        assert_eq!(fix.altitude, Some(30.5));
    }

    #[test]
    fn test_integer_coordinates_accepted() {
        let fix = enrich(r#"{"latitude": 37, "longitude": -122}"#).unwrap();

        assert_eq!(fix.latitude, 37.0);
        assert_eq!(fix.longitude, -122.0);
    }

    #[test]
    fn test_inbound_covariance_overwritten() {
        let fix = enrich(
            r#"{"latitude": 1.0, "longitude": 2.0,
                "position_covariance": [1,2,3,4,5,6,7,8,9],
                "position_covariance_type": 3}"#,
        )
        .unwrap();

        assert_eq!(fix.position_covariance, POSITION_COVARIANCE);
        assert_eq!(fix.position_covariance_type, 2);
        // The inbound values must not resurface via passthrough
        assert!(!fix.extra.contains_key("position_covariance"));
        assert!(!fix.extra.contains_key("position_covariance_type"));
    }

    #[test]
    fn test_unknown_keys_passed_through() {
        let fix = enrich(r#"{"latitude": 1.0, "longitude": 2.0, "source": "sim", "hdop": 0.9}"#)
            .unwrap();

        assert_eq!(fix.extra["source"], "sim");
        assert_eq!(fix.extra["hdop"], 0.9);
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = enrich("{not json").unwrap_err();
        assert!(matches!(err, ParseError::Syntax(_)));
    }

    #[test]
    fn test_missing_longitude_rejected() {
        let err = enrich(r#"{"latitude": 1.0}"#).unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn test_non_numeric_latitude_rejected() {
        let err = enrich(r#"{"latitude": "37.5", "longitude": -122.3}"#).unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(enrich("[1, 2]").is_err());
        assert!(enrich("42").is_err());
    }

    #[test]
    fn test_payload_shape() {
        let fix = enrich(r#"{"latitude": 37.5, "longitude": -122.3}"#).unwrap();
        let payload = fix.to_payload().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "latitude": 37.5,
                "longitude": -122.3,
                "position_covariance": [700.0, 0.0, 0.0, 0.0, 700.0, 0.0, 0.0, 0.0, 700.0],
                "position_covariance_type": 2,
            })
        );
        // Absent altitude must not serialize as null
        assert!(value.get("altitude").is_none());
    }

    #[test]
    fn test_now_nanos_monotonic_enough() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(a > 0);
        assert!(b >= a);
    }

    #[test]
    fn test_location_fix_schema() {
        let schema = location_fix_schema();

        assert_eq!(schema.topic, FIX_TOPIC);
        assert_eq!(schema.encoding, "json");
        assert_eq!(schema.schema_name, FIX_SCHEMA_NAME);

        let body: serde_json::Value = serde_json::from_str(&schema.schema).unwrap();
        assert_eq!(body["required"], serde_json::json!(["latitude", "longitude"]));
        assert_eq!(body["properties"]["position_covariance"]["minItems"], 9);
    }
}
