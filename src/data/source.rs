use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::error::{Result, VchamberError};

/// Descriptor of what the player should load.
///
/// The shape is opaque to the engine (a provider-specific JSON object such as
/// `{"type":"video","sources":[{"src":...,"provider":"youtube"}]}`); the engine
/// only compares descriptors for equality and ferries them between the wire
/// and the player. On the wire the descriptor travels URI-encoded inside the
/// `src` string field; an empty string marks an invalid source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDescriptor(Value);

impl SourceDescriptor {
    /// Wrap a raw JSON value as a source descriptor
    pub fn new(value: Value) -> Self {
        SourceDescriptor(value)
    }

    /// Convenience constructor for a single-provider video source
    pub fn video(src: &str, provider: &str) -> Self {
        SourceDescriptor(serde_json::json!({
            "type": "video",
            "sources": [{
                "src": src,
                "provider": provider,
            }]
        }))
    }

    /// Decode a descriptor from its wire form (URI-encoded JSON).
    ///
    /// An empty string is not a descriptor; callers should treat it as
    /// "no valid source" before calling this.
    pub fn decode(encoded: &str) -> Result<Self> {
        let decoded = urlencoding::decode(encoded)
            .map_err(|e| VchamberError::Protocol(format!("source is not valid UTF-8: {}", e)))?;
        let value: Value = serde_json::from_str(&decoded)?;
        Ok(SourceDescriptor(value))
    }

    /// Encode the descriptor to its wire form (URI-encoded JSON)
    pub fn encode(&self) -> String {
        urlencoding::encode(&self.0.to_string()).into_owned()
    }

    /// Access the underlying JSON value
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
