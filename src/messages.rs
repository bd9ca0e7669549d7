//! Wire protocol messages exchanged with the vchamber server.
//!
//! Every frame is a JSON text envelope `{"type": <int>, "payload": <object>}`.
//! The payload shape depends on the integer type tag, so messages are modeled
//! as a tagged union with explicit envelope packing/unpacking rather than a
//! plain serde derive.

use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::data::PlaybackState;
use crate::error::{Result, VchamberError};

/// Message type tags as defined by the server
const TYPE_HELLO: i64 = 0;
const TYPE_PING: i64 = 1;
const TYPE_PONG: i64 = 2;
const TYPE_STATE: i64 = 3;
const TYPE_STATEUPDATE: i64 = 4;

/// Raw envelope used for a first-pass parse before the payload shape is known
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    msg_type: i64,
    payload: Value,
}

/// HELLO payload: role assignment from the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HelloPayload {
    /// "master" or "guest"
    pub authority: String,
}

/// PING payload: client-side send timestamp in epoch seconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingPayload {
    pub sendtime: f64,
}

/// PONG payload: the echoed send timestamp plus the server's processing delay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PongPayload {
    pub sendtime: f64,
    pub servicetime: f64,
}

/// STATEUPDATE payload: a state snapshot plus the sender's round-trip estimate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateUpdatePayload {
    pub rtt: f64,
    pub state: PlaybackState,
}

/// A vchamber protocol message.
///
/// HELLO, PONG and STATE arrive from the server; PING and STATEUPDATE are
/// client-to-server only. Receiving one of the latter two is a protocol
/// anomaly handled by the engine's dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello(HelloPayload),
    Ping(PingPayload),
    Pong(PongPayload),
    State(PlaybackState),
    StateUpdate(StateUpdatePayload),
}

impl Message {
    /// Integer type tag for this message
    pub fn type_tag(&self) -> i64 {
        match self {
            Message::Hello(_) => TYPE_HELLO,
            Message::Ping(_) => TYPE_PING,
            Message::Pong(_) => TYPE_PONG,
            Message::State(_) => TYPE_STATE,
            Message::StateUpdate(_) => TYPE_STATEUPDATE,
        }
    }

    /// Parse a message from its wire form.
    ///
    /// Unrecognized type tags are rejected with `UnknownMessageType`; the
    /// caller decides whether that is worth more than a log line.
    pub fn from_wire(raw: &str) -> Result<Message> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        let message = match envelope.msg_type {
            TYPE_HELLO => Message::Hello(serde_json::from_value(envelope.payload)?),
            TYPE_PING => Message::Ping(serde_json::from_value(envelope.payload)?),
            TYPE_PONG => Message::Pong(serde_json::from_value(envelope.payload)?),
            TYPE_STATE => Message::State(serde_json::from_value(envelope.payload)?),
            TYPE_STATEUPDATE => Message::StateUpdate(serde_json::from_value(envelope.payload)?),
            other => return Err(VchamberError::UnknownMessageType(other)),
        };
        Ok(message)
    }

    /// Serialize the message to its wire form
    pub fn to_wire(&self) -> Result<String> {
        let payload = match self {
            Message::Hello(p) => serde_json::to_value(p)?,
            Message::Ping(p) => serde_json::to_value(p)?,
            Message::Pong(p) => serde_json::to_value(p)?,
            Message::State(p) => serde_json::to_value(p)?,
            Message::StateUpdate(p) => serde_json::to_value(p)?,
        };
        let envelope = serde_json::json!({
            "type": self.type_tag(),
            "payload": payload,
        });
        Ok(envelope.to_string())
    }
}
