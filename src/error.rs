use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, VchamberError>;

/// Errors raised by the vchamber client engine.
///
/// None of these are fatal to a running engine: protocol errors cause the
/// offending message to be dropped, transport errors cause the send to be
/// dropped. The worst case is a missed or delayed convergence.
#[derive(Error, Debug)]
pub enum VchamberError {
    /// A message violated the wire protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A message carried a type tag the protocol does not define
    #[error("unrecognized message type {0}")]
    UnknownMessageType(i64),

    /// The transport could not be established or used
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration loading or validation failed
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
