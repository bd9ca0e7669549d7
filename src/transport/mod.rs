/// WebSocket client transport
pub mod websocket;

pub use websocket::WebSocketClient;

/// A message-oriented duplex channel to the server.
///
/// Sends are best-effort: `send` returning false means the frame was
/// dropped, and callers must not assume delivery.
pub trait Transport: Send + Sync {
    /// Queue a text frame for sending. Returns false if the frame was
    /// dropped (channel gone or not open).
    fn send(&self, frame: &str) -> bool;

    /// Whether the channel is currently able to accept frames
    fn is_ready(&self) -> bool;

    /// Close the channel; subsequent sends are dropped
    fn close(&self);
}

/// Transport that discards everything, useful for running an engine without
/// a server
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, _frame: &str) -> bool {
        true
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn close(&self) {}
}
