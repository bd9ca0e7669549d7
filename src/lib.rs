/// Engine configuration
pub mod config;
/// Playback state, status and source types
pub mod data;
/// Error types
pub mod error;
/// Logging setup
pub mod logging;
/// Wire protocol messages
pub mod messages;
/// Player controller abstraction and implementations
pub mod players;
/// The synchronization engine: latency estimation, roles, reconciliation
pub mod sync;
/// Transports carrying frames to and from the server
pub mod transport;
