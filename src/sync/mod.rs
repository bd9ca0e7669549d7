/// Pause-gesture debouncing
pub mod debounce;
/// The per-connection engine and its event loop
pub mod engine;
/// One-way latency estimation
pub mod latency;
/// State reconciliation (the protocol core)
pub mod reconciler;
/// Session role tracking
pub mod role;
/// Feedback-loop guards
pub mod suppress;

pub use engine::{run_engine, ChannelEventForwarder, EngineControl, SyncEngine};
pub use latency::{LatencyEstimator, ProbeToken};
pub use role::{Authority, SessionRole};
