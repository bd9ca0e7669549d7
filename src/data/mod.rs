// Data structures for the vchamber client engine

pub mod playback_state;
pub mod playback_status;
pub mod player_event;
pub mod source;

pub use playback_state::PlaybackState;
pub use playback_status::PlaybackStatus;
pub use player_event::PlayerEvent;
pub use source::SourceDescriptor;
