use serde::{Serialize, Deserialize};

/// Events emitted by a player as playback progresses or the user interacts
/// with the controls.
///
/// These mirror the media widget's event set; the synchronization engine is
/// the primary consumer and decides which of them represent genuine state
/// changes worth announcing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerEvent {
    /// Playback was requested (may still be buffering)
    Play,
    /// Playback has actually started
    Playing,
    /// Playback was paused
    Pause,
    /// A seek has started
    Seeking,
    /// A seek has completed
    Seeked,
    /// The playback speed changed
    RateChange,
    /// The media played to its end
    Ended,
}

impl std::fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerEvent::Play => write!(f, "play"),
            PlayerEvent::Playing => write!(f, "playing"),
            PlayerEvent::Pause => write!(f, "pause"),
            PlayerEvent::Seeking => write!(f, "seeking"),
            PlayerEvent::Seeked => write!(f, "seeked"),
            PlayerEvent::RateChange => write!(f, "ratechange"),
            PlayerEvent::Ended => write!(f, "ended"),
        }
    }
}
