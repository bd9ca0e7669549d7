/// Playback status enumeration shared with the server
use serde::{Serialize, Deserialize};
use strum_macros::EnumString;

/// Status of a playback session as carried in STATE/STATEUPDATE payloads.
///
/// The wire representation is the bare integer tag, matching the server's
/// enum values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString)]
#[serde(into = "u8", try_from = "u8")]
#[strum(serialize_all = "lowercase")]
pub enum PlaybackStatus {
    /// Nothing is playing, position reset
    Stopped,
    /// Media is actively playing
    Playing,
    /// Playback is paused at the current position
    Paused,
    /// The player reported an unrecoverable media error
    Error,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        PlaybackStatus::Stopped
    }
}

impl From<PlaybackStatus> for u8 {
    fn from(status: PlaybackStatus) -> Self {
        match status {
            PlaybackStatus::Stopped => 0,
            PlaybackStatus::Playing => 1,
            PlaybackStatus::Paused => 2,
            PlaybackStatus::Error => 3,
        }
    }
}

impl TryFrom<u8> for PlaybackStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(PlaybackStatus::Stopped),
            1 => Ok(PlaybackStatus::Playing),
            2 => Ok(PlaybackStatus::Paused),
            3 => Ok(PlaybackStatus::Error),
            other => Err(format!("unknown playback status {}", other)),
        }
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Stopped => write!(f, "stopped"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Error => write!(f, "error"),
        }
    }
}
