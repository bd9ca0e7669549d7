use std::sync::{Arc, Weak};

use serde::{Serialize, Deserialize};

use crate::data::{PlayerEvent, SourceDescriptor};

/// Commands that can be sent to a media player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerCommand {
    #[serde(rename = "play")]
    Play,

    #[serde(rename = "pause")]
    Pause,

    #[serde(rename = "stop")]
    Stop,

    /// Seek to an absolute position in seconds
    #[serde(rename = "seek")]
    Seek(f64),

    /// Change the playback speed multiplier
    #[serde(rename = "set_speed")]
    SetSpeed(f64),

    /// Load a different media source
    #[serde(rename = "set_source")]
    SetSource(SourceDescriptor),
}

impl std::fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerCommand::Play => write!(f, "play"),
            PlayerCommand::Pause => write!(f, "pause"),
            PlayerCommand::Stop => write!(f, "stop"),
            PlayerCommand::Seek(position) => write!(f, "seek:{}", position),
            PlayerCommand::SetSpeed(speed) => write!(f, "set_speed:{}", speed),
            PlayerCommand::SetSource(_) => write!(f, "set_source"),
        }
    }
}

/// Trait for objects that listen to player events
pub trait PlayerEventListener: Send + Sync {
    /// Called for every non-suppressed player event
    fn on_player_event(&self, event: PlayerEvent);
}

/// Abstract interface for media player implementations.
///
/// This is the capability surface the synchronization engine needs from a
/// player widget: playback commands, readable playback properties, and an
/// event listener registration. Events fired while the player is in
/// suppressed mode never reach listeners; this is the guard that keeps
/// engine-issued corrective commands from being re-reported as user actions.
pub trait PlayerController: Send + Sync {
    /// Send a command to the player.
    ///
    /// Returns `true` if the command was accepted. A rejected `Play` is the
    /// one refusal the engine cares about: it signals an autoplay policy
    /// block that needs a real user gesture to clear.
    fn send_command(&self, command: PlayerCommand) -> bool;

    /// Current playback position in seconds
    fn get_current_time(&self) -> f64;

    /// Media duration in seconds; 0.0 when nothing is loaded
    fn get_duration(&self) -> f64;

    /// Current playback speed multiplier
    fn get_speed(&self) -> f64;

    /// Currently loaded source, or None when nothing is loaded
    fn get_source(&self) -> Option<SourceDescriptor>;

    /// Whether the player is actively playing
    fn is_playing(&self) -> bool;

    /// Whether playback is paused
    fn is_paused(&self) -> bool;

    /// Whether playback is stopped
    fn is_stopped(&self) -> bool;

    /// Whether the media has played to its end
    fn has_ended(&self) -> bool;

    /// Whether a seek is currently in progress (user scrubbing included)
    fn is_seeking(&self) -> bool;

    /// Enable or disable event suppression.
    ///
    /// While suppressed, player events are not delivered to listeners.
    /// Prefer `suppress::run_suppressed` over calling this directly so the
    /// flag cannot leak past the corrective action.
    fn set_event_suppression(&self, suppressed: bool);

    /// Register an event listener to be notified of player events
    fn register_event_listener(&self, listener: Weak<dyn PlayerEventListener>) -> bool;

    /// Unregister a previously registered event listener
    fn unregister_event_listener(&self, listener: &Arc<dyn PlayerEventListener>) -> bool;
}
