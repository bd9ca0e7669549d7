use serde::{Serialize, Deserialize};

use crate::data::PlaybackStatus;
use crate::players::PlayerController;

/// Snapshot of a playback session.
///
/// This is a pure value type: it is produced by reading the live player
/// (outbound STATEUPDATE) or received as the payload of a STATE broadcast.
/// It carries no identity and is never kept authoritative locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackState {
    /// URI-encoded JSON source descriptor; "" means no valid source
    pub src: String,

    /// Playback status (integer on the wire)
    pub status: PlaybackStatus,

    /// Playback position in seconds
    pub position: f64,

    /// Playback speed multiplier
    pub speed: f64,

    /// Media duration in seconds; 0.0 when unknown. STATE broadcasts may
    /// omit it entirely.
    #[serde(default)]
    pub duration: f64,
}

impl PlaybackState {
    /// Derive a state snapshot from the live player.
    ///
    /// Status precedence is paused > stopped/ended > playing: a player that
    /// reports both paused and ended is Paused, not Stopped. A player
    /// matching none of the predicates reports Stopped.
    pub fn from_player(player: &dyn PlayerController) -> Self {
        let status = if player.is_paused() {
            PlaybackStatus::Paused
        } else if player.is_stopped() || player.has_ended() {
            PlaybackStatus::Stopped
        } else if player.is_playing() {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Stopped
        };

        PlaybackState {
            src: player
                .get_source()
                .map(|s| s.encode())
                .unwrap_or_default(),
            status,
            position: player.get_current_time(),
            speed: player.get_speed(),
            duration: player.get_duration(),
        }
    }
}
