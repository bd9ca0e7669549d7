use std::sync::{Arc, Weak, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use delegate::delegate;
use log::{debug, info};

use crate::data::{PlaybackStatus, PlayerEvent, SourceDescriptor};
use crate::players::base_controller::BasePlayerController;
use crate::players::player_controller::{PlayerCommand, PlayerController, PlayerEventListener};

/// Internal simulation state
struct SimState {
    status: PlaybackStatus,
    ended: bool,
    scrubbing: bool,
    /// Position at the last state change; the live position is derived from
    /// this plus the time elapsed since `anchor` while playing
    position: f64,
    anchor: Option<Instant>,
    speed: f64,
    duration: f64,
    source: Option<SourceDescriptor>,
    reject_play: bool,
}

impl SimState {
    fn current_time(&self) -> f64 {
        let time = match self.anchor {
            Some(anchor) => self.position + anchor.elapsed().as_secs_f64() * self.speed,
            None => self.position,
        };
        if self.duration > 0.0 {
            time.min(self.duration)
        } else {
            time
        }
    }

    /// Fold the elapsed play time into `position` and drop the anchor
    fn freeze(&mut self) {
        self.position = self.current_time();
        self.anchor = None;
    }
}

/// A headless, clock-driven player.
///
/// Playback position advances with wall time (scaled by speed) while playing;
/// no media is decoded. Used by the demo client binary and by tests, which
/// can additionally script the player into arbitrary states through the
/// `script_*` methods and inspect every command received via `command_log`.
pub struct SimulatedPlayer {
    /// Base controller for listener management and event suppression
    base: BasePlayerController,

    state: Arc<RwLock<SimState>>,

    /// Every command ever received, in order
    command_log: Arc<RwLock<Vec<PlayerCommand>>>,
}

impl SimulatedPlayer {
    /// Create a new simulated player for media of the given duration
    /// (0.0 = nothing loaded)
    pub fn new(duration: f64) -> Self {
        debug!("Creating new SimulatedPlayer with duration {}", duration);
        Self {
            base: BasePlayerController::new(),
            state: Arc::new(RwLock::new(SimState {
                status: PlaybackStatus::Stopped,
                ended: false,
                scrubbing: false,
                position: 0.0,
                anchor: None,
                speed: 1.0,
                duration,
                source: None,
                reject_play: false,
            })),
            command_log: Arc::new(RwLock::new(Vec::new())),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SimState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SimState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// All commands received so far, in order
    pub fn command_log(&self) -> Vec<PlayerCommand> {
        self.command_log
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Force a playback status without going through a command.
    ///
    /// The derived position stays frozen, which keeps scripted tests
    /// deterministic.
    pub fn script_status(&self, status: PlaybackStatus) {
        let mut state = self.write_state();
        state.freeze();
        state.status = status;
    }

    /// Force the ended flag
    pub fn script_ended(&self, ended: bool) {
        self.write_state().ended = ended;
    }

    /// Force the playback position
    pub fn script_position(&self, position: f64) {
        let mut state = self.write_state();
        state.anchor = None;
        state.position = position;
    }

    /// Force the playback speed
    pub fn script_speed(&self, speed: f64) {
        self.write_state().speed = speed;
    }

    /// Pretend the user is holding a scrub drag
    pub fn script_scrubbing(&self, scrubbing: bool) {
        self.write_state().scrubbing = scrubbing;
    }

    /// Make subsequent Play commands fail, as an autoplay policy would
    pub fn script_reject_play(&self, reject: bool) {
        self.write_state().reject_play = reject;
    }

    /// Load a source directly, without going through a command
    pub fn script_source(&self, source: SourceDescriptor) {
        self.write_state().source = Some(source);
    }
}

impl PlayerController for SimulatedPlayer {
    delegate! {
        to self.base {
            fn set_event_suppression(&self, suppressed: bool);
            fn register_event_listener(&self, listener: Weak<dyn PlayerEventListener>) -> bool;
            fn unregister_event_listener(&self, listener: &Arc<dyn PlayerEventListener>) -> bool;
        }
    }

    fn send_command(&self, command: PlayerCommand) -> bool {
        debug!("SimulatedPlayer: received command {}", command);
        self.command_log
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.clone());

        match command {
            PlayerCommand::Play => {
                {
                    let mut state = self.write_state();
                    if state.reject_play {
                        info!("SimulatedPlayer: play rejected (autoplay policy simulation)");
                        return false;
                    }
                    state.freeze();
                    state.status = PlaybackStatus::Playing;
                    state.ended = false;
                    state.anchor = Some(Instant::now());
                }
                self.base.notify_event(PlayerEvent::Playing);
                true
            }
            PlayerCommand::Pause => {
                {
                    let mut state = self.write_state();
                    state.freeze();
                    state.status = PlaybackStatus::Paused;
                }
                self.base.notify_event(PlayerEvent::Pause);
                true
            }
            PlayerCommand::Stop => {
                {
                    let mut state = self.write_state();
                    state.freeze();
                    state.position = 0.0;
                    state.status = PlaybackStatus::Stopped;
                    state.ended = false;
                }
                // Media widgets report a stop as a pause back at zero
                self.base.notify_event(PlayerEvent::Pause);
                true
            }
            PlayerCommand::Seek(position) => {
                {
                    let mut state = self.write_state();
                    let clamped = if state.duration > 0.0 {
                        position.clamp(0.0, state.duration)
                    } else {
                        position.max(0.0)
                    };
                    state.freeze();
                    state.position = clamped;
                    if state.status == PlaybackStatus::Playing {
                        state.anchor = Some(Instant::now());
                    }
                }
                self.base.notify_event(PlayerEvent::Seeking);
                self.base.notify_event(PlayerEvent::Seeked);
                true
            }
            PlayerCommand::SetSpeed(speed) => {
                {
                    let mut state = self.write_state();
                    state.freeze();
                    state.speed = speed;
                    if state.status == PlaybackStatus::Playing {
                        state.anchor = Some(Instant::now());
                    }
                }
                self.base.notify_event(PlayerEvent::RateChange);
                true
            }
            PlayerCommand::SetSource(source) => {
                let mut state = self.write_state();
                state.source = Some(source);
                state.position = 0.0;
                state.anchor = None;
                state.status = PlaybackStatus::Stopped;
                state.ended = false;
                true
            }
        }
    }

    fn get_current_time(&self) -> f64 {
        self.read_state().current_time()
    }

    fn get_duration(&self) -> f64 {
        self.read_state().duration
    }

    fn get_speed(&self) -> f64 {
        self.read_state().speed
    }

    fn get_source(&self) -> Option<SourceDescriptor> {
        self.read_state().source.clone()
    }

    fn is_playing(&self) -> bool {
        self.read_state().status == PlaybackStatus::Playing
    }

    fn is_paused(&self) -> bool {
        self.read_state().status == PlaybackStatus::Paused
    }

    fn is_stopped(&self) -> bool {
        self.read_state().status == PlaybackStatus::Stopped
    }

    fn has_ended(&self) -> bool {
        self.read_state().ended
    }

    fn is_seeking(&self) -> bool {
        self.read_state().scrubbing
    }
}
