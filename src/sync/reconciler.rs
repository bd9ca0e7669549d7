//! State reconciliation between the authoritative remote state and the local
//! player.
//!
//! Inbound: a STATE broadcast is converted into the minimal set of corrective
//! player actions, each wrapped in a suppression scope so it cannot echo back
//! out. Outbound: genuine local player events are turned into STATEUPDATE
//! proposals, gated by role and filtered through the one-shot flags.

use log::{debug, info, warn};

use crate::data::{PlaybackState, PlaybackStatus, SourceDescriptor};
use crate::messages::{Message, StateUpdatePayload};
use crate::players::{PlayerCommand, PlayerController};
use crate::sync::latency::LatencyEstimator;
use crate::sync::role::SessionRole;
use crate::sync::suppress::{run_suppressed, SuppressionFlags};

pub struct StateReconciler {
    /// Lower bound on the position tolerance window in seconds; the actual
    /// window is max(smoothed latency, floor)
    tolerance_floor: f64,

    flags: SuppressionFlags,

    /// Most recently received remote state, kept even when its application
    /// was skipped or deferred
    latest_remote: Option<PlaybackState>,

    /// Cleared once the initial event burst from loading media has produced
    /// (and swallowed) one state-update proposal
    load_finished: bool,
}

impl StateReconciler {
    pub fn new(tolerance_floor: f64) -> Self {
        Self {
            tolerance_floor,
            flags: SuppressionFlags::new(),
            latest_remote: None,
            load_finished: false,
        }
    }

    pub fn stable_pause(&self) -> bool {
        self.flags.stable_pause()
    }

    pub fn set_stable_pause(&mut self, stable: bool) {
        self.flags.set_stable_pause(stable);
    }

    /// The last remote state seen, applied or not
    pub fn latest_remote(&self) -> Option<&PlaybackState> {
        self.latest_remote.as_ref()
    }

    /// Apply a STATE broadcast to the local player.
    ///
    /// Nothing here is fatal: an undecodable source or an active user scrub
    /// ends the attempt early, and the state remains remembered as the
    /// latest remote snapshot.
    pub fn apply_remote_state(
        &mut self,
        state: PlaybackState,
        player: &dyn PlayerController,
        role: &SessionRole,
        estimator: &LatencyEstimator,
    ) {
        self.latest_remote = Some(state.clone());

        if !role.follows_remote_state() {
            debug!("not following remote state, ignoring STATE broadcast");
            return;
        }

        if state.src.is_empty() {
            debug!("STATE carries no valid source, ignoring");
            return;
        }
        let remote_source = match SourceDescriptor::decode(&state.src) {
            Ok(source) => source,
            Err(e) => {
                warn!("undecodable source in STATE broadcast: {}", e);
                return;
            }
        };
        if player.get_source().as_ref() != Some(&remote_source) {
            info!("switching player source to match remote");
            run_suppressed(player, || {
                player.send_command(PlayerCommand::SetSource(remote_source));
            });
        }

        if player.is_seeking() && !self.flags.stable_pause() {
            // Don't fight an active drag; the snapshot stays remembered
            debug!("user is scrubbing, deferring remote state");
            return;
        }

        self.update_local_state(&state, player, estimator);
    }

    /// Converge the player on the remote snapshot with minimal corrective
    /// actions. Position, status and speed are reconciled independently.
    fn update_local_state(
        &mut self,
        state: &PlaybackState,
        player: &dyn PlayerController,
        estimator: &LatencyEstimator,
    ) {
        // Compensate for the time the snapshot spent in transit
        let target = state.position + estimator.smoothed();
        let tolerance = estimator.smoothed().max(self.tolerance_floor);

        if (player.get_current_time() - target).abs() > tolerance {
            debug!(
                "position off by more than {:.3}s, seeking to {:.3}",
                tolerance, target
            );
            self.flags.set_sync_seeking();
            run_suppressed(player, || {
                player.send_command(PlayerCommand::Seek(target));
            });
        }

        match state.status {
            PlaybackStatus::Stopped if !player.is_stopped() && !player.has_ended() => {
                debug!("remote is stopped, stopping");
                run_suppressed(player, || {
                    player.send_command(PlayerCommand::Stop);
                });
            }
            PlaybackStatus::Playing if !player.is_playing() => {
                debug!("remote is playing, starting playback");
                let mut accepted = true;
                run_suppressed(player, || {
                    accepted = player.send_command(PlayerCommand::Play);
                });
                if !accepted {
                    // Autoplay policy: recover on the user's first gesture
                    info!("play was rejected, waiting for first user interaction");
                    self.flags.set_awaiting_first_interaction();
                }
            }
            PlaybackStatus::Paused if !player.is_paused() => {
                debug!("remote is paused, pausing");
                run_suppressed(player, || {
                    player.send_command(PlayerCommand::Pause);
                });
                // A remote-origin pause is stable by definition
                self.flags.set_stable_pause(true);
            }
            _ => {}
        }

        if player.get_speed() != state.speed {
            debug!("adjusting speed to {}", state.speed);
            run_suppressed(player, || {
                player.send_command(PlayerCommand::SetSpeed(state.speed));
            });
        }
    }

    /// Turn a genuine local player event into an outgoing STATEUPDATE, or
    /// None when the event should not be announced.
    ///
    /// The one-shot flags are consumed before the role gate so that an echo
    /// swallowed here stays swallowed even if the role changes afterwards.
    pub fn propose_state_update(
        &mut self,
        player: &dyn PlayerController,
        role: &SessionRole,
        estimator: &LatencyEstimator,
    ) -> Option<Message> {
        if self.flags.take_sync_seeking() {
            debug!("swallowing echo of corrective seek");
            return None;
        }

        if self.flags.take_awaiting_first_interaction() {
            let remote_already_playing = self
                .latest_remote
                .as_ref()
                .map(|state| state.status == PlaybackStatus::Playing)
                .unwrap_or(false);
            if remote_already_playing {
                debug!("first interaction confirmed an already-playing state");
                return None;
            }
        }

        if !role.is_master() {
            return None;
        }
        if player.get_duration() == 0.0 {
            debug!("nothing loaded, dropping state update");
            return None;
        }
        if !self.load_finished {
            // The event burst from loading media is not a user action
            self.load_finished = true;
            info!("media load finished");
            return None;
        }

        let state = PlaybackState::from_player(player);
        debug!("proposing state change: {} at {:.3}s", state.status, state.position);
        Some(Message::StateUpdate(StateUpdatePayload {
            rtt: estimator.smoothed() * 2.0,
            state,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::SimulatedPlayer;

    fn estimator_with_smoothed(one_way: f64) -> LatencyEstimator {
        let mut est = LatencyEstimator::new(20, 11);
        for _ in 0..30 {
            est.update(0.0, 0.0, one_way * 2.0);
        }
        est
    }

    fn guest_role() -> SessionRole {
        let mut role = SessionRole::new();
        role.on_hello("guest");
        role
    }

    fn master_role() -> SessionRole {
        let mut role = SessionRole::new();
        role.on_hello("master");
        role
    }

    fn remote_state(status: PlaybackStatus, position: f64) -> PlaybackState {
        PlaybackState {
            src: SourceDescriptor::video("https://example.com/v", "youtube").encode(),
            status,
            position,
            speed: 1.0,
            duration: 300.0,
        }
    }

    #[test]
    fn guest_converges_on_remote_position() {
        let player = SimulatedPlayer::new(300.0);
        player.script_source(SourceDescriptor::video("https://example.com/v", "youtube"));
        player.script_status(PlaybackStatus::Playing);
        player.script_position(9.5);
        let est = estimator_with_smoothed(0.2);
        let mut reconciler = StateReconciler::new(0.1);

        reconciler.apply_remote_state(
            remote_state(PlaybackStatus::Playing, 10.0),
            &player,
            &guest_role(),
            &est,
        );

        // diff 0.7 > tolerance 0.2: seek to position + latency
        assert!((player.get_current_time() - 10.2).abs() < 1e-3);
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let player = SimulatedPlayer::new(300.0);
        player.script_source(SourceDescriptor::video("https://example.com/v", "youtube"));
        player.script_status(PlaybackStatus::Paused);
        player.script_position(50.0);
        let est = estimator_with_smoothed(0.2);
        let mut reconciler = StateReconciler::new(0.1);
        let state = remote_state(PlaybackStatus::Playing, 60.0);

        reconciler.apply_remote_state(state.clone(), &player, &guest_role(), &est);
        let commands_after_first = player.command_log().len();
        assert!(commands_after_first >= 1);

        // The player was scripted frozen, so its position does not drift
        player.script_status(PlaybackStatus::Playing);
        player.script_position(player.get_current_time());
        reconciler.apply_remote_state(state, &player, &guest_role(), &est);
        assert_eq!(player.command_log().len(), commands_after_first);
    }

    #[test]
    fn within_tolerance_no_seek_is_issued() {
        let player = SimulatedPlayer::new(300.0);
        player.script_source(SourceDescriptor::video("https://example.com/v", "youtube"));
        player.script_status(PlaybackStatus::Playing);
        player.script_position(10.15);
        let est = estimator_with_smoothed(0.2);
        let mut reconciler = StateReconciler::new(0.1);

        reconciler.apply_remote_state(
            remote_state(PlaybackStatus::Playing, 10.0),
            &player,
            &guest_role(),
            &est,
        );
        assert!(player.command_log().is_empty());
    }

    #[test]
    fn opted_out_guest_ignores_state() {
        let player = SimulatedPlayer::new(300.0);
        player.script_position(0.0);
        let est = estimator_with_smoothed(0.2);
        let mut reconciler = StateReconciler::new(0.1);
        let mut role = guest_role();
        role.toggle_listen();

        reconciler.apply_remote_state(
            remote_state(PlaybackStatus::Playing, 100.0),
            &player,
            &role,
            &est,
        );
        assert!(player.command_log().is_empty());
        // but the snapshot is still remembered
        assert!(reconciler.latest_remote().is_some());
    }

    #[test]
    fn empty_source_skips_application() {
        let player = SimulatedPlayer::new(300.0);
        let est = estimator_with_smoothed(0.2);
        let mut reconciler = StateReconciler::new(0.1);
        let mut state = remote_state(PlaybackStatus::Playing, 100.0);
        state.src = String::new();

        reconciler.apply_remote_state(state, &player, &guest_role(), &est);
        assert!(player.command_log().is_empty());
    }

    #[test]
    fn active_scrub_defers_application() {
        let player = SimulatedPlayer::new(300.0);
        player.script_source(SourceDescriptor::video("https://example.com/v", "youtube"));
        player.script_scrubbing(true);
        let est = estimator_with_smoothed(0.2);
        let mut reconciler = StateReconciler::new(0.1);

        let state = remote_state(PlaybackStatus::Playing, 100.0);
        reconciler.apply_remote_state(state.clone(), &player, &guest_role(), &est);
        assert!(player.command_log().is_empty());
        assert_eq!(reconciler.latest_remote(), Some(&state));
    }

    #[test]
    fn rejected_play_sets_first_interaction_recovery() {
        let player = SimulatedPlayer::new(300.0);
        player.script_source(SourceDescriptor::video("https://example.com/v", "youtube"));
        player.script_status(PlaybackStatus::Paused);
        player.script_position(10.1);
        player.script_reject_play(true);
        let est = estimator_with_smoothed(0.2);
        let mut reconciler = StateReconciler::new(0.1);

        reconciler.apply_remote_state(
            remote_state(PlaybackStatus::Playing, 10.0),
            &player,
            &guest_role(),
            &est,
        );

        // The next proposal is the confirming click and must be swallowed,
        // since the remote is already playing
        assert!(reconciler
            .propose_state_update(&player, &master_role(), &est)
            .is_none());
    }

    #[test]
    fn guest_never_proposes_updates() {
        let player = SimulatedPlayer::new(300.0);
        player.script_status(PlaybackStatus::Playing);
        let est = estimator_with_smoothed(0.2);
        let mut reconciler = StateReconciler::new(0.1);

        for _ in 0..5 {
            assert!(reconciler
                .propose_state_update(&player, &guest_role(), &est)
                .is_none());
        }
    }

    #[test]
    fn master_proposal_carries_rtt_and_state() {
        let player = SimulatedPlayer::new(300.0);
        player.script_source(SourceDescriptor::video("https://example.com/v", "youtube"));
        player.script_status(PlaybackStatus::Playing);
        player.script_position(10.0);
        let est = estimator_with_smoothed(0.2);
        let mut reconciler = StateReconciler::new(0.1);
        let role = master_role();

        // The first proposal is swallowed by the load latch
        assert!(reconciler.propose_state_update(&player, &role, &est).is_none());

        let message = reconciler
            .propose_state_update(&player, &role, &est)
            .expect("second proposal should be announced");
        match message {
            Message::StateUpdate(payload) => {
                assert!((payload.rtt - 0.4).abs() < 1e-6);
                assert_eq!(payload.state.status, PlaybackStatus::Playing);
                assert!((payload.state.position - 10.0).abs() < 1e-6);
                assert_eq!(payload.state.duration, 300.0);
            }
            other => panic!("expected STATEUPDATE, got {:?}", other),
        }
    }

    #[test]
    fn corrective_seek_echo_is_swallowed_once() {
        let player = SimulatedPlayer::new(300.0);
        player.script_source(SourceDescriptor::video("https://example.com/v", "youtube"));
        player.script_status(PlaybackStatus::Playing);
        player.script_position(50.0);
        let est = estimator_with_smoothed(0.2);
        let mut reconciler = StateReconciler::new(0.1);
        let role = master_role();

        // Burn the load latch first
        assert!(reconciler.propose_state_update(&player, &role, &est).is_none());

        reconciler.apply_remote_state(
            remote_state(PlaybackStatus::Playing, 100.0),
            &player,
            &role,
            &est,
        );
        // The echo of the corrective seek no-ops once...
        assert!(reconciler.propose_state_update(&player, &role, &est).is_none());
        // ...and only once
        assert!(reconciler.propose_state_update(&player, &role, &est).is_some());
    }
}
