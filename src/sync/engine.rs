//! The per-connection synchronization engine.
//!
//! One engine instance owns all mutable synchronization state for one client
//! connection: latency estimate, session role, suppression flags, debouncer
//! and the reconciler. All entry points run on one logical actor (the
//! connection's event loop), so no handler ever races another.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info, trace, warn};
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::data::PlayerEvent;
use crate::messages::{Message, PingPayload};
use crate::players::{PlayerController, PlayerEventListener};
use crate::sync::debounce::PauseSeekDebouncer;
use crate::sync::latency::{LatencyEstimator, ProbeToken};
use crate::sync::reconciler::StateReconciler;
use crate::sync::role::{Authority, SessionRole};
use crate::transport::Transport;

/// Current wall-clock time in epoch seconds, as used in PING timestamps
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Control actions a user (or embedding UI) can ask of a running engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineControl {
    /// Guest-only: toggle whether broadcast state is applied locally
    ToggleListen,
}

pub struct SyncEngine {
    config: EngineConfig,
    player: Arc<dyn PlayerController>,
    transport: Arc<dyn Transport>,
    role: SessionRole,
    estimator: LatencyEstimator,
    debouncer: PauseSeekDebouncer,
    reconciler: StateReconciler,

    /// Listener attached via `attach_listener`, unregistered on shutdown
    forwarder: Option<Arc<dyn PlayerEventListener>>,
}

impl SyncEngine {
    pub fn new(
        config: EngineConfig,
        player: Arc<dyn PlayerController>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let estimator = LatencyEstimator::new(config.latency_window, config.min_latency_samples);
        let debouncer = PauseSeekDebouncer::new(config.bouncy_pause_threshold());
        let reconciler = StateReconciler::new(config.position_tolerance_floor);
        Self {
            config,
            player,
            transport,
            role: SessionRole::new(),
            estimator,
            debouncer,
            reconciler,
            forwarder: None,
        }
    }

    /// Register a player-event listener whose lifetime is tied to this
    /// engine; `shutdown` detaches it again
    pub fn attach_listener(&mut self, listener: Arc<dyn PlayerEventListener>) {
        self.player.register_event_listener(Arc::downgrade(&listener));
        self.forwarder = Some(listener);
    }

    pub fn authority(&self) -> Authority {
        self.role.authority()
    }

    pub fn estimator(&self) -> &LatencyEstimator {
        &self.estimator
    }

    /// Guest-only opt-out from following broadcast state
    pub fn toggle_listen(&mut self) {
        self.role.toggle_listen();
    }

    /// Handle one raw frame from the transport.
    ///
    /// `receive_time` is the epoch-seconds timestamp taken when the frame
    /// arrived; it anchors latency measurement for PONGs. Malformed frames
    /// and unknown type tags are dropped with a log line, never an error.
    pub fn handle_message(&mut self, raw: &str, receive_time: f64) {
        let message = match Message::from_wire(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("dropping malformed message: {}", e);
                return;
            }
        };

        match message {
            Message::Hello(hello) => {
                info!("HELLO received, authority: {}", hello.authority);
                self.role.on_hello(&hello.authority);
            }
            Message::Pong(pong) => {
                let token = ProbeToken::new(pong.sendtime);
                self.estimator
                    .complete(token, pong.servicetime, receive_time);
            }
            Message::State(state) => {
                trace!("STATE received: {} at {:.3}s", state.status, state.position);
                self.reconciler.apply_remote_state(
                    state,
                    self.player.as_ref(),
                    &self.role,
                    &self.estimator,
                );
            }
            Message::Ping(_) | Message::StateUpdate(_) => {
                // These travel client-to-server only
                warn!(
                    "protocol anomaly: received client-to-server message type {}",
                    message.type_tag()
                );
            }
        }
    }

    /// Handle one genuine (non-suppressed) player event
    pub fn handle_player_event(&mut self, event: PlayerEvent, now: Instant) {
        trace!("player event: {}", event);
        match event {
            PlayerEvent::Pause => {
                self.debouncer.on_pause(now);
            }
            PlayerEvent::Play => {
                if self.debouncer.cancel_pending() {
                    debug!("bouncy pause cancelled by play");
                }
            }
            PlayerEvent::Playing => {
                self.reconciler.set_stable_pause(false);
                self.propagate();
            }
            PlayerEvent::Seeking => {
                self.debouncer.cancel_pending();
                if self.reconciler.stable_pause() {
                    // Scrubbing while paused is a state-worthy action
                    self.propagate();
                } else {
                    debug!("scrub during active playback, not propagating");
                }
            }
            PlayerEvent::Seeked => {
                // The settling play/pause/seek-while-paused paths cover this
            }
            PlayerEvent::RateChange | PlayerEvent::Ended => {
                self.propagate();
            }
        }
    }

    /// Fire a latency probe; `now` is the epoch-seconds send timestamp
    pub fn on_probe_tick(&mut self, now: f64) {
        let token = self.estimator.probe(now);
        self.send(&Message::Ping(PingPayload {
            sendtime: token.send_time(),
        }));
    }

    /// Resolve the bouncy-pause window if it is due
    pub fn on_pause_timer(&mut self, now: Instant) {
        if self.debouncer.fire_if_due(now) {
            debug!("pause survived the debounce window, treating as stable");
            self.reconciler.set_stable_pause(true);
            self.propagate();
        }
    }

    /// Deadline of the pending bouncy-pause window, if one is armed
    pub fn pause_timer_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Stop the engine: detach the player-event listener and close the
    /// transport, so nothing propagates in either direction afterwards
    pub fn shutdown(&self) {
        info!("shutting down synchronization engine");
        if let Some(listener) = &self.forwarder {
            self.player.unregister_event_listener(listener);
        }
        self.transport.close();
    }

    fn propagate(&mut self) {
        if let Some(message) =
            self.reconciler
                .propose_state_update(self.player.as_ref(), &self.role, &self.estimator)
        {
            self.send(&message);
        }
    }

    /// Best-effort send. The transport already queues outbound frames, so a
    /// not-ready transport means the connection is gone and the frame is
    /// dropped immediately rather than waited on.
    fn send(&self, message: &Message) {
        let frame = match message.to_wire() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("failed to serialize outgoing message: {}", e);
                return;
            }
        };

        if !self.transport.is_ready() {
            warn!(
                "transport not ready, dropping message type {}",
                message.type_tag()
            );
            return;
        }
        if !self.transport.send(&frame) {
            warn!("transport refused message type {}", message.type_tag());
        }
    }
}

/// Listener that forwards player events into a channel consumed by the
/// engine's event loop
pub struct ChannelEventForwarder {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl ChannelEventForwarder {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl PlayerEventListener for ChannelEventForwarder {
    fn on_player_event(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
        }
        None => std::future::pending().await,
    }
}

/// Drive an engine from its inbound frame stream, player events, control
/// commands and the two timer sources (probe ticker, bouncy-pause timer).
///
/// Returns when the transport's inbound stream ends.
pub async fn run_engine(
    mut engine: SyncEngine,
    mut inbound: mpsc::UnboundedReceiver<String>,
    mut player_events: mpsc::UnboundedReceiver<PlayerEvent>,
    mut control: mpsc::UnboundedReceiver<EngineControl>,
) {
    let mut probe_ticker = tokio::time::interval(engine.config.ping_interval());
    let mut events_open = true;
    let mut control_open = true;

    loop {
        let pause_deadline = engine.pause_timer_deadline();
        tokio::select! {
            _ = probe_ticker.tick() => {
                engine.on_probe_tick(epoch_seconds());
            }
            maybe_frame = inbound.recv() => match maybe_frame {
                Some(frame) => engine.handle_message(&frame, epoch_seconds()),
                None => {
                    info!("transport closed, stopping engine");
                    break;
                }
            },
            maybe_event = player_events.recv(), if events_open => match maybe_event {
                Some(event) => engine.handle_player_event(event, Instant::now()),
                None => events_open = false,
            },
            maybe_control = control.recv(), if control_open => match maybe_control {
                Some(EngineControl::ToggleListen) => engine.toggle_listen(),
                None => control_open = false,
            },
            _ = sleep_until_deadline(pause_deadline), if pause_deadline.is_some() => {
                engine.on_pause_timer(Instant::now());
            }
        }
    }

    engine.shutdown();
}
