//! End-to-end tests of the synchronization engine against a simulated player
//! and a recording transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use vchamber::config::EngineConfig;
use vchamber::data::{PlaybackStatus, PlayerEvent, SourceDescriptor};
use vchamber::players::{PlayerCommand, PlayerController, SimulatedPlayer};
use vchamber::sync::{run_engine, Authority, ChannelEventForwarder, SyncEngine};
use vchamber::transport::Transport;

/// Transport that records every outgoing frame and never blocks
struct RecordingTransport {
    frames: Mutex<Vec<String>>,
    ready: AtomicBool,
    closed: AtomicBool,
}

impl RecordingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            ready: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        })
    }

    fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    fn frames_of_type(&self, type_tag: i64) -> Vec<serde_json::Value> {
        self.frames()
            .iter()
            .filter_map(|frame| serde_json::from_str::<serde_json::Value>(frame).ok())
            .filter(|value| value["type"] == serde_json::json!(type_tag))
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, frame: &str) -> bool {
        self.frames.lock().unwrap().push(frame.to_string());
        true
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

const TYPE_PING: i64 = 1;
const TYPE_STATEUPDATE: i64 = 4;

fn test_source() -> SourceDescriptor {
    SourceDescriptor::video("https://example.com/v", "youtube")
}

fn make_engine(duration: f64) -> (SyncEngine, Arc<SimulatedPlayer>, Arc<RecordingTransport>) {
    let player = Arc::new(SimulatedPlayer::new(duration));
    player.script_source(test_source());
    let transport = RecordingTransport::new();
    let engine = SyncEngine::new(
        EngineConfig::default(),
        player.clone() as Arc<dyn PlayerController>,
        transport.clone() as Arc<dyn Transport>,
    );
    (engine, player, transport)
}

fn state_frame(status: PlaybackStatus, position: f64) -> String {
    serde_json::json!({
        "type": 3,
        "payload": {
            "src": test_source().encode(),
            "status": u8::from(status),
            "position": position,
            "speed": 1.0,
            "duration": 300.0,
        }
    })
    .to_string()
}

fn pong_frame(sendtime: f64, servicetime: f64) -> String {
    serde_json::json!({
        "type": 2,
        "payload": { "sendtime": sendtime, "servicetime": servicetime }
    })
    .to_string()
}

/// Feed enough PONGs with a fixed 0.2s one-way latency for the estimator's
/// smoothing to engage and converge
fn warm_latency(engine: &mut SyncEngine) {
    for _ in 0..30 {
        engine.handle_message(&pong_frame(100.0, 0.0), 100.4);
    }
}

/// Burn the one-shot media-load latch so subsequent events are announced
fn burn_load_latch(engine: &mut SyncEngine, transport: &RecordingTransport) {
    engine.handle_player_event(PlayerEvent::Playing, Instant::now());
    assert!(transport.frames_of_type(TYPE_STATEUPDATE).is_empty());
}

#[test]
fn hello_assigns_authority() {
    let (mut engine, _player, _transport) = make_engine(600.0);
    assert_eq!(engine.authority(), Authority::Unknown);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"master"}}"#, 0.0);
    assert_eq!(engine.authority(), Authority::Master);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"guest"}}"#, 0.0);
    assert_eq!(engine.authority(), Authority::Guest);
}

#[test]
fn pong_stream_converges_latency_estimate() {
    let (mut engine, _player, _transport) = make_engine(600.0);
    warm_latency(&mut engine);
    assert!((engine.estimator().smoothed() - 0.2).abs() < 1e-6);
}

#[test]
fn guest_mirrors_master_position_with_latency_compensation() {
    let (mut engine, player, _transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"guest"}}"#, 0.0);
    warm_latency(&mut engine);
    player.script_status(PlaybackStatus::Playing);
    player.script_position(42.0);

    engine.handle_message(&state_frame(PlaybackStatus::Playing, 10.0), 0.0);

    // One-way latency 0.2s: target is 10.2, tolerance 0.2, diff was large
    assert!((player.get_current_time() - 10.2).abs() < 1e-3);
    assert!(player.is_playing());
}

#[test]
fn corrective_actions_do_not_echo_out() {
    let (mut engine, player, transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"master"}}"#, 0.0);
    warm_latency(&mut engine);
    burn_load_latch(&mut engine, &transport);
    player.script_status(PlaybackStatus::Playing);
    player.script_position(42.0);

    engine.handle_message(&state_frame(PlaybackStatus::Paused, 10.0), 0.0);

    // The seek and pause the broadcast triggered were corrective, so the
    // transport must have seen no STATEUPDATE
    assert!(!player.command_log().is_empty());
    assert!(transport.frames_of_type(TYPE_STATEUPDATE).is_empty());
}

#[test]
fn master_announces_genuine_playing_event() {
    let (mut engine, player, transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"master"}}"#, 0.0);
    warm_latency(&mut engine);
    burn_load_latch(&mut engine, &transport);
    player.script_status(PlaybackStatus::Playing);
    player.script_position(10.0);

    engine.handle_player_event(PlayerEvent::Playing, Instant::now());

    let updates = transport.frames_of_type(TYPE_STATEUPDATE);
    assert_eq!(updates.len(), 1);
    let payload = &updates[0]["payload"];
    assert_eq!(payload["state"]["status"], serde_json::json!(1));
    assert!((payload["state"]["position"].as_f64().unwrap() - 10.0).abs() < 1e-6);
    // rtt is twice the smoothed one-way estimate
    assert!((payload["rtt"].as_f64().unwrap() - 0.4).abs() < 1e-6);
}

#[test]
fn bouncy_pause_is_never_announced() {
    let (mut engine, player, transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"master"}}"#, 0.0);
    burn_load_latch(&mut engine, &transport);
    player.script_status(PlaybackStatus::Playing);

    let t0 = Instant::now();
    engine.handle_player_event(PlayerEvent::Pause, t0);
    // A play arrives well inside the 10ms window
    engine.handle_player_event(PlayerEvent::Play, t0 + Duration::from_millis(5));
    assert!(engine.pause_timer_deadline().is_none());

    // Even a late timer check announces nothing
    engine.on_pause_timer(t0 + Duration::from_millis(50));
    assert!(transport.frames_of_type(TYPE_STATEUPDATE).is_empty());
}

#[test]
fn stable_pause_is_announced_exactly_once() {
    let (mut engine, player, transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"master"}}"#, 0.0);
    burn_load_latch(&mut engine, &transport);
    player.script_status(PlaybackStatus::Paused);
    player.script_position(33.0);

    let t0 = Instant::now();
    engine.handle_player_event(PlayerEvent::Pause, t0);
    assert!(engine.pause_timer_deadline().is_some());

    engine.on_pause_timer(t0 + Duration::from_millis(10));
    let updates = transport.frames_of_type(TYPE_STATEUPDATE);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["payload"]["state"]["status"], serde_json::json!(2));

    // The resolved window does not fire again
    engine.on_pause_timer(t0 + Duration::from_millis(50));
    assert_eq!(transport.frames_of_type(TYPE_STATEUPDATE).len(), 1);
}

#[test]
fn seek_while_stably_paused_is_announced() {
    let (mut engine, player, transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"master"}}"#, 0.0);
    burn_load_latch(&mut engine, &transport);
    player.script_status(PlaybackStatus::Paused);

    // Establish the stable pause first
    let t0 = Instant::now();
    engine.handle_player_event(PlayerEvent::Pause, t0);
    engine.on_pause_timer(t0 + Duration::from_millis(10));
    assert_eq!(transport.frames_of_type(TYPE_STATEUPDATE).len(), 1);

    // A scrub while stably paused is a state-worthy action
    player.script_position(120.0);
    engine.handle_player_event(PlayerEvent::Seeking, Instant::now());
    let updates = transport.frames_of_type(TYPE_STATEUPDATE);
    assert_eq!(updates.len(), 2);
    assert!((updates[1]["payload"]["state"]["position"].as_f64().unwrap() - 120.0).abs() < 1e-6);
}

#[test]
fn seek_during_active_playback_is_not_announced() {
    let (mut engine, player, transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"master"}}"#, 0.0);
    burn_load_latch(&mut engine, &transport);
    player.script_status(PlaybackStatus::Playing);

    engine.handle_player_event(PlayerEvent::Seeking, Instant::now());
    assert!(transport.frames_of_type(TYPE_STATEUPDATE).is_empty());
}

#[test]
fn probe_tick_sends_ping() {
    let (mut engine, _player, transport) = make_engine(600.0);
    engine.on_probe_tick(123.5);

    let pings = transport.frames_of_type(TYPE_PING);
    assert_eq!(pings.len(), 1);
    assert!((pings[0]["payload"]["sendtime"].as_f64().unwrap() - 123.5).abs() < 1e-9);
}

#[test]
fn guests_probe_but_never_announce_state() {
    let (mut engine, player, transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"guest"}}"#, 0.0);
    player.script_status(PlaybackStatus::Playing);

    engine.on_probe_tick(1.0);
    engine.handle_player_event(PlayerEvent::Playing, Instant::now());
    engine.handle_player_event(PlayerEvent::RateChange, Instant::now());
    engine.on_probe_tick(2.0);

    assert_eq!(transport.frames_of_type(TYPE_PING).len(), 2);
    assert!(transport.frames_of_type(TYPE_STATEUPDATE).is_empty());
}

#[test]
fn malformed_and_anomalous_frames_are_dropped() {
    let (mut engine, player, transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"guest"}}"#, 0.0);

    engine.handle_message("definitely not json", 0.0);
    engine.handle_message(r#"{"type":99,"payload":{}}"#, 0.0);
    // PING and STATEUPDATE travel client-to-server only
    engine.handle_message(r#"{"type":1,"payload":{"sendtime":1.0}}"#, 0.0);
    engine.handle_message(
        r#"{"type":4,"payload":{"rtt":0.1,"state":{"src":"","status":1,"position":0.0,"speed":1.0}}}"#,
        0.0,
    );

    assert!(player.command_log().is_empty());
    assert!(transport.frames().is_empty());
    assert_eq!(engine.authority(), Authority::Guest);
}

#[test]
fn opted_out_guest_stops_mirroring() {
    let (mut engine, player, _transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"guest"}}"#, 0.0);
    warm_latency(&mut engine);
    engine.toggle_listen();

    engine.handle_message(&state_frame(PlaybackStatus::Playing, 200.0), 0.0);
    assert!(player.command_log().is_empty());

    // Toggling back on, the next broadcast is applied again
    engine.toggle_listen();
    engine.handle_message(&state_frame(PlaybackStatus::Playing, 200.0), 0.0);
    assert!(!player.command_log().is_empty());
    assert!((player.get_current_time() - 200.2).abs() < 1e-3);
}

#[test]
fn frames_to_closed_transport_are_dropped_without_waiting() {
    let (mut engine, _player, transport) = make_engine(600.0);
    transport.set_ready(false);

    let started = Instant::now();
    engine.on_probe_tick(1.0);
    // The frame is dropped immediately, not spun on
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(transport.frames().is_empty());

    transport.set_ready(true);
    engine.on_probe_tick(2.0);
    assert_eq!(transport.frames_of_type(TYPE_PING).len(), 1);
}

#[test]
fn shutdown_detaches_listener_and_closes_transport() {
    let (mut engine, player, transport) = make_engine(600.0);
    let (forwarder, mut events) = ChannelEventForwarder::new();
    engine.attach_listener(forwarder);

    player.send_command(PlayerCommand::Play);
    assert_eq!(events.try_recv().unwrap(), PlayerEvent::Playing);

    engine.shutdown();
    assert!(transport.closed());

    // Later player activity no longer reaches the forwarder
    player.send_command(PlayerCommand::Pause);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn engine_loop_shuts_down_when_transport_ends() {
    let (engine, _player, transport) = make_engine(600.0);
    let (in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();
    let (_event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    let (_control_tx, control_rx) = tokio::sync::mpsc::unbounded_channel();

    in_tx
        .send(r#"{"type":0,"payload":{"authority":"guest"}}"#.to_string())
        .unwrap();
    drop(in_tx);

    // The loop drains the pending frame, sees the closed stream and stops
    run_engine(engine, in_rx, event_rx, control_rx).await;
    assert!(transport.closed());
}

#[test]
fn repeated_broadcasts_are_idempotent() {
    let (mut engine, player, _transport) = make_engine(600.0);
    engine.handle_message(r#"{"type":0,"payload":{"authority":"guest"}}"#, 0.0);
    warm_latency(&mut engine);

    engine.handle_message(&state_frame(PlaybackStatus::Paused, 10.0), 0.0);
    let commands = player.command_log().len();
    assert!(commands >= 1);

    engine.handle_message(&state_frame(PlaybackStatus::Paused, 10.0), 0.0);
    assert_eq!(player.command_log().len(), commands);
}
