//! vchamber demo client.
//!
//! Connects a headless simulated player to a vchamber room and drives it from
//! simple stdin commands, so a session can be exercised (or a room kept alive)
//! without a browser.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use vchamber::config::EngineConfig;
use vchamber::data::SourceDescriptor;
use vchamber::players::{PlayerCommand, PlayerController, SimulatedPlayer};
use vchamber::sync::{run_engine, ChannelEventForwarder, EngineControl, SyncEngine};
use vchamber::transport::{Transport, WebSocketClient};

#[derive(Parser, Debug)]
#[command(name = "vchamber_client", about = "Headless vchamber playback client")]
struct Args {
    /// WebSocket URL of the vchamber server
    #[arg(long, default_value = "ws://localhost:8080/ws")]
    server: String,

    /// Room id to join
    #[arg(long)]
    room: String,

    /// Access token for the room
    #[arg(long)]
    token: String,

    /// Optional JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Media URL to pre-load into the simulated player
    #[arg(long)]
    media: Option<String>,

    /// Duration of the simulated media in seconds
    #[arg(long, default_value_t = 600.0)]
    duration: f64,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Translate one stdin line into a player command or control action
fn dispatch_line(
    line: &str,
    player: &SimulatedPlayer,
    control: &mpsc::UnboundedSender<EngineControl>,
) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("play") => {
            player.send_command(PlayerCommand::Play);
        }
        Some("pause") => {
            player.send_command(PlayerCommand::Pause);
        }
        Some("stop") => {
            player.send_command(PlayerCommand::Stop);
        }
        Some("seek") => match parts.next().and_then(|s| s.parse::<f64>().ok()) {
            Some(position) => {
                player.send_command(PlayerCommand::Seek(position));
            }
            None => warn!("usage: seek <seconds>"),
        },
        Some("speed") => match parts.next().and_then(|s| s.parse::<f64>().ok()) {
            Some(speed) => {
                player.send_command(PlayerCommand::SetSpeed(speed));
            }
            None => warn!("usage: speed <rate>"),
        },
        Some("load") => match parts.next() {
            Some(url) => {
                player.send_command(PlayerCommand::SetSource(SourceDescriptor::video(
                    url, "youtube",
                )));
            }
            None => warn!("usage: load <url>"),
        },
        Some("follow") => {
            let _ = control.send(EngineControl::ToggleListen);
        }
        Some("quit") => return false,
        Some(other) => warn!("unknown command: {}", other),
        None => {}
    }
    true
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    vchamber::logging::init(&args.log_level);

    let config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let player = Arc::new(SimulatedPlayer::new(args.duration));
    if let Some(media) = &args.media {
        player.script_source(SourceDescriptor::video(media, "youtube"));
    }

    let (transport, inbound) =
        match WebSocketClient::connect(&args.server, &args.room, &args.token).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("connection failed: {}", e);
                std::process::exit(1);
            }
        };

    let mut engine = SyncEngine::new(
        config,
        player.clone() as Arc<dyn PlayerController>,
        transport.clone() as Arc<dyn Transport>,
    );
    let (forwarder, player_events) = ChannelEventForwarder::new();
    engine.attach_listener(forwarder);

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let stdin_player = player.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        info!("commands: play pause stop seek <s> speed <r> load <url> follow quit");
        while let Ok(Some(line)) = lines.next_line().await {
            if !dispatch_line(line.trim(), &stdin_player, &control_tx) {
                break;
            }
        }
    });

    tokio::select! {
        _ = run_engine(engine, inbound, player_events, control_rx) => {
            info!("engine stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, closing connection");
            transport.close();
        }
    }
}
