//! WebSocket client transport.
//!
//! One duplex connection per client, tagged with the `vchamber_v1`
//! subprotocol; room id and token travel as query parameters on the
//! connection URL. Outbound frames go through an unbounded queue drained by
//! a sender task, so the engine never blocks on the socket; inbound text
//! frames are timestamped on arrival and handed to the engine's event loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{Result, VchamberError};
use crate::transport::Transport;

/// Subprotocol tag expected by the server
pub const SUBPROTOCOL: &str = "vchamber_v1";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketClient {
    /// Outgoing frame queue drained by the sender task
    tx: mpsc::UnboundedSender<WsMessage>,

    /// Cleared when the connection goes away
    open: Arc<AtomicBool>,
}

impl WebSocketClient {
    /// Connect to the server and start the sender/receiver tasks.
    ///
    /// Returns the client handle plus the stream of inbound text frames
    /// with their epoch-seconds receive timestamps. The stream ends when
    /// the connection closes; no reconnection is attempted.
    pub async fn connect(
        server_url: &str,
        room_id: &str,
        token: &str,
    ) -> Result<(Arc<WebSocketClient>, mpsc::UnboundedReceiver<String>)> {
        let mut url = Url::parse(server_url)
            .map_err(|e| VchamberError::Transport(format!("invalid server URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("rid", room_id)
            .append_pair("token", token);

        info!("Connecting to {}", url);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| VchamberError::Transport(format!("invalid request: {}", e)))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(SUBPROTOCOL),
        );

        let (ws_stream, _response) = connect_async(request)
            .await
            .map_err(|e| VchamberError::Transport(format!("failed to connect: {}", e)))?;
        info!("Connected");

        let (write, read) = ws_stream.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::sender_task(write, out_rx));
        tokio::spawn(Self::receiver_task(read, in_tx, open.clone()));

        Ok((Arc::new(Self { tx: out_tx, open }), in_rx))
    }

    /// Sender task: drains the outbound queue into the socket
    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, WsMessage>,
        mut rx: mpsc::UnboundedReceiver<WsMessage>,
    ) {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = write.send(frame).await {
                error!("failed to send WebSocket frame: {}", e);
                break;
            }
        }
        debug!("sender task terminated");
    }

    /// Receiver task: forwards inbound text frames until the connection ends
    async fn receiver_task(
        mut read: futures::stream::SplitStream<WsStream>,
        in_tx: mpsc::UnboundedSender<String>,
        open: Arc<AtomicBool>,
    ) {
        while let Some(frame_result) = read.next().await {
            match frame_result {
                Ok(WsMessage::Text(text)) => {
                    if in_tx.send(text).is_err() {
                        break;
                    }
                }
                Ok(WsMessage::Close(_)) => {
                    info!("WebSocket connection closed by server");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
        open.store(false, Ordering::SeqCst);
        debug!("receiver task terminated");
    }
}

impl Transport for WebSocketClient {
    fn send(&self, frame: &str) -> bool {
        if !self.is_ready() {
            return false;
        }
        if self.tx.send(WsMessage::Text(frame.to_string())).is_err() {
            warn!("outbound queue gone, dropping frame");
            return false;
        }
        true
    }

    fn is_ready(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            info!("closing WebSocket connection");
            let _ = self.tx.send(WsMessage::Close(None));
        }
    }
}
