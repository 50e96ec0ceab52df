// Transport seam for the live voice session.
//
// The session controller never touches the socket directly. It gets a
// narrow write handle (send one frame, close) and an ordered event stream.
// This keeps the controller testable with scripted transports and keeps
// socket details (TLS, framing, the setup handshake) in one place.

use super::messages::{RealtimeInputEnvelope, ServerMessage, SessionSetup, SetupEnvelope};
use crate::error::SessionError;
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Inbound events buffered between the socket and the session.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events delivered by an open connection, in arrival order.
///
/// `Opened` comes first; `Closed` or `Error` is last, exactly one of
/// them, and nothing follows it.
#[derive(Debug)]
pub enum TransportEvent {
    /// The session is established and ready for audio.
    Opened,
    /// A decoded server message.
    Message(ServerMessage),
    /// The far end closed the session.
    Closed,
    /// The connection failed mid-flight.
    Error(String),
}

/// Write half of an open live connection.
pub trait LiveHandle: Send + Sync {
    /// Queue one encoded audio frame without blocking.
    ///
    /// Returns false when the frame was dropped (queue full or connection
    /// closing). Loss here is deliberate: a live conversation must not
    /// stall capture to wait on a slow socket.
    fn send_frame(&self, encoded: String) -> bool;

    /// Close the connection. Safe to call more than once.
    fn close(&self);
}

/// An open live connection: write handle plus the event stream.
pub struct LiveConnection {
    pub handle: Arc<dyn LiveHandle>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens live connections.
///
/// The production implementation dials the WebSocket endpoint; tests
/// substitute scripted connectors.
#[async_trait::async_trait]
pub trait LiveConnector: Send + Sync {
    async fn open(&self, setup: SessionSetup) -> Result<LiveConnection, SessionError>;
}

/// Production connector: wss + API key, setup written on open.
pub struct WsLiveConnector {
    endpoint: String,
    api_key: String,
    outbound_capacity: usize,
}

impl WsLiveConnector {
    pub fn new(endpoint: &str, api_key: &str, outbound_capacity: usize) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            outbound_capacity,
        }
    }
}

#[async_trait::async_trait]
impl LiveConnector for WsLiveConnector {
    async fn open(&self, setup: SessionSetup) -> Result<LiveConnection, SessionError> {
        // The key travels as a query parameter; never log the full URL.
        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let (ws, _response) = connect_async(&url).await.map_err(|e| {
            SessionError::TransportOpen(format!("websocket connect failed: {e}"))
        })?;
        debug!("Live socket connected: {}", self.endpoint);

        let (mut writer, mut reader) = ws.split();

        let setup_json = serde_json::to_string(&SetupEnvelope { setup })
            .map_err(|e| SessionError::TransportOpen(format!("failed to encode setup: {e}")))?;
        writer
            .send(Message::Text(setup_json))
            .await
            .map_err(|e| SessionError::TransportOpen(format!("failed to send setup: {e}")))?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (frame_tx, mut frame_rx) = mpsc::channel::<String>(self.outbound_capacity);

        // The session counts as open once setup is on the wire.
        let _ = event_tx.send(TransportEvent::Opened).await;

        // Writer task: envelope frames and push them onto the socket.
        tokio::spawn(async move {
            while let Some(encoded) = frame_rx.recv().await {
                let envelope = RealtimeInputEnvelope::pcm_frame(encoded);
                let json = match serde_json::to_string(&envelope) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode audio frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = writer.send(Message::Text(json)).await {
                    // The reader side surfaces the failure as an event.
                    debug!("Frame write failed: {}", e);
                    break;
                }
            }
            let _ = writer.close().await;
            debug!("Live writer task stopped");
        });

        // Reader task: decode inbound messages into events.
        tokio::spawn(async move {
            while let Some(item) = reader.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        if let Some(msg) = parse_server_message(text.as_bytes()) {
                            if event_tx.send(TransportEvent::Message(msg)).await.is_err() {
                                return;
                            }
                        }
                    }
                    // The server frames its JSON as binary messages too.
                    Ok(Message::Binary(bytes)) => {
                        if let Some(msg) = parse_server_message(&bytes) {
                            if event_tx.send(TransportEvent::Message(msg)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Live socket closed by server");
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        return;
                    }
                    Ok(_) => {} // ping/pong are answered by the library
                    Err(e) => {
                        let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                        return;
                    }
                }
            }
            // Stream ended without a close frame; treat as a clean close.
            let _ = event_tx.send(TransportEvent::Closed).await;
        });

        Ok(LiveConnection {
            handle: Arc::new(WsLiveHandle {
                frame_tx: Mutex::new(Some(frame_tx)),
            }),
            events: event_rx,
        })
    }
}

/// A malformed message is dropped with a warning; the stream continues.
fn parse_server_message(payload: &[u8]) -> Option<ServerMessage> {
    match serde_json::from_slice::<ServerMessage>(payload) {
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!("Dropping undecodable server message: {}", e);
            None
        }
    }
}

struct WsLiveHandle {
    frame_tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl LiveHandle for WsLiveHandle {
    fn send_frame(&self, encoded: String) -> bool {
        let guard = self.frame_tx.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_ref() {
            Some(tx) => tx.try_send(encoded).is_ok(),
            None => false,
        }
    }

    fn close(&self) {
        // Dropping the sender ends the writer task, which closes the socket.
        let mut guard = self.frame_tx.lock().unwrap_or_else(|p| p.into_inner());
        guard.take();
    }
}
