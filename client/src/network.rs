//! WebSocket transport between the session and the battle server
//!
//! The connection runs on a tokio runtime in a background thread. The
//! frame loop never touches the socket: it drains [`TransportEvent`]s and
//! pushes [`ClientMessage`]s through unbounded channels, so all game state
//! stays on one thread. Connection loss is final; nothing reconnects.

use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use shared::{encode_client_message, ClientMessage};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as Frame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Closed,
    Error(String),
}

/// Frame-loop side of a running connection.
pub struct TransportHandle {
    events: UnboundedReceiver<TransportEvent>,
    intents: UnboundedSender<ClientMessage>,
}

impl TransportHandle {
    /// Everything received since the last poll, in arrival order.
    pub fn poll(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Queues an intent. Returns false once the connection is gone.
    pub fn send(&self, message: ClientMessage) -> bool {
        self.intents.send(message).is_ok()
    }
}

/// Starts the connection on its own runtime thread.
pub fn spawn_transport(url: String) -> Result<TransportHandle, std::io::Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("transport".to_string())
        .spawn(move || runtime.block_on(run_transport(url, event_tx, intent_rx)))?;

    Ok(TransportHandle {
        events: event_rx,
        intents: intent_tx,
    })
}

/// Pumps frames both ways until either side closes.
///
/// Text frames are forwarded verbatim; decoding happens on the frame loop.
/// Dropping the intent sender closes the socket.
pub async fn run_transport(
    url: String,
    events: UnboundedSender<TransportEvent>,
    mut intents: UnboundedReceiver<ClientMessage>,
) {
    info!("Connecting to {}", url);
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, e);
            let _ = events.send(TransportEvent::Error(e.to_string()));
            return;
        }
    };

    info!("Connected to {}", url);
    let _ = events.send(TransportEvent::Opened);
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Frame::Text(text))) => {
                    if events.send(TransportEvent::Message(text)).is_err() {
                        break;
                    }
                }
                Some(Ok(Frame::Close(_))) | None => {
                    info!("Server closed the connection");
                    let _ = events.send(TransportEvent::Closed);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Connection error: {}", e);
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            },

            intent = intents.recv() => match intent {
                Some(message) => {
                    let text = match encode_client_message(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Dropping unencodable intent: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = write.send(Frame::Text(text)).await {
                        error!("Error sending intent: {}", e);
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
                None => {
                    info!("Session ended, closing connection");
                    let _ = write.send(Frame::Close(None)).await;
                    break;
                }
            },
        }
    }
}
