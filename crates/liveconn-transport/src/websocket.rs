//! WebSocket transport over `tokio-tungstenite`

use crate::transport::{pair, CloseInfo, Outbound, ReadyState, TransportEvent, TransportSignals};
use crate::{Connector, TransportError, TransportEvents, TransportHandle};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

/// Connector opening binary WebSocket connections
///
/// Each connection is served by one background task on the current tokio
/// runtime; `connect` must therefore be called from within a runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a new WebSocket connector
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> Result<(TransportHandle, TransportEvents), TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Connection(format!("No async runtime: {}", e)))?;

        let (handle, events, signals, outbound) = pair(url);
        runtime.spawn(pump(url.to_string(), signals, outbound));

        Ok((handle, events))
    }
}

/// Drive one WebSocket connection until it closes or fails
async fn pump(
    url: String,
    signals: TransportSignals,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    debug!("Connecting to {}", url);

    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, e);
            signals.failed(format!("Failed to connect: {}", e));
            return;
        }
    };

    info!("WebSocket connected to {}", url);
    if !signals.opened() {
        debug!("Event receiver dropped before open, abandoning connection");
        return;
    }

    let (mut write, mut read) = stream.split();
    let mut closing = false;

    loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(WsMessage::Binary(data))) => {
                    if !signals.emit(TransportEvent::Message(Bytes::from(data))) {
                        debug!("Event receiver dropped, closing connection");
                        let _ = write.send(WsMessage::Close(None)).await;
                        signals.set_state(ReadyState::Closed);
                        return;
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let info = match frame {
                        Some(frame) => {
                            CloseInfo::clean(Some(u16::from(frame.code)), frame.reason.to_string())
                        }
                        None => CloseInfo::clean(None, ""),
                    };
                    debug!("Server closed connection: {:?}", info);
                    signals.closed(info);
                    return;
                }
                Some(Ok(WsMessage::Text(text))) => {
                    warn!("Ignoring text message of {} bytes", text.len());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket read error: {}", e);
                    signals.failed(e.to_string());
                    return;
                }
                None => {
                    warn!("WebSocket stream ended without close frame");
                    signals.closed(CloseInfo::unclean());
                    return;
                }
            },
            request = outbound.recv(), if !closing => match request {
                Some(Outbound::Frame(data)) => {
                    if let Err(e) = write.send(WsMessage::Binary(data.to_vec())).await {
                        error!("Failed to send message: {}", e);
                        signals.failed(e.to_string());
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    closing = true;
                    signals.set_state(ReadyState::Closing);
                    if let Err(e) = write.send(WsMessage::Close(None)).await {
                        warn!("Failed to send close frame: {}", e);
                    }
                }
            },
        }
    }
}
