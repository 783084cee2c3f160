//! Transport abstraction for message-oriented sockets
//!
//! A [`Connector`] behaves like a browser `WebSocket` constructor: it returns
//! straight away with a handle in [`ReadyState::Connecting`] and reports
//! everything that happens afterwards as [`TransportEvent`]s.

use crate::TransportError;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};

/// Lifecycle of the underlying socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Handshake in progress
    Connecting,
    /// Messages can flow both ways
    Open,
    /// Local close requested, waiting for the peer
    Closing,
    /// Socket is gone
    Closed,
}

/// How the transport closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Whether the close handshake completed
    pub clean: bool,
    /// Close code sent by the peer, if any
    pub code: Option<u16>,
    /// Close reason sent by the peer
    pub reason: String,
}

impl CloseInfo {
    /// Close after a completed handshake
    pub fn clean(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            clean: true,
            code,
            reason: reason.into(),
        }
    }

    /// Connection dropped without a close handshake
    pub fn unclean() -> Self {
        Self {
            clean: false,
            code: None,
            reason: String::new(),
        }
    }
}

/// Something that happened on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake finished
    Open,
    /// One inbound binary message, possibly holding several frames
    Message(Bytes),
    /// Transport closed
    Close(CloseInfo),
    /// Transport failed
    Error(String),
}

/// Receiving side of a transport's events
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Requests from the handle to the transport driver
#[derive(Debug)]
pub(crate) enum Outbound {
    /// Binary message to transmit
    Frame(Bytes),
    /// Start the close handshake
    Close,
}

/// Opens transports
pub trait Connector: Send + Sync {
    /// Start connecting to `url`
    ///
    /// Returns before the connection is established; watch the events for
    /// [`TransportEvent::Open`].
    fn connect(&self, url: &str) -> Result<(TransportHandle, TransportEvents), TransportError>;
}

/// Outbound side of an open transport
#[derive(Debug)]
pub struct TransportHandle {
    /// Address the transport was opened with
    url: String,
    /// Requests to the driver
    outbound: mpsc::UnboundedSender<Outbound>,
    /// Current socket state, published by the driver
    ready: watch::Receiver<ReadyState>,
}

impl TransportHandle {
    /// Address the transport was opened with
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current socket state
    pub fn ready_state(&self) -> ReadyState {
        *self.ready.borrow()
    }

    /// Queue one binary message for transmission
    pub fn send(&self, data: Bytes) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Frame(data))
            .map_err(|_| TransportError::Closed)
    }

    /// Request a clean close
    pub fn close(&self) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Close)
            .map_err(|_| TransportError::Closed)
    }
}

/// State and event publishing half owned by a transport driver
#[derive(Debug)]
pub(crate) struct TransportSignals {
    ready: watch::Sender<ReadyState>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportSignals {
    pub(crate) fn set_state(&self, state: ReadyState) {
        self.ready.send_replace(state);
    }

    /// Publish an event; false once nobody is listening anymore
    pub(crate) fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub(crate) fn opened(&self) -> bool {
        self.set_state(ReadyState::Open);
        self.emit(TransportEvent::Open)
    }

    pub(crate) fn closed(&self, info: CloseInfo) {
        self.set_state(ReadyState::Closed);
        self.emit(TransportEvent::Close(info));
    }

    pub(crate) fn failed(&self, reason: impl Into<String>) {
        self.set_state(ReadyState::Closed);
        self.emit(TransportEvent::Error(reason.into()));
    }
}

/// Wire up a handle, its event receiver and the driver-side halves
pub(crate) fn pair(
    url: &str,
) -> (
    TransportHandle,
    TransportEvents,
    TransportSignals,
    mpsc::UnboundedReceiver<Outbound>,
) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = watch::channel(ReadyState::Connecting);

    let handle = TransportHandle {
        url: url.to_string(),
        outbound: outbound_tx,
        ready: ready_rx,
    };
    let signals = TransportSignals {
        ready: ready_tx,
        events: events_tx,
    };

    (handle, events_rx, signals, outbound_rx)
}
