//! In-memory transport
//!
//! [`LoopbackConnector`] hands out a [`LoopbackPeer`] for every connection it
//! opens. The peer plays the server: it opens the connection, delivers inbound
//! messages, observes outbound frames and closes or fails the transport.

use crate::transport::{pair, CloseInfo, Outbound, ReadyState, TransportEvent, TransportSignals};
use crate::{Connector, TransportError, TransportEvents, TransportHandle};
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

/// Close code used when the peer completes a locally requested close
pub const NORMAL_CLOSURE: u16 = 1000;

/// Connector backed by in-memory channels
#[derive(Debug)]
pub struct LoopbackConnector {
    peers: mpsc::UnboundedSender<LoopbackPeer>,
}

impl LoopbackConnector {
    /// Create a connector and the receiver its peers are delivered to
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LoopbackPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        (Self { peers }, peers_rx)
    }
}

impl Connector for LoopbackConnector {
    fn connect(&self, url: &str) -> Result<(TransportHandle, TransportEvents), TransportError> {
        let (handle, events, signals, outbound) = pair(url);
        let peer = LoopbackPeer {
            url: url.to_string(),
            signals,
            outbound,
        };

        self.peers
            .send(peer)
            .map_err(|_| TransportError::Connection("Loopback peer receiver dropped".to_string()))?;

        Ok((handle, events))
    }
}

/// Server side of one loopback connection
#[derive(Debug)]
pub struct LoopbackPeer {
    url: String,
    signals: TransportSignals,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl LoopbackPeer {
    /// Address the client connected to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Finish the handshake
    pub fn open(&self) {
        self.signals.opened();
    }

    /// Deliver one inbound transport message
    pub fn deliver(&self, data: impl Into<Bytes>) {
        self.signals.emit(TransportEvent::Message(data.into()));
    }

    /// Close the transport from the server side
    pub fn close(&self, info: CloseInfo) {
        self.signals.closed(info);
    }

    /// Fail the transport
    pub fn fail(&self, reason: impl Into<String>) {
        self.signals.failed(reason);
    }

    /// Wait for the next frame the client transmits
    ///
    /// A close request from the client is answered with a clean close and
    /// ends the sequence.
    pub async fn next_sent(&mut self) -> Option<Bytes> {
        let request = self.outbound.recv().await;
        self.answer(request)
    }

    /// Take the next transmitted frame if one is already queued
    pub fn try_next_sent(&mut self) -> Option<Bytes> {
        let request = self.outbound.try_recv().ok();
        self.answer(request)
    }

    fn answer(&self, request: Option<Outbound>) -> Option<Bytes> {
        match request? {
            Outbound::Frame(data) => Some(data),
            Outbound::Close => {
                debug!("Loopback peer acknowledging close");
                self.signals.set_state(ReadyState::Closing);
                self.signals.closed(CloseInfo::clean(Some(NORMAL_CLOSURE), ""));
                None
            }
        }
    }
}
