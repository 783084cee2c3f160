//! Connection session state machine
//!
//! A [`ConnectionSession`] owns one transport. It authenticates as soon as the
//! transport opens, decodes every inbound transport message into protocol
//! messages and hands them to the [`Dispatcher`], and filters outbound frames
//! through its [`SendGuard`]s.
//!
//! ```text
//! Idle --create--> Connecting --open--> Authenticating --AuthOk("ok")--> Ready
//!   any --close--> Closed        any --error--> Error
//! ```

use crate::dispatch::{Dispatcher, Handler, Handlers};
use crate::error::ConnectionError;
use crate::guard::{NotAuthenticated, SendGuard};
use crate::{LiveConnError, Result, UserHandle};
use async_trait::async_trait;
use bytes::Bytes;
use liveconn_proto::{AuthUser, FrameStreamDecoder, Message, MessageKind};
use liveconn_transport::{
    CloseInfo, Connector, ReadyState, TransportEvent, TransportEvents, TransportHandle,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Span};
use uuid::Uuid;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport yet
    Idle,
    /// Transport handshake in progress
    Connecting,
    /// Credentials sent, waiting for the acknowledgement
    Authenticating,
    /// Authenticated
    Ready,
    /// Transport closed
    Closed,
    /// Transport failed
    Error,
}

impl SessionState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }
}

/// What happened to a frame passed to [`ConnectionSession::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the transport
    Sent,
    /// Discarded because the transport is still connecting
    Dropped,
    /// Discarded by a send guard
    Vetoed,
}

/// Sets the user token on a positive acknowledgement, then forwards
struct AuthOkHandler {
    user: UserHandle,
    next: Option<Arc<dyn Handler>>,
}

#[async_trait]
impl Handler for AuthOkHandler {
    async fn handle(&self, message: Message) {
        if let Message::AuthOk(text) = &message {
            if self.user.accept_auth_ok(text) {
                info!("Authenticated as {}", self.user.name());
            } else {
                warn!("Authentication not acknowledged: {:?}", text);
            }
        }
        if let Some(next) = &self.next {
            next.handle(message).await;
        }
    }
}

/// One client connection to the server
pub struct ConnectionSession {
    /// Unique session ID
    id: Uuid,
    /// WebSocket address
    url: String,
    /// Local participant
    user: UserHandle,
    /// Current state; `Ready` is derived lazily from `Authenticating`
    state: SessionState,
    /// Transport, once created
    transport: Option<TransportHandle>,
    /// Outbound filters, consulted in order
    guards: Vec<Box<dyn SendGuard>>,
    /// Inbound message handlers
    handlers: Handlers,
    /// Splits transport messages into frames
    decoder: FrameStreamDecoder,
    /// Runs handlers, once the transport exists
    dispatcher: Option<Dispatcher>,
    /// Span all session work is recorded in
    span: Span,
}

impl ConnectionSession {
    /// Create a session for `url` acting as `user`
    pub fn new(url: impl Into<String>, user: UserHandle, mut handlers: Handlers) -> Self {
        let id = Uuid::new_v4();
        let url = url.into();
        let span = info_span!("session", %id, user = %user.name());

        let auth = AuthOkHandler {
            user: user.clone(),
            next: handlers.get(MessageKind::AuthOk),
        };
        handlers.insert(MessageKind::AuthOk, Arc::new(auth));

        Self {
            id,
            url,
            user,
            state: SessionState::Idle,
            transport: None,
            guards: Vec::new(),
            handlers,
            decoder: FrameStreamDecoder::new(),
            dispatcher: None,
            span,
        }
    }

    /// Bound every payload to its declared frame size
    pub fn with_strict_frames(mut self, strict: bool) -> Self {
        self.decoder = self.decoder.with_strict(strict);
        self
    }

    /// Unique session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// WebSocket address
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Local participant
    pub fn user(&self) -> &UserHandle {
        &self.user
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        if self.state == SessionState::Authenticating && self.user.is_authenticated() {
            SessionState::Ready
        } else {
            self.state
        }
    }

    /// Readiness of the underlying transport
    pub fn ready_state(&self) -> Option<ReadyState> {
        self.transport.as_ref().map(TransportHandle::ready_state)
    }

    /// Append a send guard
    pub fn push_guard(&mut self, guard: impl SendGuard + 'static) {
        debug!(parent: &self.span, "Adding send guard {}", guard.name());
        self.guards.push(Box::new(guard));
    }

    /// Number of installed send guards
    pub fn guard_count(&self) -> usize {
        self.guards.len()
    }

    /// Open the transport
    ///
    /// Returns the transport's events; feed them to [`handle_event`](Self::handle_event),
    /// [`wait_open`](Self::wait_open) or [`run`](Self::run).
    pub fn create(&mut self, connector: &dyn Connector) -> Result<TransportEvents> {
        let _entered = self.span.enter();

        if self.state != SessionState::Idle {
            return Err(LiveConnError::Session(format!(
                "Transport already created, session is {:?}",
                self.state
            )));
        }

        let dispatcher = Dispatcher::spawn(self.span.clone())?;

        info!("Connecting to {}", self.url);
        let (transport, events) = connector.connect(&self.url)?;

        self.dispatcher = Some(dispatcher);
        self.transport = Some(transport);
        self.state = SessionState::Connecting;
        Ok(events)
    }

    /// Drive events until the transport opens
    ///
    /// Fails with [`ConnectionError::NotOpen`] if the transport closes or
    /// fails first. There is no timeout.
    pub async fn wait_open(&mut self, events: &mut TransportEvents) -> Result<()> {
        if self.transport.is_none() {
            return Err(ConnectionError::NotCreated.into());
        }

        loop {
            match self.state {
                SessionState::Authenticating | SessionState::Ready => return Ok(()),
                SessionState::Closed | SessionState::Error => {
                    return Err(ConnectionError::NotOpen.into())
                }
                SessionState::Idle | SessionState::Connecting => {}
            }
            let event = next_event(events).await;
            self.handle_event(event);
        }
    }

    /// Drive events until the session reaches a terminal state
    pub async fn run(&mut self, events: &mut TransportEvents) -> SessionState {
        while !self.state.is_terminal() {
            let event = next_event(events).await;
            self.handle_event(event);
        }
        self.state
    }

    /// Apply one transport event and return the resulting state
    pub fn handle_event(&mut self, event: TransportEvent) -> SessionState {
        let span = self.span.clone();
        let _entered = span.enter();

        if self.state.is_terminal() {
            debug!("Session is {:?}, ignoring {:?}", self.state, event);
            return self.state;
        }

        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Message(data) => self.on_message(data),
            TransportEvent::Close(info) => self.on_close(info),
            TransportEvent::Error(reason) => self.on_error(reason),
        }
        self.state()
    }

    /// Send one encoded frame through the guards
    pub fn send(&mut self, frame: Bytes) -> std::result::Result<SendOutcome, ConnectionError> {
        let span = self.span.clone();
        let _entered = span.enter();

        let transport = self.transport.as_ref().ok_or(ConnectionError::NotCreated)?;

        match self.state {
            SessionState::Idle => return Err(ConnectionError::NotCreated),
            SessionState::Connecting => {
                debug!("Transport still connecting, dropping frame of {} bytes", frame.len());
                return Ok(SendOutcome::Dropped);
            }
            SessionState::Closed | SessionState::Error => return Err(ConnectionError::NotOpen),
            SessionState::Authenticating | SessionState::Ready => {}
        }

        match transport.ready_state() {
            ReadyState::Closing | ReadyState::Closed => return Err(ConnectionError::NotOpen),
            ReadyState::Connecting | ReadyState::Open => {}
        }

        if let Some(guard) = self.guards.iter().find(|guard| guard.should_block()) {
            debug!("Frame of {} bytes vetoed by {}", frame.len(), guard.name());
            return Ok(SendOutcome::Vetoed);
        }

        transport.send(frame).map_err(|_| ConnectionError::NotOpen)?;

        if self.state == SessionState::Authenticating && self.user.is_authenticated() {
            info!("Session ready");
            self.state = SessionState::Ready;
        }
        Ok(SendOutcome::Sent)
    }

    /// Encode and send one message through the guards
    pub fn send_message(&mut self, message: &Message) -> Result<SendOutcome> {
        let frame = message.to_frame()?;
        Ok(self.send(frame)?)
    }

    /// Request a clean close of the transport
    pub fn close(&self) -> std::result::Result<(), ConnectionError> {
        let transport = self.transport.as_ref().ok_or(ConnectionError::NotCreated)?;
        debug!(parent: &self.span, "Closing transport");
        transport.close().map_err(|_| ConnectionError::NotOpen)
    }

    /// Wait for every handler already scheduled to finish
    ///
    /// No further messages are dispatched afterwards.
    pub async fn finish(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown().await;
        }
    }

    fn on_open(&mut self) {
        if self.state != SessionState::Connecting {
            warn!("Unexpected open while {:?}", self.state);
            return;
        }

        info!("Transport open, authenticating");
        self.state = SessionState::Authenticating;

        let user = self.user.snapshot();
        let auth = Message::AuthUser(AuthUser::new(user.area, user.name));
        match auth.to_frame() {
            Ok(frame) => self.transmit(frame),
            Err(e) => error!("Failed to encode credentials: {}", e),
        }

        self.push_guard(NotAuthenticated::new(self.user.clone()));
    }

    fn on_message(&mut self, data: Bytes) {
        let Some(dispatcher) = &self.dispatcher else {
            warn!("Message before transport creation, ignoring");
            return;
        };

        let len = data.len();
        let mut scheduled = 0usize;
        for message in self.decoder.messages(data) {
            match message {
                Ok(message) => {
                    if dispatcher.dispatch(message, &self.handlers) {
                        scheduled += 1;
                    }
                }
                Err(e) => {
                    warn!("Dropping rest of {} byte transport message: {}", len, e);
                    break;
                }
            }
        }
        debug!("Scheduled {} handlers from {} bytes", scheduled, len);
    }

    fn on_close(&mut self, info: CloseInfo) {
        self.state = SessionState::Closed;

        if let Some(hook) = self.handlers.close_hook() {
            hook(&info);
        } else if info.clean {
            info!("Connection closed cleanly, code={:?} reason={:?}", info.code, info.reason);
        } else {
            warn!("Connection died");
        }
    }

    fn on_error(&mut self, reason: String) {
        self.state = SessionState::Error;

        if let Some(hook) = self.handlers.error_hook() {
            hook(&reason);
        } else {
            error!("Transport error: {}", reason);
        }
    }

    /// Send without consulting guards
    fn transmit(&self, frame: Bytes) {
        let Some(transport) = &self.transport else {
            return;
        };
        if let Err(e) = transport.send(frame) {
            error!("Failed to send credentials: {}", e);
        }
    }
}

impl fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("state", &self.state())
            .field("guards", &self.guards.len())
            .field("handlers", &self.handlers)
            .finish()
    }
}

/// Next transport event; a vanished transport reads as an unclean close
async fn next_event(events: &mut TransportEvents) -> TransportEvent {
    match events.recv().await {
        Some(event) => event,
        None => TransportEvent::Close(CloseInfo::unclean()),
    }
}
