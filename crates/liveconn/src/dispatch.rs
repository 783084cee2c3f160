//! Message handlers and deferred dispatch
//!
//! Decoded messages are never handed to their handler inline. The
//! [`Dispatcher`] queues each one on an unbounded FIFO consumed by a single
//! worker task, which runs one handler at a time and yields to the scheduler
//! between handlers. Messages from one transport message therefore reach
//! their handlers in scan order, after the decode pass has finished.

use crate::{LiveConnError, Result};
use async_trait::async_trait;
use liveconn_proto::{Message, MessageKind};
use liveconn_transport::CloseInfo;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument, Span};

/// Reacts to one kind of inbound message
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle a decoded message
    async fn handle(&self, message: Message);
}

#[async_trait]
impl<F> Handler for F
where
    F: Fn(Message) + Send + Sync,
{
    async fn handle(&self, message: Message) {
        self(message)
    }
}

/// Callback for transport closure
pub type CloseHook = Arc<dyn Fn(&CloseInfo) + Send + Sync>;

/// Callback for transport failure
pub type ErrorHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Handlers registered for a session
#[derive(Clone, Default)]
pub struct Handlers {
    by_kind: HashMap<MessageKind, Arc<dyn Handler>>,
    on_close: Option<CloseHook>,
    on_error: Option<ErrorHook>,
}

impl Handlers {
    /// Create an empty handler set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for messages of `kind`, replacing any previous one
    pub fn on(mut self, kind: MessageKind, handler: impl Handler + 'static) -> Self {
        if !kind.is_inbound() {
            warn!("Registering a handler for {}, which the server never sends", kind);
        }
        self.by_kind.insert(kind, Arc::new(handler));
        self
    }

    /// Callback for transport closure
    pub fn on_close(mut self, hook: impl Fn(&CloseInfo) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(hook));
        self
    }

    /// Callback for transport failure
    pub fn on_error(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Handler registered for `kind`
    pub fn get(&self, kind: MessageKind) -> Option<Arc<dyn Handler>> {
        self.by_kind.get(&kind).cloned()
    }

    /// Whether a handler is registered for `kind`
    pub fn contains(&self, kind: MessageKind) -> bool {
        self.by_kind.contains_key(&kind)
    }

    /// Close callback, if any
    pub fn close_hook(&self) -> Option<&CloseHook> {
        self.on_close.as_ref()
    }

    /// Error callback, if any
    pub fn error_hook(&self) -> Option<&ErrorHook> {
        self.on_error.as_ref()
    }

    pub(crate) fn insert(&mut self, kind: MessageKind, handler: Arc<dyn Handler>) {
        self.by_kind.insert(kind, handler);
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.by_kind.keys().map(|kind| kind.tag()).collect();
        kinds.sort_unstable();
        f.debug_struct("Handlers")
            .field("kinds", &kinds)
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Queued handler invocation
struct Job {
    handler: Arc<dyn Handler>,
    message: Message,
}

/// Runs handlers one at a time on a background task
pub struct Dispatcher {
    queue: mpsc::UnboundedSender<Job>,
    worker: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn the dispatch worker inside `span` on the current tokio runtime
    pub fn spawn(span: Span) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LiveConnError::Session(format!("No async runtime: {}", e)))?;

        let (queue, jobs) = mpsc::unbounded_channel();
        let worker = runtime.spawn(run_worker(jobs).instrument(span));
        Ok(Self { queue, worker })
    }

    /// Schedule `message` for its handler
    ///
    /// Returns false when no handler is registered for the message kind or the
    /// worker has stopped; the message is dropped in both cases.
    pub fn dispatch(&self, message: Message, handlers: &Handlers) -> bool {
        let kind = message.kind();
        let Some(handler) = handlers.get(kind) else {
            debug!("No handler for {}, dropping message", kind);
            return false;
        };

        if self.queue.send(Job { handler, message }).is_err() {
            warn!("Dispatcher stopped, dropping {}", kind);
            return false;
        }
        true
    }

    /// Run every queued handler, then stop the worker
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(e) = self.worker.await {
            warn!("Dispatch worker ended abnormally: {}", e);
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("running", &!self.worker.is_finished())
            .finish()
    }
}

async fn run_worker(mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(Job { handler, message }) = jobs.recv().await {
        handler.handle(message).await;
        tokio::task::yield_now().await;
    }
    debug!("Dispatch worker stopped");
}
