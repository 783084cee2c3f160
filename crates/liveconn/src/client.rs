//! Client orchestration
//!
//! The [`Client`] ties everything together: it resolves who the local user
//! is (creating an area and joining it when needed), opens a
//! [`ConnectionSession`] and runs it while forwarding local pointer moves
//! through a [`PointerThrottle`].

use crate::error::AuthError;
use crate::{
    ClientConfig, ConnectionSession, Handlers, PointerPosition, PointerThrottle, Result,
    SessionState, User, UserHandle,
};
use liveconn_transport::{
    AreaBootstrap, CloseInfo, Connector, HttpBootstrap, IdentityStore, JsonFileStore,
    MemoryStore, TransportEvent, TransportEvents, WsConnector,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Who the local user is and where that came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Resolved user, not yet authenticated
    pub user: User,
    /// Whether the user was found in the identity store
    pub restored: bool,
}

/// Area identifier named by a page path such as `/abc` or `/abc/`
pub fn area_from_path(path: &str) -> Option<&str> {
    path.split('/').find(|segment| !segment.is_empty())
}

/// Live Connections client
pub struct Client {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    bootstrap: Arc<dyn AreaBootstrap>,
    store: Arc<dyn IdentityStore>,
}

impl Client {
    /// Create a client from its collaborators
    pub fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        bootstrap: Arc<dyn AreaBootstrap>,
        store: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            config,
            connector,
            bootstrap,
            store,
        }
    }

    /// Create a client talking WebSocket and HTTP to the configured host
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn IdentityStore> = match &config.store_path {
            Some(path) => Arc::new(JsonFileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        let bootstrap = Arc::new(HttpBootstrap::new(config.http_base()));

        Ok(Self::new(config, Arc::new(WsConnector::new()), bootstrap, store))
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Work out the local user for `area`
    ///
    /// Without an area a new one is created and joined. With an area the
    /// stored user is reused when there is one; otherwise the area is joined.
    /// Newly joined users are stored.
    pub async fn resolve_identity(&self, area: Option<&str>) -> Result<Identity> {
        let area = match area.filter(|area| !area.is_empty()) {
            Some(area) => area.to_string(),
            None => self.bootstrap.create_area().await?,
        };

        if let Some(name) = self.store.get(&area) {
            info!("Restoring {} in area {}", name, area);
            match self.bootstrap.list_users(&area).await {
                Ok(users) => info!("Users online in {}: {}", area, users),
                Err(e) => warn!("Failed to list users of {}: {}", area, e),
            }
            return Ok(Identity {
                user: User::new(area, name),
                restored: true,
            });
        }

        let name = self.bootstrap.join_area(&area).await?;
        self.store.set(&area, &name)?;
        debug!("Stored {} for area {}", name, area);

        Ok(Identity {
            user: User::new(area, name),
            restored: false,
        })
    }

    /// Open a session for `user` and wait until its transport is open
    pub async fn connect(
        &self,
        user: User,
        handlers: Handlers,
    ) -> Result<(ConnectionSession, TransportEvents)> {
        let url = self.config.socket_url();
        let mut session = ConnectionSession::new(url, UserHandle::new(user), handlers)
            .with_strict_frames(self.config.strict_frames);

        let mut events = session.create(self.connector.as_ref())?;
        session.wait_open(&mut events).await?;

        Ok((session, events))
    }

    /// Run `session` until its transport closes or fails
    ///
    /// Positions received on `pointer` are forwarded through the throttle.
    /// When an auth timeout is configured and the server has not acknowledged
    /// the credentials in time, the transport is closed and
    /// [`AuthError::Rejected`] returned.
    pub async fn run(
        &self,
        session: &mut ConnectionSession,
        events: &mut TransportEvents,
        pointer: &mut mpsc::Receiver<PointerPosition>,
    ) -> Result<SessionState> {
        let mut throttle = PointerThrottle::new(self.config.pointer_interval());
        let auth_timeout = self.config.auth_timeout();
        let auth_deadline = auth_timeout.map(|timeout| Instant::now() + timeout);
        let mut pointer_open = true;

        loop {
            let awaiting_auth = auth_deadline.is_some() && !session.user().is_authenticated();

            tokio::select! {
                event = events.recv() => {
                    let event =
                        event.unwrap_or_else(|| TransportEvent::Close(CloseInfo::unclean()));
                    if session.handle_event(event).is_terminal() {
                        break;
                    }
                }
                position = pointer.recv(), if pointer_open => match position {
                    Some(position) => match throttle.emit(session, position) {
                        Ok(outcome) => debug!("Pointer event {:?}", outcome),
                        Err(e) => warn!("Pointer event not sent: {}", e),
                    },
                    None => {
                        debug!("Pointer input ended");
                        pointer_open = false;
                    }
                },
                _ = sleep_until(auth_deadline.unwrap_or_else(Instant::now)), if awaiting_auth => {
                    if !session.user().is_authenticated() {
                        let waited = auth_timeout.unwrap_or_default();
                        warn!("No authentication acknowledgement after {:?}", waited);
                        if let Err(e) = session.close() {
                            debug!("Close after auth timeout failed: {}", e);
                        }
                        session.finish().await;
                        return Err(AuthError::Rejected { waited }.into());
                    }
                }
            }
        }

        session.finish().await;
        let state = session.state();
        info!("Session ended in {:?}", state);
        Ok(state)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish()
    }
}
