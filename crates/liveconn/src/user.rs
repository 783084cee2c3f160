//! Local participant identity

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acknowledgement text the server sends for accepted credentials
pub const AUTH_OK: &str = "ok";

/// The local participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    /// Area the user belongs to
    pub area: String,
    /// User identifier inside the area
    pub name: String,
    /// Acknowledgement received from the server
    pub token: Option<String>,
}

impl User {
    /// Create an unauthenticated user
    pub fn new(area: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            name: name.into(),
            token: None,
        }
    }

    /// Whether area, name and token are all present
    pub fn is_authenticated(&self) -> bool {
        !self.area.is_empty()
            && !self.name.is_empty()
            && self.token.as_deref().is_some_and(|token| !token.is_empty())
    }

    /// Record the server acknowledgement; only [`AUTH_OK`] is accepted
    pub fn accept_auth_ok(&mut self, text: &str) -> bool {
        if text != AUTH_OK {
            return false;
        }
        self.token = Some(text.to_string());
        true
    }
}

/// Shared, thread-safe handle to the local [`User`]
///
/// The session, its send guard and the auth handler all observe the same
/// record through clones of this handle.
#[derive(Debug, Clone, Default)]
pub struct UserHandle {
    inner: Arc<RwLock<User>>,
}

impl UserHandle {
    /// Wrap a user
    pub fn new(user: User) -> Self {
        Self {
            inner: Arc::new(RwLock::new(user)),
        }
    }

    /// Copy of the current record
    pub fn snapshot(&self) -> User {
        self.read().clone()
    }

    /// User identifier
    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    /// Area identifier
    pub fn area(&self) -> String {
        self.read().area.clone()
    }

    /// Whether the user is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    /// Record the server acknowledgement
    pub fn accept_auth_ok(&self, text: &str) -> bool {
        self.write().accept_auth_ok(text)
    }

    fn read(&self) -> RwLockReadGuard<'_, User> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, User> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl From<User> for UserHandle {
    fn from(user: User) -> Self {
        Self::new(user)
    }
}
