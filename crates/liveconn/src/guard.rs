//! Send guards
//!
//! A guard is consulted before every outbound frame. Guards run in the order
//! they were pushed and the first one answering `true` vetoes the frame.

use crate::UserHandle;

/// Predicate that can veto outbound frames
pub trait SendGuard: Send + Sync {
    /// Whether the next frame must not be sent
    fn should_block(&self) -> bool;

    /// Name used in logs
    fn name(&self) -> &str {
        "guard"
    }
}

impl<F> SendGuard for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn should_block(&self) -> bool {
        self()
    }
}

/// Blocks everything until the user is authenticated
#[derive(Debug, Clone)]
pub struct NotAuthenticated {
    user: UserHandle,
}

impl NotAuthenticated {
    /// Guard watching `user`
    pub fn new(user: UserHandle) -> Self {
        Self { user }
    }
}

impl SendGuard for NotAuthenticated {
    fn should_block(&self) -> bool {
        !self.user.is_authenticated()
    }

    fn name(&self) -> &str {
        "not_authenticated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::User;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_not_authenticated_guard() {
        let user = UserHandle::new(User::new("abc", "u1"));
        let guard = NotAuthenticated::new(user.clone());

        assert!(guard.should_block());
        assert_eq!(guard.name(), "not_authenticated");

        user.accept_auth_ok("ok");
        assert!(!guard.should_block());
    }

    #[test]
    fn test_closure_guard() {
        let flag = Arc::new(AtomicBool::new(true));
        let observed = flag.clone();
        let guard = move || observed.load(Ordering::SeqCst);

        assert!(guard.should_block());
        assert_eq!(SendGuard::name(&guard), "guard");

        flag.store(false, Ordering::SeqCst);
        assert!(!guard.should_block());
    }
}
