use crate::domain::ports::{SessionProvider, SessionUser};
use std::sync::{Arc, RwLock};

/// A session fixed at construction, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user: Option<SessionUser>,
}

impl StaticSession {
    pub fn signed_in(user: SessionUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl SessionProvider for StaticSession {
    fn current_user(&self) -> Option<SessionUser> {
        self.user.clone()
    }
}

/// A session that can change while adapters hold it.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    user: Arc<RwLock<Option<SessionUser>>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: SessionUser) {
        tracing::info!("Signed in as {}", user.uid);
        match self.user.write() {
            Ok(mut guard) => *guard = Some(user),
            Err(poisoned) => *poisoned.into_inner() = Some(user),
        }
    }

    pub fn sign_out(&self) {
        tracing::info!("Signed out");
        match self.user.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl SessionProvider for SharedSession {
    fn current_user(&self) -> Option<SessionUser> {
        match self.user.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_session_is_visible_to_clones() {
        let session = SharedSession::new();
        let held = session.clone();
        assert!(held.current_user().is_none());

        session.sign_in(SessionUser::new("u1"));
        assert_eq!(held.current_user().map(|u| u.uid), Some("u1".to_string()));

        session.sign_out();
        assert!(held.current_user().is_none());
    }

    #[test]
    fn test_static_session() {
        assert!(StaticSession::anonymous().current_user().is_none());
        let session = StaticSession::signed_in(SessionUser::new("u2"));
        assert_eq!(session.current_user().unwrap().uid, "u2");
    }
}
