use std::sync::RwLock;

use hifz_domain::session::SessionProvider;
use hifz_domain::shared::UserId;

/// Session held in process memory
#[derive(Default)]
pub struct InMemorySession {
    user: RwLock<Option<UserId>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    pub fn sign_in(&self, user: UserId) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
    }

    pub fn sign_out(&self) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl SessionProvider for InMemorySession {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let session = InMemorySession::new();
        assert!(session.current_user().is_none());

        session.sign_in(UserId::from_string("user-1"));
        assert_eq!(session.current_user(), Some(UserId::from_string("user-1")));

        session.sign_out();
        assert!(session.current_user().is_none());
    }
}
