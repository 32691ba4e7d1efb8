use crate::shared::UserId;

/// Source of the signed-in user. `None` means sync is not possible.
pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}
