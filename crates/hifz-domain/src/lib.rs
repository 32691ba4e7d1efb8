// Domain layer - Pure progress/streak rules
// No dependencies on infrastructure or application layers

pub mod achievements;
pub mod events;
pub mod leaderboard;
pub mod progress;
pub mod reconciliation;
pub mod remote;
pub mod session;
pub mod shared;
pub mod storage;
pub mod streak;

// Re-exports for convenience
pub use events::DomainEvent;
pub use progress::{MemorizationRecord, ProgressSnapshot};
pub use shared::{DomainError, UserId};
