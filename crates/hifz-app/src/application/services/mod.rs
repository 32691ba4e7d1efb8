mod achievement_service;
mod config_service;
mod leaderboard_sync;
mod progress_store;
mod reconciliation_service;
mod remote_upsert;
mod streak_monitor;
mod update_distributor;

pub use achievement_service::AchievementService;
pub use config_service::{ConfigService, LogLevel};
pub use leaderboard_sync::LeaderboardSyncService;
pub use progress_store::ProgressStore;
pub use reconciliation_service::ReconciliationService;
pub use remote_upsert::{upsert_by_key, UpsertOutcome};
pub use streak_monitor::StreakMonitor;
pub use update_distributor::{
    LeaderboardCallback, Subscription, SubscriptionState, UpdateDistributor,
};
