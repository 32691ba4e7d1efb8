use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::application::services::{
    AchievementService, LeaderboardSyncService, ProgressStore, ReconciliationService,
    StreakMonitor, Subscription, UpdateDistributor,
};
use hifz_domain::events::EventBus;
use hifz_domain::leaderboard::{LeaderboardMetric, LeaderboardRow};
use hifz_domain::progress::{CounterUpdate, MemorizationRecord, ProgressSnapshot, TimeWindow};
use hifz_domain::remote::{ChangeFeed, RemoteTable};
use hifz_domain::session::SessionProvider;
use hifz_domain::shared::{Clock, DomainError, UserId};
use hifz_domain::storage::KeyValueStore;
use hifz_domain::streak::{StreakChange, StreakState};
use hifz_infrastructure::config::SyncConfig;

/// Collaborators the engine is built from
pub struct EngineDeps {
    pub storage: Arc<dyn KeyValueStore>,
    pub remote: Arc<dyn RemoteTable>,
    pub feed: Arc<dyn ChangeFeed>,
    pub session: Arc<dyn SessionProvider>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: Arc<dyn EventBus>,
    pub config: SyncConfig,
}

pub struct Services {
    pub store: Arc<ProgressStore>,
    pub streak_monitor: Arc<StreakMonitor>,
    pub leaderboard: Arc<LeaderboardSyncService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub achievements: Arc<AchievementService>,
    pub distributor: Arc<UpdateDistributor>,
}

/// Entry point for the UI: local counters, sync and the leaderboard
pub struct ProgressEngine {
    services: Services,
    session: Arc<dyn SessionProvider>,
    config: SyncConfig,
}

impl ProgressEngine {
    pub fn new(deps: EngineDeps) -> Self {
        let store = Arc::new(ProgressStore::new(
            deps.storage,
            deps.clock,
            deps.event_bus.clone(),
        ));
        let streak_monitor = Arc::new(StreakMonitor::new(store.clone()));
        let leaderboard = Arc::new(LeaderboardSyncService::new(
            deps.remote.clone(),
            store.clone(),
            deps.session.clone(),
        ));
        let reconciliation = Arc::new(ReconciliationService::new(
            deps.remote.clone(),
            store.clone(),
            deps.session.clone(),
            leaderboard.clone(),
        ));
        let achievements = Arc::new(AchievementService::new(
            deps.remote,
            store.clone(),
            deps.session.clone(),
            deps.event_bus,
        ));
        let distributor = Arc::new(UpdateDistributor::new(
            leaderboard.clone(),
            deps.feed,
            &deps.config,
        ));

        Self {
            services: Services {
                store,
                streak_monitor,
                leaderboard,
                reconciliation,
                achievements,
                distributor,
            },
            session: deps.session,
            config: deps.config,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Load local state, run the daily streak check and, when signed in,
    /// reconcile with the remote copy. Remote failures are logged only.
    #[instrument(skip(self))]
    pub async fn init(&self) -> ProgressSnapshot {
        let snapshot = self.services.store.load().await;
        info!(
            "✓ Local progress loaded: {} units, streak {}",
            snapshot.total_units, snapshot.streak
        );

        if let Err(e) = self.foreground().await {
            warn!("Streak check failed: {}", e);
        }

        if self.session.current_user().is_some() {
            if let Err(e) = self.services.reconciliation.reconcile().await {
                warn!("Initial sync failed, continuing offline: {}", e);
            }
        }

        self.services.store.load().await
    }

    pub fn shutdown(&self) {
        self.services.distributor.shutdown();
        info!("Progress engine stopped");
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        self.services.store.load().await
    }

    pub async fn add_units(&self, amount: u64) -> Result<CounterUpdate, DomainError> {
        self.services.store.add_units(amount).await
    }

    pub async fn mark_item_complete(
        &self,
        unit: &str,
        index: u32,
    ) -> Result<MemorizationRecord, DomainError> {
        self.services.store.mark_item_complete(unit, index).await
    }

    pub async fn reset_all(&self, include_secondary: bool) -> Result<(), DomainError> {
        self.services.store.reset_all(include_secondary).await
    }

    /// Call when the app returns to the foreground
    pub async fn foreground(&self) -> Result<StreakChange, DomainError> {
        self.services.streak_monitor.on_foreground().await
    }

    pub async fn streak_state(&self) -> StreakState {
        let snapshot = self.services.store.load().await;
        snapshot.streak_state(self.services.store.today())
    }

    /// Reconcile with the remote copy, then award achievements. Achievement
    /// failures do not fail the sync.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<ProgressSnapshot, DomainError> {
        let merged = self.services.reconciliation.reconcile().await?;

        match self.services.achievements.check().await {
            Ok(awarded) if !awarded.is_empty() => {
                info!("{} new achievement(s): {}", awarded.len(), awarded.join(", "))
            }
            Ok(_) => {}
            Err(e) => warn!("Achievement check failed: {}", e),
        }

        Ok(merged)
    }

    pub async fn leaderboard(
        &self,
        metric: LeaderboardMetric,
        limit: usize,
    ) -> Result<Vec<LeaderboardRow>, DomainError> {
        self.services.leaderboard.leaderboard(metric, limit).await
    }

    pub async fn rank(
        &self,
        user_id: &UserId,
        metric: LeaderboardMetric,
    ) -> Result<Option<u32>, DomainError> {
        self.services.leaderboard.rank(user_id, metric).await
    }

    /// Rank of the signed-in user
    pub async fn my_rank(&self, metric: LeaderboardMetric) -> Result<Option<u32>, DomainError> {
        let user_id = self.session.current_user().ok_or(DomainError::AuthRequired)?;
        self.rank(&user_id, metric).await
    }

    pub async fn time_windowed_units(&self, window: TimeWindow) -> u64 {
        self.services.leaderboard.time_windowed_units(window).await
    }

    /// See [`UpdateDistributor::subscribe`]
    pub fn subscribe_leaderboard<F>(
        &self,
        metric: LeaderboardMetric,
        limit: usize,
        callback: F,
    ) -> Subscription
    where
        F: Fn(Vec<LeaderboardRow>) + Send + Sync + 'static,
    {
        self.services.distributor.subscribe(metric, limit, callback)
    }

    pub fn leaderboard_limit(&self) -> usize {
        self.config.leaderboard_limit
    }
}
