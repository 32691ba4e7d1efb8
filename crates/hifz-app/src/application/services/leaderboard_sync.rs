use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use hifz_domain::leaderboard::{
    format_rows, rank_of, LeaderboardEntry, LeaderboardMetric, LeaderboardRow, UserProfile,
    LEADERBOARD_TABLE, PROFILES_TABLE,
};
use hifz_domain::progress::{ProgressSnapshot, TimeWindow};
use hifz_domain::remote::{RemoteQuery, RemoteRequest, RemoteTable};
use hifz_domain::session::SessionProvider;
use hifz_domain::shared::{DomainError, UserId};

use super::remote_upsert::{upsert_by_key, UpsertOutcome};
use super::ProgressStore;

/// Pushes the local user's stats to the ranked remote table and reads
/// ranked views back.
pub struct LeaderboardSyncService {
    remote: Arc<dyn RemoteTable>,
    store: Arc<ProgressStore>,
    session: Arc<dyn SessionProvider>,
}

impl LeaderboardSyncService {
    pub fn new(
        remote: Arc<dyn RemoteTable>,
        store: Arc<ProgressStore>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            remote,
            store,
            session,
        }
    }

    /// Update-or-insert the user's row. A concurrent insert of the same row
    /// counts as success.
    #[instrument(skip(self, entry), fields(user_id = %entry.user_id))]
    pub async fn push(&self, entry: &LeaderboardEntry) -> Result<UpsertOutcome, DomainError> {
        let body = serde_json::to_value(entry)?;
        let outcome = upsert_by_key(
            self.remote.as_ref(),
            LEADERBOARD_TABLE,
            "user_id",
            entry.user_id.as_str(),
            body,
        )
        .await?;

        info!(
            "[leaderboard] Pushed stats for {} ({:?}): {} units, streak {}",
            entry.user_id, outcome, entry.total_units, entry.current_streak
        );
        Ok(outcome)
    }

    /// 1-based position of `user_id` when ordered by `metric`, `None` if the
    /// user has no row. Ties follow the store's ordering.
    #[instrument(skip(self))]
    pub async fn rank(
        &self,
        user_id: &UserId,
        metric: LeaderboardMetric,
    ) -> Result<Option<u32>, DomainError> {
        let response = self
            .remote
            .execute(RemoteRequest::get(
                LEADERBOARD_TABLE,
                RemoteQuery::new()
                    .select("user_id")
                    .order_desc(metric.column()),
            ))
            .await?
            .into_result()?;

        let ordered: Vec<UserId> = response
            .rows()
            .iter()
            .filter_map(|row| row.get("user_id").and_then(Value::as_str))
            .map(UserId::from_string)
            .collect();

        let rank = rank_of(&ordered, user_id);
        debug!(?rank, total = ordered.len(), "Rank computed");
        Ok(rank)
    }

    /// Top `limit` entries by `metric`, ordered descending
    pub async fn top_entries(
        &self,
        metric: LeaderboardMetric,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, DomainError> {
        let response = self
            .remote
            .execute(RemoteRequest::get(
                LEADERBOARD_TABLE,
                RemoteQuery::new()
                    .select("*")
                    .order_desc(metric.column())
                    .limit(limit),
            ))
            .await?
            .into_result()?;

        let entries = response
            .rows()
            .iter()
            .filter_map(|row| match serde_json::from_value(row.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("[leaderboard] Skipping malformed row: {}", e);
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    /// Top `limit` rows by `metric`, named and formatted for display
    #[instrument(skip(self))]
    pub async fn leaderboard(
        &self,
        metric: LeaderboardMetric,
        limit: usize,
    ) -> Result<Vec<LeaderboardRow>, DomainError> {
        let entries = self.top_entries(metric, limit).await?;
        let profiles = self.profiles_for(&entries).await;
        Ok(format_rows(&entries, metric, &profiles))
    }

    /// Profiles for the given entries. Failures yield an empty map so rows
    /// fall back to generated names.
    async fn profiles_for(&self, entries: &[LeaderboardEntry]) -> HashMap<UserId, UserProfile> {
        if entries.is_empty() {
            return HashMap::new();
        }

        let response = self
            .remote
            .execute(RemoteRequest::get(
                PROFILES_TABLE,
                RemoteQuery::new().select("id,username,display_name"),
            ))
            .await
            .and_then(|response| response.into_result());

        match response {
            Ok(response) => response
                .rows()
                .iter()
                .filter_map(|row| serde_json::from_value::<UserProfile>(row.clone()).ok())
                .filter(|profile| entries.iter().any(|e| e.user_id == profile.id))
                .map(|profile| (profile.id.clone(), profile))
                .collect(),
            Err(e) => {
                warn!("[leaderboard] Profile lookup failed, using fallback names: {}", e);
                HashMap::new()
            }
        }
    }

    pub async fn time_windowed_units(&self, window: TimeWindow) -> u64 {
        self.store.time_windowed_units(window).await
    }

    /// Projection of `snapshot` for `user_id`, with the local window totals
    pub async fn build_entry(&self, user_id: UserId, snapshot: &ProgressSnapshot) -> LeaderboardEntry {
        let weekly = self.time_windowed_units(TimeWindow::Weekly).await;
        let monthly = self.time_windowed_units(TimeWindow::Monthly).await;
        LeaderboardEntry::from_snapshot(user_id, snapshot, weekly, monthly, self.store.now())
    }

    /// Build the signed-in user's entry from the local snapshot and push it
    #[instrument(skip(self))]
    pub async fn sync_current_user(&self) -> Result<LeaderboardEntry, DomainError> {
        let user_id = self.session.current_user().ok_or(DomainError::AuthRequired)?;
        let snapshot = self.store.load().await;
        let entry = self.build_entry(user_id, &snapshot).await;
        self.push(&entry).await?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hifz_domain::shared::ManualClock;
    use hifz_infrastructure::events::InMemoryEventBus;
    use hifz_infrastructure::persistence::InMemoryKeyValueStore;
    use hifz_infrastructure::remote::InMemoryRemoteTable;
    use hifz_infrastructure::session::InMemorySession;
    use serde_json::json;

    fn service(remote: Arc<InMemoryRemoteTable>, session: InMemorySession) -> LeaderboardSyncService {
        let clock = Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()));
        let store = Arc::new(ProgressStore::new(
            Arc::new(InMemoryKeyValueStore::new()),
            clock,
            Arc::new(InMemoryEventBus::new()),
        ));
        LeaderboardSyncService::new(remote, store, Arc::new(session))
    }

    #[tokio::test]
    async fn test_rank_by_position() {
        let remote = Arc::new(InMemoryRemoteTable::new());
        for (id, total) in [("user-1", 900), ("user-42", 650), ("user-3", 500), ("user-4", 300)] {
            remote.seed(LEADERBOARD_TABLE, json!({"user_id": id, "total_hasanat": total}));
        }
        let service = service(remote, InMemorySession::new());

        let rank = service
            .rank(&UserId::from_string("user-42"), LeaderboardMetric::Hasanat)
            .await
            .unwrap();
        assert_eq!(rank, Some(2));

        let missing = service
            .rank(&UserId::from_string("nobody"), LeaderboardMetric::Hasanat)
            .await
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_sync_requires_session() {
        let service = service(Arc::new(InMemoryRemoteTable::new()), InMemorySession::new());
        assert!(matches!(
            service.sync_current_user().await,
            Err(DomainError::AuthRequired)
        ));
    }

    #[tokio::test]
    async fn test_leaderboard_uses_profiles_and_skips_bad_rows() {
        let remote = Arc::new(InMemoryRemoteTable::new());
        remote.seed(LEADERBOARD_TABLE, json!({"user_id": "abcdefghijkl", "current_streak": 4}));
        remote.seed(LEADERBOARD_TABLE, json!({"user_id": "u2", "current_streak": 9}));
        remote.seed(LEADERBOARD_TABLE, json!({"current_streak": 99}));
        remote.seed(PROFILES_TABLE, json!({"id": "u2", "username": "amina"}));
        let service = service(remote, InMemorySession::new());

        let rows = service
            .leaderboard(LeaderboardMetric::Streak, 10)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "amina");
        assert_eq!(rows[0].raw_value, 9);
        assert_eq!(rows[1].name, "User abcdefgh");
        assert_eq!(rows[1].rank, 2);
    }
}
