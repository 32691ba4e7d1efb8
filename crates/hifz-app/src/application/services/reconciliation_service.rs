use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use hifz_domain::progress::ProgressSnapshot;
use hifz_domain::reconciliation::PROGRESS_TABLE;
use hifz_domain::remote::{RemoteQuery, RemoteRequest, RemoteTable};
use hifz_domain::session::SessionProvider;
use hifz_domain::shared::{DomainError, UserId};

use super::remote_upsert::upsert_by_key;
use super::{LeaderboardSyncService, ProgressStore};

/// Brings the local snapshot and the remote copy to the same merged state,
/// then publishes the merged stats to the leaderboard.
pub struct ReconciliationService {
    remote: Arc<dyn RemoteTable>,
    store: Arc<ProgressStore>,
    session: Arc<dyn SessionProvider>,
    leaderboard: Arc<LeaderboardSyncService>,
}

impl ReconciliationService {
    pub fn new(
        remote: Arc<dyn RemoteTable>,
        store: Arc<ProgressStore>,
        session: Arc<dyn SessionProvider>,
        leaderboard: Arc<LeaderboardSyncService>,
    ) -> Self {
        Self {
            remote,
            store,
            session,
            leaderboard,
        }
    }

    /// Fetch, merge, store locally, write back, push stats.
    ///
    /// A failed fetch aborts before anything is written, so an unreachable
    /// remote never overwrites local progress.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ProgressSnapshot, DomainError> {
        let user_id = self.session.current_user().ok_or(DomainError::AuthRequired)?;

        let remote_snapshot = self.fetch_remote(&user_id).await?;
        let merged = match &remote_snapshot {
            Some(remote) => self.store.merge_remote(remote).await?,
            None => self.store.load().await,
        };

        let body = json!({
            "user_id": user_id.as_str(),
            "snapshot": serde_json::to_value(&merged)?,
            "updated_at": self.store.now(),
        });
        upsert_by_key(
            self.remote.as_ref(),
            PROGRESS_TABLE,
            "user_id",
            user_id.as_str(),
            body,
        )
        .await?;

        let entry = self.leaderboard.build_entry(user_id, &merged).await;
        self.leaderboard.push(&entry).await?;

        info!(
            "[sync] Reconciled progress: {} units, streak {} (remote copy {})",
            merged.total_units,
            merged.streak,
            if remote_snapshot.is_some() { "merged" } else { "created" }
        );
        Ok(merged)
    }

    /// Remote snapshot for `user_id`. An unreadable stored snapshot counts
    /// as absent.
    async fn fetch_remote(&self, user_id: &UserId) -> Result<Option<ProgressSnapshot>, DomainError> {
        let response = self
            .remote
            .execute(RemoteRequest::get(
                PROGRESS_TABLE,
                RemoteQuery::new()
                    .select("snapshot")
                    .eq("user_id", user_id.as_str())
                    .limit(1),
            ))
            .await?
            .into_result()?;

        let Some(row) = response.rows().first() else {
            return Ok(None);
        };
        let Some(raw) = row.get("snapshot") else {
            return Ok(None);
        };

        match serde_json::from_value::<ProgressSnapshot>(raw.clone()) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!("[sync] Ignoring unreadable remote snapshot: {}", e);
                Ok(None)
            }
        }
    }
}
