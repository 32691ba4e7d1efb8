use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use hifz_domain::achievements::{newly_earned, Achievement, AchievementStats, ACHIEVEMENTS_TABLE};
use hifz_domain::events::progress_events::AchievementEarned;
use hifz_domain::events::EventBus;
use hifz_domain::remote::{RemoteQuery, RemoteRequest, RemoteTable};
use hifz_domain::session::SessionProvider;
use hifz_domain::shared::{DomainError, UserId};

use super::ProgressStore;

/// Awards milestone achievements for the signed-in user
pub struct AchievementService {
    remote: Arc<dyn RemoteTable>,
    store: Arc<ProgressStore>,
    session: Arc<dyn SessionProvider>,
    event_bus: Arc<dyn EventBus>,
}

impl AchievementService {
    pub fn new(
        remote: Arc<dyn RemoteTable>,
        store: Arc<ProgressStore>,
        session: Arc<dyn SessionProvider>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            remote,
            store,
            session,
            event_bus,
        }
    }

    /// Award everything the local snapshot qualifies for and has not been
    /// awarded yet. Returns the ids awarded by this call.
    ///
    /// A single failed award is logged and skipped; the rest still go out.
    #[instrument(skip(self))]
    pub async fn check(&self) -> Result<Vec<String>, DomainError> {
        let user_id = self.session.current_user().ok_or(DomainError::AuthRequired)?;

        let earned = self.earned_ids(&user_id).await?;
        let snapshot = self.store.load().await;
        let stats = AchievementStats::from_snapshot(&snapshot);

        let mut awarded = Vec::new();
        for achievement in newly_earned(&stats, &earned) {
            match self.award(&user_id, achievement).await {
                Ok(true) => {
                    info!("🏆 Achievement earned: {} ({})", achievement.title, achievement.id);
                    self.announce(achievement).await;
                    awarded.push(achievement.id.to_string());
                }
                Ok(false) => {}
                Err(e) => error!("Failed to award achievement {}: {}", achievement.id, e),
            }
        }

        Ok(awarded)
    }

    /// Ids already awarded to `user_id`
    pub async fn earned_ids(&self, user_id: &UserId) -> Result<HashSet<String>, DomainError> {
        let response = self
            .remote
            .execute(RemoteRequest::get(
                ACHIEVEMENTS_TABLE,
                RemoteQuery::new()
                    .select("achievement_id")
                    .eq("user_id", user_id.as_str()),
            ))
            .await?
            .into_result()?;

        Ok(response
            .rows()
            .iter()
            .filter_map(|row| row.get("achievement_id").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Insert the award. `Ok(false)` if another device awarded it first.
    async fn award(&self, user_id: &UserId, achievement: &Achievement) -> Result<bool, DomainError> {
        let body = json!({
            "user_id": user_id.as_str(),
            "achievement_id": achievement.id,
            "points": achievement.points,
            "earned_at": self.store.now(),
        });

        match self
            .remote
            .execute(RemoteRequest::post(ACHIEVEMENTS_TABLE, body))
            .await?
            .into_result()
        {
            Ok(_) => Ok(true),
            Err(DomainError::RemoteConflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn announce(&self, achievement: &Achievement) {
        let event = AchievementEarned {
            achievement_id: achievement.id.to_string(),
            points: achievement.points,
            occurred_at: self.store.now(),
        };
        if let Err(e) = self.event_bus.publish(Box::new(event)).await {
            warn!("Failed to publish achievement event: {}", e);
        }
    }
}
