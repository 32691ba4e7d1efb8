use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use hifz_domain::shared::DomainError;
use hifz_domain::streak::StreakChange;

use super::ProgressStore;

/// Runs the lapsed-streak check when the app comes to the foreground,
/// at most once per calendar day.
pub struct StreakMonitor {
    store: Arc<ProgressStore>,
    last_checked: Mutex<Option<NaiveDate>>,
}

impl StreakMonitor {
    pub fn new(store: Arc<ProgressStore>) -> Self {
        Self {
            store,
            last_checked: Mutex::new(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn on_foreground(&self) -> Result<StreakChange, DomainError> {
        let today = self.store.today();
        let mut last_checked = self.last_checked.lock().await;

        if *last_checked == Some(today) {
            debug!(%today, "Streak already checked today");
            return Ok(StreakChange::Unchanged);
        }

        let change = self.store.expire_lapsed_streak().await?;
        *last_checked = Some(today);
        Ok(change)
    }
}
