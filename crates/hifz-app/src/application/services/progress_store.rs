use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use hifz_domain::events::progress_events::{StreakAdvanced, StreakBroken};
use hifz_domain::events::EventBus;
use hifz_domain::progress::{
    ActivityLog, CounterUpdate, MemorizationRecord, ProgressSnapshot, TimeWindow, UnitName,
};
use hifz_domain::reconciliation::merge;
use hifz_domain::shared::{Clock, DomainError};
use hifz_domain::storage::KeyValueStore;
use hifz_domain::streak::{StreakChange, StreakCounter};

const COUNTERS_KEY: &str = "progress.counters";
const MEMORIZED_KEY: &str = "progress.memorized";

/// Every field that must change together, stored under one key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct CounterRecord {
    total_units: u64,
    today_units: u64,
    /// Day `today_units` was counted for
    today_date: Option<NaiveDate>,
    streak: u32,
    best_streak: u32,
    last_activity_date: Option<NaiveDate>,
    activity: ActivityLog,
}

impl CounterRecord {
    fn sanitized(mut self) -> Self {
        self.today_units = self.today_units.min(self.total_units);
        self.best_streak = self.best_streak.max(self.streak);
        self
    }

    /// Reset the daily counter when the calendar day changed. Returns true
    /// if anything changed.
    fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.today_date == Some(today) {
            return false;
        }
        self.today_units = 0;
        self.today_date = Some(today);
        self.activity.prune(today);
        true
    }

    fn streak_counter(&self) -> StreakCounter {
        StreakCounter {
            streak: self.streak,
            best_streak: self.best_streak,
            last_activity_date: self.last_activity_date,
        }
    }

    fn apply_streak(&mut self, counter: StreakCounter) {
        self.streak = counter.streak;
        self.best_streak = counter.best_streak;
        self.last_activity_date = counter.last_activity_date;
    }

    fn to_snapshot(&self, memorized_items: BTreeMap<UnitName, MemorizationRecord>) -> ProgressSnapshot {
        ProgressSnapshot {
            total_units: self.total_units,
            today_units: self.today_units,
            streak: self.streak,
            best_streak: self.best_streak,
            last_activity_date: self.last_activity_date,
            memorized_items,
        }
    }
}

/// Durable local counters for one user.
///
/// All mutations are serialized by an async mutex. Counter fields live
/// under a single storage key so a crash never leaves the streak and the
/// activity date out of step. Reads never fail: unreadable values fall back
/// to defaults.
pub struct ProgressStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<dyn EventBus>,
    write_lock: Mutex<()>,
}

impl ProgressStore {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            storage,
            clock,
            event_bus,
            write_lock: Mutex::new(()),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current snapshot, applying the daily rollover first
    #[instrument(skip(self))]
    pub async fn load(&self) -> ProgressSnapshot {
        let _guard = self.write_lock.lock().await;
        let today = self.clock.today();

        let mut counters = match self.read_counters().await {
            Ok(counters) => counters,
            Err(e) => {
                warn!(error = %e, "Counter store unreadable, serving defaults");
                return ProgressSnapshot::default();
            }
        };

        if counters.roll_over(today) {
            debug!(%today, "Daily counter rolled over");
            if let Err(e) = self.write_counters(&counters).await {
                warn!(error = %e, "Failed to persist daily rollover");
            }
        }

        let memorized = self.read_memorized().await.unwrap_or_else(|e| {
            warn!(error = %e, "Memorized items unreadable, serving empty map");
            BTreeMap::new()
        });

        counters.to_snapshot(memorized)
    }

    /// Add units earned now and apply the streak transition in the same write
    #[instrument(skip(self))]
    pub async fn add_units(&self, amount: u64) -> Result<CounterUpdate, DomainError> {
        let (update, change) = {
            let _guard = self.write_lock.lock().await;
            let today = self.clock.today();

            let mut counters = self.read_counters().await?;
            counters.roll_over(today);
            counters.total_units = counters.total_units.saturating_add(amount);
            counters.today_units = counters.today_units.saturating_add(amount);
            counters.activity.record(today, amount);

            let mut streak = counters.streak_counter();
            let change = streak.record_activity(today);
            counters.apply_streak(streak);

            self.write_counters(&counters).await?;

            let update = CounterUpdate {
                total_units: counters.total_units,
                today_units: counters.today_units,
                streak: counters.streak,
            };
            (update, change)
        };

        debug!(
            total = update.total_units,
            today = update.today_units,
            streak = update.streak,
            "Units added"
        );
        self.publish_change(change).await;

        Ok(update)
    }

    /// Mark one index of a unit as memorized. Idempotent.
    #[instrument(skip(self))]
    pub async fn mark_item_complete(
        &self,
        unit: &str,
        index: u32,
    ) -> Result<MemorizationRecord, DomainError> {
        if unit.trim().is_empty() {
            return Err(DomainError::Validation("Unit name is empty".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let mut memorized = self.read_memorized().await?;

        let record = memorized
            .entry(unit.to_string())
            .or_insert_with(|| MemorizationRecord::for_unit(unit, index));
        if !record.complete(index) {
            return Ok(record.clone());
        }
        let record = record.clone();

        self.write_memorized(&memorized).await?;
        Ok(record)
    }

    /// Zero all counters. The activity date moves to yesterday so the next
    /// activity starts a fresh streak of 1. `include_secondary` also clears
    /// memorized items.
    #[instrument(skip(self))]
    pub async fn reset_all(&self, include_secondary: bool) -> Result<(), DomainError> {
        let _guard = self.write_lock.lock().await;
        let today = self.clock.today();

        let counters = CounterRecord {
            today_date: Some(today),
            last_activity_date: Some(today - Duration::days(1)),
            ..CounterRecord::default()
        };
        self.write_counters(&counters).await?;

        if include_secondary {
            self.storage.remove(MEMORIZED_KEY).await?;
        }

        info!(include_secondary, "Progress reset");
        Ok(())
    }

    /// Merge `remote` into the local snapshot and store the result
    #[instrument(skip(self, remote))]
    pub async fn merge_remote(&self, remote: &ProgressSnapshot) -> Result<ProgressSnapshot, DomainError> {
        let _guard = self.write_lock.lock().await;
        let today = self.clock.today();

        let mut counters = self.read_counters().await?;
        counters.roll_over(today);
        let local = counters.to_snapshot(self.read_memorized().await?);

        let merged = merge(&local, remote);
        if merged == local {
            return Ok(merged);
        }

        counters.total_units = merged.total_units;
        counters.today_units = merged.today_units;
        counters.streak = merged.streak;
        counters.best_streak = merged.best_streak;
        counters.last_activity_date = merged.last_activity_date;

        self.write_counters(&counters).await?;
        self.write_memorized(&merged.memorized_items).await?;

        debug!(
            total = merged.total_units,
            streak = merged.streak,
            "Local snapshot replaced by merge"
        );
        Ok(merged)
    }

    /// Foreground check: zero a streak whose last activity is older than
    /// yesterday and announce it
    #[instrument(skip(self))]
    pub async fn expire_lapsed_streak(&self) -> Result<StreakChange, DomainError> {
        let change = {
            let _guard = self.write_lock.lock().await;
            let today = self.clock.today();

            let mut counters = self.read_counters().await?;
            let mut streak = counters.streak_counter();
            let change = streak.expire_if_lapsed(today);
            if change != StreakChange::Unchanged {
                counters.apply_streak(streak);
                counters.roll_over(today);
                self.write_counters(&counters).await?;
            }
            change
        };

        self.publish_change(change.clone()).await;
        Ok(change)
    }

    /// Units earned in the current week or month, from the local activity log
    pub async fn time_windowed_units(&self, window: TimeWindow) -> u64 {
        let today = self.clock.today();
        match self.read_counters().await {
            Ok(counters) => counters.activity.units_in(window, today),
            Err(e) => {
                warn!(error = %e, "Counter store unreadable, window total is 0");
                0
            }
        }
    }

    async fn publish_change(&self, change: StreakChange) {
        let occurred_at = self.clock.now();
        let result = match change {
            StreakChange::Unchanged => return,
            StreakChange::Started => {
                self.event_bus
                    .publish(Box::new(StreakAdvanced {
                        new_streak: 1,
                        occurred_at,
                    }))
                    .await
            }
            StreakChange::Advanced { new_streak } => {
                self.event_bus
                    .publish(Box::new(StreakAdvanced {
                        new_streak,
                        occurred_at,
                    }))
                    .await
            }
            StreakChange::Broken {
                previous_streak,
                missed_dates,
            } => {
                info!(previous_streak, missed = missed_dates.len(), "Streak broken");
                self.event_bus
                    .publish(Box::new(StreakBroken {
                        previous_streak,
                        missed_dates,
                        occurred_at,
                    }))
                    .await
            }
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to publish streak event");
        }
    }

    /// Corrupt JSON is recovered as defaults; storage failures propagate
    async fn read_counters(&self) -> Result<CounterRecord, DomainError> {
        let Some(raw) = self.storage.get(COUNTERS_KEY).await? else {
            return Ok(CounterRecord::default());
        };

        match serde_json::from_str::<CounterRecord>(&raw) {
            Ok(counters) => Ok(counters.sanitized()),
            Err(e) => {
                let err = DomainError::StorageCorruption(format!("{}: {}", COUNTERS_KEY, e));
                warn!(error = %err, "Discarding corrupt counters");
                Ok(CounterRecord::default())
            }
        }
    }

    async fn write_counters(&self, counters: &CounterRecord) -> Result<(), DomainError> {
        let raw = serde_json::to_string(counters)?;
        self.storage.set(COUNTERS_KEY, &raw).await
    }

    async fn read_memorized(&self) -> Result<BTreeMap<UnitName, MemorizationRecord>, DomainError> {
        let Some(raw) = self.storage.get(MEMORIZED_KEY).await? else {
            return Ok(BTreeMap::new());
        };

        match serde_json::from_str::<BTreeMap<UnitName, MemorizationRecord>>(&raw) {
            Ok(items) => Ok(items
                .into_iter()
                .map(|(unit, record)| (unit, record.repaired()))
                .collect()),
            Err(e) => {
                let err = DomainError::StorageCorruption(format!("{}: {}", MEMORIZED_KEY, e));
                warn!(error = %err, "Discarding corrupt memorized items");
                Ok(BTreeMap::new())
            }
        }
    }

    async fn write_memorized(
        &self,
        items: &BTreeMap<UnitName, MemorizationRecord>,
    ) -> Result<(), DomainError> {
        let raw = serde_json::to_string(items)?;
        self.storage.set(MEMORIZED_KEY, &raw).await
    }
}
