mod activity_log;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::streak::{StreakCounter, StreakState};

pub use activity_log::{ActivityLog, TimeWindow};

/// Name of a memorization unit (a surah in the mobile app)
pub type UnitName = String;

/// Known unit sizes, used when the first index of a unit is completed.
const UNIT_CATALOG: &[(&str, u32)] = &[
    ("Al-Fatihah", 7),
    ("Al-Ikhlas", 4),
    ("Al-Falaq", 5),
    ("An-Nas", 6),
    ("Ash-Sharh", 8),
    ("Al-Kahf", 110),
];

/// Default size of a unit, if the catalog knows it
pub fn default_unit_total(unit: &str) -> Option<u32> {
    UNIT_CATALOG
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, total)| *total)
}

/// Per-unit memorization progress
///
/// `memorized` always equals the number of completed indices; it is kept as
/// a field because it is what the remote store and the UI read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemorizationRecord {
    pub total: u32,
    pub memorized: u32,
    #[serde(default)]
    pub completed_indices: BTreeSet<u32>,
}

impl MemorizationRecord {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            memorized: 0,
            completed_indices: BTreeSet::new(),
        }
    }

    /// Record for a unit seen for the first time
    pub fn for_unit(unit: &str, index: u32) -> Self {
        let total = default_unit_total(unit).unwrap_or(index.saturating_add(1));
        Self::new(total)
    }

    /// Mark `index` as completed. Returns false if it already was.
    pub fn complete(&mut self, index: u32) -> bool {
        let inserted = self.completed_indices.insert(index);
        self.memorized = self.completed_indices.len() as u32;
        self.total = self.total.max(index.saturating_add(1)).max(self.memorized);
        inserted
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.memorized >= self.total
    }

    pub fn is_well_formed(&self) -> bool {
        self.memorized as usize == self.completed_indices.len() && self.memorized <= self.total
    }

    /// Bring a record read from storage back within its invariants
    pub fn repaired(mut self) -> Self {
        self.memorized = self.completed_indices.len() as u32;
        self.total = self.total.max(self.memorized);
        self
    }
}

/// The authoritative progress state for one user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSnapshot {
    pub total_units: u64,
    pub today_units: u64,
    pub streak: u32,
    pub best_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub memorized_items: BTreeMap<UnitName, MemorizationRecord>,
}

impl ProgressSnapshot {
    pub fn is_well_formed(&self) -> bool {
        self.today_units <= self.total_units
            && self
                .memorized_items
                .values()
                .all(MemorizationRecord::is_well_formed)
    }

    /// Total memorized indices across all units
    pub fn memorized_count(&self) -> u64 {
        self.memorized_items
            .values()
            .map(|record| record.memorized as u64)
            .sum()
    }

    /// Units whose every index has been completed
    pub fn completed_units(&self) -> Vec<&str> {
        self.memorized_items
            .iter()
            .filter(|(_, record)| record.is_complete())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn streak_counter(&self) -> StreakCounter {
        StreakCounter {
            streak: self.streak,
            best_streak: self.best_streak,
            last_activity_date: self.last_activity_date,
        }
    }

    pub fn streak_state(&self, today: NaiveDate) -> StreakState {
        self.streak_counter().state(today)
    }
}

/// Counters returned from a unit increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterUpdate {
    pub total_units: u64,
    pub today_units: u64,
    pub streak: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_is_idempotent() {
        let mut record = MemorizationRecord::for_unit("Al-Fatihah", 0);
        assert_eq!(record.total, 7);

        assert!(record.complete(3));
        assert!(!record.complete(3));
        assert_eq!(record.memorized, 1);
        assert!(record.is_well_formed());
    }

    #[test]
    fn test_unknown_unit_grows_total_to_cover_index() {
        let mut record = MemorizationRecord::for_unit("Al-Mulk", 4);
        assert_eq!(record.total, 5);

        record.complete(4);
        record.complete(9);
        assert_eq!(record.total, 10);
        assert_eq!(record.memorized, 2);
        assert!(!record.is_complete());
    }

    #[test]
    fn test_repaired_restores_invariants() {
        let record = MemorizationRecord {
            total: 1,
            memorized: 9,
            completed_indices: [0, 1, 2].into_iter().collect(),
        };
        assert!(!record.is_well_formed());

        let fixed = record.repaired();
        assert_eq!(fixed.memorized, 3);
        assert_eq!(fixed.total, 3);
        assert!(fixed.is_well_formed());
    }

    #[test]
    fn test_snapshot_well_formedness() {
        let mut snapshot = ProgressSnapshot {
            total_units: 10,
            today_units: 4,
            ..Default::default()
        };
        assert!(snapshot.is_well_formed());

        snapshot.today_units = 11;
        assert!(!snapshot.is_well_formed());
    }

    #[test]
    fn test_memorized_count_and_completed_units() {
        let mut snapshot = ProgressSnapshot::default();
        let mut ikhlas = MemorizationRecord::for_unit("Al-Ikhlas", 0);
        for i in 0..4 {
            ikhlas.complete(i);
        }
        let mut fatihah = MemorizationRecord::for_unit("Al-Fatihah", 0);
        fatihah.complete(0);

        snapshot.memorized_items.insert("Al-Ikhlas".to_string(), ikhlas);
        snapshot.memorized_items.insert("Al-Fatihah".to_string(), fatihah);

        assert_eq!(snapshot.memorized_count(), 5);
        assert_eq!(snapshot.completed_units(), vec!["Al-Ikhlas"]);
    }

    #[test]
    fn test_snapshot_deserializes_with_missing_fields() {
        let snapshot: ProgressSnapshot =
            serde_json::from_str(r#"{"total_units": 12, "streak": 2}"#).unwrap();
        assert_eq!(snapshot.total_units, 12);
        assert_eq!(snapshot.streak, 2);
        assert_eq!(snapshot.today_units, 0);
        assert!(snapshot.last_activity_date.is_none());
    }
}
