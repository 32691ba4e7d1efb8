use std::collections::{BTreeMap, BTreeSet};

use crate::progress::{MemorizationRecord, ProgressSnapshot};

/// Remote table holding each user's merged snapshot
pub const PROGRESS_TABLE: &str = "user_progress";

/// Merge two snapshots into one. Max-wins on counters, union-wins on
/// completed indices, later date wins.
///
/// Total: a malformed input is replaced by the other one; two malformed
/// inputs give the zero snapshot. Commutative and idempotent on well-formed
/// inputs.
pub fn merge(local: &ProgressSnapshot, remote: &ProgressSnapshot) -> ProgressSnapshot {
    match (local.is_well_formed(), remote.is_well_formed()) {
        (true, true) => merge_well_formed(local, remote),
        (true, false) => local.clone(),
        (false, true) => remote.clone(),
        (false, false) => ProgressSnapshot::default(),
    }
}

fn merge_well_formed(local: &ProgressSnapshot, remote: &ProgressSnapshot) -> ProgressSnapshot {
    let mut memorized_items = BTreeMap::new();
    for (unit, record) in local.memorized_items.iter().chain(&remote.memorized_items) {
        let merged = match memorized_items.remove(unit) {
            Some(existing) => merge_records(&existing, record),
            None => record.clone(),
        };
        memorized_items.insert(unit.clone(), merged);
    }

    ProgressSnapshot {
        total_units: local.total_units.max(remote.total_units),
        today_units: local.today_units.max(remote.today_units),
        streak: local.streak.max(remote.streak),
        best_streak: local.best_streak.max(remote.best_streak),
        last_activity_date: local.last_activity_date.max(remote.last_activity_date),
        memorized_items,
    }
}

fn merge_records(a: &MemorizationRecord, b: &MemorizationRecord) -> MemorizationRecord {
    let completed_indices: BTreeSet<u32> = a
        .completed_indices
        .union(&b.completed_indices)
        .copied()
        .collect();
    let memorized = completed_indices.len() as u32;

    MemorizationRecord {
        total: a.total.max(b.total).max(memorized),
        memorized,
        completed_indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> Option<NaiveDate> {
        Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    fn record(total: u32, indices: &[u32]) -> MemorizationRecord {
        MemorizationRecord {
            total,
            memorized: indices.len() as u32,
            completed_indices: indices.iter().copied().collect(),
        }
    }

    fn sample_a() -> ProgressSnapshot {
        let mut snapshot = ProgressSnapshot {
            total_units: 500,
            today_units: 20,
            streak: 3,
            best_streak: 5,
            last_activity_date: date("2024-01-10"),
            ..Default::default()
        };
        snapshot
            .memorized_items
            .insert("Al-Fatihah".to_string(), record(7, &[0, 1, 2]));
        snapshot
    }

    fn sample_b() -> ProgressSnapshot {
        let mut snapshot = ProgressSnapshot {
            total_units: 650,
            today_units: 10,
            streak: 2,
            best_streak: 9,
            last_activity_date: date("2024-01-09"),
            ..Default::default()
        };
        snapshot
            .memorized_items
            .insert("Al-Fatihah".to_string(), record(7, &[2, 3]));
        snapshot
            .memorized_items
            .insert("An-Nas".to_string(), record(6, &[0]));
        snapshot
    }

    #[test]
    fn test_merge_example_scenario() {
        let local = ProgressSnapshot {
            total_units: 500,
            streak: 3,
            last_activity_date: date("2024-01-10"),
            ..Default::default()
        };
        let remote = ProgressSnapshot {
            total_units: 650,
            streak: 2,
            last_activity_date: date("2024-01-09"),
            ..Default::default()
        };

        let merged = merge(&local, &remote);
        assert_eq!(merged.total_units, 650);
        assert_eq!(merged.streak, 3);
        assert_eq!(merged.last_activity_date, date("2024-01-10"));
    }

    #[test]
    fn test_merge_unions_completed_indices() {
        let merged = merge(&sample_a(), &sample_b());

        let fatihah = &merged.memorized_items["Al-Fatihah"];
        assert_eq!(fatihah.completed_indices, [0, 1, 2, 3].into_iter().collect());
        assert_eq!(fatihah.memorized, 4);
        assert_eq!(fatihah.total, 7);
        assert_eq!(merged.memorized_items["An-Nas"].memorized, 1);
        assert_eq!(merged.best_streak, 9);
        assert_eq!(merged.today_units, 20);
        assert!(merged.is_well_formed());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = sample_a();
        assert_eq!(merge(&a, &a), a);

        let merged = merge(&a, &sample_b());
        assert_eq!(merge(&merged, &sample_b()), merged);
    }

    #[test]
    fn test_merge_is_commutative() {
        let (a, b) = (sample_a(), sample_b());
        assert_eq!(merge(&a, &b), merge(&b, &a));
        assert_eq!(
            merge(&a, &ProgressSnapshot::default()),
            merge(&ProgressSnapshot::default(), &a)
        );
    }

    #[test]
    fn test_malformed_input_falls_back() {
        let good = sample_a();
        let mut bad = sample_b();
        bad.today_units = bad.total_units + 1;

        assert_eq!(merge(&good, &bad), good);
        assert_eq!(merge(&bad, &good), good);

        let mut also_bad = sample_a();
        also_bad
            .memorized_items
            .insert("Al-Ikhlas".to_string(), record(1, &[0, 1, 2]));
        assert_eq!(merge(&bad, &also_bad), ProgressSnapshot::default());
    }
}
