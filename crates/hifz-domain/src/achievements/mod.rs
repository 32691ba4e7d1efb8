use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::progress::ProgressSnapshot;

/// Remote table of awarded achievements
pub const ACHIEVEMENTS_TABLE: &str = "user_achievements";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    UnitCompletion,
    Streak,
    Hasanat,
    AyatMemorized,
    QuranCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    pub id: &'static str,
    pub kind: AchievementKind,
    pub title: &'static str,
    pub requirement: u64,
    pub points: u32,
    /// Unit that must be fully memorized, for `UnitCompletion`
    pub unit: Option<&'static str>,
}

const fn milestone(
    id: &'static str,
    kind: AchievementKind,
    title: &'static str,
    requirement: u64,
    points: u32,
) -> Achievement {
    Achievement {
        id,
        kind,
        title,
        requirement,
        points,
        unit: None,
    }
}

/// Number of ayat in the whole Quran
pub const QURAN_AYAT: u64 = 6236;

static CATALOG: &[Achievement] = &[
    Achievement {
        id: "surah_al_fatiha",
        kind: AchievementKind::UnitCompletion,
        title: "Surah Al-Fatiha Master",
        requirement: 7,
        points: 100,
        unit: Some("Al-Fatihah"),
    },
    milestone("streak_3", AchievementKind::Streak, "3 Day Streak", 3, 10),
    milestone("streak_10", AchievementKind::Streak, "10 Day Streak", 10, 25),
    milestone("streak_40", AchievementKind::Streak, "40 Day Streak", 40, 50),
    milestone("streak_100", AchievementKind::Streak, "100 Day Streak", 100, 100),
    milestone("streak_500", AchievementKind::Streak, "500 Day Streak", 500, 250),
    milestone("streak_1000", AchievementKind::Streak, "1000 Day Streak", 1_000, 500),
    milestone("streak_5000", AchievementKind::Streak, "5000 Day Streak", 5_000, 1_000),
    milestone("streak_10000", AchievementKind::Streak, "10000 Day Streak", 10_000, 2_000),
    milestone("hasanat_1m", AchievementKind::Hasanat, "1M Hasanat", 1_000_000, 100),
    milestone("hasanat_10m", AchievementKind::Hasanat, "10M Hasanat", 10_000_000, 250),
    milestone("hasanat_100m", AchievementKind::Hasanat, "100M Hasanat", 100_000_000, 500),
    milestone("hasanat_1b", AchievementKind::Hasanat, "1B Hasanat", 1_000_000_000, 1_000),
    milestone("hasanat_10b", AchievementKind::Hasanat, "10B Hasanat", 10_000_000_000, 2_000),
    milestone("ayat_10", AchievementKind::AyatMemorized, "10 Ayat", 10, 25),
    milestone("ayat_50", AchievementKind::AyatMemorized, "50 Ayat", 50, 50),
    milestone("ayat_100", AchievementKind::AyatMemorized, "100 Ayat", 100, 100),
    milestone("ayat_300", AchievementKind::AyatMemorized, "300 Ayat", 300, 200),
    milestone("ayat_1000", AchievementKind::AyatMemorized, "1000 Ayat", 1_000, 500),
    milestone("ayat_3000", AchievementKind::AyatMemorized, "3000 Ayat", 3_000, 1_000),
    milestone(
        "quran_complete",
        AchievementKind::QuranCompletion,
        "Khatm Al-Quran",
        QURAN_AYAT,
        10_000,
    ),
];

pub fn catalog() -> &'static [Achievement] {
    CATALOG
}

pub fn find(id: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.id == id)
}

/// The numbers achievements are evaluated against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchievementStats {
    pub streak: u32,
    pub total_units: u64,
    pub memorized: u64,
    pub completed_units: HashSet<String>,
}

impl AchievementStats {
    pub fn from_snapshot(snapshot: &ProgressSnapshot) -> Self {
        Self {
            streak: snapshot.streak,
            total_units: snapshot.total_units,
            memorized: snapshot.memorized_count(),
            completed_units: snapshot
                .completed_units()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Current value and requirement, for progress bars
    pub fn progress(&self, achievement: &Achievement) -> (u64, u64) {
        let current = match achievement.kind {
            AchievementKind::Streak => self.streak as u64,
            AchievementKind::Hasanat => self.total_units,
            AchievementKind::AyatMemorized | AchievementKind::QuranCompletion => self.memorized,
            AchievementKind::UnitCompletion => {
                let done = achievement
                    .unit
                    .is_some_and(|unit| self.completed_units.contains(unit));
                if done {
                    achievement.requirement
                } else {
                    0
                }
            }
        };
        (current.min(achievement.requirement), achievement.requirement)
    }

    pub fn meets(&self, achievement: &Achievement) -> bool {
        let (current, required) = self.progress(achievement);
        current >= required
    }
}

/// Achievements reached by `stats` that are not in `already_earned`
pub fn newly_earned(
    stats: &AchievementStats,
    already_earned: &HashSet<String>,
) -> Vec<&'static Achievement> {
    CATALOG
        .iter()
        .filter(|a| !already_earned.contains(a.id) && stats.meets(a))
        .collect()
}
