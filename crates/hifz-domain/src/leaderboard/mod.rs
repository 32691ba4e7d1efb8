use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::progress::ProgressSnapshot;
use crate::shared::{DomainError, UserId};

/// Remote table holding one row per user
pub const LEADERBOARD_TABLE: &str = "leaderboard_stats";
/// Remote table holding public profile names
pub const PROFILES_TABLE: &str = "user_profiles";

/// Sort key of a ranked query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardMetric {
    Memorization,
    Streak,
    BestStreak,
    Hasanat,
    Weekly,
    Monthly,
}

impl LeaderboardMetric {
    pub fn all() -> &'static [LeaderboardMetric] {
        &[
            LeaderboardMetric::Memorization,
            LeaderboardMetric::Streak,
            LeaderboardMetric::BestStreak,
            LeaderboardMetric::Hasanat,
            LeaderboardMetric::Weekly,
            LeaderboardMetric::Monthly,
        ]
    }

    /// Column of the remote table this metric orders by
    pub fn column(&self) -> &'static str {
        match self {
            LeaderboardMetric::Memorization => "total_ayaat_memorized",
            LeaderboardMetric::Streak => "current_streak",
            LeaderboardMetric::BestStreak => "best_streak",
            LeaderboardMetric::Hasanat => "total_hasanat",
            LeaderboardMetric::Weekly => "weekly_hasanat",
            LeaderboardMetric::Monthly => "monthly_hasanat",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeaderboardMetric::Memorization => "ayaat",
            LeaderboardMetric::Streak | LeaderboardMetric::BestStreak => "days",
            LeaderboardMetric::Hasanat | LeaderboardMetric::Weekly | LeaderboardMetric::Monthly => {
                "hasanat"
            }
        }
    }

    pub fn value_of(&self, entry: &LeaderboardEntry) -> u64 {
        match self {
            LeaderboardMetric::Memorization => entry.memorized_count,
            LeaderboardMetric::Streak => entry.current_streak as u64,
            LeaderboardMetric::BestStreak => entry.best_streak as u64,
            LeaderboardMetric::Hasanat => entry.total_units,
            LeaderboardMetric::Weekly => entry.weekly_units,
            LeaderboardMetric::Monthly => entry.monthly_units,
        }
    }
}

impl fmt::Display for LeaderboardMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeaderboardMetric::Memorization => "memorization",
            LeaderboardMetric::Streak => "streak",
            LeaderboardMetric::BestStreak => "best_streak",
            LeaderboardMetric::Hasanat => "hasanat",
            LeaderboardMetric::Weekly => "weekly",
            LeaderboardMetric::Monthly => "monthly",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for LeaderboardMetric {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memorization" | "memorized" | "ayaat" => Ok(LeaderboardMetric::Memorization),
            "streak" | "current_streak" => Ok(LeaderboardMetric::Streak),
            "best_streak" | "best-streak" => Ok(LeaderboardMetric::BestStreak),
            "hasanat" | "total" | "total_units" => Ok(LeaderboardMetric::Hasanat),
            "weekly" => Ok(LeaderboardMetric::Weekly),
            "monthly" => Ok(LeaderboardMetric::Monthly),
            other => Err(DomainError::Validation(format!(
                "Unknown leaderboard metric: {}",
                other
            ))),
        }
    }
}

/// Remote-visible projection of a snapshot. Rebuilt on every sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    #[serde(rename = "total_hasanat", default)]
    pub total_units: u64,
    #[serde(rename = "total_ayaat_memorized", default)]
    pub memorized_count: u64,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub best_streak: u32,
    #[serde(rename = "weekly_hasanat", default)]
    pub weekly_units: u64,
    #[serde(rename = "monthly_hasanat", default)]
    pub monthly_units: u64,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_activity: Option<NaiveDate>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Accepts `YYYY-MM-DD` or a full timestamp; anything else reads as `None`
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.get(..10))
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()))
}

impl LeaderboardEntry {
    pub fn from_snapshot(
        user_id: UserId,
        snapshot: &ProgressSnapshot,
        weekly_units: u64,
        monthly_units: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            total_units: snapshot.total_units,
            memorized_count: snapshot.memorized_count(),
            current_streak: snapshot.streak,
            best_streak: snapshot.best_streak.max(snapshot.streak),
            weekly_units,
            monthly_units,
            last_activity: snapshot.last_activity_date,
            updated_at: now,
        }
    }
}

/// Public profile used to name leaderboard rows
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One presentation-ready leaderboard line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub rank: u32,
    pub user_id: UserId,
    pub name: String,
    pub value: String,
    pub raw_value: u64,
    pub label: &'static str,
    pub last_activity: Option<NaiveDate>,
}

/// Name shown for a user: display name, else username, else a short id
pub fn display_name(user_id: &UserId, profile: Option<&UserProfile>) -> String {
    let non_empty = |s: &Option<String>| s.as_ref().filter(|v| !v.trim().is_empty()).cloned();

    profile
        .and_then(|p| non_empty(&p.display_name).or_else(|| non_empty(&p.username)))
        .unwrap_or_else(|| {
            let short: String = user_id.as_str().chars().take(8).collect();
            format!("User {}", short)
        })
}

/// Compact large counts: 1500 -> "1.5K", 2000000 -> "2M"
pub fn compact_number(value: u64) -> String {
    fn scaled(value: u64, unit: u64, suffix: &str) -> String {
        let tenths = value / (unit / 10);
        if tenths % 10 == 0 {
            format!("{}{}", tenths / 10, suffix)
        } else {
            format!("{}.{}{}", tenths / 10, tenths % 10, suffix)
        }
    }

    if value >= 1_000_000_000 {
        scaled(value, 1_000_000_000, "B")
    } else if value >= 1_000_000 {
        scaled(value, 1_000_000, "M")
    } else if value >= 1_000 {
        scaled(value, 1_000, "K")
    } else {
        value.to_string()
    }
}

/// Turn ordered entries into ranked rows. Entries must already be sorted.
pub fn format_rows(
    entries: &[LeaderboardEntry],
    metric: LeaderboardMetric,
    profiles: &HashMap<UserId, UserProfile>,
) -> Vec<LeaderboardRow> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let raw_value = metric.value_of(entry);
            LeaderboardRow {
                rank: i as u32 + 1,
                user_id: entry.user_id.clone(),
                name: display_name(&entry.user_id, profiles.get(&entry.user_id)),
                value: compact_number(raw_value),
                raw_value,
                label: metric.label(),
                last_activity: entry.last_activity,
            }
        })
        .collect()
}

/// 1-based position of `user_id` in an already ordered id list
pub fn rank_of(ordered: &[UserId], user_id: &UserId) -> Option<u32> {
    ordered
        .iter()
        .position(|id| id == user_id)
        .map(|index| index as u32 + 1)
}
