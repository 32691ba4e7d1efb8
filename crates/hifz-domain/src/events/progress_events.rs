use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;

use crate::events::DomainEvent;

macro_rules! impl_domain_event {
    ($type:ty) => {
        impl DomainEvent for $type {
            fn as_any(&self) -> &(dyn Any + Send + Sync) {
                self
            }

            fn event_type_name(&self) -> &'static str {
                std::any::type_name::<Self>()
            }
        }
    };
}

/// Fired when a gap of more than one day ends a streak
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakBroken {
    pub previous_streak: u32,
    /// Dates strictly between the last activity and today
    pub missed_dates: Vec<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

impl_domain_event!(StreakBroken);

/// Fired when activity on a new consecutive day extends the streak
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakAdvanced {
    pub new_streak: u32,
    pub occurred_at: DateTime<Utc>,
}

impl_domain_event!(StreakAdvanced);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementEarned {
    pub achievement_id: String,
    pub points: u32,
    pub occurred_at: DateTime<Utc>,
}

impl_domain_event!(AchievementEarned);
