use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Derived streak state. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakState {
    /// streak == 0
    None,
    /// Activity recorded today
    Active,
    /// Last activity was yesterday; today's activity continues the streak
    AtRisk,
    /// Last activity is older than yesterday; the next activity restarts at 1
    Broken,
}

/// Outcome of a streak transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreakChange {
    Unchanged,
    Started,
    Advanced {
        new_streak: u32,
    },
    Broken {
        previous_streak: u32,
        missed_dates: Vec<NaiveDate>,
    },
}

/// The streak-relevant slice of a progress snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakCounter {
    pub streak: u32,
    pub best_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
}

impl StreakCounter {
    /// Apply one activity on `today`.
    ///
    /// At most one increment per calendar day. A gap of more than one day
    /// restarts the streak at 1 and reports the missed dates.
    pub fn record_activity(&mut self, today: NaiveDate) -> StreakChange {
        let change = if self.streak == 0 {
            self.streak = 1;
            StreakChange::Started
        } else {
            match self.last_activity_date {
                Some(last) if last >= today => StreakChange::Unchanged,
                Some(last) if last == today - Duration::days(1) => {
                    self.streak = self.streak.saturating_add(1);
                    StreakChange::Advanced {
                        new_streak: self.streak,
                    }
                }
                last => {
                    let previous_streak = self.streak;
                    self.streak = 1;
                    StreakChange::Broken {
                        previous_streak,
                        missed_dates: last
                            .map(|last| missed_dates(last, today))
                            .unwrap_or_default(),
                    }
                }
            }
        };

        self.last_activity_date = Some(match self.last_activity_date {
            Some(last) if last > today => last,
            _ => today,
        });
        self.best_streak = self.best_streak.max(self.streak);
        change
    }

    /// Foreground check: zero a streak whose last activity is older than
    /// yesterday. The date is left as is so the gap stays visible.
    pub fn expire_if_lapsed(&mut self, today: NaiveDate) -> StreakChange {
        if self.state(today) != StreakState::Broken {
            return StreakChange::Unchanged;
        }

        let previous_streak = self.streak;
        self.streak = 0;
        StreakChange::Broken {
            previous_streak,
            missed_dates: self
                .last_activity_date
                .map(|last| missed_dates(last, today))
                .unwrap_or_default(),
        }
    }

    pub fn state(&self, today: NaiveDate) -> StreakState {
        if self.streak == 0 {
            return StreakState::None;
        }

        match self.last_activity_date {
            Some(last) if last >= today => StreakState::Active,
            Some(last) if last == today - Duration::days(1) => StreakState::AtRisk,
            _ => StreakState::Broken,
        }
    }
}

/// Upper bound on reported missed dates; longer gaps keep the most recent ones
pub const MAX_MISSED_DATES: i64 = 366;

/// Calendar dates strictly between `last` and `today`
pub fn missed_dates(last: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    let first = (last + Duration::days(1)).max(today - Duration::days(MAX_MISSED_DATES));
    first.iter_days().take_while(|date| *date < today).collect()
}
