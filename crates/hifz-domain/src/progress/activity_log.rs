use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Weekly,
    Monthly,
}

impl TimeWindow {
    /// First day of the window containing `today`. Weeks start on Sunday.
    pub fn start(&self, today: NaiveDate) -> NaiveDate {
        match self {
            TimeWindow::Weekly => {
                today - Duration::days(today.weekday().num_days_from_sunday() as i64)
            }
            TimeWindow::Monthly => today.with_day(1).unwrap_or(today),
        }
    }
}

/// Units earned per calendar day, retained for the current week and month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityLog {
    days: BTreeMap<NaiveDate, u64>,
}

impl ActivityLog {
    pub fn record(&mut self, date: NaiveDate, units: u64) {
        let entry = self.days.entry(date).or_insert(0);
        *entry = entry.saturating_add(units);
    }

    /// Drop days that can no longer fall into either window
    pub fn prune(&mut self, today: NaiveDate) {
        let cutoff = TimeWindow::Weekly
            .start(today)
            .min(TimeWindow::Monthly.start(today));
        self.days.retain(|date, _| *date >= cutoff);
    }

    pub fn units_in(&self, window: TimeWindow, today: NaiveDate) -> u64 {
        self.days
            .range(window.start(today)..=today)
            .map(|(_, units)| *units)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_starts_on_sunday() {
        // 2024-01-10 is a Wednesday
        assert_eq!(TimeWindow::Weekly.start(date(2024, 1, 10)), date(2024, 1, 7));
        assert_eq!(TimeWindow::Weekly.start(date(2024, 1, 7)), date(2024, 1, 7));
        assert_eq!(TimeWindow::Monthly.start(date(2024, 1, 10)), date(2024, 1, 1));
    }

    #[test]
    fn test_units_in_windows() {
        let mut log = ActivityLog::default();
        log.record(date(2024, 1, 2), 100);
        log.record(date(2024, 1, 8), 40);
        log.record(date(2024, 1, 10), 10);
        log.record(date(2024, 1, 10), 5);

        let today = date(2024, 1, 10);
        assert_eq!(log.units_in(TimeWindow::Weekly, today), 55);
        assert_eq!(log.units_in(TimeWindow::Monthly, today), 155);
        assert_eq!(log.units_in(TimeWindow::Weekly, date(2024, 1, 9)), 40);
    }

    #[test]
    fn test_prune_keeps_week_spanning_month_boundary() {
        let mut log = ActivityLog::default();
        log.record(date(2024, 1, 15), 7);
        log.record(date(2024, 1, 29), 3);
        log.record(date(2024, 2, 1), 2);

        // 2024-02-01 is a Thursday; its week started on 2024-01-28
        let today = date(2024, 2, 1);
        log.prune(today);

        assert_eq!(
            serde_json::to_string(&log).unwrap(),
            r#"{"2024-01-29":3,"2024-02-01":2}"#
        );
        assert_eq!(log.units_in(TimeWindow::Weekly, today), 5);
        assert_eq!(log.units_in(TimeWindow::Monthly, today), 2);
    }

    #[test]
    fn test_serializes_as_date_keyed_map() {
        let mut log = ActivityLog::default();
        log.record(date(2024, 3, 5), 12);

        let json = serde_json::to_string(&log).unwrap();
        assert_eq!(json, r#"{"2024-03-05":12}"#);

        let back: ActivityLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }
}
