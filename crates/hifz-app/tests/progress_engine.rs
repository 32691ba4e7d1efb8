use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use hifz_domain::events::progress_events::StreakBroken;
use hifz_domain::events::{EventHandler, TypedEventHandlerWrapper};
use hifz_domain::progress::TimeWindow;
use hifz_domain::shared::DomainError;
use hifz_domain::streak::StreakState;

mod test_helpers;
use test_helpers::{day, setup_engine};

struct Recorder(Arc<Mutex<Vec<StreakBroken>>>);

#[async_trait]
impl EventHandler<StreakBroken> for Recorder {
    async fn handle(&self, event: &StreakBroken) -> Result<(), DomainError> {
        self.0.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[tokio::test]
async fn daily_amounts_sum_into_today_and_total() {
    let t = setup_engine(day(2024, 1, 10)).await;

    for amount in [3, 7, 20] {
        t.engine.add_units(amount).await.expect("Add units");
    }
    let snapshot = t.engine.snapshot().await;
    assert_eq!(snapshot.today_units, 30);
    assert_eq!(snapshot.total_units, 30);

    t.clock.advance_days(1);
    t.engine.add_units(5).await.expect("Add units");
    let snapshot = t.engine.snapshot().await;
    assert_eq!(snapshot.today_units, 5);
    assert_eq!(snapshot.total_units, 35);
    assert_eq!(snapshot.streak, 2);
}

#[tokio::test]
async fn counters_survive_a_restart() {
    let t = setup_engine(day(2024, 1, 10)).await;
    t.engine.add_units(12).await.expect("Add units");
    t.engine
        .mark_item_complete("Al-Ikhlas", 1)
        .await
        .expect("Mark complete");

    // same database, fresh engine
    let reopened = hifz_lib::ProgressEngine::new(hifz_lib::EngineDeps {
        storage: Arc::new(hifz_infrastructure::persistence::SqliteKeyValueStore::new(
            Arc::new(t.db.pool().clone()),
        )),
        remote: t.remote.clone(),
        feed: t.feed.clone(),
        session: t.session.clone(),
        clock: t.clock.clone(),
        event_bus: t.event_bus.clone(),
        config: Default::default(),
    });

    let snapshot = reopened.snapshot().await;
    assert_eq!(snapshot.total_units, 12);
    assert_eq!(snapshot.streak, 1);
    assert_eq!(snapshot.memorized_items["Al-Ikhlas"].memorized, 1);
}

#[tokio::test]
async fn gap_breaks_streak_with_missed_dates() {
    let t = setup_engine(day(2024, 1, 10)).await;
    let broken = Arc::new(Mutex::new(Vec::new()));
    t.event_bus
        .subscribe::<StreakBroken>(Arc::new(
            TypedEventHandlerWrapper::<StreakBroken, _>::new(Recorder(broken.clone())),
        ))
        .await;

    t.engine.add_units(1).await.expect("Add units");
    t.clock.set(day(2024, 1, 13));
    let update = t.engine.add_units(1).await.expect("Add units");

    assert_eq!(update.streak, 1);
    let events = broken.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].missed_dates,
        vec![day(2024, 1, 11), day(2024, 1, 12)]
    );
}

#[tokio::test]
async fn init_expires_lapsed_streak_once() {
    let t = setup_engine(day(2024, 1, 10)).await;
    let broken = Arc::new(Mutex::new(Vec::new()));
    t.event_bus
        .subscribe::<StreakBroken>(Arc::new(
            TypedEventHandlerWrapper::<StreakBroken, _>::new(Recorder(broken.clone())),
        ))
        .await;

    t.engine.add_units(1).await.expect("Add units");
    t.clock.advance_days(1);
    t.engine.add_units(1).await.expect("Add units");
    assert_eq!(t.engine.streak_state().await, StreakState::Active);

    t.clock.advance_days(1);
    assert_eq!(t.engine.streak_state().await, StreakState::AtRisk);

    t.clock.advance_days(1);
    let snapshot = t.engine.init().await;
    assert_eq!(snapshot.streak, 0);
    assert_eq!(snapshot.best_streak, 2);
    assert_eq!(t.engine.streak_state().await, StreakState::None);

    t.engine.foreground().await.expect("Foreground");
    assert_eq!(broken.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn window_totals_follow_calendar() {
    // Saturday; the next day starts a new week
    let t = setup_engine(day(2024, 3, 30)).await;
    t.engine.add_units(40).await.expect("Add units");
    assert_eq!(t.engine.time_windowed_units(TimeWindow::Weekly).await, 40);

    t.clock.advance_days(1);
    t.engine.add_units(2).await.expect("Add units");
    assert_eq!(t.engine.time_windowed_units(TimeWindow::Weekly).await, 2);
    assert_eq!(t.engine.time_windowed_units(TimeWindow::Monthly).await, 42);

    // April 1st: new month, same week
    t.clock.advance_days(1);
    assert_eq!(t.engine.time_windowed_units(TimeWindow::Weekly).await, 2);
    assert_eq!(t.engine.time_windowed_units(TimeWindow::Monthly).await, 0);
}
