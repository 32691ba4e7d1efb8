#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::Arc;

use hifz_domain::remote::RemoteTable;
use hifz_domain::shared::{ManualClock, UserId};
use hifz_infrastructure::config::SyncConfig;
use hifz_infrastructure::events::InMemoryEventBus;
use hifz_infrastructure::persistence::{Database, SqliteKeyValueStore};
use hifz_infrastructure::realtime::BroadcastChangeFeed;
use hifz_infrastructure::remote::InMemoryRemoteTable;
use hifz_infrastructure::session::InMemorySession;
use hifz_lib::{EngineDeps, ProgressEngine};

pub const USER: &str = "user-42";

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("Valid date")
}

pub struct TestEngine {
    pub engine: ProgressEngine,
    pub db: Database,
    pub remote: Arc<InMemoryRemoteTable>,
    pub feed: Arc<BroadcastChangeFeed>,
    pub session: Arc<InMemorySession>,
    pub clock: Arc<ManualClock>,
    pub event_bus: Arc<InMemoryEventBus>,
}

/// Engine over in-memory SQLite and the in-memory remote, signed in as
/// `USER`, with the clock at `today`
pub async fn setup_engine(today: NaiveDate) -> TestEngine {
    let remote = Arc::new(InMemoryRemoteTable::new());
    setup_engine_with_remote(today, remote.clone(), remote).await
}

pub async fn setup_engine_with_remote(
    today: NaiveDate,
    remote: Arc<dyn RemoteTable>,
    in_memory: Arc<InMemoryRemoteTable>,
) -> TestEngine {
    let db = Database::in_memory().await.expect("Open in-memory database");
    db.run_migrations().await.expect("Run migrations");
    let storage = Arc::new(SqliteKeyValueStore::new(Arc::new(db.pool().clone())));

    let feed = Arc::new(BroadcastChangeFeed::new());
    let session = Arc::new(InMemorySession::signed_in(UserId::from_string(USER)));
    let clock = Arc::new(ManualClock::new(today));
    let event_bus = Arc::new(InMemoryEventBus::new());

    let engine = ProgressEngine::new(EngineDeps {
        storage,
        remote,
        feed: feed.clone(),
        session: session.clone(),
        clock: clock.clone(),
        event_bus: event_bus.clone(),
        config: SyncConfig::default(),
    });

    TestEngine {
        engine,
        db,
        remote: in_memory,
        feed,
        session,
        clock,
        event_bus,
    }
}
