use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::application::services::ConfigService;
use crate::presentation::state::{EngineDeps, ProgressEngine};
use hifz_domain::remote::{ChangeFeed, RemoteTable};
use hifz_domain::session::SessionProvider;
use hifz_domain::shared::{SystemClock, UserId};
use hifz_infrastructure::config::SyncConfig;
use hifz_infrastructure::events::InMemoryEventBus;
use hifz_infrastructure::http::PostgrestClient;
use hifz_infrastructure::persistence::{Database, SqliteKeyValueStore};
use hifz_infrastructure::realtime::{BroadcastChangeFeed, FeedMode};
use hifz_infrastructure::remote::InMemoryRemoteTable;
use hifz_infrastructure::session::InMemorySession;

/// Signed-in user id for the CLI session
pub const USER_ID_ENV: &str = "HIFZ_USER_ID";

/// Where the app keeps its files
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl AppPaths {
    /// `<data dir>/hifz`, e.g. `~/.local/share/hifz` on Linux
    pub fn resolve() -> Result<Self> {
        let base = dirs::data_dir().context("Failed to resolve user data directory")?;
        Ok(Self::under(base.join("hifz")))
    }

    pub fn under(data_dir: PathBuf) -> Self {
        let db_filename = if cfg!(debug_assertions) {
            "hifz-dev.db"
        } else {
            "hifz.db"
        };

        Self {
            db_path: data_dir.join(db_filename),
            log_dir: data_dir.join("logs"),
            config_dir: data_dir.join("config"),
            data_dir,
        }
    }
}

pub struct AppRuntime {
    pub engine: ProgressEngine,
    pub config: Arc<ConfigService>,
    pub database: Arc<Database>,
}

impl AppRuntime {
    pub async fn shutdown(&self) {
        self.engine.shutdown();
        self.database.close().await;
    }
}

pub async fn build_runtime(paths: &AppPaths, sync_config: SyncConfig) -> Result<AppRuntime> {
    let startup_started_at = Instant::now();

    let started_at = Instant::now();
    std::fs::create_dir_all(&paths.data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", paths.data_dir))?;
    info!(
        "✓ Ensured data dir exists ({}ms)",
        started_at.elapsed().as_millis()
    );

    let config = Arc::new(ConfigService::new(&paths.config_dir)?);

    let db_path = paths.db_path.to_str().context("Invalid database path")?;
    info!("Database path: {}", db_path);

    info!("🔌 Connecting to database...");
    let started_at = Instant::now();
    let database = Arc::new(Database::new(db_path).await?);
    info!(
        "✓ Database connection established ({}ms)",
        started_at.elapsed().as_millis()
    );

    info!("🔄 Running migrations...");
    let started_at = Instant::now();
    database.run_migrations().await?;
    info!(
        "✓ Migrations completed ({}ms)",
        started_at.elapsed().as_millis()
    );

    let storage = Arc::new(SqliteKeyValueStore::new(Arc::new(database.pool().clone())));

    let started_at = Instant::now();
    let (remote, feed) = build_remote(&sync_config)?;
    info!(
        "✓ Remote backend ready: {} ({}ms)",
        if sync_config.is_offline() { "offline" } else { "postgrest" },
        started_at.elapsed().as_millis()
    );

    let session: Arc<dyn SessionProvider> = match std::env::var(USER_ID_ENV) {
        Ok(id) if !id.trim().is_empty() => {
            Arc::new(InMemorySession::signed_in(UserId::from_string(id.trim())))
        }
        _ => Arc::new(InMemorySession::new()),
    };

    let engine = ProgressEngine::new(EngineDeps {
        storage,
        remote,
        feed,
        session,
        clock: Arc::new(SystemClock),
        event_bus: Arc::new(InMemoryEventBus::new()),
        config: sync_config,
    });

    info!(
        "✓ Startup completed ({}ms)",
        startup_started_at.elapsed().as_millis()
    );

    Ok(AppRuntime {
        engine,
        config,
        database,
    })
}

/// PostgREST when a remote URL is configured, otherwise an in-process
/// table with a live change feed.
fn build_remote(config: &SyncConfig) -> Result<(Arc<dyn RemoteTable>, Arc<dyn ChangeFeed>)> {
    if config.is_offline() {
        let feed = Arc::new(BroadcastChangeFeed::new());
        let remote = Arc::new(InMemoryRemoteTable::new().with_change_feed(feed.clone()));
        return Ok((remote, feed));
    }

    let remote = Arc::new(PostgrestClient::new(config)?);
    // No realtime transport for PostgREST; subscribers poll
    let feed = Arc::new(BroadcastChangeFeed::with_mode(FeedMode::Unavailable));
    Ok((remote, feed))
}
