use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use hifz_infrastructure::config::SyncConfig;
use hifz_infrastructure::logging::init_logger;
use hifz_lib::application::services::ConfigService;
use hifz_lib::presentation::commands::{self, Cli};
use hifz_lib::{build_runtime, AppPaths};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AppPaths::resolve()?;

    // Log level comes from the persisted config, read before the logger exists
    let log_level = ConfigService::new(&paths.config_dir)?.get_log_level();
    init_logger(&paths.log_dir, log_level.as_str())?;

    info!("🚀 Starting hifz v{}", env!("CARGO_PKG_VERSION"));

    let runtime = build_runtime(&paths, SyncConfig::from_env()).await?;
    runtime.engine.init().await;

    let result = commands::run(
        &runtime.engine,
        cli.command,
        runtime.config.leaderboard_enabled(),
    )
    .await;

    runtime.shutdown().await;

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    result
}
