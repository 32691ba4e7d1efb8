use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::warn;

use crate::presentation::state::ProgressEngine;
use hifz_domain::leaderboard::{LeaderboardMetric, LeaderboardRow};
use hifz_domain::progress::TimeWindow;
use hifz_domain::shared::DomainError;

#[derive(Debug, Parser)]
#[command(name = "hifz", version, about = "Memorization progress, streaks and leaderboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show local progress and streak
    Status,
    /// Record units earned now
    Add { amount: u64 },
    /// Mark one item of a unit as memorized
    Complete { unit: String, index: u32 },
    /// Zero the counters
    Reset {
        /// Also clear memorized items
        #[arg(long)]
        all: bool,
    },
    /// Reconcile with the remote copy and push leaderboard stats
    Sync,
    /// Print the leaderboard
    Leaderboard {
        #[arg(long, default_value = "hasanat")]
        metric: LeaderboardMetric,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the signed-in user's rank
    Rank {
        #[arg(long, default_value = "hasanat")]
        metric: LeaderboardMetric,
    },
    /// Follow the leaderboard until interrupted
    Watch {
        #[arg(long, default_value = "hasanat")]
        metric: LeaderboardMetric,
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub async fn run(engine: &ProgressEngine, command: Command, leaderboard_enabled: bool) -> Result<()> {
    match command {
        Command::Status => print_status(engine).await,
        Command::Add { amount } => {
            let update = engine.add_units(amount).await?;
            println!(
                "+{} → today {}, total {}, streak {}",
                amount, update.today_units, update.total_units, update.streak
            );
            sync_quietly(engine).await;
        }
        Command::Complete { unit, index } => {
            let record = engine.mark_item_complete(&unit, index).await?;
            println!("{}: {}/{} memorized", unit, record.memorized, record.total);
        }
        Command::Reset { all } => {
            engine.reset_all(all).await?;
            println!("Progress reset{}", if all { " (including memorized items)" } else { "" });
        }
        Command::Sync => {
            let merged = engine.sync().await?;
            println!(
                "Synced: total {}, streak {} (best {})",
                merged.total_units, merged.streak, merged.best_streak
            );
        }
        Command::Leaderboard { metric, limit } => {
            ensure_enabled(leaderboard_enabled)?;
            let limit = limit.unwrap_or(engine.leaderboard_limit());
            print_rows(&engine.leaderboard(metric, limit).await?);
        }
        Command::Rank { metric } => {
            ensure_enabled(leaderboard_enabled)?;
            match engine.my_rank(metric).await? {
                Some(rank) => println!("#{} by {}", rank, metric),
                None => println!("Not ranked yet; run `hifz sync` first"),
            }
        }
        Command::Watch { metric, limit } => {
            ensure_enabled(leaderboard_enabled)?;
            let limit = limit.unwrap_or(engine.leaderboard_limit());
            let subscription = engine.subscribe_leaderboard(metric, limit, |rows| {
                println!("--- {} ---", chrono::Local::now().format("%H:%M:%S"));
                print_rows(&rows);
            });

            tokio::signal::ctrl_c().await?;
            subscription.unsubscribe();
            // let the last log lines flush
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    Ok(())
}

fn ensure_enabled(leaderboard_enabled: bool) -> Result<()> {
    if leaderboard_enabled {
        Ok(())
    } else {
        anyhow::bail!("Leaderboard is disabled in app_config.json")
    }
}

async fn print_status(engine: &ProgressEngine) {
    let snapshot = engine.snapshot().await;
    let state = engine.streak_state().await;
    let weekly = engine.time_windowed_units(TimeWindow::Weekly).await;
    let monthly = engine.time_windowed_units(TimeWindow::Monthly).await;

    println!("Total units:   {}", snapshot.total_units);
    println!("Today:         {}", snapshot.today_units);
    println!("This week:     {}", weekly);
    println!("This month:    {}", monthly);
    println!(
        "Streak:        {} ({:?}, best {})",
        snapshot.streak, state, snapshot.best_streak
    );
    match snapshot.last_activity_date {
        Some(date) => println!("Last activity: {}", date),
        None => println!("Last activity: never"),
    }
    for (unit, record) in &snapshot.memorized_items {
        println!("  {:<12} {}/{}", unit, record.memorized, record.total);
    }
}

/// Sync after a local change when possible; offline is not an error here
async fn sync_quietly(engine: &ProgressEngine) {
    match engine.sync().await {
        Ok(_) => {}
        Err(DomainError::AuthRequired) => {}
        Err(e) => warn!("Sync after update failed: {}", e),
    }
}

fn print_rows(rows: &[LeaderboardRow]) {
    if rows.is_empty() {
        println!("(no entries)");
        return;
    }
    for row in rows {
        println!("{:>3}. {:<24} {:>8} {}", row.rank, row.name, row.value, row.label);
    }
}
