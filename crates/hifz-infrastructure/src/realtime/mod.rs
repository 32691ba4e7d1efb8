use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use std::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use hifz_domain::remote::{ChangeFeed, ChangeKind, ChangeStream, TableChange};
use hifz_domain::shared::DomainError;

const CHANNEL_CAPACITY: usize = 64;

/// How `subscribe` behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Subscriptions connect immediately
    Available,
    /// Subscriptions fail to connect
    Unavailable,
    /// Subscriptions never finish connecting
    Hanging,
}

#[derive(Debug, Clone)]
enum FeedSignal {
    Change(TableChange),
    Lost(String),
}

/// In-process change feed over a `tokio::sync::broadcast` channel.
///
/// Writers call `publish` after a successful write; every open stream for
/// that table receives a `TableChange`. `disconnect` drops all open streams
/// with an error.
pub struct BroadcastChangeFeed {
    sender: broadcast::Sender<FeedSignal>,
    mode: Mutex<FeedMode>,
}

impl Default for BroadcastChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastChangeFeed {
    pub fn new() -> Self {
        Self::with_mode(FeedMode::Available)
    }

    pub fn with_mode(mode: FeedMode) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            mode: Mutex::new(mode),
        }
    }

    pub fn set_mode(&self, mode: FeedMode) {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    fn mode(&self) -> FeedMode {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn publish(&self, table: &str, kind: ChangeKind) {
        let change = TableChange {
            table: table.to_string(),
            kind,
            occurred_at: Utc::now(),
        };
        // No receivers is fine
        let _ = self.sender.send(FeedSignal::Change(change));
    }

    /// Fail every open stream
    pub fn disconnect(&self, reason: &str) {
        warn!("Realtime channel lost: {}", reason);
        let _ = self.sender.send(FeedSignal::Lost(reason.to_string()));
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl ChangeFeed for BroadcastChangeFeed {
    async fn subscribe(&self, table: &str) -> Result<ChangeStream, DomainError> {
        match self.mode() {
            FeedMode::Unavailable => {
                return Err(DomainError::NetworkUnavailable(
                    "Realtime channel unavailable".to_string(),
                ))
            }
            FeedMode::Hanging => futures::future::pending::<()>().await,
            FeedMode::Available => {}
        }

        debug!(table, "Realtime subscription established");
        let receiver = self.sender.subscribe();
        let table = table.to_string();

        let stream = futures::stream::unfold(
            (receiver, table, false),
            |(mut receiver, table, lost)| async move {
                if lost {
                    return None;
                }
                loop {
                    match receiver.recv().await {
                        Ok(FeedSignal::Change(change)) if change.table == table => {
                            return Some((Ok(change), (receiver, table, false)));
                        }
                        Ok(FeedSignal::Change(_)) => continue,
                        Ok(FeedSignal::Lost(reason)) => {
                            let err = DomainError::NetworkUnavailable(reason);
                            return Some((Err(err), (receiver, table, true)));
                        }
                        // Missed notifications collapse into one
                        Err(RecvError::Lagged(_)) => {
                            let change = TableChange {
                                table: table.clone(),
                                kind: ChangeKind::Update,
                                occurred_at: Utc::now(),
                            };
                            return Some((Ok(change), (receiver, table, false)));
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            },
        );

        Ok(stream.boxed())
    }
}
