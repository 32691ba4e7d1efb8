use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use hifz_domain::leaderboard::{LeaderboardMetric, LeaderboardRow, LEADERBOARD_TABLE};
use hifz_domain::remote::ChangeFeed;
use hifz_domain::shared::SubscriptionId;
use hifz_infrastructure::config::SyncConfig;

use super::LeaderboardSyncService;

/// Receives the full formatted top-N list on every update
pub type LeaderboardCallback = Arc<dyn Fn(Vec<LeaderboardRow>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Connecting,
    Live,
    Polling,
    /// Terminal
    Closed,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct Shared {
    id: SubscriptionId,
    state: watch::Sender<SubscriptionState>,
    /// `true` while deliveries are allowed. Held for the whole callback.
    gate: Mutex<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    callback: LeaderboardCallback,
}

impl Shared {
    fn deliver(&self, rows: Vec<LeaderboardRow>) {
        let open = lock(&self.gate);
        if !*open {
            debug!(subscription = %self.id, "Dropping delivery after close");
            return;
        }
        (self.callback)(rows);
    }

    fn set_state(&self, next: SubscriptionState) {
        self.state.send_if_modified(|state| {
            if *state == SubscriptionState::Closed || *state == next {
                return false;
            }
            debug!(subscription = %self.id, from = ?*state, to = ?next, "Subscription state");
            *state = next;
            true
        });
    }

    /// Returns false if already closed
    fn close(&self) -> bool {
        {
            let mut open = lock(&self.gate);
            if !*open {
                return false;
            }
            *open = false;
        }

        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        self.state.send_replace(SubscriptionState::Closed);
        true
    }
}

/// Handle to one leaderboard subscription. Dropping it unsubscribes.
pub struct Subscription {
    shared: Arc<Shared>,
    state: watch::Receiver<SubscriptionState>,
}

impl Subscription {
    pub fn id(&self) -> &SubscriptionId {
        &self.shared.id
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Wait until the subscription reaches `target` (or closes)
    pub async fn wait_for_state(&mut self, target: SubscriptionState) -> SubscriptionState {
        match self
            .state
            .wait_for(|s| *s == target || *s == SubscriptionState::Closed)
            .await
        {
            Ok(state) => *state,
            Err(_) => SubscriptionState::Closed,
        }
    }

    /// Stop deliveries and cancel the push channel and timers.
    ///
    /// No callback runs once this returns; a delivery already in progress is
    /// waited for. Calling it again is a no-op. Must not be called from
    /// inside the subscription's own callback.
    pub fn unsubscribe(&self) -> bool {
        let closed = self.shared.close();
        if closed {
            info!(subscription = %self.shared.id, "Leaderboard subscription closed");
        }
        closed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Fans leaderboard changes out to subscribers, live when the change feed
/// connects in time and by polling otherwise.
pub struct UpdateDistributor {
    leaderboard: Arc<LeaderboardSyncService>,
    feed: Arc<dyn ChangeFeed>,
    connect_deadline: Duration,
    poll_interval: Duration,
    subscriptions: Mutex<Vec<Weak<Shared>>>,
}

impl UpdateDistributor {
    pub fn new(
        leaderboard: Arc<LeaderboardSyncService>,
        feed: Arc<dyn ChangeFeed>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            leaderboard,
            feed,
            connect_deadline: config.connect_deadline(),
            poll_interval: config.poll_interval(),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Deliver the top `limit` rows by `metric` to `callback` until the
    /// returned handle is unsubscribed or dropped. Must be called inside a
    /// Tokio runtime.
    pub fn subscribe<F>(&self, metric: LeaderboardMetric, limit: usize, callback: F) -> Subscription
    where
        F: Fn(Vec<LeaderboardRow>) + Send + Sync + 'static,
    {
        let (state_tx, state_rx) = watch::channel(SubscriptionState::Connecting);
        let shared = Arc::new(Shared {
            id: SubscriptionId::new(),
            state: state_tx,
            gate: Mutex::new(true),
            task: Mutex::new(None),
            callback: Arc::new(callback),
        });

        let task = tokio::spawn(run_subscription(
            shared.clone(),
            self.leaderboard.clone(),
            self.feed.clone(),
            metric,
            limit,
            self.connect_deadline,
            self.poll_interval,
        ));
        *lock(&shared.task) = Some(task);

        let mut subscriptions = lock(&self.subscriptions);
        subscriptions.retain(|s| s.strong_count() > 0);
        subscriptions.push(Arc::downgrade(&shared));

        info!(subscription = %shared.id, %metric, limit, "Leaderboard subscription opened");
        Subscription {
            shared,
            state: state_rx,
        }
    }

    /// Subscriptions not yet closed
    pub fn active_count(&self) -> usize {
        lock(&self.subscriptions)
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|s| *s.state.borrow() != SubscriptionState::Closed)
            .count()
    }

    /// Close every open subscription
    pub fn shutdown(&self) {
        let subscriptions: Vec<_> = lock(&self.subscriptions).drain(..).collect();
        let closed = subscriptions
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|s| s.close())
            .count();
        info!("Update distributor stopped, {} subscription(s) closed", closed);
    }
}

async fn run_subscription(
    shared: Arc<Shared>,
    leaderboard: Arc<LeaderboardSyncService>,
    feed: Arc<dyn ChangeFeed>,
    metric: LeaderboardMetric,
    limit: usize,
    connect_deadline: Duration,
    poll_interval: Duration,
) {
    match timeout(connect_deadline, feed.subscribe(LEADERBOARD_TABLE)).await {
        Ok(Ok(mut changes)) => {
            shared.set_state(SubscriptionState::Live);
            refresh(&shared, &leaderboard, metric, limit).await;

            while let Some(change) = changes.next().await {
                match change {
                    Ok(change) => {
                        debug!(subscription = %shared.id, kind = ?change.kind, "Leaderboard changed");
                        refresh(&shared, &leaderboard, metric, limit).await;
                    }
                    Err(e) => {
                        warn!(subscription = %shared.id, "Live channel lost, polling instead: {}", e);
                        break;
                    }
                }
            }
        }
        Ok(Err(e)) => {
            warn!(subscription = %shared.id, "Live channel unavailable, polling instead: {}", e);
        }
        Err(_) => {
            warn!(
                subscription = %shared.id,
                "Live channel did not connect within {:?}, polling instead",
                connect_deadline
            );
        }
    }

    shared.set_state(SubscriptionState::Polling);
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        refresh(&shared, &leaderboard, metric, limit).await;
    }
}

/// Fetch and deliver. A failed fetch keeps the last delivered list.
async fn refresh(
    shared: &Shared,
    leaderboard: &LeaderboardSyncService,
    metric: LeaderboardMetric,
    limit: usize,
) {
    match leaderboard.leaderboard(metric, limit).await {
        Ok(rows) => shared.deliver(rows),
        Err(e) => warn!(subscription = %shared.id, "Leaderboard refresh failed: {}", e),
    }
}
