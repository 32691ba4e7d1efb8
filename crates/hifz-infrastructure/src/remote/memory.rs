use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::realtime::BroadcastChangeFeed;
use hifz_domain::achievements::ACHIEVEMENTS_TABLE;
use hifz_domain::leaderboard::{LEADERBOARD_TABLE, PROFILES_TABLE};
use hifz_domain::reconciliation::PROGRESS_TABLE;
use hifz_domain::remote::{
    ChangeKind, RemoteMethod, RemoteQuery, RemoteRequest, RemoteResponse, RemoteTable, SortOrder,
    UNIQUE_VIOLATION,
};
use hifz_domain::shared::DomainError;

type Row = Map<String, Value>;

#[derive(Default)]
struct TableState {
    tables: HashMap<String, Vec<Row>>,
    fail_next: u32,
    request_counts: HashMap<RemoteMethod, usize>,
}

/// In-process stand-in for the PostgREST store.
///
/// Supports equality filters, ordering, limit and projection, enforces the
/// configured unique keys on insert (409 / `23505`), and publishes a change
/// notification after every successful write when a feed is attached.
pub struct InMemoryRemoteTable {
    state: Mutex<TableState>,
    unique_keys: HashMap<String, Vec<String>>,
    feed: Option<Arc<BroadcastChangeFeed>>,
}

impl Default for InMemoryRemoteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteTable {
    /// Table set used by the sync services, with their unique keys
    pub fn new() -> Self {
        Self::empty()
            .with_unique_key(LEADERBOARD_TABLE, &["user_id"])
            .with_unique_key(PROGRESS_TABLE, &["user_id"])
            .with_unique_key(PROFILES_TABLE, &["id"])
            .with_unique_key(ACHIEVEMENTS_TABLE, &["user_id", "achievement_id"])
    }

    /// No unique constraints at all
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(TableState::default()),
            unique_keys: HashMap::new(),
            feed: None,
        }
    }

    pub fn with_unique_key(mut self, table: &str, columns: &[&str]) -> Self {
        self.unique_keys.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn with_change_feed(mut self, feed: Arc<BroadcastChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Make the next `n` requests fail as if the network were down
    pub fn fail_next_requests(&self, n: u32) {
        self.lock().fail_next = n;
    }

    /// Insert a row directly, bypassing constraints and notifications
    pub fn seed(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            self.lock()
                .tables
                .entry(table.to_string())
                .or_default()
                .push(row);
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock()
            .tables
            .get(table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    pub fn request_count(&self, method: RemoteMethod) -> usize {
        self.lock().request_counts.get(&method).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle(&self, state: &mut TableState, request: &RemoteRequest) -> (RemoteResponse, Option<ChangeKind>) {
        match request.method {
            RemoteMethod::Get => {
                let rows = state
                    .tables
                    .get(&request.table)
                    .map(|rows| select_rows(rows, &request.query))
                    .unwrap_or_default();
                (RemoteResponse::new(200, Value::Array(rows)), None)
            }
            RemoteMethod::Patch => {
                let Some(Value::Object(changes)) = &request.body else {
                    return (bad_request("PATCH body must be an object"), None);
                };
                let rows = state.tables.entry(request.table.clone()).or_default();
                let mut updated = Vec::new();
                for row in rows.iter_mut().filter(|row| matches(row, &request.query)) {
                    for (column, value) in changes {
                        row.insert(column.clone(), value.clone());
                    }
                    updated.push(Value::Object(row.clone()));
                }
                let kind = (!updated.is_empty()).then_some(ChangeKind::Update);
                (RemoteResponse::new(200, Value::Array(updated)), kind)
            }
            RemoteMethod::Post => {
                let new_rows: Vec<Row> = match &request.body {
                    Some(Value::Object(row)) => vec![row.clone()],
                    Some(Value::Array(items)) => items
                        .iter()
                        .filter_map(|item| item.as_object().cloned())
                        .collect(),
                    _ => return (bad_request("POST body must be an object or array"), None),
                };

                let key = self.unique_keys.get(&request.table);
                let rows = state.tables.entry(request.table.clone()).or_default();
                if let Some(key) = key {
                    let duplicate = new_rows.iter().any(|new_row| {
                        rows.iter().any(|existing| same_key(existing, new_row, key))
                    });
                    if duplicate {
                        return (
                            RemoteResponse::new(
                                409,
                                json!({
                                    "code": UNIQUE_VIOLATION,
                                    "message": format!(
                                        "duplicate key value violates unique constraint on {}",
                                        request.table
                                    ),
                                }),
                            ),
                            None,
                        );
                    }
                }

                rows.extend(new_rows.iter().cloned());
                let inserted = new_rows.into_iter().map(Value::Object).collect();
                (RemoteResponse::new(201, Value::Array(inserted)), Some(ChangeKind::Insert))
            }
        }
    }
}

#[async_trait]
impl RemoteTable for InMemoryRemoteTable {
    async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, DomainError> {
        let (response, change) = {
            let mut state = self.lock();
            *state.request_counts.entry(request.method).or_insert(0) += 1;

            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(DomainError::NetworkUnavailable(format!(
                    "{} {}: simulated outage",
                    request.method, request.table
                )));
            }

            self.handle(&mut state, &request)
        };

        debug!(
            method = %request.method,
            table = %request.table,
            status = response.status,
            "In-memory remote request"
        );

        if let (Some(kind), Some(feed)) = (change, &self.feed) {
            feed.publish(&request.table, kind);
        }

        Ok(response)
    }
}

fn bad_request(message: &str) -> RemoteResponse {
    RemoteResponse::new(400, json!({ "code": "PGRST102", "message": message }))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches(row: &Row, query: &RemoteQuery) -> bool {
    query.filters.iter().all(|(column, expected)| {
        row.get(column)
            .map(|value| cell_text(value) == *expected)
            .unwrap_or(false)
    })
}

fn same_key(a: &Row, b: &Row, key: &[String]) -> bool {
    key.iter().all(|column| match (a.get(column), b.get(column)) {
        (Some(x), Some(y)) => cell_text(x) == cell_text(y),
        _ => false,
    })
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(x), Some(y)) => cell_text(x).cmp(&cell_text(y)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn select_rows(rows: &[Row], query: &RemoteQuery) -> Vec<Value> {
    let mut selected: Vec<&Row> = rows.iter().filter(|row| matches(row, query)).collect();

    // Stable sort: ties keep insertion order
    if let Some((column, order)) = &query.order {
        selected.sort_by(|a, b| {
            let ordering = compare_cells(a.get(column), b.get(column));
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    if let Some(limit) = query.limit {
        selected.truncate(limit);
    }

    let columns: Option<Vec<&str>> = query
        .select
        .as_deref()
        .filter(|s| s.trim() != "*")
        .map(|s| s.split(',').map(str::trim).collect());

    selected
        .into_iter()
        .map(|row| match &columns {
            Some(columns) => Value::Object(
                row.iter()
                    .filter(|(k, _)| columns.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            None => Value::Object(row.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_orders_limits_and_projects() {
        let table = InMemoryRemoteTable::new();
        for (id, total) in [("a", 500), ("b", 900), ("c", 650)] {
            table.seed(LEADERBOARD_TABLE, json!({"user_id": id, "total_hasanat": total}));
        }

        let response = table
            .execute(RemoteRequest::get(
                LEADERBOARD_TABLE,
                RemoteQuery::new()
                    .select("user_id")
                    .order_desc("total_hasanat")
                    .limit(2),
            ))
            .await
            .unwrap();

        assert_eq!(response.payload, json!([{"user_id": "b"}, {"user_id": "c"}]));
    }

    #[tokio::test]
    async fn test_post_duplicate_is_conflict() {
        let table = InMemoryRemoteTable::new();
        let row = json!({"user_id": "u1", "total_hasanat": 1});

        let first = table
            .execute(RemoteRequest::post(LEADERBOARD_TABLE, row.clone()))
            .await
            .unwrap();
        assert_eq!(first.status, 201);

        let second = table
            .execute(RemoteRequest::post(LEADERBOARD_TABLE, row))
            .await
            .unwrap();
        assert!(second.is_conflict());
        assert_eq!(table.rows(LEADERBOARD_TABLE).len(), 1);
    }

    #[tokio::test]
    async fn test_patch_returns_updated_rows() {
        let table = InMemoryRemoteTable::new();
        let filter = RemoteQuery::new().eq("user_id", "u1");

        let missing = table
            .execute(RemoteRequest::patch(LEADERBOARD_TABLE, filter.clone(), json!({"total_hasanat": 5})))
            .await
            .unwrap();
        assert!(missing.is_success());
        assert!(missing.rows().is_empty());

        table.seed(LEADERBOARD_TABLE, json!({"user_id": "u1", "total_hasanat": 1}));
        let hit = table
            .execute(RemoteRequest::patch(LEADERBOARD_TABLE, filter, json!({"total_hasanat": 5})))
            .await
            .unwrap();
        assert_eq!(hit.rows().len(), 1);
        assert_eq!(table.rows(LEADERBOARD_TABLE)[0]["total_hasanat"], 5);
    }

    #[tokio::test]
    async fn test_simulated_outage() {
        let table = InMemoryRemoteTable::new();
        table.fail_next_requests(1);

        let err = table
            .execute(RemoteRequest::get(LEADERBOARD_TABLE, RemoteQuery::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NetworkUnavailable(_)));

        assert!(table
            .execute(RemoteRequest::get(LEADERBOARD_TABLE, RemoteQuery::new()))
            .await
            .is_ok());
        assert_eq!(table.request_count(RemoteMethod::Get), 2);
    }
}
