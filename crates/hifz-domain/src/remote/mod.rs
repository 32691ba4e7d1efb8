use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::shared::DomainError;

/// Postgres unique_violation, reported by PostgREST in the error body
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteMethod {
    Get,
    Patch,
    Post,
}

impl fmt::Display for RemoteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteMethod::Get => write!(f, "GET"),
            RemoteMethod::Patch => write!(f, "PATCH"),
            RemoteMethod::Post => write!(f, "POST"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Row selection: projection, equality filters, ordering, limit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteQuery {
    pub select: Option<String>,
    pub filters: Vec<(String, String)>,
    pub order: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
}

impl RemoteQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), value.to_string()));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some((column.to_string(), SortOrder::Desc));
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some((column.to_string(), SortOrder::Asc));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query string pairs in PostgREST syntax
    /// (`user_id=eq.X`, `order=col.desc`, `limit=N`)
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        for (column, value) in &self.filters {
            pairs.push((column.clone(), format!("eq.{}", value)));
        }
        if let Some((column, order)) = &self.order {
            let dir = match order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            pairs.push(("order".to_string(), format!("{}.{}", column, dir)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: RemoteMethod,
    pub table: String,
    pub query: RemoteQuery,
    pub body: Option<Value>,
}

impl RemoteRequest {
    pub fn get(table: &str, query: RemoteQuery) -> Self {
        Self {
            method: RemoteMethod::Get,
            table: table.to_string(),
            query,
            body: None,
        }
    }

    /// Conditional update of the rows matched by `query`
    pub fn patch(table: &str, query: RemoteQuery, body: Value) -> Self {
        Self {
            method: RemoteMethod::Patch,
            table: table.to_string(),
            query,
            body: Some(body),
        }
    }

    pub fn post(table: &str, body: Value) -> Self {
        Self {
            method: RemoteMethod::Post,
            table: table.to_string(),
            query: RemoteQuery::default(),
            body: Some(body),
        }
    }
}

/// Status code plus JSON payload (`Null` for empty bodies)
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub payload: Value,
}

impl RemoteResponse {
    pub fn new(status: u16, payload: Value) -> Self {
        Self { status, payload }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Insert rejected because the row already exists
    pub fn is_conflict(&self) -> bool {
        self.status == 409
            || self.payload.get("code").and_then(Value::as_str) == Some(UNIQUE_VIOLATION)
    }

    /// Rows of a successful response. Non-array payloads count as empty.
    pub fn rows(&self) -> &[Value] {
        self.payload.as_array().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, DomainError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Human-readable failure detail
    pub fn error_message(&self) -> String {
        self.payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.payload.to_string())
    }

    /// Turn a non-success response into `RemoteConflict` or `Remote`
    pub fn into_result(self) -> Result<RemoteResponse, DomainError> {
        if self.is_success() {
            Ok(self)
        } else if self.is_conflict() {
            Err(DomainError::RemoteConflict(self.error_message()))
        } else {
            Err(DomainError::Remote {
                status: self.status,
                message: self.error_message(),
            })
        }
    }
}

/// HTTP-like access to remote tables.
///
/// Returns `Err` only when no response could be obtained; an HTTP error
/// status is a successful call with a non-success `RemoteResponse`.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, DomainError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Notification that a remote table changed. Carries no row data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChange {
    pub table: String,
    pub kind: ChangeKind,
    pub occurred_at: DateTime<Utc>,
}

pub type ChangeStream = BoxStream<'static, Result<TableChange, DomainError>>;

/// Push channel for remote table changes.
///
/// `subscribe` may fail or never resolve; callers bound it with a deadline.
/// An `Err` item or the end of the stream means the channel is lost.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, table: &str) -> Result<ChangeStream, DomainError>;
}
