use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::fmt;
use tracing::debug;
use url::Url;

use super::retry::{execute_with_retry, RetryConfig};
use crate::config::SyncConfig;
use hifz_domain::remote::{RemoteMethod, RemoteRequest, RemoteResponse, RemoteTable};
use hifz_domain::shared::DomainError;

const USER_AGENT: &str = concat!("hifz/", env!("CARGO_PKG_VERSION"));

/// Failure of a single HTTP attempt
enum AttemptError {
    Transport(reqwest::Error),
    /// Response with a retryable status (5xx, 429)
    Status(RemoteResponse),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Transport(e) => write!(f, "{}", e),
            AttemptError::Status(response) => write!(f, "HTTP {}", response.status),
        }
    }
}

impl AttemptError {
    /// Retries on:
    /// - Network errors (connection failures, timeouts)
    /// - 5xx server errors
    /// - 429 Too Many Requests
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            AttemptError::Status(_) => true,
        }
    }
}

/// `RemoteTable` over a PostgREST endpoint (`{base}/rest/v1/{table}`)
pub struct PostgrestClient {
    client: Client,
    rest_url: Url,
    api_key: String,
    retry_config: RetryConfig,
}

impl PostgrestClient {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let base = config
            .remote_url
            .as_deref()
            .context("Remote URL is not configured")?;
        let rest_url = Url::parse(&format!("{}/rest/v1/", base.trim_end_matches('/')))
            .context("Invalid remote URL")?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeouts.http_request)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            rest_url,
            api_key: config.api_key.clone(),
            retry_config: config.retry.clone(),
        })
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    fn table_url(&self, table: &str) -> Result<Url, DomainError> {
        self.rest_url
            .join(table)
            .map_err(|e| DomainError::Validation(format!("Invalid table name {}: {}", table, e)))
    }

    async fn send_once(&self, url: &Url, request: &RemoteRequest) -> Result<RemoteResponse, AttemptError> {
        let method = match request.method {
            RemoteMethod::Get => Method::GET,
            RemoteMethod::Patch => Method::PATCH,
            RemoteMethod::Post => Method::POST,
        };

        let mut builder = self
            .client
            .request(method, url.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&request.query.to_query_pairs());

        if request.method != RemoteMethod::Get {
            builder = builder.header("Prefer", "return=representation");
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(AttemptError::Transport)?;
        let status = response.status();
        let text = response.text().await.map_err(AttemptError::Transport)?;

        let payload = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        let remote_response = RemoteResponse::new(status.as_u16(), payload);

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::Status(remote_response));
        }

        Ok(remote_response)
    }
}

#[async_trait]
impl RemoteTable for PostgrestClient {
    async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, DomainError> {
        let url = self.table_url(&request.table)?;
        let operation_name = format!("{} {}", request.method, request.table);

        let result = execute_with_retry(
            &self.retry_config,
            &operation_name,
            || self.send_once(&url, &request),
            AttemptError::is_retryable,
        )
        .await;

        match result {
            Ok(response) => {
                debug!(status = response.status, "{} completed", operation_name);
                Ok(response)
            }
            Err(AttemptError::Status(response)) => Err(DomainError::NetworkUnavailable(format!(
                "{}: HTTP {}",
                operation_name, response.status
            ))),
            Err(AttemptError::Transport(e)) if e.is_timeout() => Err(DomainError::Timeout(
                format!("{}: {}", operation_name, e),
            )),
            Err(AttemptError::Transport(e)) => Err(DomainError::NetworkUnavailable(format!(
                "{}: {}",
                operation_name, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local server answering every request with `status`, counting requests
    async fn serve_status(status: &'static str) -> (String, Arc<AtomicU32>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), hits)
    }

    fn fast_retries(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff_multiplier: 2.0,
        }
    }

    fn config(url: Option<&str>) -> SyncConfig {
        SyncConfig {
            remote_url: url.map(str::to_string),
            api_key: "anon".to_string(),
            ..SyncConfig::default()
        }
    }

    #[test]
    fn test_requires_remote_url() {
        assert!(PostgrestClient::new(&config(None)).is_err());
    }

    #[test]
    fn test_table_url_is_under_rest_v1() {
        let client = PostgrestClient::new(&config(Some("https://db.example.com/"))).unwrap();
        assert_eq!(
            client.table_url("leaderboard_stats").unwrap().as_str(),
            "https://db.example.com/rest/v1/leaderboard_stats"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_unavailable() {
        let client = PostgrestClient::new(&config(Some("http://127.0.0.1:9")))
            .unwrap()
            .with_retry_config(RetryConfig::none());

        let result = client
            .execute(RemoteRequest::get("leaderboard_stats", Default::default()))
            .await;

        match result {
            Err(e) => assert!(e.is_recoverable(), "unexpected error: {}", e),
            Ok(response) => panic!("expected failure, got {:?}", response),
        }
    }

    #[tokio::test]
    async fn test_exhausted_server_errors_are_network_unavailable() {
        let (url, hits) = serve_status("503 Service Unavailable").await;
        let client = PostgrestClient::new(&config(Some(&url)))
            .unwrap()
            .with_retry_config(fast_retries(2));

        let err = client
            .execute(RemoteRequest::get("leaderboard_stats", Default::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NetworkUnavailable(_)), "unexpected error: {}", err);
        assert!(err.is_recoverable());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_reach_the_caller() {
        let (url, hits) = serve_status("403 Forbidden").await;
        let client = PostgrestClient::new(&config(Some(&url)))
            .unwrap()
            .with_retry_config(fast_retries(2));

        let response = client
            .execute(RemoteRequest::get("leaderboard_stats", Default::default()))
            .await
            .expect("4xx is a response, not a transport failure");

        assert_eq!(response.status, 403);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
