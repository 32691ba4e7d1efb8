use serde_json::Value;
use tracing::{debug, warn};

use hifz_domain::remote::{RemoteQuery, RemoteRequest, RemoteTable};
use hifz_domain::shared::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated,
    Inserted,
    /// Insert lost a race with another writer; the row was patched instead
    AlreadyExists,
}

/// Update-then-insert on a table keyed by `key_column`.
///
/// PATCH is tried first. If it matched no row the body is POSTed; a unique
/// violation on that insert means another writer created the row in the
/// meantime, so the PATCH is repeated once, best-effort.
pub async fn upsert_by_key(
    remote: &dyn RemoteTable,
    table: &str,
    key_column: &str,
    key_value: &str,
    body: Value,
) -> Result<UpsertOutcome, DomainError> {
    let filter = RemoteQuery::new().eq(key_column, key_value);

    let patched = remote
        .execute(RemoteRequest::patch(table, filter.clone(), body.clone()))
        .await?
        .into_result()?;
    if !patched.rows().is_empty() {
        debug!(table, key = key_value, "Remote row updated");
        return Ok(UpsertOutcome::Updated);
    }

    let inserted = remote
        .execute(RemoteRequest::post(table, body.clone()))
        .await?
        .into_result();
    match inserted {
        Ok(_) => {
            debug!(table, key = key_value, "Remote row inserted");
            return Ok(UpsertOutcome::Inserted);
        }
        Err(DomainError::RemoteConflict(_)) => {}
        Err(e) => return Err(e),
    }

    debug!(table, key = key_value, "Row appeared concurrently, patching");
    if let Err(e) = remote
        .execute(RemoteRequest::patch(table, filter, body))
        .await
        .and_then(|response| response.into_result())
    {
        warn!(table, key = key_value, error = %e, "Re-patch after conflict failed");
    }

    Ok(UpsertOutcome::AlreadyExists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hifz_domain::leaderboard::LEADERBOARD_TABLE;
    use hifz_domain::remote::RemoteMethod;
    use hifz_infrastructure::remote::InMemoryRemoteTable;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_then_update() {
        let remote = InMemoryRemoteTable::new();
        let body = json!({"user_id": "u1", "total_hasanat": 10});

        let first = upsert_by_key(&remote, LEADERBOARD_TABLE, "user_id", "u1", body)
            .await
            .unwrap();
        assert_eq!(first, UpsertOutcome::Inserted);

        let second = upsert_by_key(
            &remote,
            LEADERBOARD_TABLE,
            "user_id",
            "u1",
            json!({"user_id": "u1", "total_hasanat": 20}),
        )
        .await
        .unwrap();
        assert_eq!(second, UpsertOutcome::Updated);

        let rows = remote.rows(LEADERBOARD_TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["total_hasanat"], 20);
        assert_eq!(remote.request_count(RemoteMethod::Post), 1);
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let remote = InMemoryRemoteTable::new();
        remote.fail_next_requests(1);

        let err = upsert_by_key(&remote, LEADERBOARD_TABLE, "user_id", "u1", json!({"user_id": "u1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NetworkUnavailable(_)));
        assert!(remote.rows(LEADERBOARD_TABLE).is_empty());
    }
}
