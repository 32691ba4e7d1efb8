use std::sync::Arc;

use hifz_infrastructure::persistence::{Database, SqliteKeyValueStore};

pub async fn setup_in_memory_db() -> Database {
    let db = Database::in_memory().await.expect("Open in-memory database");
    db.run_migrations().await.expect("Run migrations");
    db
}

pub async fn setup_kv_store() -> (Database, SqliteKeyValueStore) {
    let db = setup_in_memory_db().await;
    let store = SqliteKeyValueStore::new(Arc::new(db.pool().clone()));
    (db, store)
}
