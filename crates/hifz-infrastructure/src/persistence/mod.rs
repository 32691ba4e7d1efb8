mod database;
mod kv_store;
mod memory_store;
mod result_ext;

pub use database::Database;
pub use kv_store::SqliteKeyValueStore;
pub use memory_store::InMemoryKeyValueStore;
pub use result_ext::ResultExt;
