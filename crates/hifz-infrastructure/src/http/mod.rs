mod postgrest;
mod retry;

pub use postgrest::PostgrestClient;
pub use retry::{execute_with_retry, RetryConfig};
