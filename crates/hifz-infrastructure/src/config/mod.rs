mod sync;
mod timeouts;

pub use sync::SyncConfig;
pub use timeouts::TimeoutConfig;
