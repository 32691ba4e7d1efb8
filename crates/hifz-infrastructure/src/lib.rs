// Infrastructure layer - Technical implementations
// Depends on domain layer, implements its interfaces

pub mod config;
pub mod events;
pub mod http;
pub mod logging;
pub mod persistence;
pub mod realtime;
pub mod remote;
pub mod session;
