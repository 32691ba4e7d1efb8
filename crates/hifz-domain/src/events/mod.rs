pub mod event_bus;
pub mod progress_events;

use std::any::Any;

pub use event_bus::{DynamicEventHandler, EventBus, EventHandler, TypedEventHandlerWrapper};

/// Base trait for all domain events
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    fn as_any(&self) -> &(dyn Any + Send + Sync);

    /// Concrete type name, used as the dispatch key
    fn event_type_name(&self) -> &'static str;
}
