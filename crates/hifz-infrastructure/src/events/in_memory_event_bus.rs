use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

use hifz_domain::events::{DomainEvent, DynamicEventHandler, EventBus};
use hifz_domain::shared::DomainError;

/// In-memory event bus. Handlers run in registration order before `publish`
/// returns; a failing handler is logged and does not stop the others.
pub struct InMemoryEventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<Arc<dyn DynamicEventHandler>>>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe a handler to a specific event type
    pub async fn subscribe<E: DomainEvent + 'static>(&self, handler: Arc<dyn DynamicEventHandler>) {
        let event_type_name = std::any::type_name::<E>();
        let mut handlers = self.handlers.write().await;

        handlers
            .entry(event_type_name.to_string())
            .or_default()
            .push(handler);

        debug!("Subscribed handler for event type: {}", event_type_name);
    }

    /// Get the number of handlers for a specific event type
    pub async fn handler_count<E: DomainEvent + 'static>(&self) -> usize {
        let event_type_name = std::any::type_name::<E>();
        let handlers = self.handlers.read().await;
        handlers.get(event_type_name).map_or(0, |h| h.len())
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: Box<dyn DomainEvent>) -> Result<(), DomainError> {
        let event_type_name = event.event_type_name();
        let handlers = self.handlers.read().await;

        let Some(event_handlers) = handlers.get(event_type_name) else {
            debug!("No handlers registered for event type: {}", event_type_name);
            return Ok(());
        };

        debug!(
            "Dispatching {} to {} handler(s)",
            event_type_name,
            event_handlers.len()
        );
        for handler in event_handlers {
            if let Err(e) = handler.handle_dynamic(event.as_any()).await {
                error!("Handler failed to process event {}: {}", event_type_name, e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hifz_domain::events::progress_events::{StreakAdvanced, StreakBroken};
    use hifz_domain::events::{EventHandler, TypedEventHandlerWrapper};

    struct RecordingHandler {
        seen: Arc<RwLock<Vec<u32>>>,
    }

    #[async_trait]
    impl EventHandler<StreakAdvanced> for RecordingHandler {
        async fn handle(&self, event: &StreakAdvanced) -> Result<(), DomainError> {
            self.seen.write().await.push(event.new_streak);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler<StreakAdvanced> for FailingHandler {
        async fn handle(&self, _event: &StreakAdvanced) -> Result<(), DomainError> {
            Err(DomainError::Infrastructure("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_event_bus_dispatches_by_concrete_type() {
        let bus = InMemoryEventBus::new();
        let seen = Arc::new(RwLock::new(Vec::new()));

        bus.subscribe::<StreakAdvanced>(Arc::new(
            TypedEventHandlerWrapper::<StreakAdvanced, _>::new(FailingHandler),
        ))
        .await;
        bus.subscribe::<StreakAdvanced>(Arc::new(
            TypedEventHandlerWrapper::<StreakAdvanced, _>::new(RecordingHandler {
                seen: seen.clone(),
            }),
        ))
        .await;
        assert_eq!(bus.handler_count::<StreakAdvanced>().await, 2);
        assert_eq!(bus.handler_count::<StreakBroken>().await, 0);

        bus.publish(Box::new(StreakAdvanced {
            new_streak: 4,
            occurred_at: Utc::now(),
        }))
        .await
        .unwrap();

        bus.publish(Box::new(StreakBroken {
            previous_streak: 4,
            missed_dates: vec![],
            occurred_at: Utc::now(),
        }))
        .await
        .unwrap();

        assert_eq!(*seen.read().await, vec![4]);
    }
}
