use async_trait::async_trait;
use std::any::Any;

use super::DomainEvent;
use crate::shared::DomainError;

/// Fan-out for progress events (`StreakAdvanced`, `StreakBroken`,
/// `AchievementEarned`). Publishing completes before the mutating call that
/// raised the event returns.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: Box<dyn DomainEvent>) -> Result<(), DomainError>;
}

/// Reacts to one event type, e.g. a streak-broken notice
#[async_trait]
pub trait EventHandler<E: DomainEvent>: Send + Sync {
    async fn handle(&self, event: &E) -> Result<(), DomainError>;
}

/// Handler with the event type erased, keyed by `event_type_name` in the bus
#[async_trait]
pub trait DynamicEventHandler: Send + Sync {
    async fn handle_dynamic(&self, event: &(dyn Any + Send + Sync)) -> Result<(), DomainError>;

    fn event_type_name(&self) -> &'static str;
}

/// Adapts an `EventHandler<E>` for registration on the bus
pub struct TypedEventHandlerWrapper<E: DomainEvent + 'static, H: EventHandler<E>> {
    handler: H,
    _phantom: std::marker::PhantomData<E>,
}

impl<E: DomainEvent + 'static, H: EventHandler<E>> TypedEventHandlerWrapper<E, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<E: DomainEvent + 'static, H: EventHandler<E>> DynamicEventHandler
    for TypedEventHandlerWrapper<E, H>
{
    async fn handle_dynamic(&self, event: &(dyn Any + Send + Sync)) -> Result<(), DomainError> {
        match event.downcast_ref::<E>() {
            Some(typed_event) => self.handler.handle(typed_event).await,
            None => Err(DomainError::Infrastructure(format!(
                "Handler registered for {} received another event type",
                std::any::type_name::<E>()
            ))),
        }
    }

    fn event_type_name(&self) -> &'static str {
        std::any::type_name::<E>()
    }
}
