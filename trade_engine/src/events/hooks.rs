use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, PurchaseCompletedEvent, PurchaseCreatedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub purchase_created_producer: Vec<EventProducer<PurchaseCreatedEvent>>,
    pub purchase_completed_producer: Vec<EventProducer<PurchaseCompletedEvent>>,
}

impl EventProducers {
    /// Enqueues the event with every subscriber without waiting. Returns `true` only if every subscriber accepted it.
    pub fn try_publish_purchase_created(&self, event: &PurchaseCreatedEvent) -> bool {
        self.purchase_created_producer.iter().fold(true, |ok, p| p.try_publish_event(event.clone()) && ok)
    }

    /// Enqueues the event with every subscriber without waiting. Subscribers whose channel is full miss the event.
    pub fn try_publish_purchase_completed(&self, event: &PurchaseCompletedEvent) -> bool {
        self.purchase_completed_producer.iter().fold(true, |ok, p| p.try_publish_event(event.clone()) && ok)
    }
}

pub struct EventHandlers {
    pub on_purchase_created: Option<EventHandler<PurchaseCreatedEvent>>,
    pub on_purchase_completed: Option<EventHandler<PurchaseCompletedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_purchase_created = hooks.on_purchase_created.map(|f| EventHandler::new(buffer_size, f));
        let on_purchase_completed = hooks.on_purchase_completed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_purchase_created, on_purchase_completed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_purchase_created {
            result.purchase_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_purchase_completed {
            result.purchase_completed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_purchase_created {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_purchase_completed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_purchase_created: Option<Handler<PurchaseCreatedEvent>>,
    pub on_purchase_completed: Option<Handler<PurchaseCompletedEvent>>,
}

impl EventHooks {
    pub fn on_purchase_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PurchaseCreatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_purchase_created = Some(Arc::new(f));
        self
    }

    pub fn on_purchase_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PurchaseCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_purchase_completed = Some(Arc::new(f));
        self
    }
}
