use std::{future::Future, sync::Arc};

use futures_util::FutureExt;

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    PaymentRefundedEvent,
    PaymentSettledEvent,
    PayoutStatusChangedEvent,
};

/// The publishing side of the registered hooks. The APIs hold one of these and publish to every producer in it.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_settled_producer: Vec<EventProducer<PaymentSettledEvent>>,
    pub payment_refunded_producer: Vec<EventProducer<PaymentRefundedEvent>>,
    pub payout_status_producer: Vec<EventProducer<PayoutStatusChangedEvent>>,
}

impl EventProducers {
    pub async fn publish_payment_settled(&self, event: PaymentSettledEvent) {
        for producer in &self.payment_settled_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payment_refunded(&self, event: PaymentRefundedEvent) {
        for producer in &self.payment_refunded_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payout_status_changed(&self, event: PayoutStatusChangedEvent) {
        for producer in &self.payout_status_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_payment_settled: Option<EventHandler<PaymentSettledEvent>>,
    pub on_payment_refunded: Option<EventHandler<PaymentRefundedEvent>>,
    pub on_payout_status_changed: Option<EventHandler<PayoutStatusChangedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_settled = hooks.on_payment_settled.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_refunded = hooks.on_payment_refunded.map(|f| EventHandler::new(buffer_size, f));
        let on_payout_status_changed = hooks.on_payout_status_changed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_settled, on_payment_refunded, on_payout_status_changed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_settled {
            result.payment_settled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_refunded {
            result.payment_refunded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_status_changed {
            result.payout_status_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per registered handler. Each task ends once all of its producers have been dropped.
    pub fn start_handlers(self) {
        if let Some(handler) = self.on_payment_settled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_refunded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payout_status_changed {
            tokio::spawn(handler.start_handler());
        }
    }
}

/// Callbacks to run when engine events occur.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_settled: Option<Handler<PaymentSettledEvent>>,
    pub on_payment_refunded: Option<Handler<PaymentRefundedEvent>>,
    pub on_payout_status_changed: Option<Handler<PayoutStatusChangedEvent>>,
}

impl EventHooks {
    pub fn on_payment_settled<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(PaymentSettledEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_payment_settled = Some(Arc::new(move |ev| f(ev).boxed()));
        self
    }

    pub fn on_payment_refunded<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(PaymentRefundedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_payment_refunded = Some(Arc::new(move |ev| f(ev).boxed()));
        self
    }

    pub fn on_payout_status_changed<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(PayoutStatusChangedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_payout_status_changed = Some(Arc::new(move |ev| f(ev).boxed()));
        self
    }
}
