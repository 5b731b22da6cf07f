//! Order lifecycle events, published to NATS when a broker is configured.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::order::OrderStatus;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created {
        order_id: Uuid,
        order_number: String,
        total: Decimal,
    },
    StatusChanged {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl OrderEvent {
    fn subject(&self) -> &'static str {
        match self {
            Self::Created { .. } => "orders.created",
            Self::StatusChanged { .. } => "orders.status_changed",
        }
    }
}

#[derive(Clone)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    /// Best effort: a broker outage must never fail the request that raised
    /// the event.
    pub async fn publish(&self, event: OrderEvent) {
        let Some(client) = &self.nats else { return };
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize order event");
                return;
            }
        };
        if let Err(e) = client.publish(event.subject(), payload.into()).await {
            tracing::warn!(error = %e, subject = event.subject(), "failed to publish order event");
        }
    }
}
