//! Order lifecycle: statuses, webhook-driven transitions, line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PendingPayment,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Paid,
    Refunded,
    Rejected,
}

impl OrderStatus {
    /// Parses a status label. `"proces"` is a tolerated legacy spelling of
    /// `processing`; anything else unrecognized is refused.
    pub fn parse(label: &str) -> Result<Self> {
        match label {
            "pending" => Ok(Self::Pending),
            "pending_payment" => Ok(Self::PendingPayment),
            "processing" | "proces" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "paid" => Ok(Self::Paid),
            "refunded" => Ok(Self::Refunded),
            "rejected" => Ok(Self::Rejected),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingPayment => "pending_payment",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }
}

/// Which gateway took the payment. Determines the initial order status and
/// which correlation column the webhook handler matches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Manual,
    Hosted,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Hosted => "hosted",
        }
    }

    pub fn initial_status(&self) -> OrderStatus {
        match self {
            Self::Manual => OrderStatus::Pending,
            Self::Hosted => OrderStatus::PendingPayment,
        }
    }
}

/// A verified, parsed gateway notification.
#[derive(Clone, Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub correlation_id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
}

/// Maps a gateway event to the status it drives the order to. Unknown event
/// types map to `None`: the handler logs and acknowledges without raising.
pub fn status_for_event(event: &WebhookEvent) -> Option<OrderStatus> {
    match event.event_type.as_str() {
        "session_completed" => {
            if event.payment_status.as_deref() == Some("paid") {
                Some(OrderStatus::Processing)
            } else {
                None
            }
        }
        "payment_succeeded" => Some(OrderStatus::Paid),
        "payment_failed" => Some(OrderStatus::Rejected),
        "refunded" => Some(OrderStatus::Refunded),
        _ => None,
    }
}

/// Idempotency rule for webhook redelivery: an event whose target status is
/// already the current status is a no-op.
pub fn webhook_transition(current: OrderStatus, target: OrderStatus) -> Option<OrderStatus> {
    if current == target {
        None
    } else {
        Some(target)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub cart_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub status: String,
    pub total: Decimal,
    pub payment_method: String,
    pub checkout_session_id: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderLineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub size: String,
    pub quantity: i32,
    /// Price paid at purchase time. Never recomputed from the catalog.
    pub unit_price: Decimal,
}

/// Human-facing order number.
pub fn new_order_number() -> String {
    format!("ORD-{:08}", rand::random::<u32>() % 100_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognizes_every_label_and_the_legacy_alias() {
        for label in [
            "pending",
            "pending_payment",
            "processing",
            "shipped",
            "delivered",
            "cancelled",
            "paid",
            "refunded",
            "rejected",
        ] {
            assert_eq!(OrderStatus::parse(label).unwrap().as_str(), label);
        }
        assert_eq!(OrderStatus::parse("proces").unwrap(), OrderStatus::Processing);
    }

    #[test]
    fn unrecognized_label_is_refused() {
        assert!(matches!(
            OrderStatus::parse("foo"),
            Err(Error::InvalidStatus(s)) if s == "foo"
        ));
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
    }

    #[test]
    fn initial_status_depends_on_gateway() {
        assert_eq!(PaymentMethod::Manual.initial_status(), OrderStatus::Pending);
        assert_eq!(
            PaymentMethod::Hosted.initial_status(),
            OrderStatus::PendingPayment
        );
    }

    fn event(event_type: &str, payment_status: Option<&str>) -> WebhookEvent {
        WebhookEvent {
            event_type: event_type.to_string(),
            correlation_id: "cs_123".to_string(),
            payment_status: payment_status.map(str::to_string),
        }
    }

    #[test]
    fn event_to_status_mapping() {
        assert_eq!(
            status_for_event(&event("session_completed", Some("paid"))),
            Some(OrderStatus::Processing)
        );
        assert_eq!(status_for_event(&event("session_completed", Some("unpaid"))), None);
        assert_eq!(
            status_for_event(&event("payment_succeeded", None)),
            Some(OrderStatus::Paid)
        );
        assert_eq!(
            status_for_event(&event("payment_failed", None)),
            Some(OrderStatus::Rejected)
        );
        assert_eq!(
            status_for_event(&event("refunded", None)),
            Some(OrderStatus::Refunded)
        );
        assert_eq!(status_for_event(&event("invoice.created", None)), None);
    }

    #[test]
    fn redelivered_event_is_a_no_op() {
        assert_eq!(
            webhook_transition(OrderStatus::PendingPayment, OrderStatus::Paid),
            Some(OrderStatus::Paid)
        );
        assert_eq!(webhook_transition(OrderStatus::Paid, OrderStatus::Paid), None);
    }
}
