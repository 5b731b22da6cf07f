//! Payment gateway adapters.
//!
//! Two interchangeable gateways back checkout: the legacy manual flow (orders
//! settle out of band, start `pending`) and the hosted-checkout flow (orders
//! start `pending_payment` and move via signed webhooks). The gateways' own
//! wire protocols are outside this service; what lives here is session
//! minting, webhook signature verification and event parsing.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::order::{PaymentMethod, WebhookEvent};
use crate::error::{Error, Result};

/// What `create_checkout` hands back to the caller: the correlation id the
/// gateway will quote in webhooks, plus the client secret the front end needs
/// to drive the hosted payment page (absent for the manual flow).
#[derive(Clone, Debug, serde::Serialize)]
pub struct CheckoutSession {
    pub correlation_id: String,
    pub client_secret: Option<String>,
}

/// Order fields a gateway needs to open a checkout session.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    pub order_id: Uuid,
    pub order_number: String,
    pub total: rust_decimal::Decimal,
}

#[derive(Clone, Debug)]
pub enum Gateway {
    Manual(ManualGateway),
    Hosted(HostedGateway),
}

impl Gateway {
    pub fn for_method(method: PaymentMethod, webhook_secret: &str, tolerance_secs: u64) -> Self {
        match method {
            PaymentMethod::Manual => Self::Manual(ManualGateway),
            PaymentMethod::Hosted => Self::Hosted(HostedGateway::new(webhook_secret, tolerance_secs)),
        }
    }

    pub fn payment_method(&self) -> PaymentMethod {
        match self {
            Self::Manual(_) => PaymentMethod::Manual,
            Self::Hosted(_) => PaymentMethod::Hosted,
        }
    }

    pub async fn create_checkout(&self, draft: &OrderDraft) -> Result<CheckoutSession> {
        match self {
            Self::Manual(g) => g.create_checkout(draft),
            Self::Hosted(g) => g.create_checkout(draft),
        }
    }

    pub fn verify_and_parse_webhook(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent> {
        match self {
            Self::Manual(_) => Err(Error::Gateway(
                "the manual gateway does not deliver webhooks".to_string(),
            )),
            Self::Hosted(g) => g.verify_and_parse_webhook(raw_body, signature_header),
        }
    }
}

/// Legacy flow: no remote session, settlement is reconciled by an admin.
#[derive(Clone, Debug)]
pub struct ManualGateway;

impl ManualGateway {
    fn create_checkout(&self, _draft: &OrderDraft) -> Result<CheckoutSession> {
        Ok(CheckoutSession {
            correlation_id: format!("man_{}", Uuid::new_v4().simple()),
            client_secret: None,
        })
    }
}

/// Hosted checkout: the customer pays on the gateway's page, outcomes arrive
/// as webhooks signed with a shared secret.
#[derive(Clone, Debug)]
pub struct HostedGateway {
    webhook_secret: String,
    tolerance_secs: u64,
}

impl HostedGateway {
    pub fn new(webhook_secret: &str, tolerance_secs: u64) -> Self {
        Self {
            webhook_secret: webhook_secret.to_string(),
            tolerance_secs,
        }
    }

    fn create_checkout(&self, draft: &OrderDraft) -> Result<CheckoutSession> {
        let correlation_id = format!("cs_{}", Uuid::new_v4().simple());
        let client_secret = keyed_digest(
            self.webhook_secret.as_bytes(),
            &[correlation_id.as_bytes(), draft.order_number.as_bytes()],
        );
        Ok(CheckoutSession {
            correlation_id,
            client_secret: Some(client_secret),
        })
    }

    /// Verifies a `t=<unix>,v1=<hex>` signature header over the raw body and
    /// parses the event. A bad or stale signature is a hard reject.
    pub fn verify_and_parse_webhook(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent> {
        let (timestamp, signature) =
            parse_signature_header(signature_header).ok_or(Error::SignatureMismatch)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        if now.abs_diff(timestamp) > self.tolerance_secs {
            tracing::warn!(timestamp, now, "webhook signature timestamp outside tolerance");
            return Err(Error::SignatureMismatch);
        }

        let expected = sign_payload(self.webhook_secret.as_bytes(), timestamp, raw_body);
        if signature != expected {
            return Err(Error::SignatureMismatch);
        }

        serde_json::from_slice(raw_body)
            .map_err(|e| Error::Gateway(format!("unparseable webhook body: {e}")))
    }
}

fn parse_signature_header(header: &str) -> Option<(u64, String)> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => signature = Some(v.to_string()),
            _ => {}
        }
    }
    Some((timestamp?, signature?))
}

/// Keyed SHA-256 over `<timestamp>.<body>`, hex encoded.
pub fn sign_payload(secret: &[u8], timestamp: u64, body: &[u8]) -> String {
    keyed_digest(secret, &[timestamp.to_string().as_bytes(), b".", body])
}

fn keyed_digest(secret: &[u8], parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    for part in parts {
        hasher.update(part);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn signed_header(secret: &str, timestamp: u64, body: &[u8]) -> String {
        format!("t={},v1={}", timestamp, sign_payload(secret.as_bytes(), timestamp, body))
    }

    #[test]
    fn valid_signature_parses_the_event() {
        let gw = HostedGateway::new("whsec_test", 300);
        let body = br#"{"type":"payment_succeeded","correlation_id":"cs_abc"}"#;
        let event = gw
            .verify_and_parse_webhook(body, &signed_header("whsec_test", now(), body))
            .unwrap();
        assert_eq!(event.event_type, "payment_succeeded");
        assert_eq!(event.correlation_id, "cs_abc");
    }

    #[test]
    fn tampered_body_is_rejected() {
        let gw = HostedGateway::new("whsec_test", 300);
        let body = br#"{"type":"payment_succeeded","correlation_id":"cs_abc"}"#;
        let header = signed_header("whsec_test", now(), body);
        let tampered = br#"{"type":"payment_succeeded","correlation_id":"cs_zzz"}"#;
        assert!(matches!(
            gw.verify_and_parse_webhook(tampered, &header),
            Err(Error::SignatureMismatch)
        ));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let gw = HostedGateway::new("whsec_test", 300);
        let body = br#"{"type":"refunded","correlation_id":"cs_abc"}"#;
        let stale = now() - 3600;
        assert!(matches!(
            gw.verify_and_parse_webhook(body, &signed_header("whsec_test", stale, body)),
            Err(Error::SignatureMismatch)
        ));
    }

    #[test]
    fn malformed_header_is_rejected() {
        let gw = HostedGateway::new("whsec_test", 300);
        assert!(gw.verify_and_parse_webhook(b"{}", "nonsense").is_err());
        assert!(gw.verify_and_parse_webhook(b"{}", "t=abc,v1=00").is_err());
    }

    #[tokio::test]
    async fn checkout_sessions_carry_gateway_specific_ids() {
        let draft = OrderDraft {
            order_id: Uuid::now_v7(),
            order_number: "ORD-00000001".to_string(),
            total: rust_decimal::Decimal::new(480, 0),
        };
        let manual = Gateway::Manual(ManualGateway);
        let session = manual.create_checkout(&draft).await.unwrap();
        assert!(session.correlation_id.starts_with("man_"));
        assert!(session.client_secret.is_none());

        let hosted = Gateway::Hosted(HostedGateway::new("whsec_test", 300));
        let session = hosted.create_checkout(&draft).await.unwrap();
        assert!(session.correlation_id.starts_with("cs_"));
        assert!(session.client_secret.is_some());
    }
}
