//! Stripe webhook ingestion
//!
//! Verifies, deduplicates, and applies provider events to the payment ledger.
//! Delivery is at-least-once and possibly duplicated; each distinct event id
//! must apply its side effects at most once.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use sqlx::PgPool;
use stripe::{
    BalanceTransaction, BalanceTransactionId, Charge, Event, EventObject, EventType,
    Expandable, PaymentIntent, Webhook,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::{PaymentError, PaymentResult};
use crate::ledger::{PaymentLedger, PaymentStatus, TransitionFinancials};

type HmacSha256 = Hmac<Sha256>;

/// Signed payloads older than this are rejected as possible replays.
const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

/// Audit row for one received provider event.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WebhookEventRecord {
    pub id: Uuid,
    pub stripe_event_id: String,
    pub event_type: String,
    pub processed: bool,
    pub payload: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// What handling a verified event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Side effects applied and the event marked processed.
    Processed,
    /// The event id had already been processed; acknowledged without work.
    AlreadyProcessed,
    /// Event type has no handler; acknowledged and marked processed.
    Ignored,
}

/// Destination ledger status for each handled event type. Total and explicit:
/// anything not listed here is acknowledged without a ledger mutation.
pub fn destination_status(event_type: &EventType) -> Option<PaymentStatus> {
    match event_type {
        EventType::PaymentIntentSucceeded => Some(PaymentStatus::Succeeded),
        EventType::PaymentIntentPaymentFailed => Some(PaymentStatus::Failed),
        EventType::PaymentIntentRequiresAction => Some(PaymentStatus::RequiresAction),
        EventType::PaymentIntentCanceled => Some(PaymentStatus::Canceled),
        EventType::PaymentIntentProcessing => Some(PaymentStatus::Processing),
        _ => None,
    }
}

/// Webhook handler for Stripe payment-intent events.
#[derive(Clone)]
pub struct WebhookHandler {
    stripe: StripeClient,
    pool: PgPool,
    ledger: PaymentLedger,
}

impl WebhookHandler {
    pub fn new(stripe: StripeClient, pool: PgPool, ledger: PaymentLedger) -> Self {
        Self { stripe, pool, ledger }
    }

    /// Verify and parse an inbound webhook payload.
    ///
    /// Tries the SDK's verification first, then falls back to manual
    /// signature verification, which tolerates provider API versions newer
    /// than the SDK's event parser expects.
    pub fn verify_event(&self, payload: &str, signature: &str) -> PaymentResult<Event> {
        let secret = &self.stripe.config().webhook_secret;

        match Webhook::construct_event(payload, signature, secret) {
            Ok(event) => return Ok(event),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "SDK webhook parsing failed, trying manual verification"
                );
            }
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        verify_signature(payload, signature, secret, now)?;

        serde_json::from_str(payload).map_err(|e| {
            tracing::error!(error = %e, "Signed webhook payload failed to parse");
            PaymentError::WebhookPayloadInvalid(e.to_string())
        })
    }

    /// Apply a verified event to the ledger, exactly once per event id.
    ///
    /// `raw` is the signed request body, stored verbatim for audit/replay.
    pub async fn handle_event(&self, event: Event, raw: &str) -> PaymentResult<WebhookOutcome> {
        let event_id = event.id.to_string();
        let event_type = event.type_.to_string();
        let payload: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| PaymentError::WebhookPayloadInvalid(e.to_string()))?;

        // Atomic insert-or-fetch against the unique event-id constraint.
        // A no-op conflict assignment makes RETURNING yield the existing row,
        // so two racing deliveries cannot both observe "never seen".
        let record: WebhookEventRecord = sqlx::query_as(
            r#"
            INSERT INTO webhook_events (id, stripe_event_id, event_type, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (stripe_event_id)
                DO UPDATE SET stripe_event_id = EXCLUDED.stripe_event_id
            RETURNING id, stripe_event_id, event_type, processed, payload, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event_id)
        .bind(&event_type)
        .bind(&payload)
        .fetch_one(&self.pool)
        .await?;

        if record.processed {
            tracing::info!(event_id = %event_id, "Duplicate webhook event, already processed");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        tracing::info!(
            event_id = %event_id,
            event_type = %event_type,
            "Processing webhook event"
        );

        // Any error below leaves `processed = false`; the caller answers 500
        // and the provider redelivers later.
        let outcome = match destination_status(&event.type_) {
            Some(status) => {
                let intent = extract_payment_intent(event)?;
                self.apply_intent_event(&intent, status).await?;
                WebhookOutcome::Processed
            }
            None => {
                tracing::info!(
                    event_id = %event_id,
                    event_type = %event_type,
                    "Unhandled webhook event type"
                );
                WebhookOutcome::Ignored
            }
        };

        sqlx::query("UPDATE webhook_events SET processed = TRUE WHERE id = $1")
            .bind(record.id)
            .execute(&self.pool)
            .await?;

        Ok(outcome)
    }

    /// Transition the payment correlated with `intent`. A missing payment is
    /// a handled outcome (the intent may not belong to this system), never an
    /// error.
    async fn apply_intent_event(
        &self,
        intent: &PaymentIntent,
        status: PaymentStatus,
    ) -> PaymentResult<()> {
        let Some(payment) = self.ledger.find_by_intent_id(intent.id.as_str()).await? else {
            tracing::warn!(
                intent_id = %intent.id,
                "No payment recorded for intent, acknowledging event"
            );
            return Ok(());
        };

        let financials = if status == PaymentStatus::Succeeded {
            self.fetch_financials(intent).await
        } else {
            None
        };

        self.ledger
            .apply_transition(payment.id, status, financials)
            .await?;

        Ok(())
    }

    /// Fetch the fee/net breakdown for a settled intent from its latest
    /// charge's balance transaction. Failures are logged and reported as
    /// "no data": the status transition must not depend on this lookup.
    async fn fetch_financials(&self, intent: &PaymentIntent) -> Option<TransitionFinancials> {
        let balance_transaction = match intent.latest_charge.as_ref()? {
            Expandable::Object(charge) => charge.balance_transaction.clone(),
            Expandable::Id(charge_id) => {
                match Charge::retrieve(self.stripe.inner(), charge_id, &[]).await {
                    Ok(charge) => charge.balance_transaction,
                    Err(e) => {
                        tracing::error!(
                            intent_id = %intent.id,
                            error = %e,
                            "Failed to retrieve charge for fee breakdown"
                        );
                        return None;
                    }
                }
            }
        }?;

        let transaction = match balance_transaction {
            Expandable::Object(transaction) => *transaction,
            Expandable::Id(transaction_id) => {
                match self.retrieve_balance_transaction(&transaction_id).await {
                    Some(transaction) => transaction,
                    None => return None,
                }
            }
        };

        Some(TransitionFinancials {
            stripe_fee: rust_decimal::Decimal::new(transaction.fee, 2),
            net_amount: rust_decimal::Decimal::new(transaction.net, 2),
        })
    }

    async fn retrieve_balance_transaction(
        &self,
        id: &BalanceTransactionId,
    ) -> Option<BalanceTransaction> {
        match BalanceTransaction::retrieve(self.stripe.inner(), id, &[]).await {
            Ok(transaction) => Some(transaction),
            Err(e) => {
                tracing::error!(
                    balance_transaction_id = %id,
                    error = %e,
                    "Failed to retrieve balance transaction"
                );
                None
            }
        }
    }
}

fn extract_payment_intent(event: Event) -> PaymentResult<PaymentIntent> {
    match event.data.object {
        EventObject::PaymentIntent(intent) => Ok(intent),
        other => Err(PaymentError::WebhookPayloadInvalid(format!(
            "expected a payment intent object, got {other:?}"
        ))),
    }
}

/// Manual verification of the provider's `t=...,v1=...` signature header:
/// HMAC-SHA256 over `{timestamp}.{payload}` with the shared secret, with a
/// bounded timestamp tolerance against replays.
fn verify_signature(
    payload: &str,
    signature: &str,
    secret: &str,
    now: i64,
) -> PaymentResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut v1_signature: Option<&str> = None;

    for part in signature.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => v1_signature = Some(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::WebhookSignatureInvalid)?;
    let v1_signature = v1_signature.ok_or(PaymentError::WebhookSignatureInvalid)?;

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECONDS {
        tracing::warn!(timestamp, now, "Webhook timestamp outside tolerance");
        return Err(PaymentError::WebhookSignatureInvalid);
    }

    // The whsec_ prefix is not part of the signing key.
    let secret_key = secret.strip_prefix("whsec_").unwrap_or(secret);
    let signed_payload = format!("{timestamp}.{payload}");

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|_| PaymentError::WebhookSignatureInvalid)?;
    mac.update(signed_payload.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    if computed != v1_signature {
        return Err(PaymentError::WebhookSignatureInvalid);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const NOW: i64 = 1_700_000_000;

    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        let secret_key = secret.strip_prefix("whsec_").unwrap_or(secret);
        let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn header(payload: &str, secret: &str, timestamp: i64) -> String {
        format!("t={},v1={}", timestamp, sign(payload, secret, timestamp))
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = r#"{"type":"payment_intent.succeeded"}"#;
        let header = header(payload, SECRET, NOW);
        assert!(verify_signature(payload, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = r#"{"type":"payment_intent.succeeded"}"#;
        let header = header(payload, "whsec_other", NOW);
        assert!(verify_signature(payload, &header, SECRET, NOW).is_err());
    }

    #[test]
    fn rejects_modified_payload() {
        let payload = r#"{"type":"payment_intent.succeeded"}"#;
        let header = header(payload, SECRET, NOW);
        let tampered = r#"{"type":"payment_intent.succeeded","amount":1}"#;
        assert!(verify_signature(tampered, &header, SECRET, NOW).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = r#"{"type":"payment_intent.succeeded"}"#;
        let header = header(payload, SECRET, NOW - 600);
        assert!(verify_signature(payload, &header, SECRET, NOW).is_err());
    }

    #[test]
    fn rejects_malformed_header() {
        let payload = r#"{"type":"payment_intent.succeeded"}"#;
        assert!(verify_signature(payload, "v1=deadbeef", SECRET, NOW).is_err());
        assert!(verify_signature(payload, "t=notanumber,v1=deadbeef", SECRET, NOW).is_err());
        assert!(verify_signature(payload, "", SECRET, NOW).is_err());
    }

    #[test]
    fn maps_every_handled_event_type() {
        assert_eq!(
            destination_status(&EventType::PaymentIntentSucceeded),
            Some(PaymentStatus::Succeeded)
        );
        assert_eq!(
            destination_status(&EventType::PaymentIntentPaymentFailed),
            Some(PaymentStatus::Failed)
        );
        assert_eq!(
            destination_status(&EventType::PaymentIntentRequiresAction),
            Some(PaymentStatus::RequiresAction)
        );
        assert_eq!(
            destination_status(&EventType::PaymentIntentCanceled),
            Some(PaymentStatus::Canceled)
        );
        assert_eq!(
            destination_status(&EventType::PaymentIntentProcessing),
            Some(PaymentStatus::Processing)
        );
    }

    #[test]
    fn unhandled_event_types_map_to_none() {
        assert_eq!(destination_status(&EventType::PaymentIntentCreated), None);
        assert_eq!(destination_status(&EventType::ChargeRefunded), None);
        assert_eq!(destination_status(&EventType::InvoicePaid), None);
    }
}
