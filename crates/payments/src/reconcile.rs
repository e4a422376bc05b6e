//! Pull-path reconciliation
//!
//! When a user revisits a payment, local state is eagerly reconciled against
//! the provider in case a webhook was missed or has not arrived yet.

use stripe::{PaymentIntent, PaymentIntentId, PaymentIntentStatus};

use crate::client::StripeClient;
use crate::error::PaymentResult;
use crate::ledger::{Payment, PaymentLedger, PaymentStatus};

/// Total mapping from the provider's intent status to the local vocabulary.
/// Statuses with no local counterpart collapse onto the nearest phase:
/// awaiting-payment-method/confirmation are still `pending`, a capturable
/// intent is `processing`.
pub fn map_intent_status(status: PaymentIntentStatus) -> PaymentStatus {
    match status {
        PaymentIntentStatus::Succeeded => PaymentStatus::Succeeded,
        PaymentIntentStatus::Processing => PaymentStatus::Processing,
        PaymentIntentStatus::RequiresAction => PaymentStatus::RequiresAction,
        PaymentIntentStatus::Canceled => PaymentStatus::Canceled,
        PaymentIntentStatus::RequiresCapture => PaymentStatus::Processing,
        PaymentIntentStatus::RequiresPaymentMethod
        | PaymentIntentStatus::RequiresConfirmation => PaymentStatus::Pending,
    }
}

#[derive(Clone)]
pub struct ReconcileService {
    stripe: StripeClient,
    ledger: PaymentLedger,
}

impl ReconcileService {
    pub fn new(stripe: StripeClient, ledger: PaymentLedger) -> Self {
        Self { stripe, ledger }
    }

    /// Re-fetch the provider's view of a payment and apply a transition when
    /// it diverges from the stored status. Provider fetch failure is logged
    /// and the stored payment returned unchanged; the caller falls back to
    /// the last known state.
    pub async fn sync_payment(&self, payment: &Payment) -> PaymentResult<Payment> {
        let intent_id: PaymentIntentId = match payment.stripe_payment_intent_id.parse() {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.id,
                    error = %e,
                    "Stored intent id failed to parse, skipping reconciliation"
                );
                return Ok(payment.clone());
            }
        };

        let intent = match PaymentIntent::retrieve(self.stripe.inner(), &intent_id, &[]).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.id,
                    intent_id = %intent_id,
                    error = %e,
                    "Failed to fetch intent status, keeping local state"
                );
                return Ok(payment.clone());
            }
        };

        let provider_status = map_intent_status(intent.status);
        if provider_status == payment.status {
            return Ok(payment.clone());
        }

        tracing::info!(
            payment_id = %payment.id,
            local_status = %payment.status,
            provider_status = %provider_status,
            "Reconciling payment against provider status"
        );

        self.ledger
            .apply_transition(payment.id, provider_status, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_provider_statuses_totally() {
        assert_eq!(
            map_intent_status(PaymentIntentStatus::Succeeded),
            PaymentStatus::Succeeded
        );
        assert_eq!(
            map_intent_status(PaymentIntentStatus::Processing),
            PaymentStatus::Processing
        );
        assert_eq!(
            map_intent_status(PaymentIntentStatus::RequiresAction),
            PaymentStatus::RequiresAction
        );
        assert_eq!(
            map_intent_status(PaymentIntentStatus::Canceled),
            PaymentStatus::Canceled
        );
        assert_eq!(
            map_intent_status(PaymentIntentStatus::RequiresCapture),
            PaymentStatus::Processing
        );
        assert_eq!(
            map_intent_status(PaymentIntentStatus::RequiresPaymentMethod),
            PaymentStatus::Pending
        );
        assert_eq!(
            map_intent_status(PaymentIntentStatus::RequiresConfirmation),
            PaymentStatus::Pending
        );
    }
}
