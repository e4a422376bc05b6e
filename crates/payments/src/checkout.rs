//! Checkout orchestration
//!
//! One checkout call: validate the product, resolve the Stripe customer,
//! build rail-specific intent parameters, create the intent, record the
//! pending ledger row.

use serde::Serialize;
use stripe::PaymentIntent;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use uuid::Uuid;

use crate::client::StripeClient;
use crate::customer::CustomerService;
use crate::error::{PaymentError, PaymentResult};
use crate::intent::{build_payment_intent, PaymentRail};
use crate::ledger::PaymentLedger;
use crate::catalog::ProductCatalog;
use crate::reconcile::map_intent_status;

const CURRENCY: &str = "brl";

/// What the client needs to confirm the payment with Stripe.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub client_secret: String,
    pub payment_id: Uuid,
    pub payment_method: PaymentRail,
    pub status: String,
}

#[derive(Clone)]
pub struct CheckoutService {
    stripe: StripeClient,
    catalog: ProductCatalog,
    customers: CustomerService,
    ledger: PaymentLedger,
}

impl CheckoutService {
    pub fn new(
        stripe: StripeClient,
        catalog: ProductCatalog,
        customers: CustomerService,
        ledger: PaymentLedger,
    ) -> Self {
        Self {
            stripe,
            catalog,
            customers,
            ledger,
        }
    }

    /// Create a payment intent for `product_id` over the selected rail and
    /// record the attempt in the ledger as `pending`.
    ///
    /// Validation happens before any provider call; provider failures abort
    /// before a ledger row exists, so no partial state survives a declined
    /// checkout.
    pub async fn create_intent(
        &self,
        user_id: Uuid,
        email: &str,
        name: &str,
        product_id: Uuid,
        payment_method: &str,
    ) -> PaymentResult<CheckoutResponse> {
        let rail: PaymentRail = payment_method.parse()?;

        let product = self
            .catalog
            .get_active(product_id)
            .await?
            .ok_or(PaymentError::ProductNotFound(product_id))?;

        let customer = self.customers.resolve(email, name, user_id).await?;
        let customer_id = customer.to_string();

        let params = build_payment_intent(&product, rail, customer, user_id)?;

        // One idempotency key per logical attempt: a transport-level retry of
        // this call cannot mint a second intent, while a fresh checkout gets
        // a fresh nonce.
        let attempt_nonce = Uuid::new_v4();
        let idempotency_key = format!("intent-{user_id}-{product_id}-{attempt_nonce}");
        let client = self.stripe.idempotent(idempotency_key);

        let backoff = ExponentialBackoff::from_millis(200).map(jitter).take(2);
        let intent = Retry::spawn(backoff, || {
            PaymentIntent::create(&client, params.clone())
        })
        .await?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            PaymentError::Internal(format!("intent {} returned no client secret", intent.id))
        })?;

        let payment = self
            .ledger
            .create(
                user_id,
                product.id,
                rail,
                intent.id.as_str(),
                &customer_id,
                product.price,
                CURRENCY,
            )
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            intent_id = %intent.id,
            rail = %rail,
            amount = %payment.amount,
            "Created payment intent"
        );

        Ok(CheckoutResponse {
            client_secret,
            payment_id: payment.id,
            payment_method: rail,
            status: map_intent_status(intent.status).to_string(),
        })
    }
}
