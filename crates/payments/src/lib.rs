// Payments crate clippy configuration
#![allow(clippy::too_many_arguments)] // Ledger inserts carry many columns
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Caixa payments core
//!
//! Handles the Stripe integration for the sandbox store: catalog
//! provisioning, customer resolution, rail-specific payment intents
//! (card, PIX, boleto), the payment ledger, and reconciliation of ledger
//! state against provider events.
//!
//! ## Features
//!
//! - **Catalog**: local products with lazily provisioned Stripe counterparts
//! - **Checkout**: per-rail intent creation with idempotency keys
//! - **Ledger**: append-only record of purchase attempts and their lifecycle
//! - **Webhooks**: verified, deduplicated ingestion of provider events
//! - **Pull reconciliation**: on-demand sync when a payment is viewed

pub mod catalog;
pub mod checkout;
pub mod client;
pub mod customer;
pub mod error;
pub mod intent;
pub mod ledger;
pub mod reconcile;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Catalog
pub use catalog::{Product, ProductCatalog};

// Checkout
pub use checkout::{CheckoutResponse, CheckoutService};

// Client
pub use client::{StripeClient, StripeConfig};

// Customer
pub use customer::CustomerService;

// Error
pub use error::{PaymentError, PaymentResult};

// Intent
pub use intent::{PaymentRail, BOLETO_EXPIRES_AFTER_DAYS, PIX_EXPIRES_AFTER_SECONDS};

// Ledger
pub use ledger::{Payment, PaymentLedger, PaymentStatus, TransitionFinancials};

// Reconcile
pub use reconcile::ReconcileService;

// Webhooks
pub use webhooks::{WebhookEventRecord, WebhookHandler, WebhookOutcome};

use sqlx::PgPool;

/// Main payments service combining all payment functionality.
pub struct PaymentsService {
    pub catalog: ProductCatalog,
    pub checkout: CheckoutService,
    pub customers: CustomerService,
    pub ledger: PaymentLedger,
    pub reconcile: ReconcileService,
    pub webhooks: WebhookHandler,
    stripe: StripeClient,
}

impl PaymentsService {
    /// Create a payments service from environment variables.
    pub fn from_env(pool: PgPool) -> PaymentResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?, pool))
    }

    /// Create a payments service with explicit config.
    pub fn new(config: StripeConfig, pool: PgPool) -> Self {
        let stripe = StripeClient::new(config);
        let ledger = PaymentLedger::new(pool.clone());
        let catalog = ProductCatalog::new(stripe.clone(), pool.clone());
        let customers = CustomerService::new(stripe.clone());

        Self {
            checkout: CheckoutService::new(
                stripe.clone(),
                catalog.clone(),
                customers.clone(),
                ledger.clone(),
            ),
            reconcile: ReconcileService::new(stripe.clone(), ledger.clone()),
            webhooks: WebhookHandler::new(stripe.clone(), pool, ledger.clone()),
            catalog,
            customers,
            ledger,
            stripe,
        }
    }

    /// The public (non-secret) key browser clients use to confirm intents.
    pub fn publishable_key(&self) -> &str {
        &self.stripe.config().publishable_key
    }
}
