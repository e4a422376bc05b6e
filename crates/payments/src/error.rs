//! Error types for the payments crate

use uuid::Uuid;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Rail selector outside {card, pix, boleto}. Rejected at the boundary
    /// instead of silently falling back to a card-style intent.
    #[error("unknown payment method: {0}")]
    InvalidRail(String),

    #[error("unknown payment status: {0}")]
    InvalidStatus(String),

    #[error("product not found or inactive: {0}")]
    ProductNotFound(Uuid),

    #[error("payment not found: {0}")]
    PaymentNotFound(Uuid),

    /// A ledger insert hit the unique intent-id constraint. Callers create
    /// one row per intent, so this is an integration bug, not a business
    /// outcome.
    #[error("payment already recorded for intent {0}")]
    DuplicateIntent(String),

    #[error("webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("unexpected webhook payload: {0}")]
    WebhookPayloadInvalid(String),

    #[error("amount {0} cannot be expressed in minor units")]
    AmountOutOfRange(rust_decimal::Decimal),

    #[error("missing configuration: {0}")]
    Config(&'static str),

    #[error("Stripe API error: {0}")]
    StripeApi(#[from] stripe::StripeError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
