//! Stripe client wrapper
//!
//! Credentials live in an explicit [`StripeConfig`] handed to the client at
//! construction time; nothing reads a process-global API key.

use std::sync::Arc;

use stripe::RequestStrategy;

use crate::error::{PaymentError, PaymentResult};

/// Stripe credentials and webhook secret.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Non-secret key exposed to browser clients via the config endpoint.
    pub publishable_key: String,
    pub webhook_secret: String,
}

impl StripeConfig {
    pub fn from_env() -> PaymentResult<Self> {
        Ok(Self {
            secret_key: require_env("STRIPE_SECRET_KEY")?,
            publishable_key: require_env("STRIPE_PUBLISHABLE_KEY")?,
            webhook_secret: require_env("STRIPE_WEBHOOK_SECRET")?,
        })
    }
}

fn require_env(name: &'static str) -> PaymentResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(PaymentError::Config(name))
}

/// Shared Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: stripe::Client,
    config: Arc<StripeConfig>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            inner: stripe::Client::new(config.secret_key.clone()),
            config: Arc::new(config),
        }
    }

    pub fn from_env() -> PaymentResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    pub fn inner(&self) -> &stripe::Client {
        &self.inner
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Client variant that attaches an idempotency key to outgoing requests.
    /// Used for intent creation so a retried checkout cannot mint a second
    /// intent for the same logical attempt.
    pub fn idempotent(&self, key: String) -> stripe::Client {
        self.inner.clone().with_strategy(RequestStrategy::Idempotent(key))
    }
}
