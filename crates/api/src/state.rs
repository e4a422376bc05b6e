//! Application state

use std::sync::Arc;

use caixa_payments::PaymentsService;
use sqlx::PgPool;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub payments: Arc<PaymentsService>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, payments: PaymentsService) -> Self {
        Self {
            pool,
            config,
            payments: Arc::new(payments),
        }
    }
}
