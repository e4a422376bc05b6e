//! HTTP routes

pub mod payments;
pub mod products;
pub mod webhook;

use axum::extract::State;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::auth::require_auth;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/v1/health/", get(health_check))
        .route("/api/v1/config/stripe/", get(stripe_config))
        .route("/api/v1/products/", get(products::list_products))
        .route("/api/v1/products/{id}/", get(products::get_product))
        .route("/webhook/stripe/", post(webhook::stripe_webhook));

    let authenticated = Router::new()
        .route("/api/v1/payments/", get(payments::list_payments))
        .route("/api/v1/payments/{id}/", get(payments::get_payment))
        .route(
            "/api/v1/payments/create-intent/",
            post(payments::create_intent),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public.merge(authenticated).with_state(state)
}

/// Liveness probe.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Public provider configuration for browser clients.
async fn stripe_config(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "publishable_key": state.payments.publishable_key() }))
}
