//! Stripe webhook endpoint
//!
//! Unauthenticated but signature-verified. Response codes drive the
//! provider's redelivery: 400 rejects bad payloads outright, 200
//! acknowledges processed (or already-processed) events, 500 asks for a
//! retry after a handler failure.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
    else {
        tracing::warn!("Webhook delivery without signature header");
        return StatusCode::BAD_REQUEST.into_response();
    };

    let event = match state.payments.webhooks.verify_event(&body, signature) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected unverifiable webhook payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state.payments.webhooks.handle_event(event, &body).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "Webhook event acknowledged");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            // Leave the event unprocessed; the provider will redeliver.
            tracing::error!(error = %e, "Webhook handler failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
