//! Owner-scoped payment routes

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use caixa_payments::{CheckoutResponse, Payment, PaymentRail, PaymentStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub product_id: Uuid,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    /// Accepted for client compatibility; confirmation collects these
    /// directly with the provider.
    #[serde(default)]
    #[allow(dead_code)]
    pub billing_details: Option<serde_json::Value>,
}

fn default_payment_method() -> String {
    "card".to_string()
}

pub async fn create_intent(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateIntentRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let response = state
        .payments
        .checkout
        .create_intent(
            user.id,
            &user.email,
            user.display_name(),
            request.product_id,
            &request.payment_method,
        )
        .await?;

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct PaymentListQuery {
    pub status: Option<String>,
    pub payment_method: Option<String>,
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PaymentListQuery>,
) -> ApiResult<Json<Vec<Payment>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<PaymentStatus>)
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let rail = query
        .payment_method
        .as_deref()
        .map(str::parse::<PaymentRail>)
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let payments = state
        .payments
        .ledger
        .list_for_user(user.id, status, rail)
        .await?;

    Ok(Json(payments))
}

/// Viewing a payment reconciles it against the provider first, in case the
/// webhook for its latest transition was missed or has not arrived yet.
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    let payment = state
        .payments
        .ledger
        .get_for_user(id, user.id)
        .await?
        .ok_or(ApiError::NotFound("payment not found"))?;

    let payment = state.payments.reconcile.sync_payment(&payment).await?;

    Ok(Json(payment))
}
