//! API error handling

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use caixa_payments::PaymentError;
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Payment(e) => match e {
                // Caller mistakes and provider declines surface as 400.
                PaymentError::InvalidRail(_)
                | PaymentError::InvalidStatus(_)
                | PaymentError::StripeApi(_)
                | PaymentError::AmountOutOfRange(_)
                | PaymentError::WebhookSignatureInvalid
                | PaymentError::WebhookPayloadInvalid(_) => StatusCode::BAD_REQUEST,
                PaymentError::ProductNotFound(_) | PaymentError::PaymentNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                // Integrity and infrastructure failures are server errors.
                PaymentError::DuplicateIntent(_)
                | PaymentError::Config(_)
                | PaymentError::Database(_)
                | PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        // Internal details stay in the logs.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
