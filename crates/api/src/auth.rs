//! Bearer-token authentication middleware
//!
//! Verifies tokens against the `api_tokens` table; issuance happens
//! out-of-band. Both `Bearer <token>` and the legacy `Token <token>` scheme
//! are accepted.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated user attached to the request extensions.
#[derive(Debug, Clone, FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
}

impl AuthUser {
    /// Display name sent to the payment provider.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }
}

fn extract_token(request: &Request) -> Option<&str> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&request)
        .map(str::to_owned)
        .ok_or(ApiError::Unauthorized)?;

    let user: AuthUser = sqlx::query_as(
        r#"
        SELECT u.id, u.username, u.email, u.full_name
        FROM api_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.token = $1
        "#,
    )
    .bind(&token)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::Unauthorized)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_auth(value: &str) -> Request {
        Request::builder()
            .header(AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn extracts_bearer_and_token_schemes() {
        let request = request_with_auth("Bearer abc123");
        assert_eq!(extract_token(&request), Some("abc123"));

        let request = request_with_auth("Token abc123");
        assert_eq!(extract_token(&request), Some("abc123"));
    }

    #[test]
    fn rejects_missing_or_empty_credentials() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_token(&request), None);

        let request = request_with_auth("Bearer ");
        assert_eq!(extract_token(&request), None);

        let request = request_with_auth("Basic dXNlcjpwYXNz");
        assert_eq!(extract_token(&request), None);
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = AuthUser {
            id: Uuid::new_v4(),
            username: "sandbox_user".to_string(),
            email: "sandbox@example.com".to_string(),
            full_name: Some("Usuário Sandbox".to_string()),
        };
        assert_eq!(user.display_name(), "Usuário Sandbox");

        user.full_name = Some(String::new());
        assert_eq!(user.display_name(), "sandbox_user");

        user.full_name = None;
        assert_eq!(user.display_name(), "sandbox_user");
    }
}
