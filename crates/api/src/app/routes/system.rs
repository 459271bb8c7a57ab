use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::app::{dto, errors};
use crate::middleware::AuthState;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// POST /login
///
/// Single shared-secret check. The token handed back is what protected
/// routes expect as `Authorization: Bearer <token>`.
pub async fn login(
    Extension(auth): Extension<AuthState>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    if !auth.accepts(&body.password) {
        tracing::warn!(username = body.username.as_deref().unwrap_or(""), "login rejected");
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid credentials");
    }

    (
        StatusCode::OK,
        Json(dto::LoginResponse {
            status: "success",
            role: "admin",
            token: auth.secret.to_string(),
        }),
    )
        .into_response()
}
