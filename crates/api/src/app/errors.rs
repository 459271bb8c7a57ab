use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_infra::{ReservationError, StaffError};

pub fn reservation_error_to_response(err: ReservationError) -> axum::response::Response {
    match err {
        ReservationError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ReservationError::UnknownMaterial(ref id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("unknown material: {id}"))
        }
        ReservationError::UnknownParticipant(ref id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("unknown participant: {id}"))
        }
        ReservationError::InsufficientStock {
            ref material,
            requested,
            available,
            shortfall,
        } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": err.to_string(),
                "material": material,
                "requested": requested,
                "available": available,
                "shortfall": shortfall,
            })),
        )
            .into_response(),
        ReservationError::Busy { .. } => {
            let mut res = json_error(StatusCode::SERVICE_UNAVAILABLE, "busy", err.to_string());
            res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            res
        }
        ReservationError::Duplicate(_) => json_error(StatusCode::CONFLICT, "conflict", err.to_string()),
        ReservationError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn staff_error_to_response(err: StaffError) -> axum::response::Response {
    match err {
        StaffError::UnknownPerson(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        StaffError::DuplicateBadge(_) => json_error(StatusCode::CONFLICT, "conflict", err.to_string()),
        StaffError::Validation(_) | StaffError::WrongRole { .. } => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
        }
    }
}

/// Malformed JSON bodies are caller bugs: always 400.
pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

pub fn query_rejection_to_response(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
