use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use stockroom_core::RecordId;
use stockroom_infra::{HistoryLog, ReservationError};
use stockroom_inventory::WithdrawalRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Shown by the dashboard when no `limit` is given.
const DEFAULT_HISTORY_LIMIT: usize = 10;
const MAX_HISTORY_LIMIT: usize = 1_000;

/// POST /requests
pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SubmitRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    let requester = match services
        .staff
        .resolve_requester(body.supervisor_id, body.agent1_id, body.agent2_id)
    {
        Ok(r) => r,
        Err(e) => return errors::reservation_error_to_response(ReservationError::from(e)),
    };

    let request = WithdrawalRequest::new(requester, body.materials.0, body.note, Utc::now());
    match services.engine.submit(request).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => errors::reservation_error_to_response(e),
    }
}

/// GET /requests?limit=N, newest first.
pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::HistoryQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection_to_response(e),
    };
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);

    match services.history.recent(limit) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => errors::reservation_error_to_response(e.into()),
    }
}

/// GET /requests/:id
pub async fn get_record(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(id) = id.parse::<u64>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "record id must be a positive integer");
    };

    match services.history.get(RecordId(id)) {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("no history record {id}")),
        Err(e) => errors::reservation_error_to_response(e.into()),
    }
}
