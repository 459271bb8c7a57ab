use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockroom_core::PersonId;
use stockroom_infra::NewStaffMember;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(register))
        .route("/:id", get(get_member).patch(update).delete(remove))
}

fn parse_id(raw: &str) -> Result<PersonId, axum::response::Response> {
    raw.parse::<PersonId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::StaffQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection_to_response(e),
    };
    (StatusCode::OK, Json(services.staff.list(query.role))).into_response()
}

async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewStaffMember>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.staff.register(body) {
        Ok(member) => (StatusCode::CREATED, Json(member)).into_response(),
        Err(e) => errors::staff_error_to_response(e),
    }
}

async fn get_member(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.staff.get(id) {
        Ok(member) => (StatusCode::OK, Json(member)).into_response(),
        Err(e) => errors::staff_error_to_response(e),
    }
}

/// PATCH /staff/:id, replacing name, badge and role.
async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<NewStaffMember>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.staff.update(id, body) {
        Ok(member) => (StatusCode::OK, Json(member)).into_response(),
        Err(e) => errors::staff_error_to_response(e),
    }
}

async fn remove(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.staff.remove(id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::staff_error_to_response(e),
    }
}
