use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockroom_core::MaterialId;
use stockroom_inventory::{MaterialPatch, NewMaterial};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_material).patch(update).delete(remove))
        .route("/:id/restock", post(restock))
}

fn parse_id(raw: &str) -> Result<MaterialId, axum::response::Response> {
    raw.parse::<MaterialId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

async fn list(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let materials = services.engine.ledger().list().await;
    let views: Vec<dto::MaterialView<'_>> = materials.iter().map(dto::MaterialView::from).collect();
    (StatusCode::OK, Json(views)).into_response()
}

async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewMaterial>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.engine.register_material(body).await {
        Ok(material) => (StatusCode::CREATED, Json(dto::MaterialView::from(&material))).into_response(),
        Err(e) => errors::reservation_error_to_response(e),
    }
}

/// GET /materials/:id, also used by badge/QR lookups.
async fn get_material(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.engine.ledger().get(&id).await {
        Ok(material) => (StatusCode::OK, Json(dto::MaterialView::from(&material))).into_response(),
        Err(e) => errors::reservation_error_to_response(e.into()),
    }
}

async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<MaterialPatch>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let Json(patch) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.engine.update_material(&id, &patch).await {
        Ok(material) => (StatusCode::OK, Json(dto::MaterialView::from(&material))).into_response(),
        Err(e) => errors::reservation_error_to_response(e),
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

    match services.engine.remove_material(&id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::reservation_error_to_response(e),
    }
}

async fn restock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::RestockRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.engine.restock(&id, body.quantity).await {
        Ok(material) => (StatusCode::OK, Json(dto::MaterialView::from(&material))).into_response(),
        Err(e) => errors::reservation_error_to_response(e),
    }
}
