use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};

use stockroom_core::MaterialId;
use stockroom_infra::{projections::TrendProjectionError, stock_alerts as collect_alerts};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

const DEFAULT_TOP_MATERIALS: usize = 5;

/// GET /stock-alerts
pub async fn stock_alerts(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let materials = services.engine.ledger().list().await;
    (StatusCode::OK, Json(collect_alerts(materials, &services.trends))).into_response()
}

/// GET /trends?top=N
pub async fn trends(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::TrendsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection_to_response(e),
    };

    let body = dto::TrendsResponse {
        monthly_trends: services.trends.monthly_trends(),
        top_materials: services.trends.top_materials(query.top.unwrap_or(DEFAULT_TOP_MATERIALS)),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /predictions/:id
pub async fn prediction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match id.parse::<MaterialId>() {
        Ok(id) => id,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };
    let material = match services.engine.ledger().get(&id).await {
        Ok(m) => m,
        Err(e) => return errors::reservation_error_to_response(e.into()),
    };

    match services.trends.predict(&material) {
        Ok(prediction) => {
            let body = dto::PredictionResponse {
                prediction: &prediction,
                current_quantity: material.quantity(),
                alert_threshold: material.thresholds().alert(),
                monthly_usage: services.trends.usage_window(&id),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(TrendProjectionError::Prediction(e)) => {
            errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
        Err(e) => {
            tracing::error!(material = %id, error = %e, "prediction failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", e.to_string())
        }
    }
}
