use axum::{
    Router,
    routing::{get, post},
};

pub mod insights;
pub mod materials;
pub mod notifications;
pub mod requests;
pub mod staff;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/requests", post(requests::submit).get(requests::list))
        .route("/requests/:id", get(requests::get_record))
        .route("/stock-alerts", get(insights::stock_alerts))
        .route("/trends", get(insights::trends))
        .route("/predictions/:id", get(insights::prediction))
        .route("/notifications", get(notifications::subscribe))
        .nest("/materials", materials::router())
        .nest("/staff", staff::router())
}
