use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse};

use crate::app::services::{self, AppServices};

/// GET /notifications
///
/// Server-sent events, one per notification, in sequence order. The SSE
/// `event` is the notification type and `id` its sequence number. Nothing
/// published before the connection opened is replayed.
pub async fn subscribe(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    services::notification_sse(&services)
}
