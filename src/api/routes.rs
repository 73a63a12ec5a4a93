use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::jobs::ReportRunner;

use super::handlers::{get_report, health_check, root, trigger_report, AppState};

pub fn create_api_router(runner: Arc<ReportRunner>) -> Router {
    let state = Arc::new(AppState { runner });

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/trigger_report", post(trigger_report))
        .route("/get_report/{report_id}", get(get_report))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
