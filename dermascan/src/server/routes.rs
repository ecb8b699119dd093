use crate::server::{handlers, types::AppState, upload::MULTIPART_OVERHEAD};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn create_router(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let body_limit = state.settings.max_upload_bytes + MULTIPART_OVERHEAD;
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/predict",
            post(handlers::predict).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/metrics",
            get(move || std::future::ready(metrics_handle.render())),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
