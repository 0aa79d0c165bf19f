use crate::infra::{AppState, Marketplace};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use zameen_hub::marketplace::marketplace_router;

#[derive(Debug, Deserialize)]
pub(crate) struct ObjectPath {
    pub(crate) bucket: String,
    pub(crate) path: String,
}

pub(crate) fn with_service_routes(marketplace: Marketplace) -> axum::Router {
    marketplace_router(marketplace)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/storage/v1/object/public/:bucket/*path",
            axum::routing::get(public_object_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Serves uploaded listing images at the URLs recorded on `property_images`.
pub(crate) async fn public_object_endpoint(
    Extension(state): Extension<AppState>,
    Path(ObjectPath { bucket, path }): Path<ObjectPath>,
) -> Response {
    match state.storage.object(&bucket, &path) {
        Some(object) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, object.content_type)],
            object.bytes,
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "object not found" })),
        )
            .into_response(),
    }
}
