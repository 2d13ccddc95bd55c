//! Health endpoints over a shared `HealthAggregator`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::application::{HealthAggregator, HealthStatus};

/// Shared state for the health endpoints.
pub type HealthState = Arc<HealthAggregator>;

/// Create the health router.
///
/// # Routes
///
/// - `GET /livez` - process is running (always 200)
/// - `GET /readyz` - 200 when ready to take traffic, 503 otherwise
/// - `GET /health` - full probe report, 503 when unhealthy
pub fn health_router(aggregator: HealthState) -> Router {
    Router::new()
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .route("/health", get(health))
        .with_state(aggregator)
}

async fn livez(State(aggregator): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(aggregator.liveness()))
}

async fn readyz(State(aggregator): State<HealthState>) -> impl IntoResponse {
    let readiness = aggregator.readiness().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}

async fn health(State(aggregator): State<HealthState>) -> impl IntoResponse {
    let report = aggregator.check_health().await;
    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}
