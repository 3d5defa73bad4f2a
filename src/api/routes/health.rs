//! Readiness probe (§6, ambient).

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    version: &'static str,
}

pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = if state.store.health_check().await.is_ok() { "ok" } else { "degraded" };
    Json(HealthResponse {
        status,
        backend: state.store.backend_name(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
