//! Fan-Out pattern routes (§6, C5).

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::app::AppState;
use crate::store::Fields;

use super::super::types::{ApiError, ApiResult};

#[derive(Serialize)]
pub struct ProduceResponse {
    id: String,
}

pub async fn produce(State(state): State<Arc<AppState>>, Json(fields): Json<Fields>) -> ApiResult<ProduceResponse> {
    let id = state.fan_out.produce(fields).await?;
    Ok(Json(ProduceResponse { id }))
}

pub async fn clear(State(state): State<Arc<AppState>>) -> Result<(), ApiError> {
    state.fan_out.clear().await?;
    Ok(())
}
