//! Work-Queue pattern routes (§6, C4).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::app::AppState;

use super::super::types::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct ProduceQuery {
    #[serde(rename = "processingType")]
    processing_type: String,
}

#[derive(Serialize)]
pub struct ProduceResponse {
    id: String,
}

pub async fn produce(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ProduceQuery>,
) -> ApiResult<ProduceResponse> {
    let id = state.work_queue.produce(&q.processing_type).await?;
    Ok(Json(ProduceResponse { id }))
}

pub async fn clear(State(state): State<Arc<AppState>>) -> Result<(), ApiError> {
    state.work_queue.clear().await?;
    Ok(())
}
