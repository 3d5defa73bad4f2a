//! Request/Reply routes (§6, C8). Only `send` is exposed over HTTP — the
//! responder side is a background process reading the request log, and the
//! timeout listener is the bootstrap-spawned worker in `app.rs`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::store::Fields;

use super::super::types::ApiResult;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    business_id: String,
    response_log: String,
    timeout_sec: u64,
    request_log: String,
    #[serde(default)]
    payload: Fields,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    correlation_id: String,
}

pub async fn send(State(state): State<Arc<AppState>>, Json(req): Json<SendRequest>) -> ApiResult<SendResponse> {
    let correlation_id = state
        .request_reply
        .send(&req.business_id, &req.response_log, req.timeout_sec, &req.request_log, req.payload)
        .await?;
    Ok(Json(SendResponse { correlation_id }))
}
