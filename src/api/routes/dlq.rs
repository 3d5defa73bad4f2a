//! DLQ pattern routes (§6, C3).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::engines::DlqConfig;
use crate::store::Fields;

use super::super::types::{ApiError, ApiResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    stream_name: String,
    dlq_stream_name: String,
    consumer_group: String,
    consumer_name: String,
    min_idle_ms: u64,
    count: usize,
    max_deliveries: u64,
}

pub async fn claim(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClaimRequest>,
) -> ApiResult<crate::store::ClaimOrDlqResult> {
    let result = state
        .store
        .read_claim_or_dlq(
            &req.stream_name,
            &req.dlq_stream_name,
            &req.consumer_group,
            &req.consumer_name,
            req.min_idle_ms,
            req.count,
            req.max_deliveries,
        )
        .await
        .map_err(crate::engines::EngineError::from)?;
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    stream_name: String,
    consumer_group: String,
}

pub async fn init(State(state): State<Arc<AppState>>, Json(req): Json<InitRequest>) -> Result<(), ApiError> {
    let config = DlqConfig::new(&req.stream_name, &req.consumer_group);
    state.dlq.init(&config).await?;
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceRequest {
    stream_name: String,
    payload: Fields,
}

#[derive(Serialize)]
pub struct ProduceResponse {
    id: String,
}

pub async fn produce(State(state): State<Arc<AppState>>, Json(req): Json<ProduceRequest>) -> ApiResult<ProduceResponse> {
    let id = state.dlq.produce(&req.stream_name, req.payload).await?;
    Ok(Json(ProduceResponse { id }))
}

#[derive(Deserialize)]
pub struct StreamCountQuery {
    #[serde(rename = "streamName")]
    stream_name: String,
    count: Option<usize>,
}

pub async fn messages(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StreamCountQuery>,
) -> ApiResult<Vec<crate::store::Entry>> {
    let entries = state.dlq.messages(&q.stream_name, q.count.unwrap_or(10)).await?;
    Ok(Json(entries))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    stream_name: String,
    group_name: String,
    count: Option<usize>,
}

pub async fn pending_messages(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PendingQuery>,
) -> ApiResult<Vec<crate::store::PendingEntry>> {
    let pel = state.dlq.pending(&q.stream_name, &q.group_name, q.count.unwrap_or(100)).await?;
    Ok(Json(pel))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextMessageQuery {
    stream_name: String,
    group_name: String,
}

pub async fn next_message(
    State(state): State<Arc<AppState>>,
    Query(q): Query<NextMessageQuery>,
) -> ApiResult<Option<String>> {
    let pel = state.dlq.pending(&q.stream_name, &q.group_name, 1).await?;
    Ok(Json(pel.into_iter().next().map(|p| p.id)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    stream_name: String,
    consumer_group: String,
    should_succeed: bool,
}

pub async fn process(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessRequest>,
) -> ApiResult<crate::engines::ProcessResult> {
    let config = state.dlq_config(&req.stream_name, &req.consumer_group);
    let result = state.dlq.process_one(&config, req.should_succeed).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct ConfigQuery {
    #[serde(rename = "streamName")]
    stream_name: String,
}

pub async fn get_config(State(state): State<Arc<AppState>>, Query(q): Query<ConfigQuery>) -> Json<DlqConfig> {
    Json(state.dlq_config(&q.stream_name, "dlq-group"))
}

pub async fn set_config(State(state): State<Arc<AppState>>, Json(config): Json<DlqConfig>) -> Response {
    state.set_dlq_config(&config.main_log.clone(), config);
    axum::http::StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupQuery {
    stream_name: String,
    consumer_group: String,
}

pub async fn cleanup(State(state): State<Arc<AppState>>, Query(q): Query<CleanupQuery>) -> Result<(), ApiError> {
    let config = state.dlq_config(&q.stream_name, &q.consumer_group);
    state.dlq.cleanup(&config).await?;
    Ok(())
}

pub async fn delete_stream(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Result<(), ApiError> {
    state
        .store
        .delete(&name)
        .await
        .map_err(crate::engines::EngineError::from)?;
    Ok(())
}
