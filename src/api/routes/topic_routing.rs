//! Topic-routing exchange routes (§6, C6): the fixed default exchange plus
//! per-exchange rule CRUD.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::app::{AppState, DEFAULT_TOPIC_EXCHANGE};
use crate::store::{Fields, RouteResult, RoutingMetadata, RoutingRule};

use super::super::types::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct RouteQuery {
    #[serde(rename = "routingKey")]
    routing_key: String,
}

pub async fn route(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RouteQuery>,
    Json(payload): Json<Fields>,
) -> ApiResult<RouteResult> {
    let result = state.topic_routing.route(DEFAULT_TOPIC_EXCHANGE, &q.routing_key, payload).await?;
    Ok(Json(result))
}

pub async fn routing_keys(State(state): State<Arc<AppState>>) -> ApiResult<Vec<String>> {
    let keys = state.topic_routing.routing_keys(DEFAULT_TOPIC_EXCHANGE).await?;
    Ok(Json(keys))
}

pub async fn clear(State(state): State<Arc<AppState>>) -> Result<(), ApiError> {
    state.topic_routing.clear(DEFAULT_TOPIC_EXCHANGE).await?;
    Ok(())
}

pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Path(exchange): Path<String>,
) -> ApiResult<Vec<RoutingRule>> {
    let rules = state.topic_routing.list_rules(&exchange).await?;
    Ok(Json(rules))
}

pub async fn get_rule(
    State(state): State<Arc<AppState>>,
    Path((exchange, id)): Path<(String, String)>,
) -> ApiResult<RoutingRule> {
    let rule = state.topic_routing.get_rule(&exchange, &id).await?;
    Ok(Json(rule))
}

pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Path(exchange): Path<String>,
    Json(rule): Json<RoutingRule>,
) -> ApiResult<RoutingRule> {
    let saved = state.topic_routing.save_rule(&exchange, rule).await?;
    Ok(Json(saved))
}

pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path((exchange, id)): Path<(String, String)>,
    Json(mut rule): Json<RoutingRule>,
) -> ApiResult<RoutingRule> {
    rule.id = id;
    let saved = state.topic_routing.save_rule(&exchange, rule).await?;
    Ok(Json(saved))
}

pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path((exchange, id)): Path<(String, String)>,
) -> Result<(), ApiError> {
    state.topic_routing.delete_rule(&exchange, &id).await?;
    Ok(())
}

pub async fn get_metadata(
    State(state): State<Arc<AppState>>,
    Path(exchange): Path<String>,
) -> ApiResult<RoutingMetadata> {
    let metadata = state.topic_routing.metadata(&exchange).await?;
    Ok(Json(metadata))
}

#[derive(Deserialize, Serialize)]
pub struct MetadataUpdate {
    #[serde(flatten)]
    metadata: RoutingMetadata,
}

pub async fn put_metadata(
    State(state): State<Arc<AppState>>,
    Path(exchange): Path<String>,
    Json(body): Json<MetadataUpdate>,
) -> Result<(), ApiError> {
    state.topic_routing.set_metadata(&exchange, &body.metadata).await?;
    Ok(())
}

pub async fn reset(State(state): State<Arc<AppState>>, Path(exchange): Path<String>) -> Result<(), ApiError> {
    state.topic_routing.reset(&exchange).await?;
    Ok(())
}
