//! Pub/Sub publish routes (§6, C10). Both endpoints publish on a channel;
//! the only difference is which field names the caller uses, matching
//! whether the channel is addressed as an exact name or a routing key
//! pattern subscribers glob-match against.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::app::AppState;

use super::super::types::ApiResult;

#[derive(Deserialize)]
pub struct PublishRequest {
    channel: String,
    payload: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPublishRequest {
    routing_key: String,
    payload: String,
}

#[derive(Serialize)]
pub struct PublishResponse {
    subscribers: u64,
}

pub async fn publish(State(state): State<Arc<AppState>>, Json(req): Json<PublishRequest>) -> ApiResult<PublishResponse> {
    let subscribers = state.pubsub.publish(&req.channel, &req.payload).await?;
    Ok(Json(PublishResponse { subscribers }))
}

pub async fn publish_topic(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TopicPublishRequest>,
) -> ApiResult<PublishResponse> {
    let subscribers = state.pubsub.publish(&req.routing_key, &req.payload).await?;
    Ok(Json(PublishResponse { subscribers }))
}
