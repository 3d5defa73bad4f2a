//! Scheduled-message routes (§6, C9).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::store::ScheduledItem;

use super::super::types::{ApiError, ApiResult};

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ScheduledItem>> {
    let items = state.scheduler.list().await?;
    Ok(Json(items))
}

pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<ScheduledItem> {
    let item = state.scheduler.get(&id).await?;
    Ok(Json(item))
}

#[derive(Deserialize)]
pub struct NewScheduledMessage {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "scheduledForEpochMillis")]
    scheduled_for_epoch_millis: i64,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewScheduledMessage>,
) -> ApiResult<ScheduledItem> {
    let item = ScheduledItem {
        id: Uuid::new_v4().to_string(),
        title: body.title,
        description: body.description,
        scheduled_for_epoch_millis: body.scheduled_for_epoch_millis,
        created_at_epoch_millis: Utc::now().timestamp_millis(),
    };
    state.scheduler.schedule(item.clone()).await?;
    Ok(Json(item))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<NewScheduledMessage>,
) -> ApiResult<ScheduledItem> {
    let item = ScheduledItem {
        id,
        title: body.title,
        description: body.description,
        scheduled_for_epoch_millis: body.scheduled_for_epoch_millis,
        created_at_epoch_millis: Utc::now().timestamp_millis(),
    };
    let _ = state.scheduler.delete(&item.id).await;
    state.scheduler.schedule(item.clone()).await?;
    Ok(Json(item))
}

pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<(), ApiError> {
    state.scheduler.delete(&id).await?;
    Ok(())
}

pub async fn clear(State(state): State<Arc<AppState>>) -> Result<(), ApiError> {
    state.scheduler.clear().await?;
    Ok(())
}
