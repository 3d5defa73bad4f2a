//! Content-Based Router routes (§6, C7).

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::app::AppState;
use crate::engines::{PaymentSubmission, RoutingDecision};

use super::super::types::{ApiError, ApiResult};

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<PaymentSubmission>,
) -> ApiResult<RoutingDecisionResponse> {
    let decision = state.content_router.submit(submission).await?;
    Ok(Json(decision.into()))
}

#[derive(Serialize)]
pub struct RoutingDecisionResponse {
    destination: String,
    id: String,
}

impl From<RoutingDecision> for RoutingDecisionResponse {
    fn from(d: RoutingDecision) -> Self {
        Self { destination: d.destination, id: d.id }
    }
}

#[derive(Serialize)]
pub struct RuleDescription {
    range: &'static str,
    destination: &'static str,
}

pub async fn rules(State(state): State<Arc<AppState>>) -> Json<Vec<RuleDescription>> {
    Json(
        state
            .content_router
            .rules()
            .into_iter()
            .map(|(range, destination)| RuleDescription { range, destination })
            .collect(),
    )
}

pub async fn clear(State(state): State<Arc<AppState>>) -> Result<(), ApiError> {
    state.content_router.clear().await?;
    Ok(())
}
