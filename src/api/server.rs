//! Router assembly (§4.15, §6): one flat router under `/api`, plus the
//! `/ws/dlq-events` upgrade endpoint, CORS, and a 404 fallback.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::app::AppState;

use super::middleware::{self, AllowedOrigins};
use super::routes::{content_routing, dlq, fan_out, health, pubsub, request_reply, scheduler, topic_routing, work_queue};
use super::ws;

pub fn build_router(state: Arc<AppState>) -> Router {
    let allowed = AllowedOrigins::new(&state.config.host, state.config.port);

    let api = Router::new()
        .route("/dlq/claim", post(dlq::claim))
        .route("/dlq/init", post(dlq::init))
        .route("/dlq/produce", post(dlq::produce))
        .route("/dlq/messages", get(dlq::messages))
        .route("/dlq/pending-messages", get(dlq::pending_messages))
        .route("/dlq/next-message", get(dlq::next_message))
        .route("/dlq/process", post(dlq::process))
        .route("/dlq/config", get(dlq::get_config).post(dlq::set_config))
        .route("/dlq/cleanup", delete(dlq::cleanup))
        .route("/dlq/stream/{name}", delete(dlq::delete_stream))
        .route("/work-queue/produce", post(work_queue::produce))
        .route("/work-queue/clear", delete(work_queue::clear))
        .route("/fan-out/produce", post(fan_out::produce))
        .route("/fan-out/clear", delete(fan_out::clear))
        .route("/topic-routing/route", post(topic_routing::route))
        .route("/topic-routing/routing-keys", get(topic_routing::routing_keys))
        .route("/topic-routing/clear", delete(topic_routing::clear))
        .route("/routing-rules/{exchange}/rules", get(topic_routing::list_rules).post(topic_routing::create_rule))
        .route(
            "/routing-rules/{exchange}/rules/{id}",
            get(topic_routing::get_rule).put(topic_routing::update_rule).delete(topic_routing::delete_rule),
        )
        .route("/routing-rules/{exchange}/metadata", get(topic_routing::get_metadata).put(topic_routing::put_metadata))
        .route("/routing-rules/{exchange}/reset", post(topic_routing::reset))
        .route("/content-routing/submit", post(content_routing::submit))
        .route("/content-routing/rules", get(content_routing::rules))
        .route("/content-routing/clear", delete(content_routing::clear))
        .route("/request-reply/send", post(request_reply::send))
        .route("/scheduled-messages", get(scheduler::list).post(scheduler::create))
        .route("/scheduled-messages/clear", delete(scheduler::clear))
        .route(
            "/scheduled-messages/{id}",
            get(scheduler::get).put(scheduler::update).delete(scheduler::delete),
        )
        .route("/pubsub/publish", post(pubsub::publish))
        .route("/pubsub-topic-routing/publish", post(pubsub::publish_topic))
        .route("/healthz", get(health::healthz));

    Router::new()
        .nest("/api", api)
        .route("/ws/dlq-events", get(ws::upgrade))
        .fallback(middleware::handle_404)
        .layer(middleware::cors(&allowed))
        .with_state(state)
}
