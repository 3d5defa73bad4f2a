//! Process bootstrap: config, logging, store construction, engine wiring,
//! server startup and graceful shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::RwLock;

use crate::api;
use crate::core::banner;
use crate::core::cli::Cli;
use crate::core::config::{AppConfig, StoreBackendKind};
use crate::core::shutdown::ShutdownService;
use crate::engines::{
    ContentRouterEngine, DlqConfig, DlqEngine, FanOutConfig, FanOutEngine, PubSubEngine,
    RequestReplyEngine, SchedulerEngine, StreamMonitor, TopicRoutingEngine, WorkQueueConfig,
    WorkQueueEngine,
};
use crate::event_bus::EventBus;
use crate::store::{MemoryStore, RedisStore, ScriptLibrary};

pub const WORK_QUEUE_LOG: &str = "work-queue.v1";
pub const FAN_OUT_LOG: &str = "fan-out.v1";
pub const CONTENT_ROUTING_PREFIX: &str = "content-routing";
pub const DEFAULT_TOPIC_EXCHANGE: &str = "topic-routing.v1";

/// Everything a route handler needs, shared behind one `Arc`.
pub struct AppState {
    pub config: AppConfig,
    pub shutdown: ShutdownService,
    pub bus: EventBus,
    pub store: Arc<dyn ScriptLibrary>,
    pub dlq: DlqEngine,
    pub dlq_configs: RwLock<HashMap<String, DlqConfig>>,
    pub work_queue: Arc<WorkQueueEngine>,
    pub fan_out: Arc<FanOutEngine>,
    pub topic_routing: TopicRoutingEngine,
    pub content_router: ContentRouterEngine,
    pub request_reply: Arc<RequestReplyEngine>,
    pub scheduler: Arc<SchedulerEngine>,
    pub pubsub: PubSubEngine,
    pub monitor: Arc<StreamMonitor>,
}

impl AppState {
    /// Per-stream DLQ tuning (§4.14): held in a process-wide map, not
    /// persisted past the process lifetime.
    pub fn dlq_config(&self, stream_name: &str, group: &str) -> DlqConfig {
        self.dlq_configs
            .read()
            .get(stream_name)
            .cloned()
            .unwrap_or_else(|| DlqConfig::new(stream_name, group))
    }

    pub fn set_dlq_config(&self, stream_name: &str, config: DlqConfig) {
        self.dlq_configs.write().insert(stream_name.to_string(), config);
    }
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli).map_err(anyhow::Error::msg)?;

    let store = build_store(&config).await?;
    let shutdown = ShutdownService::new(store_backend_handle(&store));
    let bus = EventBus::new(config.event_bus_capacity);

    let state = Arc::new(build_state(config, store, shutdown.clone(), bus));
    start_background_tasks(&state, &shutdown).await;

    shutdown.install_signal_handlers();
    banner::print_banner(&state.config, env!("CARGO_PKG_VERSION"));

    let listener = tokio::net::TcpListener::bind(state.config.bind_addr()).await?;
    let router = api::build_router(Arc::clone(&state));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.wait())
        .await?;

    shutdown.shutdown().await;
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = std::env::var("MP_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info,messaging_patterns=debug".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .compact()
        .init();
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ScriptLibrary>> {
    match config.store_backend {
        StoreBackendKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackendKind::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .expect("AppConfig::from_cli rejects redis backend without a url");
            let store = RedisStore::connect(url).await?;
            Ok(Arc::new(store))
        }
    }
}

/// `ScriptLibrary: StoreBackend`, but `ShutdownService` only needs the
/// narrower trait for its final health check.
fn store_backend_handle(store: &Arc<dyn ScriptLibrary>) -> Arc<dyn crate::store::StoreBackend> {
    Arc::clone(store) as Arc<dyn crate::store::StoreBackend>
}

fn build_state(
    config: AppConfig,
    store: Arc<dyn ScriptLibrary>,
    shutdown: ShutdownService,
    bus: EventBus,
) -> AppState {
    let worker_tick = Duration::from_millis(config.worker_tick_ms);

    let work_queue_config = WorkQueueConfig {
        tick: worker_tick,
        max_deliveries: config.dlq_max_deliveries,
        min_idle_ms: config.dlq_min_idle_ms,
        ..WorkQueueConfig::new(WORK_QUEUE_LOG)
    };
    let fan_out_config = FanOutConfig {
        tick: worker_tick,
        max_deliveries: config.dlq_max_deliveries,
        min_idle_ms: config.dlq_min_idle_ms,
        ..FanOutConfig::new(FAN_OUT_LOG)
    };

    AppState {
        store: Arc::clone(&store),
        dlq: DlqEngine::new(Arc::clone(&store)),
        dlq_configs: RwLock::new(HashMap::new()),
        work_queue: Arc::new(WorkQueueEngine::new(Arc::clone(&store), bus.clone(), work_queue_config)),
        fan_out: Arc::new(FanOutEngine::new(Arc::clone(&store), bus.clone(), fan_out_config)),
        topic_routing: TopicRoutingEngine::new(Arc::clone(&store)),
        content_router: ContentRouterEngine::new(Arc::clone(&store), CONTENT_ROUTING_PREFIX),
        request_reply: Arc::new(RequestReplyEngine::new(Arc::clone(&store), bus.clone())),
        scheduler: Arc::new(SchedulerEngine::new(
            Arc::clone(&store),
            bus.clone(),
            Duration::from_millis(config.scheduler_tick_ms),
        )),
        pubsub: PubSubEngine::new(Arc::clone(&store)),
        monitor: Arc::new(StreamMonitor::new(
            store,
            bus.clone(),
            vec![WORK_QUEUE_LOG.to_string(), FAN_OUT_LOG.to_string()],
            Duration::from_millis(config.monitor_tick_ms),
        )),
        config,
        shutdown,
        bus,
    }
}

async fn start_background_tasks(state: &Arc<AppState>, shutdown: &ShutdownService) {
    for handle in state.work_queue.spawn(shutdown.subscribe()) {
        shutdown.register(handle).await;
    }
    for handle in state.fan_out.spawn(shutdown.subscribe()) {
        shutdown.register(handle).await;
    }
    shutdown.register(state.scheduler.spawn(shutdown.subscribe())).await;
    shutdown.register(Arc::clone(&state.monitor).spawn(shutdown.subscribe())).await;
    shutdown
        .register(state.request_reply.spawn_timeout_listener(shutdown.subscribe()))
        .await;
}
