//! Runtime configuration, resolved from CLI flags with environment/default fallback.

use serde::{Deserialize, Serialize};

use super::cli::Cli;
use super::constants::{
    DEFAULT_DLQ_MAX_DELIVERIES, DEFAULT_DLQ_MIN_IDLE_MS, DEFAULT_EVENT_BUS_CAPACITY,
    DEFAULT_HOST, DEFAULT_MONITOR_TICK_MS, DEFAULT_PORT, DEFAULT_SCHEDULER_TICK_MS,
    DEFAULT_WORKER_TICK_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Memory,
    Redis,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackendKind,
    pub redis_url: Option<String>,
    pub dlq_max_deliveries: u64,
    pub dlq_min_idle_ms: u64,
    pub worker_tick_ms: u64,
    pub scheduler_tick_ms: u64,
    pub monitor_tick_ms: u64,
    pub event_bus_capacity: usize,
    pub log_filter: Option<String>,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, String> {
        let store_backend = cli.store_backend.unwrap_or(StoreBackendKind::Memory);
        if matches!(store_backend, StoreBackendKind::Redis) && cli.redis_url.is_none() {
            return Err("--redis-url is required when --store-backend=redis".to_string());
        }

        Ok(Self {
            host: cli.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.unwrap_or(DEFAULT_PORT),
            store_backend,
            redis_url: cli.redis_url.clone(),
            dlq_max_deliveries: cli.dlq_max_deliveries.unwrap_or(DEFAULT_DLQ_MAX_DELIVERIES),
            dlq_min_idle_ms: cli.dlq_min_idle_ms.unwrap_or(DEFAULT_DLQ_MIN_IDLE_MS),
            worker_tick_ms: cli.worker_tick_ms.unwrap_or(DEFAULT_WORKER_TICK_MS),
            scheduler_tick_ms: cli.scheduler_tick_ms.unwrap_or(DEFAULT_SCHEDULER_TICK_MS),
            monitor_tick_ms: cli.monitor_tick_ms.unwrap_or(DEFAULT_MONITOR_TICK_MS),
            event_bus_capacity: cli
                .event_bus_capacity
                .unwrap_or(DEFAULT_EVENT_BUS_CAPACITY),
            log_filter: cli.log.clone(),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn redis_backend_without_url_is_rejected() {
        let cli = Cli::parse_from(["messaging-patterns", "--store-backend", "redis"]);
        assert!(AppConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cli = Cli::parse_from(["messaging-patterns"]);
        let config = AppConfig::from_cli(&cli).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.store_backend, StoreBackendKind::Memory);
    }
}
