use clap::Parser;

use super::config::StoreBackendKind;
use super::constants::{
    ENV_DLQ_MAX_DELIVERIES, ENV_DLQ_MIN_IDLE_MS, ENV_EVENT_BUS_CAPACITY, ENV_HOST, ENV_LOG,
    ENV_MONITOR_TICK_MS, ENV_PORT, ENV_REDIS_URL, ENV_SCHEDULER_TICK_MS, ENV_STORE_BACKEND,
    ENV_WORKER_TICK_MS,
};

#[derive(Parser)]
#[command(name = "messaging-patterns")]
#[command(version, about = "Enterprise messaging pattern gallery over a log-store primitive", long_about = None)]
pub struct Cli {
    /// Server host address
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', env = ENV_PORT)]
    pub port: Option<u16>,

    /// Store backend to use
    #[arg(long, value_enum, env = ENV_STORE_BACKEND)]
    pub store_backend: Option<StoreBackendKind>,

    /// Redis connection URL, required when --store-backend=redis
    #[arg(long, env = ENV_REDIS_URL)]
    pub redis_url: Option<String>,

    /// DLQ engine: deliveries allowed before an entry is routed to the dead-letter log
    #[arg(long, env = ENV_DLQ_MAX_DELIVERIES)]
    pub dlq_max_deliveries: Option<u64>,

    /// DLQ engine: minimum idle time before a pending entry is eligible for reclaim
    #[arg(long, env = ENV_DLQ_MIN_IDLE_MS)]
    pub dlq_min_idle_ms: Option<u64>,

    /// Poll interval for work-queue/fan-out worker loops
    #[arg(long, env = ENV_WORKER_TICK_MS)]
    pub worker_tick_ms: Option<u64>,

    /// Poll interval for the scheduler's due-item sweep
    #[arg(long, env = ENV_SCHEDULER_TICK_MS)]
    pub scheduler_tick_ms: Option<u64>,

    /// Poll interval for the stream monitor
    #[arg(long, env = ENV_MONITOR_TICK_MS)]
    pub monitor_tick_ms: Option<u64>,

    /// In-process event bus broadcast channel capacity
    #[arg(long, env = ENV_EVENT_BUS_CAPACITY)]
    pub event_bus_capacity: Option<usize>,

    /// Tracing env-filter string, falls back to RUST_LOG then a built-in default
    #[arg(long, env = ENV_LOG)]
    pub log: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_no_args() {
        let cli = Cli::parse_from(["messaging-patterns"]);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
    }

    #[test]
    fn parses_store_backend_flag() {
        let cli = Cli::parse_from(["messaging-patterns", "--store-backend", "redis"]);
        assert_eq!(cli.store_backend, Some(StoreBackendKind::Redis));
    }
}
