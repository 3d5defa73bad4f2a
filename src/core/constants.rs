//! Environment variable names and default tunables.

pub const ENV_HOST: &str = "MP_HOST";
pub const ENV_PORT: &str = "MP_PORT";
pub const ENV_LOG: &str = "MP_LOG";
pub const ENV_STORE_BACKEND: &str = "MP_STORE_BACKEND";
pub const ENV_REDIS_URL: &str = "MP_REDIS_URL";
pub const ENV_DLQ_MAX_DELIVERIES: &str = "MP_DLQ_MAX_DELIVERIES";
pub const ENV_DLQ_MIN_IDLE_MS: &str = "MP_DLQ_MIN_IDLE_MS";
pub const ENV_WORKER_TICK_MS: &str = "MP_WORKER_TICK_MS";
pub const ENV_SCHEDULER_TICK_MS: &str = "MP_SCHEDULER_TICK_MS";
pub const ENV_MONITOR_TICK_MS: &str = "MP_MONITOR_TICK_MS";
pub const ENV_EVENT_BUS_CAPACITY: &str = "MP_EVENT_BUS_CAPACITY";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DLQ_MAX_DELIVERIES: u64 = 3;
pub const DEFAULT_DLQ_MIN_IDLE_MS: u64 = 5_000;
pub const DEFAULT_WORKER_TICK_MS: u64 = 200;
pub const DEFAULT_SCHEDULER_TICK_MS: u64 = 500;
pub const DEFAULT_MONITOR_TICK_MS: u64 = 1_000;
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1_000;

pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
