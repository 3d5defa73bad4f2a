//! Startup banner.

use super::config::AppConfig;

pub fn print_banner(config: &AppConfig, version: &str) {
    println!();
    println!("  messaging-patterns v{version}");
    println!("  listening on http://{}", config.bind_addr());
    println!("  store backend: {:?}", config.store_backend);
    println!();
}
