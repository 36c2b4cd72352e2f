//! Default values and configuration presets

use super::{
    ClientConfig, Config, Mode, OutputConfig, RunConfig, SecurityMode, ServerConfig, TerminalMode,
};
use crate::constants::{DEFAULT_PLAIN_SERVER_URI, DEFAULT_PSK_PREFIX, DEFAULT_SECURE_SERVER_URI};
use std::time::Duration;

/// Default configuration values
pub struct Defaults;

impl Defaults {
    pub const CLIENT_COUNT: u32 = 1000;
    pub const TIME_ALIVE_MS: u64 = 100;
    pub const WAIT_TIMEOUT_SECONDS: u64 = 15;
    pub const LIFETIME_SECONDS: u64 = 36_000;
    pub const RESPONSE_TIMEOUT_SECONDS: u64 = 30;
    pub const LOOKUP_LATENCY_MS: u64 = 10;
    pub const SETTLE_MS: u64 = 500;
    pub const PSK_PREFIX: &'static str = DEFAULT_PSK_PREFIX;

    /// Server URI matching the security mode
    pub fn server_uri(security: SecurityMode) -> &'static str {
        match security {
            SecurityMode::Psk => DEFAULT_SECURE_SERVER_URI,
            SecurityMode::NoSec => DEFAULT_PLAIN_SERVER_URI,
        }
    }

    /// Worker count for pools sized to the machine
    pub fn worker_count() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

impl Config {
    /// Benchmark configuration with every default applied
    pub fn default_benchmark(mode: Mode) -> Self {
        Self {
            mode,
            client: ClientConfig {
                count: Defaults::CLIENT_COUNT,
                time_alive: Duration::from_millis(Defaults::TIME_ALIVE_MS),
                security: SecurityMode::Psk,
                server_uri: Defaults::server_uri(SecurityMode::Psk).to_string(),
                lifetime: Duration::from_secs(Defaults::LIFETIME_SECONDS),
                response_timeout: Duration::from_secs(Defaults::RESPONSE_TIMEOUT_SECONDS),
            },
            server: ServerConfig {
                lookup_latency: Duration::from_millis(Defaults::LOOKUP_LATENCY_MS),
                lookup_workers: Defaults::worker_count(),
                psk_prefix: Defaults::PSK_PREFIX.to_string(),
                network_delay: Duration::ZERO,
                network_jitter: Duration::ZERO,
            },
            run: RunConfig {
                wait_timeout: Duration::from_secs(Defaults::WAIT_TIMEOUT_SECONDS),
                terminal: TerminalMode::Deregistration,
                settle: Duration::from_millis(Defaults::SETTLE_MS),
            },
            output: OutputConfig {
                verbose: false,
                json: false,
            },
        }
    }

    /// Create a quick test configuration (few clients, short windows)
    pub fn quick_test() -> Self {
        let mut config = Self::default_benchmark(Mode::Clients);

        config.client.count = 10;
        config.client.time_alive = Duration::from_millis(50);
        config.run.wait_timeout = Duration::from_millis(2000);
        config.run.settle = Duration::from_millis(100);

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_benchmark_config() {
        let config = Config::default_benchmark(Mode::Clients);
        assert_eq!(config.client.count, Defaults::CLIENT_COUNT);
        assert_eq!(config.client.security, SecurityMode::Psk);
        assert_eq!(config.client.server_uri, "coaps://localhost:5684");
        assert_eq!(config.run.terminal, TerminalMode::Deregistration);
        assert_eq!(config.run.wait_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_default_response_timeout_covers_serial_lookups() {
        let config = Config::default_benchmark(Mode::Clients);
        let serial_lookups = config.server.lookup_latency * config.client.count;
        assert!(serial_lookups < config.client.response_timeout);
    }

    #[test]
    fn test_quick_test_config() {
        let config = Config::quick_test();
        assert_eq!(config.client.count, 10);
        assert_eq!(config.client.time_alive, Duration::from_millis(50));
        assert_eq!(config.run.wait_timeout, Duration::from_millis(2000));
    }
}
