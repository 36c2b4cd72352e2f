//! Configuration management for the regbench harness
//!
//! This module provides a clean, layered approach to configuration:
//! - Core structures and enums
//! - CLI argument parsing
//! - Configuration validation
//! - Default value management

pub mod defaults;
pub mod parser;
pub mod validation;

use crate::errors::Result;
use std::time::Duration;

/// What the process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One benchmark wave against an in-process server, then exit
    Clients,
    /// Server console reading `start` / `stop` / `bench` commands
    Server,
}

/// Transport security used by every simulated client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    /// Pre-shared key, identity is the endpoint name
    Psk,
    /// Unsecured transport
    NoSec,
}

impl SecurityMode {
    pub fn is_secure(&self) -> bool {
        matches!(self, SecurityMode::Psk)
    }
}

/// Which lifecycle milestone releases a client from the completion barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    /// A successful registration is terminal on its own
    Registration,
    /// A successful registration must be followed by a deregistration outcome
    Deregistration,
}

/// Simulated client population
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub count: u32,
    pub time_alive: Duration,
    pub security: SecurityMode,
    pub server_uri: String,
    pub lifetime: Duration,
    pub response_timeout: Duration,
}

/// Simulated server and its security store
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub lookup_latency: Duration,
    pub lookup_workers: usize,
    pub psk_prefix: String,
    pub network_delay: Duration,
    pub network_jitter: Duration,
}

/// Run boundaries
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub wait_timeout: Duration,
    pub terminal: TerminalMode,
    pub settle: Duration,
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub verbose: bool,
    pub json: bool,
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub client: ClientConfig,
    pub server: ServerConfig,
    pub run: RunConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Parse and validate configuration from command line arguments
    pub fn from_args() -> Result<Self> {
        let raw_config = parser::RawConfig::parse_from_args()?;
        let config = raw_config.try_into()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("Registration Benchmark Configuration:");
        println!("   Mode:             {:?}", self.mode);
        println!("   Clients:          {}", self.client.count);
        println!("   Server:           {}", self.client.server_uri);
        println!("   Security:         {:?}", self.client.security);
        println!(
            "   Time Alive:       {}ms",
            self.client.time_alive.as_millis()
        );
        println!(
            "   Wait Timeout:     {}ms",
            self.run.wait_timeout.as_millis()
        );
        println!("   Terminal On:      {:?}", self.run.terminal);
        println!(
            "   Lookup Latency:   {}ms ({} workers)",
            self.server.lookup_latency.as_millis(),
            self.server.lookup_workers
        );

        if !self.server.network_delay.is_zero() || !self.server.network_jitter.is_zero() {
            println!(
                "   Network Delay:    {}ms (+ up to {}ms jitter)",
                self.server.network_delay.as_millis(),
                self.server.network_jitter.as_millis()
            );
        }

        println!();
    }
}
