//! Server side of the harness
//!
//! - Gated registration counters
//! - Registry listener feeding them
//! - Security-store stub and its blocking worker pool
//! - Interactive console driving the whole stack

pub mod console;
pub mod counter;
pub mod listener;
pub mod security;

pub use console::ServerConsole;
pub use counter::{CounterSnapshot, ServerCounters};
pub use listener::RegistrationCounter;
pub use security::{SecurityWorkers, StubSecurityStore};

use crate::config::ServerConfig;
use crate::engine::ServerEngine;
use crate::engine::sim::{SimEngine, SimNetwork, SimServer};
use crate::errors::Result;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Counter values plus the registrations still held by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerSummary {
    pub counters: CounterSnapshot,
    pub remaining: usize,
}

impl ServerSummary {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = self.counters.lines();
        lines.push(format!("Registration Remaining: {}", self.remaining));
        lines
    }

    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
        } else {
            for line in self.lines() {
                println!("{}", line);
            }
        }
        Ok(())
    }
}

/// Simulated server wired to its security store, counters and registry listener
pub struct ServerStack {
    server: Arc<SimServer>,
    counters: Arc<ServerCounters>,
    listener: JoinHandle<()>,
}

impl ServerStack {
    /// Build the stack; the server stays stopped until [`ServerStack::start`]
    pub fn launch(config: &ServerConfig) -> Self {
        let counters = Arc::new(ServerCounters::new());
        let store = StubSecurityStore::new(
            config.lookup_latency,
            config.psk_prefix.clone(),
            Arc::clone(&counters),
        );
        let server = SimServer::new(
            Arc::new(store),
            SecurityWorkers::new(config.lookup_workers),
            SimNetwork::new(config.network_delay, config.network_jitter),
        );

        let engine: Arc<dyn ServerEngine> = server.clone();
        let listener = RegistrationCounter::new(engine, Arc::clone(&counters)).spawn();

        Self {
            server,
            counters,
            listener,
        }
    }

    /// Reset and enable counting, then start serving
    pub fn start(&self) {
        self.counters.enable();
        self.server.start();
    }

    pub fn server(&self) -> &Arc<SimServer> {
        &self.server
    }

    pub fn counters(&self) -> &Arc<ServerCounters> {
        &self.counters
    }

    /// Client engine whose clients register against this stack's server
    pub fn client_engine(&self, response_timeout: Duration) -> SimEngine {
        SimEngine::new(Arc::clone(&self.server), response_timeout)
    }

    /// Registrations currently held by the server
    pub fn remaining(&self) -> usize {
        self.server.registrations().len()
    }

    pub fn summary(&self) -> ServerSummary {
        ServerSummary {
            counters: self.counters.snapshot(),
            remaining: self.remaining(),
        }
    }

    pub async fn shutdown(self) {
        self.counters.disable();
        self.server.destroy().await;
        self.listener.abort();
        info!("Server stack shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Mode};

    #[test]
    fn test_summary_lines_end_with_remaining() {
        let summary = ServerSummary {
            counters: CounterSnapshot {
                registrations: 3,
                ..CounterSnapshot::default()
            },
            remaining: 2,
        };
        let lines = summary.lines();
        assert_eq!(lines.len(), 5);
        assert!(lines.contains(&"nb reg : 3".to_string()));
        assert_eq!(lines[4], "Registration Remaining: 2");
    }

    #[tokio::test]
    async fn test_launch_starts_stopped_and_counting_disabled() {
        let config = Config::default_benchmark(Mode::Server);
        let stack = ServerStack::launch(&config.server);
        assert!(!stack.server().is_running());
        assert!(!stack.counters().is_enabled());

        stack.start();
        assert!(stack.server().is_running());
        assert!(stack.counters().is_enabled());
        assert_eq!(stack.remaining(), 0);

        stack.shutdown().await;
    }
}
