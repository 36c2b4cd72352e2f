//! Command-line argument parsing for regbench configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;

use super::{
    ClientConfig, Config, Mode, OutputConfig, RunConfig, SecurityMode, ServerConfig, TerminalMode,
};
use crate::config::defaults::Defaults;
use crate::errors::{BenchError, Result};

/// What to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum ModeArg {
    /// Run one benchmark wave against an in-process server and exit
    Clients,
    /// Run the server console (`start`, `stop`, `bench`, `quit` on stdin)
    Server,
}

/// Transport security for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SecurityArg {
    /// Pre-shared key
    Psk,
    /// No security
    None,
}

/// Barrier release milestone for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TerminalArg {
    /// Release on registration outcome alone
    Registration,
    /// Release on deregistration outcome after the scheduled stop
    Deregistration,
}

/// Raw configuration from command line arguments
#[derive(Parser, Debug, Clone)]
#[command(
    name = "regbench",
    version,
    about = "Device registration load tester: many concurrent clients, lifecycle latency",
    long_about = None
)]
pub struct RawConfig {
    #[command(subcommand)]
    pub mode: ModeArg,

    /// Number of simulated clients
    #[arg(
        short = 'c',
        long = "clients",
        value_name = "COUNT",
        default_value_t = Defaults::CLIENT_COUNT,
        global = true,
        help = "Number of clients to create and start"
    )]
    pub clients: u32,

    /// Time a client stays registered before it is stopped
    #[arg(
        long = "time-alive",
        value_name = "DURATION",
        default_value = "100ms",
        global = true,
        help = "Time each client remains registered (e.g., '100ms', '2s')"
    )]
    pub time_alive: String,

    /// Security mode
    #[arg(
        long = "security",
        value_enum,
        default_value = "psk",
        global = true,
        help = "Transport security used by clients"
    )]
    pub security: SecurityArg,

    /// Overall wait timeout
    #[arg(
        long = "wait-timeout",
        value_name = "DURATION",
        default_value = "15s",
        global = true,
        help = "Maximum time to wait for every client to finish"
    )]
    pub wait_timeout: String,

    /// Barrier release milestone
    #[arg(
        long = "terminal-on",
        value_enum,
        default_value = "deregistration",
        global = true,
        help = "Lifecycle milestone after which a successful client counts as finished"
    )]
    pub terminal_on: TerminalArg,

    /// Server URI written into every client's security object
    #[arg(
        long = "server-uri",
        value_name = "URI",
        global = true,
        help = "Server URI (defaults to coaps://localhost:5684 or coap://localhost:5683)"
    )]
    pub server_uri: Option<String>,

    /// Registration lifetime
    #[arg(
        long = "lifetime",
        value_name = "DURATION",
        default_value = "36000s",
        global = true,
        help = "Registration lifetime announced by clients"
    )]
    pub lifetime: String,

    /// Engine response timeout
    #[arg(
        long = "response-timeout",
        value_name = "DURATION",
        default_value = "30s",
        global = true,
        help = "Time a client waits for a registration or deregistration response; \
                includes time queued for a security lookup worker"
    )]
    pub response_timeout: String,

    /// Security store latency
    #[arg(
        long = "lookup-latency",
        value_name = "DURATION",
        default_value = "10ms",
        global = true,
        help = "Artificial latency of every security store lookup"
    )]
    pub lookup_latency: String,

    /// Security store worker threads
    #[arg(
        long = "lookup-workers",
        value_name = "COUNT",
        global = true,
        help = "Concurrent security lookups (defaults to available parallelism)"
    )]
    pub lookup_workers: Option<usize>,

    /// Recognised PSK identity prefix
    #[arg(
        long = "psk-prefix",
        value_name = "PREFIX",
        default_value = Defaults::PSK_PREFIX,
        global = true,
        help = "Identity prefix the security store recognises"
    )]
    pub psk_prefix: String,

    /// Simulated one-way network delay
    #[arg(
        long = "network-delay",
        value_name = "DURATION",
        default_value = "0ms",
        global = true,
        help = "Simulated network delay applied to every request"
    )]
    pub network_delay: String,

    /// Simulated network jitter
    #[arg(
        long = "network-jitter",
        value_name = "DURATION",
        default_value = "0ms",
        global = true,
        help = "Upper bound of random extra delay applied to every request"
    )]
    pub network_jitter: String,

    /// Settle delay before counting remaining registrations
    #[arg(
        long = "settle",
        value_name = "DURATION",
        default_value = "500ms",
        global = true,
        help = "Time to let in-flight events settle before reporting server state"
    )]
    pub settle: String,

    /// Emit the report as JSON
    #[arg(long = "json", global = true, help = "Print the run report as JSON")]
    pub json: bool,

    /// Enable verbose logging
    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        help = "Enable verbose logging"
    )]
    pub verbose: bool,
}

impl RawConfig {
    /// Parse from command line arguments
    pub fn parse_from_args() -> Result<Self> {
        Ok(Self::parse())
    }

    /// Parse duration string with time suffixes (ms/s/m/h)
    pub(crate) fn parse_duration(duration_str: &str) -> Result<Duration> {
        let duration_str = duration_str.trim();

        if duration_str.is_empty() {
            return Err(BenchError::config("Duration cannot be empty"));
        }

        let lower = duration_str.to_ascii_lowercase();
        let (number_part, unit_ms) = if let Some(n) = lower.strip_suffix("ms") {
            (n, 1)
        } else if let Some(n) = lower.strip_suffix('s') {
            (n, 1_000)
        } else if let Some(n) = lower.strip_suffix('m') {
            (n, 60_000)
        } else if let Some(n) = lower.strip_suffix('h') {
            (n, 3_600_000)
        } else {
            // No suffix, assume milliseconds
            (lower.as_str(), 1)
        };

        let value = number_part.trim().parse::<u64>().map_err(|_| {
            BenchError::config(format!(
                "Invalid duration '{}': expected a number with an ms/s/m/h suffix",
                duration_str
            ))
        })?;

        value
            .checked_mul(unit_ms)
            .map(Duration::from_millis)
            .ok_or_else(|| BenchError::config(format!("Duration '{}' is too large", duration_str)))
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = BenchError;

    fn try_from(raw: RawConfig) -> Result<Self> {
        let security = match raw.security {
            SecurityArg::Psk => SecurityMode::Psk,
            SecurityArg::None => SecurityMode::NoSec,
        };

        let server_uri = raw
            .server_uri
            .unwrap_or_else(|| Defaults::server_uri(security).to_string());

        let lookup_workers = raw.lookup_workers.unwrap_or_else(Defaults::worker_count);

        Ok(Config {
            mode: match raw.mode {
                ModeArg::Clients => Mode::Clients,
                ModeArg::Server => Mode::Server,
            },
            client: ClientConfig {
                count: raw.clients,
                time_alive: RawConfig::parse_duration(&raw.time_alive)?,
                security,
                server_uri,
                lifetime: RawConfig::parse_duration(&raw.lifetime)?,
                response_timeout: RawConfig::parse_duration(&raw.response_timeout)?,
            },
            server: ServerConfig {
                lookup_latency: RawConfig::parse_duration(&raw.lookup_latency)?,
                lookup_workers,
                psk_prefix: raw.psk_prefix,
                network_delay: RawConfig::parse_duration(&raw.network_delay)?,
                network_jitter: RawConfig::parse_duration(&raw.network_jitter)?,
            },
            run: RunConfig {
                wait_timeout: RawConfig::parse_duration(&raw.wait_timeout)?,
                terminal: match raw.terminal_on {
                    TerminalArg::Registration => TerminalMode::Registration,
                    TerminalArg::Deregistration => TerminalMode::Deregistration,
                },
                settle: RawConfig::parse_duration(&raw.settle)?,
            },
            output: OutputConfig {
                verbose: raw.verbose,
                json: raw.json,
            },
        })
    }
}
