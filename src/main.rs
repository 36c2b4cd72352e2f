mod barrier;
mod client;
mod common;
mod config;
mod constants;
mod engine;
mod errors;
mod metrics;
mod server;

use client::ClientManager;
use config::{Config, Mode};
use errors::{BenchError, ErrorContext, Result};
use server::{ServerConsole, ServerStack};
use std::process;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Application failed: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    let config = Config::from_args()?;

    init_logging(&config)?;

    info!("regbench - device registration load tester");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if !config.output.json {
        config.print_summary();
    }

    match config.mode {
        Mode::Clients => run_clients(config).await,
        Mode::Server => {
            let console = ServerConsole::new(config);
            console.run(BufReader::new(tokio::io::stdin())).await
        }
    }
}

/// One benchmark wave against an in-process server, then the server-side tallies
async fn run_clients(config: Config) -> Result<()> {
    let stack = ServerStack::launch(&config.server);
    stack.start();

    let engine = Arc::new(stack.client_engine(config.client.response_timeout));
    let manager = ClientManager::new(engine, config.clone());

    let report = tokio::select! {
        report = manager.run_benchmark() => report,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            warn!("Received Ctrl+C, abandoning the benchmark");
            Err(BenchError::execution("interrupted"))
        }
    };

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            stack.shutdown().await;
            return Err(e);
        }
    };
    report.print(config.output.json)?;

    // Server-side events may still be landing
    tokio::time::sleep(config.run.settle).await;
    stack.summary().print(config.output.json)?;

    stack.shutdown().await;
    Ok(())
}

/// Initialize logging based on configuration
fn init_logging(config: &Config) -> Result<()> {
    let level = if config.output.verbose {
        "debug"
    } else {
        "info"
    };

    let directive = format!("regbench={}", level)
        .parse::<Directive>()
        .with_config_context("Invalid filter directive")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .with_config_context("Failed to set global subscriber")?;

    if config.output.verbose {
        info!("Verbose logging enabled");
    }
    Ok(())
}
