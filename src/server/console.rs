//! Line-oriented console driving the server stack
//!
//! ```text
//! Idle --start--> Counting --stop--> Stopped --start--> Counting
//! ```
//! `bench` runs one client wave against the running server and `actuate` executes the
//! reboot resource on every registered device. Both are only accepted while counting.

use crate::client::ClientManager;
use crate::config::Config;
use crate::constants::{DEVICE_OBJECT_ID, DEVICE_REBOOT_RESOURCE_ID};
use crate::engine::ServerEngine;
use crate::engine::model::{ExecuteRequest, ExecuteResponse};
use crate::errors::{BenchError, Result};
use crate::server::ServerStack;

use futures_util::future::join_all;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    Idle,
    Counting,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Bench,
    Actuate,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ConsoleCommand::Start),
            "stop" => Ok(ConsoleCommand::Stop),
            "bench" => Ok(ConsoleCommand::Bench),
            "actuate" => Ok(ConsoleCommand::Actuate),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(BenchError::execution(format!(
                "unknown command '{}' (expected start, stop, bench, actuate or quit)",
                other
            ))),
        }
    }
}

pub struct ServerConsole {
    state: ConsoleState,
    config: Config,
    stack: ServerStack,
}

impl ServerConsole {
    pub fn new(config: Config) -> Self {
        let stack = ServerStack::launch(&config.server);
        Self {
            state: ConsoleState::Idle,
            config,
            stack,
        }
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Apply one command and return the lines to print
    pub async fn handle(&mut self, command: ConsoleCommand) -> Result<Vec<String>> {
        match (command, self.state) {
            (ConsoleCommand::Start, ConsoleState::Counting) => {
                self.stack.counters().reset();
                info!("Counters reset");
                Ok(Vec::new())
            }
            (ConsoleCommand::Start, _) => {
                self.stack.start();
                self.state = ConsoleState::Counting;
                Ok(vec!["Server started, counting registrations".to_string()])
            }
            (ConsoleCommand::Stop, ConsoleState::Counting) => Ok(self.stop().await),
            (ConsoleCommand::Stop, state) => Err(BenchError::execution(format!(
                "cannot stop a server in state {:?}",
                state
            ))),
            (ConsoleCommand::Bench, ConsoleState::Counting) => self.bench().await,
            (ConsoleCommand::Bench, state) => Err(BenchError::execution(format!(
                "bench needs a started server, current state is {:?}",
                state
            ))),
            (ConsoleCommand::Actuate, ConsoleState::Counting) => Ok(self.actuate().await),
            (ConsoleCommand::Actuate, state) => Err(BenchError::execution(format!(
                "actuate needs a started server, current state is {:?}",
                state
            ))),
            (ConsoleCommand::Quit, _) => Ok(Vec::new()),
        }
    }

    async fn stop(&mut self) -> Vec<String> {
        let mut lines = self.stack.counters().snapshot().lines();
        self.stack.counters().disable();

        // Let in-flight registry events land before counting what is left
        sleep(self.config.run.settle).await;
        lines.push(format!("Registration Remaining: {}", self.stack.remaining()));

        self.stack.server().destroy().await;
        self.state = ConsoleState::Stopped;
        lines
    }

    async fn bench(&self) -> Result<Vec<String>> {
        let engine = Arc::new(self.stack.client_engine(self.config.client.response_timeout));
        let report = ClientManager::new(engine, self.config.clone())
            .run_benchmark()
            .await?;

        if self.config.output.json {
            Ok(vec![serde_json::to_string_pretty(&report)?])
        } else {
            Ok(report.lines())
        }
    }

    async fn actuate(&self) -> Vec<String> {
        let server = self.stack.server();
        let registrations = server.registrations();
        let responses = join_all(registrations.iter().map(|registration| {
            server.execute(
                registration,
                ExecuteRequest::new(DEVICE_OBJECT_ID, DEVICE_REBOOT_RESOURCE_ID),
            )
        }))
        .await;

        let actuated = responses
            .iter()
            .filter(|r| matches!(r, Ok(ExecuteResponse::Success)))
            .count();
        vec![format!(
            "Actuated {} of {} registered devices",
            actuated,
            registrations.len()
        )]
    }

    /// Start counting, then serve commands from `input` until quit or end of input
    pub async fn run<R>(mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        print_lines(self.handle(ConsoleCommand::Start).await?);

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let command = match line.parse::<ConsoleCommand>() {
                Ok(ConsoleCommand::Quit) => break,
                Ok(command) => command,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };

            match self.handle(command).await {
                Ok(output) => print_lines(output),
                Err(e) => error!("Command {:?} failed: {}", command, e),
            }
        }

        info!("Console closed in state {:?}", self.state());
        self.stack.shutdown().await;
        Ok(())
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}
