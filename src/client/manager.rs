//! Client manager driving one benchmark wave

use crate::barrier::{BarrierOutcome, CompletionBarrier};
use crate::client::orchestrator::{ClientHandle, Orchestrator};
use crate::client::scheduler::StopScheduler;
use crate::common::ClientId;
use crate::config::Config;
use crate::config::defaults::Defaults;
use crate::constants::*;
use crate::engine::ClientEngine;
use crate::errors::Result;
use crate::metrics::{MetricsAggregator, Outcome, RunReport};

use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Creates the whole client population, starts it and waits for every outcome
pub struct ClientManager {
    engine: Arc<dyn ClientEngine>,
    config: Config,
}

impl ClientManager {
    pub fn new(engine: Arc<dyn ClientEngine>, config: Config) -> Self {
        Self { engine, config }
    }

    /// Run one wave and return its report
    ///
    /// Every wave gets fresh metrics, a fresh barrier and a fresh scheduler. Clients
    /// still alive once the barrier released (or timed out) are destroyed without
    /// deregistering.
    pub async fn run_benchmark(&self) -> Result<RunReport> {
        let count = self.config.client.count;
        info!("Starting registration benchmark with {} clients", count);

        let metrics = Arc::new(MetricsAggregator::new());
        let barrier = Arc::new(CompletionBarrier::new(count as usize));
        let scheduler = StopScheduler::new(Defaults::worker_count());
        let orchestrator = Orchestrator::new(
            Arc::clone(&self.engine),
            self.config.client.clone(),
            self.config.run.terminal,
            Arc::clone(&metrics),
            Arc::clone(&barrier),
            scheduler.clone(),
        );

        let started_at = Utc::now();
        let started = Instant::now();

        let mut handles = match self.create_all(&orchestrator).await {
            Ok(handles) => handles,
            Err(e) => {
                scheduler.shutdown().await;
                return Err(e);
            }
        };
        for handle in handles.iter_mut() {
            orchestrator.start_client(handle);
        }
        info!("{} clients started", handles.len());

        let completion = self.wait_for_completion(&barrier).await;
        debug!("{} outcomes recorded", metrics.total());
        let report = RunReport::collect(
            &metrics,
            started_at,
            count,
            started.elapsed(),
            completion,
        );
        info!(
            "{} of {} clients registered successfully",
            report.count(Outcome::Success),
            count
        );

        join_all(handles.into_iter().map(ClientHandle::destroy)).await;
        debug!("Cancelling {} deferred stops", scheduler.pending());
        scheduler.shutdown().await;
        debug!("All clients destroyed");

        Ok(report)
    }

    /// Create clients one after another; on failure the ones already built are destroyed
    async fn create_all(&self, orchestrator: &Orchestrator) -> Result<Vec<ClientHandle>> {
        let mut handles = Vec::with_capacity(self.config.client.count as usize);
        for index in 0..self.config.client.count {
            match orchestrator.create_client(ClientId::from(index)) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    join_all(handles.into_iter().map(ClientHandle::destroy)).await;
                    return Err(e);
                }
            }
        }
        Ok(handles)
    }

    /// Wait on the barrier, logging progress while clients are pending
    async fn wait_for_completion(&self, barrier: &CompletionBarrier) -> BarrierOutcome {
        let mut progress = tokio::time::interval(PROGRESS_LOG_INTERVAL);
        progress.tick().await;

        tokio::select! {
            outcome = barrier.wait(self.config.run.wait_timeout) => {
                match outcome {
                    BarrierOutcome::Completed => info!("All clients reached a terminal outcome"),
                    BarrierOutcome::TimedOut => warn!(
                        "{} clients did not complete within {}ms",
                        barrier.remaining(),
                        self.config.run.wait_timeout.as_millis()
                    ),
                }
                outcome
            }
            _ = async {
                loop {
                    progress.tick().await;
                    info!("{} clients still pending", barrier.remaining());
                }
            } => {
                // Unreachable: the progress loop never ends
                BarrierOutcome::TimedOut
            }
        }
    }
}
