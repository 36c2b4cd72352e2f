//! Run report and output formatting

use crate::barrier::BarrierOutcome;
use crate::errors::Result;
use crate::metrics::aggregate::MetricsAggregator;
use crate::metrics::outcome::{Outcome, Summary};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

const BANNER: &str = "********************************************";

/// Final result of one benchmark wave
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub clients: u32,
    pub elapsed_ms: u64,
    pub completion: BarrierOutcome,
    pub summaries: Vec<Summary>,
}

impl RunReport {
    /// Snapshot the aggregator into a report
    pub fn collect(
        metrics: &MetricsAggregator,
        started_at: DateTime<Utc>,
        clients: u32,
        elapsed: Duration,
        completion: BarrierOutcome,
    ) -> Self {
        Self {
            started_at,
            clients,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            completion,
            summaries: metrics.summarize_all(),
        }
    }

    pub fn summary(&self, outcome: Outcome) -> Option<&Summary> {
        self.summaries.iter().find(|s| s.outcome == outcome)
    }

    /// Number of clients recorded under `outcome`
    pub fn count(&self, outcome: Outcome) -> u64 {
        self.summary(outcome).map_or(0, |s| s.count)
    }

    /// Plain-text report lines
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.summaries.len() + 3);
        lines.push(BANNER.to_string());
        lines.push(match self.completion {
            BarrierOutcome::Completed => "Terminated !".to_string(),
            BarrierOutcome::TimedOut => "Timeout ...".to_string(),
        });
        lines.extend(self.summaries.iter().map(Summary::to_string));
        lines.push(BANNER.to_string());
        lines
    }

    /// Print the report to stdout, as text or JSON
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
