//! Outcome classification and per-outcome summaries

use serde::Serialize;
use std::fmt;

/// Classification of one client's registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
    InternalError,
}

impl Outcome {
    /// Every outcome, in report order
    pub const ALL: [Outcome; 4] = [
        Outcome::Success,
        Outcome::Failure,
        Outcome::Timeout,
        Outcome::InternalError,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Outcome::Success => 0,
            Outcome::Failure => 1,
            Outcome::Timeout => 2,
            Outcome::InternalError => 3,
        }
    }

    /// Label used in report lines
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
            Outcome::InternalError => "internal",
        }
    }
}

/// Latency reduction over the samples of one outcome, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencyStats {
    pub max_ms: u64,
    pub min_ms: u64,
    pub avg_ms: u64,
}

impl LatencyStats {
    /// Reduce a sample list; `None` when empty. The average truncates.
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        let max_ms = *samples.iter().max()?;
        let min_ms = *samples.iter().min()?;
        let sum: u128 = samples.iter().map(|&s| u128::from(s)).sum();
        let avg_ms = u64::try_from(sum / samples.len() as u128).unwrap_or(u64::MAX);

        Some(Self {
            max_ms,
            min_ms,
            avg_ms,
        })
    }
}

/// Count and latency of one outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub outcome: Outcome,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyStats>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nb {} : {}", self.outcome.label(), self.count)?;
        if let Some(latency) = self.latency {
            write!(
                f,
                " (max {}ms, min {}ms, avg {}ms)",
                latency.max_ms, latency.min_ms, latency.avg_ms
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_stats_truncating_average() {
        let stats = LatencyStats::from_samples(&[3, 4, 4]).unwrap();
        assert_eq!(stats.max_ms, 4);
        assert_eq!(stats.min_ms, 3);
        assert_eq!(stats.avg_ms, 3);
    }

    #[test]
    fn test_latency_stats_empty() {
        assert_eq!(LatencyStats::from_samples(&[]), None);
    }

    #[test]
    fn test_summary_lines() {
        let with_samples = Summary {
            outcome: Outcome::Success,
            count: 10,
            latency: LatencyStats::from_samples(&[12, 3, 6]),
        };
        assert_eq!(
            with_samples.to_string(),
            "nb success : 10 (max 12ms, min 3ms, avg 7ms)"
        );

        let empty = Summary {
            outcome: Outcome::Timeout,
            count: 0,
            latency: None,
        };
        assert_eq!(empty.to_string(), "nb timeout : 0");
    }
}
