//! Domain-specific error types for the regbench harness
//!
//! Registration failures and timeouts are benchmark outcomes, not errors: they are
//! recorded as metrics. The types here cover everything that can actually abort a
//! command (bad configuration, engine misuse, I/O on the console).

use thiserror::Error;

/// Main error type for the regbench application
#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration-related errors (CLI parsing, validation, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client or server engine refused an operation
    #[error("Engine error: {0}")]
    Engine(String),

    /// Benchmark execution errors (teardown, console commands, etc.)
    #[error("Test execution error: {0}")]
    TestExecution(String),

    /// JSON serialization errors
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// Console and standard stream errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A spawned task panicked or was cancelled
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type using BenchError
pub type Result<T> = std::result::Result<T, BenchError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_config_context(self, msg: &str) -> Result<T>;
    fn with_engine_context(self, msg: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_config_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| BenchError::Config(format!("{}: {}", msg, e)))
    }

    fn with_engine_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| BenchError::Engine(format!("{}: {}", msg, e)))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn with_config_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| BenchError::Config(msg.to_string()))
    }

    fn with_engine_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| BenchError::Engine(msg.to_string()))
    }
}

// Convenience constructors
impl BenchError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        BenchError::Config(msg.into())
    }

    pub fn engine<S: Into<String>>(msg: S) -> Self {
        BenchError::Engine(msg.into())
    }

    pub fn execution<S: Into<String>>(msg: S) -> Self {
        BenchError::TestExecution(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_context_maps_to_config_error() {
        let missing: Option<u32> = None;
        let err = missing.with_config_context("no workers").unwrap_err();
        assert!(matches!(err, BenchError::Config(ref m) if m == "no workers"));
    }

    #[test]
    fn test_result_context_prefixes_message() {
        let failed: std::result::Result<(), &str> = Err("closed");
        let err = failed.with_engine_context("start client").unwrap_err();
        assert_eq!(err.to_string(), "Engine error: start client: closed");
    }
}
