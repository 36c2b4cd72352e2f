//! Configuration validation logic

use super::{Config, SecurityMode};
use crate::constants::MAX_CLIENTS_LIMIT;
use crate::errors::{BenchError, ErrorContext, Result};
use std::time::Duration;
use url::Url;

/// Validate the configuration
pub fn validate(config: &Config) -> Result<()> {
    validate_server_uri(config)?;
    validate_client_config(config)?;
    validate_server_config(config)?;
    validate_run_config(config)?;
    Ok(())
}

/// Validate the server URI against the security mode
fn validate_server_uri(config: &Config) -> Result<()> {
    let url = Url::parse(&config.client.server_uri)
        .with_config_context(&format!("Invalid server URI '{}'", config.client.server_uri))?;

    match (config.client.security, url.scheme()) {
        (SecurityMode::Psk, "coaps") | (SecurityMode::NoSec, "coap") => Ok(()),
        (SecurityMode::Psk, scheme) => Err(BenchError::config(format!(
            "Invalid URI scheme '{}' for PSK security. Only 'coaps' is supported",
            scheme
        ))),
        (SecurityMode::NoSec, scheme) => Err(BenchError::config(format!(
            "Invalid URI scheme '{}' without security. Only 'coap' is supported",
            scheme
        ))),
    }
}

/// Validate client configuration
fn validate_client_config(config: &Config) -> Result<()> {
    if config.client.count == 0 {
        return Err(BenchError::config(
            "Number of clients must be greater than 0",
        ));
    }

    if config.client.count > MAX_CLIENTS_LIMIT {
        return Err(BenchError::config(format!(
            "Number of clients cannot exceed {}",
            MAX_CLIENTS_LIMIT
        )));
    }

    if config.client.response_timeout.is_zero() {
        return Err(BenchError::config("Response timeout must be greater than 0"));
    }

    if config.client.lifetime < Duration::from_secs(1) {
        return Err(BenchError::config(
            "Registration lifetime must be at least 1s",
        ));
    }

    Ok(())
}

/// Validate simulated server configuration
fn validate_server_config(config: &Config) -> Result<()> {
    if config.server.lookup_workers == 0 {
        return Err(BenchError::config(
            "Security lookup workers must be greater than 0",
        ));
    }

    if config.server.psk_prefix.is_empty() {
        return Err(BenchError::config("PSK prefix cannot be empty"));
    }

    Ok(())
}

/// Validate run boundaries
fn validate_run_config(config: &Config) -> Result<()> {
    if config.run.wait_timeout.is_zero() {
        return Err(BenchError::config("Wait timeout must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    fn create_test_config() -> Config {
        Config::default_benchmark(Mode::Clients)
    }

    #[test]
    fn test_validate_valid_config() {
        let config = create_test_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_invalid_uri() {
        let mut config = create_test_config();
        config.client.server_uri = "not a uri".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_scheme_must_match_security() {
        let mut config = create_test_config();
        config.client.server_uri = "coap://localhost:5683".to_string();
        assert!(validate(&config).is_err());

        config.client.security = SecurityMode::NoSec;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_clients() {
        let mut config = create_test_config();
        config.client.count = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_too_many_clients() {
        let mut config = create_test_config();
        config.client.count = MAX_CLIENTS_LIMIT + 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_zero_wait_timeout() {
        let mut config = create_test_config();
        config.run.wait_timeout = Duration::ZERO;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_zero_lookup_workers() {
        let mut config = create_test_config();
        config.server.lookup_workers = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_empty_psk_prefix() {
        let mut config = create_test_config();
        config.server.psk_prefix.clear();
        assert!(validate(&config).is_err());
    }
}
