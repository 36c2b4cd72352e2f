//! Shared identity types and small utilities used across the codebase

use crate::constants::{PLAIN_ENDPOINT_PREFIX, SECURE_ENDPOINT_PREFIX};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Type-safe wrapper for client index to prevent confusion with other numeric types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct ClientId(pub u32);

impl ClientId {
    /// Get the underlying u32 value
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ClientId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique client identity presented during registration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Endpoint(pub String);

impl Endpoint {
    /// Deterministic endpoint name for the client at `id`
    pub fn for_client(id: ClientId, secure: bool) -> Self {
        let prefix = if secure {
            SECURE_ENDPOINT_PREFIX
        } else {
            PLAIN_ENDPOINT_PREFIX
        };
        Self(format!("{}{}", prefix, id))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_names_are_deterministic() {
        assert_eq!(
            Endpoint::for_client(ClientId(7), true).as_ref(),
            "sec-device-7"
        );
        assert_eq!(Endpoint::for_client(ClientId(7), false).as_ref(), "device-7");
    }
}
