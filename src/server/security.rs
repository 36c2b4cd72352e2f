//! Blocking security-store stub and the worker pool it runs on

use crate::constants::PSK_KEY;
use crate::engine::SecurityStore;
use crate::engine::model::SecurityInfo;
use crate::errors::{ErrorContext, Result};
use crate::server::counter::ServerCounters;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Security store simulating a slow backing database
///
/// Every lookup sleeps for `latency` on the calling thread, then knows exactly the
/// identities and endpoints starting with `prefix`. Unknown values are absent, not
/// errors. Only known identities count as PSK accesses.
#[derive(Debug)]
pub struct StubSecurityStore {
    latency: Duration,
    prefix: String,
    key: Vec<u8>,
    counters: Arc<ServerCounters>,
}

impl StubSecurityStore {
    pub fn new(
        latency: Duration,
        prefix: impl Into<String>,
        counters: Arc<ServerCounters>,
    ) -> Self {
        Self {
            latency,
            prefix: prefix.into(),
            key: PSK_KEY.to_vec(),
            counters,
        }
    }

    fn lookup(&self, value: &str) -> Option<SecurityInfo> {
        std::thread::sleep(self.latency);

        value
            .starts_with(&self.prefix)
            .then(|| SecurityInfo::pre_shared_key(value, value, &self.key))
    }
}

impl SecurityStore for StubSecurityStore {
    fn get_by_identity(&self, identity: &str) -> Option<SecurityInfo> {
        let info = self.lookup(identity);
        if info.is_some() {
            self.counters.record_security_lookup();
        }
        info
    }

    fn get_by_endpoint(&self, endpoint: &str) -> Option<SecurityInfo> {
        self.lookup(endpoint)
    }
}

/// Bounded pool for blocking lookups, kept off the event-dispatch threads
#[derive(Debug, Clone)]
pub struct SecurityWorkers {
    permits: Arc<Semaphore>,
}

impl SecurityWorkers {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Run `lookup` on a blocking thread once a worker slot is free
    pub async fn run<F, T>(&self, lookup: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .with_engine_context("security workers closed")?;

        let value = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            lookup()
        })
        .await?;
        Ok(value)
    }
}
