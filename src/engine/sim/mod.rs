//! In-process simulated engine
//!
//! Clients and server exchange requests as direct async calls instead of
//! datagrams. [`SimNetwork`] adds the configured delay and jitter to every hop so the
//! orchestration core sees realistic asynchronous timing.

pub mod client;
pub mod server;

pub use client::SimClient;
pub use server::SimServer;

use crate::constants::DEVICE_OBJECT_ID;
use crate::engine::objects::ClientSettings;
use crate::engine::{ClientEngine, EngineClient};
use crate::errors::{BenchError, Result};

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Delay model for one request or response hop
#[derive(Debug, Clone, Copy, Default)]
pub struct SimNetwork {
    pub delay: Duration,
    pub jitter: Duration,
}

impl SimNetwork {
    pub fn new(delay: Duration, jitter: Duration) -> Self {
        Self { delay, jitter }
    }

    fn hop_delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            self.delay
        } else {
            self.delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        }
    }

    /// Wait for one hop
    pub async fn transit(&self) {
        let delay = self.hop_delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

/// Client engine whose clients register against a [`SimServer`]
pub struct SimEngine {
    server: Arc<SimServer>,
    response_timeout: Duration,
}

impl SimEngine {
    pub fn new(server: Arc<SimServer>, response_timeout: Duration) -> Self {
        Self {
            server,
            response_timeout,
        }
    }
}

impl ClientEngine for SimEngine {
    fn create(&self, settings: ClientSettings) -> Result<Arc<dyn EngineClient>> {
        if settings.object(DEVICE_OBJECT_ID).is_none() {
            return Err(BenchError::engine(format!(
                "client {} exposes no device object",
                settings.endpoint
            )));
        }

        Ok(Arc::new(SimClient::new(
            settings,
            Arc::clone(&self.server),
            self.response_timeout,
        )))
    }
}
