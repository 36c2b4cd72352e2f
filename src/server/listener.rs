//! Registry listener feeding the server counters

use crate::constants::DEVICE_OBJECT_ID;
use crate::engine::model::ReadRequest;
use crate::engine::{RegistryEvent, ServerEngine};
use crate::server::counter::ServerCounters;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Tallies registry changes and pokes every new registration with a read
pub struct RegistrationCounter {
    server: Arc<dyn ServerEngine>,
    counters: Arc<ServerCounters>,
}

impl RegistrationCounter {
    pub fn new(server: Arc<dyn ServerEngine>, counters: Arc<ServerCounters>) -> Self {
        Self { server, counters }
    }

    /// Subscribe to the registry and count until the server drops the subscription
    pub fn spawn(self) -> JoinHandle<()> {
        let mut events = self.server.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(event);
            }
            debug!("Registry subscription closed");
        })
    }

    pub fn handle(&self, event: RegistryEvent) {
        match event {
            RegistryEvent::Registered {
                registration,
                previous,
            } => {
                self.counters.record_registration();
                if let Some(previous) = previous {
                    debug!("{} replaced registration {}", registration.endpoint, previous.id);
                }

                // Best effort: the response only exercises the request path
                let server = Arc::clone(&self.server);
                tokio::spawn(async move {
                    let _ = server
                        .send(&registration, ReadRequest::new(DEVICE_OBJECT_ID))
                        .await;
                });
            }
            RegistryEvent::Updated {
                update,
                registration,
                ..
            } => {
                self.counters.record_update();
                if let Some(lifetime) = update.lifetime {
                    debug!("{} lifetime now {}s", registration.endpoint, lifetime.as_secs());
                }
            }
            RegistryEvent::Unregistered {
                registration,
                expired,
            } => {
                self.counters.record_deregistration();
                if expired {
                    debug!("Registration of {} expired", registration.endpoint);
                }
            }
        }
    }
}
