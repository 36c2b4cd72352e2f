//! Builds simulated clients and wires each one to its observer

use crate::barrier::CompletionBarrier;
use crate::client::observer::LifecycleObserver;
use crate::client::scheduler::StopScheduler;
use crate::common::{ClientId, Endpoint};
use crate::config::{ClientConfig, TerminalMode};
use crate::constants::*;
use crate::engine::objects::{
    AccessControlObject, ActuatedDevice, ClientSettings, DeviceObject, SecurityObject,
    ServerObject,
};
use crate::engine::{ClientEngine, EngineClient, EventSink, LifecycleEvent};
use crate::errors::Result;
use crate::metrics::MetricsAggregator;

use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::debug;

/// One created client and the tasks attached to it
pub struct ClientHandle {
    pub id: ClientId,
    client: Arc<dyn EngineClient>,
    observer: Option<JoinHandle<()>>,
}

impl ClientHandle {
    pub fn endpoint(&self) -> &Endpoint {
        self.client.endpoint()
    }

    /// Destroy without deregistering and drop the observer
    pub async fn destroy(self) {
        self.client.destroy(false).await;
        if let Some(observer) = self.observer {
            observer.abort();
        }
        debug!("Destroyed client {}", self.id);
    }
}

pub struct Orchestrator {
    engine: Arc<dyn ClientEngine>,
    config: ClientConfig,
    terminal: TerminalMode,
    metrics: Arc<MetricsAggregator>,
    barrier: Arc<CompletionBarrier>,
    scheduler: StopScheduler,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn ClientEngine>,
        config: ClientConfig,
        terminal: TerminalMode,
        metrics: Arc<MetricsAggregator>,
        barrier: Arc<CompletionBarrier>,
        scheduler: StopScheduler,
    ) -> Self {
        Self {
            engine,
            config,
            terminal,
            metrics,
            barrier,
            scheduler,
        }
    }

    /// Settings of client `id`; identical for the same id and configuration
    pub fn settings(&self, id: ClientId) -> ClientSettings {
        let secure = self.config.security.is_secure();
        let endpoint = Endpoint::for_client(id, secure);

        let security = if secure {
            SecurityObject::PreSharedKey {
                server_uri: self.config.server_uri.clone(),
                short_id: SERVER_SHORT_ID,
                identity: endpoint.as_bytes().to_vec(),
                key: PSK_KEY.to_vec(),
            }
        } else {
            SecurityObject::NoSec {
                server_uri: self.config.server_uri.clone(),
                short_id: SERVER_SHORT_ID,
            }
        };

        let server = ServerObject {
            short_id: SERVER_SHORT_ID,
            lifetime: self.config.lifetime,
            binding: "U".to_string(),
            notify_when_disabled: false,
        };

        let device = ActuatedDevice {
            device: DeviceObject {
                manufacturer: "regbench".to_string(),
                model_number: "simulated".to_string(),
                serial_number: format!("{:08}", id.get()),
                binding: "U".to_string(),
            },
            actuated_resource: DEVICE_REBOOT_RESOURCE_ID,
        };

        ClientSettings {
            endpoint,
            objects: vec![
                Arc::new(security.clone()),
                Arc::new(server.clone()),
                Arc::new(AccessControlObject),
                Arc::new(device),
            ],
            security,
            server,
        }
    }

    pub fn create_client(&self, id: ClientId) -> Result<ClientHandle> {
        let settings = self.settings(id);
        let objects = settings.object_links();
        let client = self.engine.create(settings)?;
        debug!(
            "Created client {} ({}) exposing objects {:?}",
            id,
            client.endpoint(),
            objects
        );
        Ok(ClientHandle {
            id,
            client,
            observer: None,
        })
    }

    /// Attach an observer and start the client without waiting for the outcome
    pub fn start_client(&self, handle: &mut ClientHandle) {
        let started_at = Instant::now();
        let (sink, events) = EventSink::channel();
        handle.client.attach_observer(sink.clone());

        let observer = LifecycleObserver {
            endpoint: handle.endpoint().clone(),
            started_at,
            metrics: Arc::clone(&self.metrics),
            completion: Some(self.barrier.token()),
            scheduler: self.scheduler.clone(),
            client: Arc::clone(&handle.client),
            time_alive: self.config.time_alive,
            terminal: self.terminal,
            outcome: None,
        };
        handle.observer = Some(tokio::spawn(observer.run(events)));

        let client = Arc::clone(&handle.client);
        tokio::spawn(async move {
            if let Err(e) = client.start().await {
                sink.emit(LifecycleEvent::InternalError {
                    message: e.to_string(),
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Mode, SecurityMode};
    use crate::engine::model::ExecuteResponse;
    use crate::errors::BenchError;

    /// Engine that records nothing and refuses every client
    struct RefusingEngine;

    impl ClientEngine for RefusingEngine {
        fn create(&self, settings: ClientSettings) -> Result<Arc<dyn EngineClient>> {
            Err(BenchError::engine(format!("cannot build {}", settings.endpoint)))
        }
    }

    fn orchestrator(security: SecurityMode) -> Orchestrator {
        let mut config = Config::default_benchmark(Mode::Clients).client;
        config.security = security;
        Orchestrator::new(
            Arc::new(RefusingEngine),
            config,
            TerminalMode::Deregistration,
            Arc::new(MetricsAggregator::new()),
            Arc::new(CompletionBarrier::new(1)),
            StopScheduler::new(1),
        )
    }

    #[test]
    fn test_psk_settings() {
        let settings = orchestrator(SecurityMode::Psk).settings(ClientId::from(7));
        assert_eq!(settings.endpoint.as_ref(), "sec-device-7");
        match &settings.security {
            SecurityObject::PreSharedKey {
                identity,
                key,
                short_id,
                ..
            } => {
                assert_eq!(identity.as_slice(), b"sec-device-7");
                assert_eq!(key.as_slice(), PSK_KEY);
                assert_eq!(*short_id, SERVER_SHORT_ID);
            }
            other => panic!("expected PSK security, got {:?}", other),
        }
        assert_eq!(settings.server.binding, "U");
        assert_eq!(
            settings.object_links(),
            vec![
                SECURITY_OBJECT_ID,
                SERVER_OBJECT_ID,
                ACCESS_CONTROL_OBJECT_ID,
                DEVICE_OBJECT_ID
            ]
        );
    }

    #[test]
    fn test_nosec_settings_and_device_actuation() {
        let settings = orchestrator(SecurityMode::NoSec).settings(ClientId::from(3));
        assert_eq!(settings.endpoint.as_ref(), "device-3");
        assert!(matches!(settings.security, SecurityObject::NoSec { .. }));

        let device = settings.object(DEVICE_OBJECT_ID).unwrap();
        assert_eq!(
            device.execute(DEVICE_REBOOT_RESOURCE_ID, ""),
            ExecuteResponse::Success
        );
        assert_ne!(
            device.execute(DEVICE_REBOOT_RESOURCE_ID + 1, ""),
            ExecuteResponse::Success
        );
    }

    #[test]
    fn test_settings_are_deterministic() {
        let orchestrator = orchestrator(SecurityMode::Psk);
        let first = orchestrator.settings(ClientId::from(42));
        let second = orchestrator.settings(ClientId::from(42));
        assert_eq!(first.endpoint, second.endpoint);
        assert_eq!(first.security, second.security);
        assert_eq!(first.object_links(), second.object_links());
    }

    #[test]
    fn test_create_propagates_engine_error() {
        let result = orchestrator(SecurityMode::Psk).create_client(ClientId::from(0));
        assert!(matches!(result, Err(BenchError::Engine(_))));
    }
}
