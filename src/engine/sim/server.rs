//! Simulated registration server
//!
//! Holds the registration registry, authenticates registering clients through a
//! [`SecurityStore`] on the blocking lookup pool, fans registry changes out to
//! subscribers and expires registrations whose lifetime elapsed. A stopped server
//! never answers: requests wait until the client's own timeout fires.

use crate::common::{Endpoint, lock};
use crate::constants::EXPIRY_CHECK_INTERVAL;
use crate::engine::model::{
    ExecuteRequest, ExecuteResponse, ReadRequest, ReadResponse, Registration, RegistrationId,
    RegistrationUpdate, ResponseCode,
};
use crate::engine::objects::ObjectEnabler;
use crate::engine::sim::SimNetwork;
use crate::engine::{RegistryEvent, SecurityStore, ServerEngine};
use crate::errors::{BenchError, Result};
use crate::server::security::SecurityWorkers;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tracing::{debug, info};

/// Credentials presented by a registering client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    PreSharedKey { identity: Vec<u8>, key: Vec<u8> },
    None,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub endpoint: Endpoint,
    pub lifetime: Duration,
    pub binding: String,
    pub objects: Vec<Arc<dyn ObjectEnabler>>,
    pub credentials: Credentials,
}

/// Negative response to a client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: ResponseCode,
    pub message: String,
}

impl Rejection {
    fn new(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

struct Entry {
    registration: Registration,
    objects: Vec<Arc<dyn ObjectEnabler>>,
    expires_at: Instant,
}

#[derive(Default)]
struct Registry {
    running: bool,
    entries: HashMap<RegistrationId, Entry>,
    by_endpoint: HashMap<Endpoint, RegistrationId>,
}

pub struct SimServer {
    this: Weak<SimServer>,
    registry: Mutex<Registry>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<RegistryEvent>>>,
    store: Arc<dyn SecurityStore>,
    workers: SecurityWorkers,
    network: SimNetwork,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

impl SimServer {
    pub fn new(
        store: Arc<dyn SecurityStore>,
        workers: SecurityWorkers,
        network: SimNetwork,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            registry: Mutex::new(Registry::default()),
            listeners: Mutex::new(Vec::new()),
            store,
            workers,
            network,
            expiry: Mutex::new(None),
        })
    }

    pub fn is_running(&self) -> bool {
        lock(&self.registry).running
    }

    async fn unanswered_if_stopped(&self) {
        if !self.is_running() {
            std::future::pending::<()>().await;
        }
    }

    fn notify(&self, event: RegistryEvent) {
        lock(&self.listeners).retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Handle a registration request
    pub async fn register(
        &self,
        request: RegisterRequest,
    ) -> std::result::Result<RegistrationId, Rejection> {
        self.network.transit().await;
        self.unanswered_if_stopped().await;

        let result = self.accept_registration(request).await;

        self.network.transit().await;
        result
    }

    async fn accept_registration(
        &self,
        request: RegisterRequest,
    ) -> std::result::Result<RegistrationId, Rejection> {
        self.authenticate(&request).await?;

        let registration = Registration {
            id: RegistrationId::generate(),
            endpoint: request.endpoint.clone(),
            lifetime: request.lifetime,
            binding: request.binding,
            object_links: request.objects.iter().map(|o| o.id()).collect(),
            secure: matches!(request.credentials, Credentials::PreSharedKey { .. }),
            registered_at: Utc::now(),
        };

        let previous = {
            let mut guard = lock(&self.registry);
            let registry = &mut *guard;
            if !registry.running {
                return Err(Rejection::new(
                    ResponseCode::ServiceUnavailable,
                    "server stopped during registration",
                ));
            }

            let previous = registry
                .by_endpoint
                .insert(request.endpoint, registration.id.clone())
                .and_then(|old| registry.entries.remove(&old))
                .map(|entry| entry.registration);

            registry.entries.insert(
                registration.id.clone(),
                Entry {
                    registration: registration.clone(),
                    objects: request.objects,
                    expires_at: Instant::now() + request.lifetime,
                },
            );
            previous
        };

        debug!(
            "Registered {} as {} at {} (lifetime {}s, binding {}, secure {}, objects {:?})",
            registration.endpoint,
            registration.id,
            registration.registered_at,
            registration.lifetime.as_secs(),
            registration.binding,
            registration.secure,
            registration.object_links
        );
        let id = registration.id.clone();
        self.notify(RegistryEvent::Registered {
            registration,
            previous,
        });
        Ok(id)
    }

    async fn authenticate(&self, request: &RegisterRequest) -> std::result::Result<(), Rejection> {
        let store = Arc::clone(&self.store);

        match &request.credentials {
            Credentials::PreSharedKey { identity, key } => {
                let identity = String::from_utf8_lossy(identity).into_owned();
                let lookup_identity = identity.clone();
                let info = self
                    .workers
                    .run(move || store.get_by_identity(&lookup_identity))
                    .await
                    .map_err(|e| Rejection::new(ResponseCode::InternalServerError, e.to_string()))?;

                match info {
                    None => Err(Rejection::new(
                        ResponseCode::Forbidden,
                        format!("unknown PSK identity '{}'", identity),
                    )),
                    Some(info) if info.key != *key => Err(Rejection::new(
                        ResponseCode::Forbidden,
                        format!("invalid key for PSK identity '{}'", identity),
                    )),
                    Some(info) if info.endpoint != request.endpoint.as_ref() => {
                        Err(Rejection::new(
                            ResponseCode::Forbidden,
                            format!(
                                "PSK identity '{}' is not allowed for endpoint {}",
                                identity, request.endpoint
                            ),
                        ))
                    }
                    Some(_) => Ok(()),
                }
            }
            Credentials::None => {
                let endpoint = request.endpoint.as_ref().to_string();
                let info = self
                    .workers
                    .run(move || store.get_by_endpoint(&endpoint))
                    .await
                    .map_err(|e| Rejection::new(ResponseCode::InternalServerError, e.to_string()))?;

                match info {
                    Some(_) => Err(Rejection::new(
                        ResponseCode::Forbidden,
                        format!("endpoint {} requires a secure connection", request.endpoint),
                    )),
                    None => Ok(()),
                }
            }
        }
    }

    /// Handle a registration update, refreshing the expiry deadline
    pub async fn update(
        &self,
        id: &RegistrationId,
        lifetime: Option<Duration>,
    ) -> std::result::Result<(), Rejection> {
        self.network.transit().await;
        self.unanswered_if_stopped().await;

        let event = {
            let mut registry = lock(&self.registry);
            registry.entries.get_mut(id).map(|entry| {
                let previous = entry.registration.clone();
                if let Some(lifetime) = lifetime {
                    entry.registration.lifetime = lifetime;
                }
                entry.expires_at = Instant::now() + entry.registration.lifetime;
                RegistryEvent::Updated {
                    update: RegistrationUpdate {
                        registration_id: id.clone(),
                        lifetime,
                    },
                    registration: entry.registration.clone(),
                    previous,
                }
            })
        };

        let result = match event {
            Some(event) => {
                self.notify(event);
                Ok(())
            }
            None => Err(Rejection::new(
                ResponseCode::NotFound,
                format!("no registration {}", id),
            )),
        };

        self.network.transit().await;
        result
    }

    /// Handle a deregistration request
    pub async fn deregister(&self, id: &RegistrationId) -> std::result::Result<(), Rejection> {
        self.network.transit().await;
        self.unanswered_if_stopped().await;

        let removed = {
            let mut guard = lock(&self.registry);
            let registry = &mut *guard;
            let removed = registry.entries.remove(id);
            if let Some(entry) = &removed
                && registry.by_endpoint.get(&entry.registration.endpoint) == Some(id)
            {
                registry.by_endpoint.remove(&entry.registration.endpoint);
            }
            removed
        };

        let result = match removed {
            Some(entry) => {
                self.notify(RegistryEvent::Unregistered {
                    registration: entry.registration,
                    expired: false,
                });
                Ok(())
            }
            None => Err(Rejection::new(
                ResponseCode::NotFound,
                format!("no registration {}", id),
            )),
        };

        self.network.transit().await;
        result
    }

    /// Objects of a registered client, once a request reached it
    async fn client_objects(
        &self,
        registration: &Registration,
    ) -> Result<Vec<Arc<dyn ObjectEnabler>>> {
        if !self.is_running() {
            return Err(BenchError::engine("server is not running"));
        }
        self.network.transit().await;

        lock(&self.registry)
            .entries
            .get(&registration.id)
            .map(|entry| entry.objects.clone())
            .ok_or_else(|| BenchError::engine(format!("no registration {}", registration.id)))
    }

    /// Drop every registration whose lifetime elapsed; returns how many expired
    pub fn expire_stale(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<Entry> = {
            let mut guard = lock(&self.registry);
            let registry = &mut *guard;
            let ids: Vec<RegistrationId> = registry
                .entries
                .iter()
                .filter(|(_, entry)| entry.expires_at <= now)
                .map(|(id, _)| id.clone())
                .collect();

            ids.iter()
                .filter_map(|id| registry.entries.remove(id))
                .inspect(|entry| {
                    registry.by_endpoint.remove(&entry.registration.endpoint);
                })
                .collect()
        };

        let count = expired.len();
        for entry in expired {
            self.notify(RegistryEvent::Unregistered {
                registration: entry.registration,
                expired: true,
            });
        }
        count
    }
}

#[async_trait]
impl ServerEngine for SimServer {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<RegistryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.listeners).push(tx);
        rx
    }

    async fn send(
        &self,
        registration: &Registration,
        request: ReadRequest,
    ) -> Result<ReadResponse> {
        let objects = self.client_objects(registration).await?;
        let response = objects
            .iter()
            .find(|o| o.id() == request.object_id)
            .map_or_else(|| ReadResponse::error(ResponseCode::NotFound), |o| o.read());

        self.network.transit().await;
        Ok(response)
    }

    async fn execute(
        &self,
        registration: &Registration,
        request: ExecuteRequest,
    ) -> Result<ExecuteResponse> {
        let objects = self.client_objects(registration).await?;
        let response = objects
            .iter()
            .find(|o| o.id() == request.object_id)
            .map_or(ExecuteResponse::Error(ResponseCode::NotFound), |o| {
                o.execute(request.resource_id, &request.params)
            });

        self.network.transit().await;
        Ok(response)
    }

    fn registrations(&self) -> Vec<Registration> {
        lock(&self.registry)
            .entries
            .values()
            .map(|entry| entry.registration.clone())
            .collect()
    }

    fn start(&self) {
        lock(&self.registry).running = true;

        let mut expiry = lock(&self.expiry);
        if expiry.is_none() {
            let this = self.this.clone();
            *expiry = Some(tokio::spawn(async move {
                let mut ticker = interval(EXPIRY_CHECK_INTERVAL);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let Some(server) = this.upgrade() else {
                        break;
                    };
                    let expired = server.expire_stale();
                    if expired > 0 {
                        debug!("Expired {} registrations", expired);
                    }
                }
            }));
        }
        info!("Server started");
    }

    async fn destroy(&self) {
        {
            let mut registry = lock(&self.registry);
            registry.running = false;
            registry.entries.clear();
            registry.by_endpoint.clear();
        }
        if let Some(task) = lock(&self.expiry).take() {
            task.abort();
        }
        info!("Server destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::SecurityInfo;
    use crate::constants::{DEVICE_OBJECT_ID, DEVICE_REBOOT_RESOURCE_ID};
    use crate::engine::objects::{AccessControlObject, ActuatedDevice, DeviceObject};

    /// Accepts every `sec` identity, instantly
    struct AcceptingStore;

    impl SecurityStore for AcceptingStore {
        fn get_by_identity(&self, identity: &str) -> Option<SecurityInfo> {
            identity
                .starts_with("sec")
                .then(|| SecurityInfo::pre_shared_key(identity, identity, b"key"))
        }

        fn get_by_endpoint(&self, endpoint: &str) -> Option<SecurityInfo> {
            self.get_by_identity(endpoint)
        }
    }

    fn server() -> Arc<SimServer> {
        SimServer::new(
            Arc::new(AcceptingStore),
            SecurityWorkers::new(2),
            SimNetwork::default(),
        )
    }

    fn psk_request(endpoint: &str, key: &[u8], lifetime: Duration) -> RegisterRequest {
        RegisterRequest {
            endpoint: Endpoint::from(endpoint),
            lifetime,
            binding: "U".to_string(),
            objects: vec![Arc::new(AccessControlObject)],
            credentials: Credentials::PreSharedKey {
                identity: endpoint.as_bytes().to_vec(),
                key: key.to_vec(),
            },
        }
    }

    #[tokio::test]
    async fn test_register_update_deregister_events() {
        let server = server();
        let mut events = server.subscribe();
        server.start();

        let id = server
            .register(psk_request("sec-device-1", b"key", Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(matches!(
            events.recv().await,
            Some(RegistryEvent::Registered { previous: None, .. })
        ));

        server.update(&id, None).await.unwrap();
        assert!(matches!(
            events.recv().await,
            Some(RegistryEvent::Updated { .. })
        ));

        server.deregister(&id).await.unwrap();
        assert!(matches!(
            events.recv().await,
            Some(RegistryEvent::Unregistered { expired: false, .. })
        ));
        assert!(server.registrations().is_empty());

        let again = server.deregister(&id).await.unwrap_err();
        assert_eq!(again.code, ResponseCode::NotFound);
    }

    #[tokio::test]
    async fn test_rejects_unknown_identity_and_wrong_key() {
        let server = server();
        server.start();

        let unknown = server
            .register(psk_request("device-1", b"key", Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert_eq!(unknown.code, ResponseCode::Forbidden);

        let wrong_key = server
            .register(psk_request("sec-device-1", b"nope", Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert_eq!(wrong_key.code, ResponseCode::Forbidden);
    }

    #[tokio::test]
    async fn test_unsecured_endpoint_with_credentials_is_rejected() {
        let server = server();
        server.start();

        let mut request = psk_request("sec-device-2", b"key", Duration::from_secs(60));
        request.credentials = Credentials::None;
        assert!(server.register(request).await.is_err());

        let mut request = psk_request("device-2", b"key", Duration::from_secs(60));
        request.credentials = Credentials::None;
        assert!(server.register(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_reregistration_replaces_previous() {
        let server = server();
        let mut events = server.subscribe();
        server.start();

        server
            .register(psk_request("sec-device-3", b"key", Duration::from_secs(60)))
            .await
            .unwrap();
        server
            .register(psk_request("sec-device-3", b"key", Duration::from_secs(60)))
            .await
            .unwrap();

        events.recv().await;
        assert!(matches!(
            events.recv().await,
            Some(RegistryEvent::Registered {
                previous: Some(_),
                ..
            })
        ));
        assert_eq!(server.registrations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_registrations_are_removed() {
        let server = server();
        let mut events = server.subscribe();
        server.start();

        server
            .register(psk_request("sec-device-4", b"key", Duration::from_secs(1)))
            .await
            .unwrap();
        events.recv().await;

        tokio::time::advance(Duration::from_secs(2)).await;
        // The background sweep may already have removed it
        server.expire_stale();
        assert!(server.registrations().is_empty());
        assert!(matches!(
            events.recv().await,
            Some(RegistryEvent::Unregistered { expired: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_read_reaches_client_objects() {
        let server = server();
        server.start();

        let id = server
            .register(psk_request("sec-device-5", b"key", Duration::from_secs(60)))
            .await
            .unwrap();
        let registration = server
            .registrations()
            .into_iter()
            .find(|r| r.id == id)
            .unwrap();

        let present = server.send(&registration, ReadRequest::new(2)).await.unwrap();
        assert_eq!(present.code, ResponseCode::Content);

        let missing = server.send(&registration, ReadRequest::new(3)).await.unwrap();
        assert_eq!(missing.code, ResponseCode::NotFound);
    }

    #[tokio::test]
    async fn test_execute_reaches_device_object() {
        let server = server();
        server.start();

        let mut request = psk_request("sec-device-7", b"key", Duration::from_secs(60));
        request.objects.push(Arc::new(ActuatedDevice {
            device: DeviceObject {
                manufacturer: "Acme".to_string(),
                model_number: "M-1".to_string(),
                serial_number: "7".to_string(),
                binding: "U".to_string(),
            },
            actuated_resource: DEVICE_REBOOT_RESOURCE_ID,
        }));
        server.register(request).await.unwrap();
        let registration = server.registrations().remove(0);

        let reboot = ExecuteRequest::new(DEVICE_OBJECT_ID, DEVICE_REBOOT_RESOURCE_ID);
        assert_eq!(
            server.execute(&registration, reboot).await.unwrap(),
            ExecuteResponse::Success
        );

        let other = ExecuteRequest::new(DEVICE_OBJECT_ID, DEVICE_REBOOT_RESOURCE_ID + 1);
        assert_eq!(
            server.execute(&registration, other).await.unwrap(),
            ExecuteResponse::Error(ResponseCode::MethodNotAllowed)
        );

        let absent = ExecuteRequest::new(9, 0);
        assert_eq!(
            server.execute(&registration, absent).await.unwrap(),
            ExecuteResponse::Error(ResponseCode::NotFound)
        );

        server.destroy().await;
        let reboot = ExecuteRequest::new(DEVICE_OBJECT_ID, DEVICE_REBOOT_RESOURCE_ID);
        assert!(server.execute(&registration, reboot).await.is_err());
    }

    #[tokio::test]
    async fn test_destroyed_server_never_answers() {
        let server = server();
        server.start();
        server.destroy().await;

        let pending = tokio::time::timeout(
            Duration::from_millis(50),
            server.register(psk_request("sec-device-6", b"key", Duration::from_secs(60))),
        )
        .await;
        assert!(pending.is_err());
    }
}
