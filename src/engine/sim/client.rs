//! Simulated client state machine
//!
//! `Idle -> Registering -> Registered -> Stopped`, with `Destroyed` reachable from
//! anywhere. Every server exchange is bounded by the response timeout; its outcome
//! is reported to the attached observer and never returned to the caller.

use crate::common::{Endpoint, lock};
use crate::engine::model::{RegistrationId, ServerRef};
use crate::engine::objects::{ClientSettings, SecurityObject};
use crate::engine::sim::server::{Credentials, RegisterRequest, SimServer};
use crate::engine::{EngineClient, EventSink, LifecycleEvent};
use crate::errors::{BenchError, Result};

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, timeout};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClientState {
    Idle,
    Registering,
    Registered(RegistrationId),
    Stopped,
    Destroyed,
}

struct ClientInner {
    settings: ClientSettings,
    server: Arc<SimServer>,
    response_timeout: Duration,
    sink: Mutex<Option<EventSink>>,
    state: Mutex<ClientState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

pub struct SimClient {
    inner: Arc<ClientInner>,
}

impl SimClient {
    pub fn new(
        settings: ClientSettings,
        server: Arc<SimServer>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                settings,
                server,
                response_timeout,
                sink: Mutex::new(None),
                state: Mutex::new(ClientState::Idle),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl ClientInner {
    fn server_ref(&self) -> ServerRef {
        ServerRef {
            short_id: self.settings.security.short_id(),
            uri: self.settings.security.server_uri().to_string(),
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        if let Some(sink) = lock(&self.sink).as_ref()
            && !sink.emit(event)
        {
            debug!("Observer of {} is gone", self.settings.endpoint);
        }
    }

    /// Move `from -> to` only if the client is still in `from`
    fn transition(&self, from: &ClientState, to: ClientState) -> bool {
        let mut state = lock(&self.state);
        if *state == *from {
            *state = to;
            true
        } else {
            false
        }
    }

    fn register_request(&self) -> RegisterRequest {
        let credentials = match &self.settings.security {
            SecurityObject::PreSharedKey { identity, key, .. } => Credentials::PreSharedKey {
                identity: identity.clone(),
                key: key.clone(),
            },
            SecurityObject::NoSec { .. } => Credentials::None,
        };

        RegisterRequest {
            endpoint: self.settings.endpoint.clone(),
            lifetime: self.settings.server.lifetime,
            binding: self.settings.server.binding.clone(),
            objects: self.settings.objects.clone(),
            credentials,
        }
    }

    async fn register(self: Arc<Self>) {
        let server = self.server_ref();
        let request = self.register_request();

        match timeout(self.response_timeout, self.server.register(request)).await {
            Ok(Ok(registration_id)) => {
                let registered = ClientState::Registered(registration_id.clone());
                if !self.transition(&ClientState::Registering, registered) {
                    debug!(
                        "{} stopped while registering, dropping {}",
                        self.settings.endpoint, registration_id
                    );
                    return;
                }
                self.spawn_updates(registration_id.clone());
                self.emit(LifecycleEvent::RegistrationSucceeded {
                    server,
                    registration_id,
                });
            }
            Ok(Err(rejection)) => {
                self.transition(&ClientState::Registering, ClientState::Stopped);
                self.emit(LifecycleEvent::RegistrationFailed {
                    server,
                    code: rejection.code,
                    message: rejection.message,
                });
            }
            Err(_) => {
                self.transition(&ClientState::Registering, ClientState::Stopped);
                self.emit(LifecycleEvent::RegistrationTimedOut { server });
            }
        }
    }

    /// Refresh the registration at half its lifetime until stopped
    fn spawn_updates(self: &Arc<Self>, registration_id: RegistrationId) {
        let inner = Arc::clone(self);
        let period = (self.settings.server.lifetime / 2).max(Duration::from_millis(500));

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                match timeout(
                    inner.response_timeout,
                    inner.server.update(&registration_id, None),
                )
                .await
                {
                    Ok(Ok(())) => debug!("{} updated registration", inner.settings.endpoint),
                    Ok(Err(rejection)) => {
                        warn!(
                            "{} update rejected: {} {}",
                            inner.settings.endpoint, rejection.code, rejection.message
                        );
                        break;
                    }
                    Err(_) => warn!("{} update timed out", inner.settings.endpoint),
                }
            }
        });
        lock(&self.tasks).push(task);
    }

    async fn deregister(&self, registration_id: RegistrationId) {
        let server = self.server_ref();

        match timeout(
            self.response_timeout,
            self.server.deregister(&registration_id),
        )
        .await
        {
            Ok(Ok(())) => self.emit(LifecycleEvent::DeregistrationSucceeded {
                server,
                registration_id,
            }),
            Ok(Err(rejection)) => self.emit(LifecycleEvent::DeregistrationFailed {
                server,
                code: rejection.code,
                message: rejection.message,
            }),
            Err(_) => self.emit(LifecycleEvent::DeregistrationTimedOut { server }),
        }
    }

    fn abort_tasks(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}

#[async_trait]
impl EngineClient for SimClient {
    fn endpoint(&self) -> &Endpoint {
        &self.inner.settings.endpoint
    }

    fn attach_observer(&self, sink: EventSink) {
        *lock(&self.inner.sink) = Some(sink);
    }

    async fn start(&self) -> Result<()> {
        {
            let mut state = lock(&self.inner.state);
            match *state {
                ClientState::Idle | ClientState::Stopped => *state = ClientState::Registering,
                ClientState::Destroyed => {
                    return Err(BenchError::engine(format!(
                        "client {} is destroyed",
                        self.inner.settings.endpoint
                    )));
                }
                ClientState::Registering | ClientState::Registered(_) => {
                    return Err(BenchError::engine(format!(
                        "client {} is already started",
                        self.inner.settings.endpoint
                    )));
                }
            }
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(inner.register());
        lock(&self.inner.tasks).push(task);
        Ok(())
    }

    async fn stop(&self, graceful: bool) -> Result<()> {
        self.inner.abort_tasks();

        let previous = {
            let mut state = lock(&self.inner.state);
            if *state == ClientState::Destroyed {
                return Ok(());
            }
            std::mem::replace(&mut *state, ClientState::Stopped)
        };

        if let ClientState::Registered(registration_id) = previous
            && graceful
        {
            self.inner.deregister(registration_id).await;
        }
        Ok(())
    }

    async fn destroy(&self, graceful: bool) {
        if let Err(e) = self.stop(graceful).await {
            warn!("Failed to stop {}: {}", self.inner.settings.endpoint, e);
        }
        *lock(&self.inner.state) = ClientState::Destroyed;
        lock(&self.inner.sink).take();
    }
}
