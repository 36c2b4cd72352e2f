//! Contracts of the black-box client and server engines
//!
//! The harness never speaks the registration protocol itself. It drives a
//! [`ClientEngine`] to build and start clients, listens to their lifecycle through an
//! [`EventSink`], and observes the server side through a [`ServerEngine`] registry
//! subscription. [`sim`] provides an in-process implementation of both sides.

pub mod model;
pub mod objects;
pub mod sim;

use crate::common::Endpoint;
use crate::errors::Result;
use model::{
    ExecuteRequest, ExecuteResponse, ReadRequest, ReadResponse, Registration, RegistrationId,
    RegistrationUpdate, ResponseCode,
    SecurityInfo, ServerRef,
};
use objects::ClientSettings;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lifecycle notification delivered by a client engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    RegistrationSucceeded {
        server: ServerRef,
        registration_id: RegistrationId,
    },
    RegistrationFailed {
        server: ServerRef,
        code: ResponseCode,
        message: String,
    },
    RegistrationTimedOut {
        server: ServerRef,
    },
    DeregistrationSucceeded {
        server: ServerRef,
        registration_id: RegistrationId,
    },
    DeregistrationFailed {
        server: ServerRef,
        code: ResponseCode,
        message: String,
    },
    DeregistrationTimedOut {
        server: ServerRef,
    },
    /// Unexpected local error, raised on behalf of a client that could not run
    InternalError {
        message: String,
    },
}

/// Sending half of one client's lifecycle channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver without blocking; false once the observer is gone
    pub fn emit(&self, event: LifecycleEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// One client built by a [`ClientEngine`]
#[async_trait]
pub trait EngineClient: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    /// Route every future lifecycle event of this client to `sink`
    fn attach_observer(&self, sink: EventSink);

    /// Begin registration; the outcome arrives through the observer
    async fn start(&self) -> Result<()>;

    /// Leave the server; a graceful stop deregisters first
    async fn stop(&self, graceful: bool) -> Result<()>;

    /// Stop and release every resource of the client
    async fn destroy(&self, graceful: bool);
}

pub trait ClientEngine: Send + Sync {
    fn create(&self, settings: ClientSettings) -> Result<Arc<dyn EngineClient>>;
}

/// Change in the server's registration registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Registered {
        registration: Registration,
        previous: Option<Registration>,
    },
    Updated {
        update: RegistrationUpdate,
        registration: Registration,
        previous: Registration,
    },
    Unregistered {
        registration: Registration,
        expired: bool,
    },
}

/// Credential lookups performed by the server during a handshake
pub trait SecurityStore: Send + Sync {
    fn get_by_identity(&self, identity: &str) -> Option<SecurityInfo>;

    fn get_by_endpoint(&self, endpoint: &str) -> Option<SecurityInfo>;
}

#[async_trait]
pub trait ServerEngine: Send + Sync {
    /// Receive every registry change from now on
    fn subscribe(&self) -> mpsc::UnboundedReceiver<RegistryEvent>;

    /// Send a request to a registered client and wait for its response
    async fn send(&self, registration: &Registration, request: ReadRequest)
    -> Result<ReadResponse>;

    /// Execute a resource on a registered client
    async fn execute(
        &self,
        registration: &Registration,
        request: ExecuteRequest,
    ) -> Result<ExecuteResponse>;

    fn registrations(&self) -> Vec<Registration>;

    fn start(&self);

    async fn destroy(&self);
}
