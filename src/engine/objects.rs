//! Minimal device object model handed to the client engine

use crate::common::Endpoint;
use crate::constants::{
    ACCESS_CONTROL_OBJECT_ID, DEVICE_OBJECT_ID, SECURITY_OBJECT_ID, SERVER_OBJECT_ID,
};
use crate::engine::model::{ExecuteResponse, ReadResponse, ResourceValue, ResponseCode};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One object exposed by a client
pub trait ObjectEnabler: Send + Sync + fmt::Debug {
    fn id(&self) -> u16;

    fn read(&self) -> ReadResponse;

    fn execute(&self, _resource_id: u16, _params: &str) -> ExecuteResponse {
        ExecuteResponse::Error(ResponseCode::MethodNotAllowed)
    }
}

/// Bootstrap credentials for the single server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityObject {
    PreSharedKey {
        server_uri: String,
        short_id: u16,
        identity: Vec<u8>,
        key: Vec<u8>,
    },
    NoSec {
        server_uri: String,
        short_id: u16,
    },
}

impl SecurityObject {
    pub fn server_uri(&self) -> &str {
        match self {
            SecurityObject::PreSharedKey { server_uri, .. }
            | SecurityObject::NoSec { server_uri, .. } => server_uri,
        }
    }

    pub fn short_id(&self) -> u16 {
        match self {
            SecurityObject::PreSharedKey { short_id, .. }
            | SecurityObject::NoSec { short_id, .. } => *short_id,
        }
    }
}

impl ObjectEnabler for SecurityObject {
    fn id(&self) -> u16 {
        SECURITY_OBJECT_ID
    }

    // Credentials are never readable by a server
    fn read(&self) -> ReadResponse {
        ReadResponse::error(ResponseCode::Unauthorized)
    }
}

/// Server account: short id, lifetime and binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerObject {
    pub short_id: u16,
    pub lifetime: Duration,
    pub binding: String,
    pub notify_when_disabled: bool,
}

impl ObjectEnabler for ServerObject {
    fn id(&self) -> u16 {
        SERVER_OBJECT_ID
    }

    fn read(&self) -> ReadResponse {
        ReadResponse::content(vec![
            ResourceValue::new(0, self.short_id.to_string()),
            ResourceValue::new(1, self.lifetime.as_secs().to_string()),
            ResourceValue::new(6, self.notify_when_disabled.to_string()),
            ResourceValue::new(7, self.binding.clone()),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccessControlObject;

impl ObjectEnabler for AccessControlObject {
    fn id(&self) -> u16 {
        ACCESS_CONTROL_OBJECT_ID
    }

    fn read(&self) -> ReadResponse {
        ReadResponse::content(Vec::new())
    }
}

/// Device identity resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceObject {
    pub manufacturer: String,
    pub model_number: String,
    pub serial_number: String,
    pub binding: String,
}

impl ObjectEnabler for DeviceObject {
    fn id(&self) -> u16 {
        DEVICE_OBJECT_ID
    }

    fn read(&self) -> ReadResponse {
        ReadResponse::content(vec![
            ResourceValue::new(0, self.manufacturer.clone()),
            ResourceValue::new(1, self.model_number.clone()),
            ResourceValue::new(2, self.serial_number.clone()),
            ResourceValue::new(16, self.binding.clone()),
        ])
    }
}

/// Device whose execute on `actuated_resource` always succeeds
#[derive(Debug, Clone)]
pub struct ActuatedDevice {
    pub device: DeviceObject,
    pub actuated_resource: u16,
}

impl ObjectEnabler for ActuatedDevice {
    fn id(&self) -> u16 {
        self.device.id()
    }

    fn read(&self) -> ReadResponse {
        self.device.read()
    }

    fn execute(&self, resource_id: u16, params: &str) -> ExecuteResponse {
        if resource_id == self.actuated_resource {
            ExecuteResponse::Success
        } else {
            self.device.execute(resource_id, params)
        }
    }
}

/// Everything the engine needs to build one client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub endpoint: Endpoint,
    pub security: SecurityObject,
    pub server: ServerObject,
    pub objects: Vec<Arc<dyn ObjectEnabler>>,
}

impl ClientSettings {
    /// Object ids announced at registration
    pub fn object_links(&self) -> Vec<u16> {
        self.objects.iter().map(|o| o.id()).collect()
    }

    pub fn object(&self, object_id: u16) -> Option<&Arc<dyn ObjectEnabler>> {
        self.objects.iter().find(|o| o.id() == object_id)
    }
}
