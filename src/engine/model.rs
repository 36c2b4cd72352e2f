//! Data exchanged with the client and server engines

use crate::common::Endpoint;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Response codes surfaced by the engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Content,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
    ServiceUnavailable,
}

impl ResponseCode {
    /// Dotted class.detail notation
    pub fn code(&self) -> &'static str {
        match self {
            ResponseCode::Content => "2.05",
            ResponseCode::Unauthorized => "4.01",
            ResponseCode::Forbidden => "4.03",
            ResponseCode::NotFound => "4.04",
            ResponseCode::MethodNotAllowed => "4.05",
            ResponseCode::InternalServerError => "5.00",
            ResponseCode::ServiceUnavailable => "5.03",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

/// The server a client talks to, as seen from the client side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRef {
    pub short_id: u16,
    pub uri: String,
}

impl fmt::Display for ServerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.uri, self.short_id)
    }
}

/// Server-assigned registration identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub String);

impl RegistrationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session record held by the server for a registered client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: RegistrationId,
    pub endpoint: Endpoint,
    pub lifetime: Duration,
    pub binding: String,
    pub object_links: Vec<u16>,
    pub secure: bool,
    pub registered_at: DateTime<Utc>,
}

/// Fields a client refreshes on a registration update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationUpdate {
    pub registration_id: RegistrationId,
    pub lifetime: Option<Duration>,
}

/// Pre-shared key credentials known to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityInfo {
    pub endpoint: String,
    pub identity: String,
    pub key: Vec<u8>,
}

impl SecurityInfo {
    pub fn pre_shared_key(endpoint: &str, identity: &str, key: &[u8]) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            identity: identity.to_string(),
            key: key.to_vec(),
        }
    }
}

/// Read of every resource of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub object_id: u16,
}

impl ReadRequest {
    pub fn new(object_id: u16) -> Self {
        Self { object_id }
    }
}

/// Execute of one resource, as used to actuate a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteRequest {
    pub object_id: u16,
    pub resource_id: u16,
    pub params: String,
}

impl ExecuteRequest {
    pub fn new(object_id: u16, resource_id: u16) -> Self {
        Self {
            object_id,
            resource_id,
            params: String::new(),
        }
    }
}

/// One resource value in a read response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceValue {
    pub id: u16,
    pub value: String,
}

impl ResourceValue {
    pub fn new(id: u16, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    pub code: ResponseCode,
    pub content: Vec<ResourceValue>,
}

impl ReadResponse {
    pub fn content(content: Vec<ResourceValue>) -> Self {
        Self {
            code: ResponseCode::Content,
            content,
        }
    }

    pub fn error(code: ResponseCode) -> Self {
        Self {
            code,
            content: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResponse {
    Success,
    Error(ResponseCode),
}
