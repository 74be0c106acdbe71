//! Collaborator capabilities the engine consumes.
//!
//! The services crate implements these over HTTP. The engine only depends on
//! the traits, so it can be driven by in-memory fakes in tests.

use async_trait::async_trait;
use serde_json::Value;

use invsync_core::profile::TargetType;
use invsync_core::source::{Host, VirtualBlockDevice, VirtualDiskImage, VirtualMachine};
use invsync_core::{Endpoint, MinionGrains};

use crate::query::GraphQlRequest;

const MAX_BODY_CHARS: usize = 200;

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_BODY_CHARS).collect();
        format!("{cut}…")
    }
}

/// Errors raised by an external service.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} returned HTTP {status}: {}", truncate_body(.body))]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service}: object not found at {path}")]
    NotFound { service: &'static str, path: String },

    #[error("{service}: authentication failed (HTTP {status})")]
    Auth { service: &'static str, status: u16 },

    #[error("{service}: request failed: {message}")]
    Transport { service: &'static str, message: String },

    #[error("{service}: could not decode response: {message}")]
    Decode { service: &'static str, message: String },

    #[error("GraphQL query failed: {}", truncate_body(.0))]
    Query(String),

    #[error("{service}: timed out after {secs}s")]
    Timeout { service: &'static str, secs: u64 },
}

/// Single object or list, preserved from request to response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    One(Value),
    Many(Vec<Value>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::One(_) => 1,
            Payload::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_value(self) -> Value {
        match self {
            Payload::One(v) => v,
            Payload::Many(items) => Value::Array(items),
        }
    }
}

/// Read-only view of the hypervisor (Xen Orchestra).
#[async_trait]
pub trait HypervisorSource: Send + Sync {
    async fn list_hosts(&self) -> Result<Vec<Host>, CollaboratorError>;

    async fn list_vms(&self) -> Result<Vec<VirtualMachine>, CollaboratorError>;

    /// Block devices (disk and CD attachments) of one VM.
    async fn vm_devices(&self, vm_id: &str) -> Result<Vec<VirtualBlockDevice>, CollaboratorError>;

    /// Disk images referenced by already-fetched block devices.
    async fn virtual_disks(&self, devices: &[VirtualBlockDevice]) -> Result<Vec<VirtualDiskImage>, CollaboratorError>;
}

/// Structured query execution against the inventory service (NetBox GraphQL).
#[async_trait]
pub trait InventoryQuery: Send + Sync {
    /// Returns the full response body, including the `data` envelope.
    async fn execute_query(&self, request: &GraphQlRequest) -> Result<Value, CollaboratorError>;
}

/// Record creation in the inventory service.
#[async_trait]
pub trait InventoryMutation: Send + Sync {
    async fn create(&self, endpoint: Endpoint, body: Payload) -> Result<Payload, CollaboratorError>;
}

/// Per-minion facts from the configuration-management system (Salt).
#[async_trait]
pub trait GrainsSource: Send + Sync {
    async fn minion_grains(
        &self,
        target: &str,
        target_type: TargetType,
    ) -> Result<Vec<MinionGrains>, CollaboratorError>;
}
