//! Data model shared between the scopes and the backend capabilities.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::BackendError;
use crate::Error;

/// Caller-facing input for a single instance registration.
///
/// The owning scope supplies group, cluster and the ephemeral/healthy/enabled
/// flags when it builds the full [`Registration`].
#[derive(Debug, Clone, Default)]
pub struct InstanceSpec {
    pub ip: String,
    pub port: u32,
    pub weight: f64,
    pub service_name: String,
    pub metadata: HashMap<String, String>,
}

/// Caller-facing input for one member of a batch registration.
///
/// The service name is shared across the batch and passed separately.
#[derive(Debug, Clone, Default)]
pub struct BatchInstanceSpec {
    pub ip: String,
    pub port: u32,
    pub weight: f64,
    pub metadata: HashMap<String, String>,
}

/// Full registration request as issued to the registry backend.
///
/// Also the tracked record: deregistration always reuses these exact
/// parameters, never caller input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub ip: String,
    pub port: u32,
    pub weight: f64,
    pub metadata: HashMap<String, String>,
    pub service_name: String,
    pub group: String,
    pub cluster: String,
    pub ephemeral: bool,
    pub healthy: bool,
    pub enabled: bool,
}

/// An instance as reported by the registry backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredInstance {
    pub ip: String,
    pub port: u32,
    pub weight: f64,
    pub healthy: bool,
    pub enabled: bool,
    pub service_name: String,
    pub cluster: String,
    pub metadata: HashMap<String, String>,
}

/// A discovered instance annotated with its stable identity hash.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub instance: DiscoveredInstance,
    pub identifier: String,
}

/// Summary of one service within a group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub group: String,
    pub clusters: Vec<String>,
    pub instances: Vec<DiscoveredInstance>,
}

/// One page of the service catalog for a namespace/group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceList {
    pub count: u64,
    pub names: Vec<String>,
}

/// A configuration change as delivered by the config backend.
#[derive(Debug, Clone)]
pub struct ConfigChange {
    pub namespace: String,
    pub group: String,
    pub data_id: String,
    pub content: String,
}

/// Invoked on the backend's delivery task for every remote config change.
pub type ConfigChangeHandler = Arc<dyn Fn(ConfigChange) + Send + Sync>;

/// Service-membership handler as registered with the registry backend.
///
/// `Err` carries a delivery-layer failure, not a membership change.
pub type DeliveryHandler =
    Arc<dyn Fn(std::result::Result<Vec<DiscoveredInstance>, BackendError>) + Send + Sync>;

/// Caller-facing service-membership handler; delivery failures arrive as
/// [`DataError::Delivery`](crate::DataError::Delivery).
pub type NamingChangeHandler =
    Arc<dyn Fn(std::result::Result<Vec<DiscoveredInstance>, Error>) + Send + Sync>;
