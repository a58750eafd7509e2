//! Abstract backend capabilities.
//!
//! The remote configuration store and service registry are external
//! collaborators reached through two async traits:
//! - [`ConfigBackend`] - fetch payloads and subscribe to key changes
//! - [`RegistryBackend`] - register instances, query services, subscribe to
//!   membership changes
//!
//! A [`BackendProvider`] factory turns connection settings into live
//! backends during startup, so multiple independent coordinators (and fully
//! in-process test doubles) can coexist in one process.
//!
//! Reachability, wire protocol, retries and health checking all live behind
//! these traits; this crate never retries a failed backend call.

mod types;

pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::BackendError;
use crate::ConnectionSettings;

type BackendResult<T> = std::result::Result<T, BackendError>;

/// Remote configuration store capability.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigBackend: Send + Sync + 'static {
    /// Fetch the current raw payload for `data_id` in `group`. Round-trips
    /// on every call; the core keeps no cache.
    async fn fetch(
        &self,
        data_id: &str,
        group: &str,
    ) -> BackendResult<String>;

    /// Install a change listener for `(data_id, group)`. The handler runs on
    /// the backend's delivery task for every remote change.
    async fn subscribe(
        &self,
        data_id: &str,
        group: &str,
        handler: ConfigChangeHandler,
    ) -> BackendResult<()>;

    /// Cancel the change listener for `(data_id, group)`. A callback already
    /// in flight may still complete after this returns.
    async fn unsubscribe(
        &self,
        data_id: &str,
        group: &str,
    ) -> BackendResult<()>;

    /// Release the connection. Idempotent.
    async fn close(&self);
}

/// Remote service registry capability.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistryBackend: Send + Sync + 'static {
    /// Register one instance. `Ok(false)` means the backend refused the
    /// registration without reporting a transport error.
    async fn register(
        &self,
        registration: &Registration,
    ) -> BackendResult<bool>;

    /// Register a batch of instances for one service atomically.
    async fn batch_register(
        &self,
        service_name: &str,
        group: &str,
        registrations: &[Registration],
    ) -> BackendResult<bool>;

    /// Remove one registration, addressed by its original parameters.
    async fn deregister(
        &self,
        registration: &Registration,
    ) -> BackendResult<bool>;

    /// Summary of one service in a group.
    async fn query_service(
        &self,
        service_name: &str,
        group: &str,
    ) -> BackendResult<ServiceInfo>;

    /// One page of the service catalog of a namespace/group.
    async fn query_services(
        &self,
        namespace: &str,
        group: &str,
        page_no: u32,
        page_size: u32,
    ) -> BackendResult<ServiceList>;

    /// Instances of a service, optionally restricted to healthy ones.
    async fn query_instances(
        &self,
        service_name: &str,
        group: &str,
        healthy_only: bool,
    ) -> BackendResult<Vec<DiscoveredInstance>>;

    /// Install a membership-change listener for `(service_name, group)`.
    async fn subscribe(
        &self,
        service_name: &str,
        group: &str,
        handler: DeliveryHandler,
    ) -> BackendResult<()>;

    /// Cancel the membership-change listener for `(service_name, group)`.
    async fn unsubscribe(
        &self,
        service_name: &str,
        group: &str,
    ) -> BackendResult<()>;

    /// Release the connection. Idempotent.
    async fn close(&self);
}

/// Factory that opens backend connections during coordinator startup.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackendProvider: Send + Sync {
    async fn connect_config(
        &self,
        settings: &ConnectionSettings,
    ) -> BackendResult<Arc<dyn ConfigBackend>>;

    async fn connect_registry(
        &self,
        settings: &ConnectionSettings,
    ) -> BackendResult<Arc<dyn RegistryBackend>>;
}
