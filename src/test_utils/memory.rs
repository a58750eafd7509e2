//! In-memory backend doubles.
//!
//! Fully in-process implementations of both backend capabilities with
//! switchable failure injection and manual change publication, so tests can
//! drive the whole watch/registration lifecycle without a server.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::BackendError;
use crate::BackendProvider;
use crate::ConfigBackend;
use crate::ConfigChange;
use crate::ConfigChangeHandler;
use crate::ConnectionSettings;
use crate::DeliveryHandler;
use crate::DiscoveredInstance;
use crate::Registration;
use crate::RegistryBackend;
use crate::ServiceInfo;
use crate::ServiceList;

type Key = (String, String);

fn key(
    a: &str,
    b: &str,
) -> Key {
    (a.to_string(), b.to_string())
}

/// Configuration backend double backed by a plain map.
#[derive(Default)]
pub struct MemoryConfigBackend {
    namespace: String,
    values: Mutex<HashMap<Key, String>>,
    handlers: Mutex<HashMap<Key, ConfigChangeHandler>>,
    pub fail_fetch: AtomicBool,
    pub fail_subscribe: AtomicBool,
    pub fail_unsubscribe: AtomicBool,
    closed: AtomicBool,
}

impl MemoryConfigBackend {
    pub fn new(namespace: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            namespace: namespace.into(),
            ..Default::default()
        })
    }

    /// Seed a payload without notifying watchers.
    pub fn put(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
    ) {
        self.values.lock().insert(key(data_id, group), content.to_string());
    }

    /// Update a payload and deliver the change to the installed watcher on
    /// a separate task, like a real notification thread would.
    pub fn publish(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
    ) {
        self.put(data_id, group, content);
        let handler = self.handlers.lock().get(&key(data_id, group)).cloned();
        if let Some(handler) = handler {
            let change = ConfigChange {
                namespace: self.namespace.clone(),
                group: group.to_string(),
                data_id: data_id.to_string(),
                content: content.to_string(),
            };
            tokio::spawn(async move { handler(change) });
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ConfigBackend for MemoryConfigBackend {
    async fn fetch(
        &self,
        data_id: &str,
        group: &str,
    ) -> Result<String, BackendError> {
        if self.fail_fetch.load(Ordering::Acquire) {
            return Err(BackendError::new("injected fetch failure"));
        }
        self.values
            .lock()
            .get(&key(data_id, group))
            .cloned()
            .ok_or_else(|| BackendError::new(format!("no config {data_id} in {group}")))
    }

    async fn subscribe(
        &self,
        data_id: &str,
        group: &str,
        handler: ConfigChangeHandler,
    ) -> Result<(), BackendError> {
        if self.fail_subscribe.load(Ordering::Acquire) {
            return Err(BackendError::new("injected subscribe failure"));
        }
        // First handler wins; the manager's dedup keeps seconds out anyway.
        self.handlers.lock().entry(key(data_id, group)).or_insert(handler);
        Ok(())
    }

    async fn unsubscribe(
        &self,
        data_id: &str,
        group: &str,
    ) -> Result<(), BackendError> {
        if self.fail_unsubscribe.load(Ordering::Acquire) {
            return Err(BackendError::new("injected unsubscribe failure"));
        }
        self.handlers.lock().remove(&key(data_id, group));
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Registry backend double tracking registrations in memory.
#[derive(Default)]
pub struct MemoryRegistryBackend {
    registered: Mutex<Vec<Registration>>,
    catalog: Mutex<HashMap<Key, Vec<DiscoveredInstance>>>,
    handlers: Mutex<HashMap<Key, DeliveryHandler>>,
    pub refuse_register: AtomicBool,
    pub fail_register: AtomicBool,
    pub fail_deregister: AtomicBool,
    pub fail_unsubscribe: AtomicBool,
    /// Artificial latency per deregistration, for shutdown-timing tests.
    pub deregister_delay: Mutex<Duration>,
    deregister_calls: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryRegistryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Instances returned by the query surface for `(service, group)`.
    pub fn seed_catalog(
        &self,
        service_name: &str,
        group: &str,
        instances: Vec<DiscoveredInstance>,
    ) {
        self.catalog.lock().insert(key(service_name, group), instances);
    }

    /// Deliver a membership event to the installed subscriber on a
    /// separate task.
    pub fn publish_instances(
        &self,
        service_name: &str,
        group: &str,
        event: Result<Vec<DiscoveredInstance>, BackendError>,
    ) {
        let handler = self.handlers.lock().get(&key(service_name, group)).cloned();
        if let Some(handler) = handler {
            tokio::spawn(async move { handler(event) });
        }
    }

    pub fn registered(&self) -> Vec<Registration> {
        self.registered.lock().clone()
    }

    pub fn deregister_calls(&self) -> usize {
        self.deregister_calls.load(Ordering::Acquire)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl RegistryBackend for MemoryRegistryBackend {
    async fn register(
        &self,
        registration: &Registration,
    ) -> Result<bool, BackendError> {
        if self.fail_register.load(Ordering::Acquire) {
            return Err(BackendError::new("injected register failure"));
        }
        if self.refuse_register.load(Ordering::Acquire) {
            return Ok(false);
        }
        self.registered.lock().push(registration.clone());
        Ok(true)
    }

    async fn batch_register(
        &self,
        _service_name: &str,
        _group: &str,
        registrations: &[Registration],
    ) -> Result<bool, BackendError> {
        if self.fail_register.load(Ordering::Acquire) {
            return Err(BackendError::new("injected register failure"));
        }
        if self.refuse_register.load(Ordering::Acquire) {
            return Ok(false);
        }
        self.registered.lock().extend_from_slice(registrations);
        Ok(true)
    }

    async fn deregister(
        &self,
        registration: &Registration,
    ) -> Result<bool, BackendError> {
        let delay = *self.deregister_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.deregister_calls.fetch_add(1, Ordering::AcqRel);
        if self.fail_deregister.load(Ordering::Acquire) {
            return Err(BackendError::new("injected deregister failure"));
        }
        let mut registered = self.registered.lock();
        let before = registered.len();
        registered.retain(|r| r != registration);
        Ok(registered.len() < before)
    }

    async fn query_service(
        &self,
        service_name: &str,
        group: &str,
    ) -> Result<ServiceInfo, BackendError> {
        let instances = self
            .catalog
            .lock()
            .get(&key(service_name, group))
            .cloned()
            .unwrap_or_default();
        Ok(ServiceInfo {
            name: service_name.to_string(),
            group: group.to_string(),
            clusters: Vec::new(),
            instances,
        })
    }

    async fn query_services(
        &self,
        _namespace: &str,
        group: &str,
        _page_no: u32,
        _page_size: u32,
    ) -> Result<ServiceList, BackendError> {
        let catalog = self.catalog.lock();
        let names: Vec<String> = catalog
            .keys()
            .filter(|(_, g)| g == group)
            .map(|(service, _)| service.clone())
            .collect();
        Ok(ServiceList {
            count: names.len() as u64,
            names,
        })
    }

    async fn query_instances(
        &self,
        service_name: &str,
        group: &str,
        healthy_only: bool,
    ) -> Result<Vec<DiscoveredInstance>, BackendError> {
        let instances = self
            .catalog
            .lock()
            .get(&key(service_name, group))
            .cloned()
            .unwrap_or_default();
        Ok(instances
            .into_iter()
            .filter(|i| !healthy_only || i.healthy)
            .collect())
    }

    async fn subscribe(
        &self,
        service_name: &str,
        group: &str,
        handler: DeliveryHandler,
    ) -> Result<(), BackendError> {
        self.handlers.lock().entry(key(service_name, group)).or_insert(handler);
        Ok(())
    }

    async fn unsubscribe(
        &self,
        service_name: &str,
        group: &str,
    ) -> Result<(), BackendError> {
        if self.fail_unsubscribe.load(Ordering::Acquire) {
            return Err(BackendError::new("injected unsubscribe failure"));
        }
        self.handlers.lock().remove(&key(service_name, group));
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Provider handing out shared memory backends, with switchable
/// connection failures.
pub struct MemoryProvider {
    pub config: Arc<MemoryConfigBackend>,
    pub registry: Arc<MemoryRegistryBackend>,
    pub fail_config_connect: AtomicBool,
    pub fail_registry_connect: AtomicBool,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self {
            config: MemoryConfigBackend::new("test-namespace"),
            registry: MemoryRegistryBackend::new(),
            fail_config_connect: AtomicBool::new(false),
            fail_registry_connect: AtomicBool::new(false),
        }
    }
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackendProvider for MemoryProvider {
    async fn connect_config(
        &self,
        _settings: &ConnectionSettings,
    ) -> Result<Arc<dyn ConfigBackend>, BackendError> {
        if self.fail_config_connect.load(Ordering::Acquire) {
            return Err(BackendError::new("injected config connect failure"));
        }
        Ok(self.config.clone())
    }

    async fn connect_registry(
        &self,
        _settings: &ConnectionSettings,
    ) -> Result<Arc<dyn RegistryBackend>, BackendError> {
        if self.fail_registry_connect.load(Ordering::Acquire) {
            return Err(BackendError::new("injected registry connect failure"));
        }
        Ok(self.registry.clone())
    }
}
