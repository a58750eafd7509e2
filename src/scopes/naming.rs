use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::Mutex;
use tracing::debug;

use crate::utils::ident;
use crate::BatchInstanceSpec;
use crate::DataError;
use crate::DeliveryHandler;
use crate::DiscoveredInstance;
use crate::InstanceRecord;
use crate::InstanceSpec;
use crate::NamingChangeHandler;
use crate::Registration;
use crate::RegistrationError;
use crate::RegistryBackend;
use crate::Result;
use crate::ServiceInfo;
use crate::ServiceList;
use crate::WatchError;

struct SubscriptionEntry {
    service_name: String,
}

/// Per-group naming client: ephemeral instance registration with full
/// lifecycle tracking, service queries, and membership-change
/// subscriptions.
///
/// Every registration issued through the scope stays tracked until it is
/// unregistered, so the shutdown sweep can tear down exactly what this
/// process registered.
pub struct NamingScope {
    group: String,
    namespace: String,
    backend: Arc<dyn RegistryBackend>,
    registered: Mutex<HashMap<String, Registration>>,
    subscribed: Mutex<HashMap<String, SubscriptionEntry>>,
}

impl std::fmt::Debug for NamingScope {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NamingScope")
            .field("group", &self.group)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl NamingScope {
    pub(crate) fn new(
        group: impl Into<String>,
        namespace: impl Into<String>,
        backend: Arc<dyn RegistryBackend>,
    ) -> Self {
        Self {
            group: group.into(),
            namespace: namespace.into(),
            backend,
            registered: Mutex::new(HashMap::new()),
            subscribed: Mutex::new(HashMap::new()),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    fn registration_from(
        &self,
        ip: String,
        port: u32,
        weight: f64,
        metadata: HashMap<String, String>,
        service_name: String,
    ) -> Registration {
        Registration {
            ip,
            port,
            weight,
            metadata,
            service_name,
            group: self.group.clone(),
            cluster: String::new(),
            ephemeral: true,
            healthy: true,
            enabled: true,
        }
    }

    /// Register one ephemeral instance.
    ///
    /// The entry is tracked only after the backend accepts it; a backend
    /// refusal without a transport error is normalized into
    /// `RegistrationRejected`.
    ///
    /// # Returns
    /// The instance identifier, `hash(ip, port)` - multiple concurrent
    /// registrations per scope are allowed as long as addresses differ.
    pub async fn register(
        &self,
        spec: InstanceSpec,
    ) -> Result<String> {
        let registration = self.registration_from(
            spec.ip,
            spec.port,
            spec.weight,
            spec.metadata,
            spec.service_name,
        );
        let accepted = self.backend.register(&registration).await?;
        if !accepted {
            return Err(RegistrationError::RegistrationRejected {
                service: registration.service_name,
            }
            .into());
        }
        let instance_id = ident::instance_id(&registration.ip, registration.port);
        debug!(
            group = %self.group,
            service = %registration.service_name,
            ip = %registration.ip,
            port = registration.port,
            "instance registered"
        );
        self.registered.lock().await.insert(instance_id.clone(), registration);
        Ok(instance_id)
    }

    /// Register a batch of instances for one service.
    ///
    /// All-or-nothing: on backend success every entry is tracked, on
    /// failure none are.
    pub async fn register_batch(
        &self,
        service_name: &str,
        specs: Vec<BatchInstanceSpec>,
    ) -> Result<Vec<String>> {
        if specs.is_empty() {
            return Err(RegistrationError::EmptyBatch.into());
        }
        let registrations: Vec<Registration> = specs
            .into_iter()
            .map(|spec| {
                self.registration_from(
                    spec.ip,
                    spec.port,
                    spec.weight,
                    spec.metadata,
                    service_name.to_string(),
                )
            })
            .collect();
        let ids: Vec<String> = registrations
            .iter()
            .map(|r| ident::instance_id(&r.ip, r.port))
            .collect();

        let accepted = self
            .backend
            .batch_register(service_name, &self.group, &registrations)
            .await?;
        if !accepted {
            return Err(RegistrationError::RegistrationRejected {
                service: service_name.to_string(),
            }
            .into());
        }
        let mut registered = self.registered.lock().await;
        for (id, registration) in ids.iter().zip(registrations) {
            registered.insert(id.clone(), registration);
        }
        debug!(group = %self.group, service = service_name, count = ids.len(), "batch registered");
        Ok(ids)
    }

    /// Unregister a tracked instance, using the stored original
    /// registration parameters.
    ///
    /// The tracking entry is dropped once the backend call has been issued,
    /// whether or not it succeeded: a stale backend-side registration (the
    /// backend expires ephemeral entries itself) is preferred over a local
    /// entry that can never be cleared.
    pub async fn unregister(
        &self,
        instance_id: &str,
    ) -> Result<bool> {
        let mut registered = self.registered.lock().await;
        let registration = registered
            .get(instance_id)
            .cloned()
            .ok_or_else(|| RegistrationError::UnknownInstance {
                instance_id: instance_id.to_string(),
            })?;
        let outcome = self.backend.deregister(&registration).await;
        registered.remove(instance_id);
        let accepted = outcome?;
        debug!(
            group = %self.group,
            ip = %registration.ip,
            port = registration.port,
            accepted,
            "instance unregistered"
        );
        Ok(accepted)
    }

    /// Snapshot of every tracked registration, in no particular order.
    pub async fn tracked(&self) -> Vec<Registration> {
        self.registered.lock().await.values().cloned().collect()
    }

    pub(crate) async fn tracked_ids(&self) -> Vec<String> {
        self.registered.lock().await.keys().cloned().collect()
    }

    /// Subscribe to membership changes of `service_name`.
    ///
    /// At most one live subscription per `(service_name, group)` pair. The
    /// handler runs on the backend's delivery task; a delivery-layer
    /// failure arrives as `Err(DataError::Delivery)` and does not cancel
    /// the subscription.
    pub async fn subscribe(
        &self,
        service_name: &str,
        handler: NamingChangeHandler,
    ) -> Result<String> {
        let watch_id = ident::subscription_id(service_name, &self.group);
        let mut subscribed = self.subscribed.lock().await;
        if subscribed.contains_key(&watch_id) {
            return Err(WatchError::DuplicateWatch {
                key: service_name.to_string(),
                group: self.group.clone(),
            }
            .into());
        }
        let delivery: DeliveryHandler = Arc::new(move |event| {
            handler(event.map_err(|e| DataError::Delivery(e).into()));
        });
        self.backend.subscribe(service_name, &self.group, delivery).await?;
        subscribed.insert(
            watch_id.clone(),
            SubscriptionEntry {
                service_name: service_name.to_string(),
            },
        );
        debug!(group = %self.group, service = service_name, watch_id = %watch_id, "naming watch installed");
        Ok(watch_id)
    }

    /// Cancel the subscription behind `watch_id`.
    ///
    /// The entry is removed as soon as cancellation is attempted; a backend
    /// failure is still reported but a retry will fail with `UnknownWatch`.
    pub async fn unsubscribe(
        &self,
        watch_id: &str,
    ) -> Result<()> {
        let mut subscribed = self.subscribed.lock().await;
        let entry = subscribed
            .remove(watch_id)
            .ok_or_else(|| WatchError::UnknownWatch {
                watch_id: watch_id.to_string(),
            })?;
        self.backend.unsubscribe(&entry.service_name, &self.group).await?;
        debug!(group = %self.group, watch_id, "naming watch removed");
        Ok(())
    }

    /// Summary of one service in this group.
    pub async fn service(
        &self,
        service_name: &str,
    ) -> Result<ServiceInfo> {
        self.backend
            .query_service(service_name, &self.group)
            .await
            .map_err(Into::into)
    }

    /// One page of the service catalog of this group's namespace.
    pub async fn services_page(
        &self,
        page_no: u32,
        page_size: u32,
    ) -> Result<ServiceList> {
        self.backend
            .query_services(&self.namespace, &self.group, page_no, page_size)
            .await
            .map_err(Into::into)
    }

    /// Every instance of a service, available or not.
    pub async fn all_instances(
        &self,
        service_name: &str,
    ) -> Result<Vec<InstanceRecord>> {
        let instances = self.backend.query_instances(service_name, &self.group, false).await?;
        Ok(Self::annotate(instances))
    }

    /// Healthy instances of a service.
    pub async fn healthy_instances(
        &self,
        service_name: &str,
    ) -> Result<Vec<InstanceRecord>> {
        let instances = self.backend.query_instances(service_name, &self.group, true).await?;
        Ok(Self::annotate(instances))
    }

    /// Pick one healthy instance uniformly at random, or `None` when the
    /// service has no healthy instances.
    pub async fn choose_one_healthy(
        &self,
        service_name: &str,
    ) -> Result<Option<InstanceRecord>> {
        let instances = self.healthy_instances(service_name).await?;
        Ok(instances.choose(&mut rand::thread_rng()).cloned())
    }

    fn annotate(instances: Vec<DiscoveredInstance>) -> Vec<InstanceRecord> {
        instances
            .into_iter()
            .map(|instance| InstanceRecord {
                identifier: ident::instance_id(&instance.ip, instance.port),
                instance,
            })
            .collect()
    }
}
