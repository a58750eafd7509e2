use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::BackendProvider;
use crate::BootstrapSettings;
use crate::ConfigBackend;
use crate::ConfigScope;
use crate::ConnectionSettings;
use crate::DecoderRegistry;
use crate::NamingScope;
use crate::RegistryBackend;
use crate::Result;
use crate::ScopeRegistry;
use crate::SetupError;

/// Lifecycle states of a [`Coordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Outcome of a [`Coordinator::stop`] call.
///
/// `stopped` is always true once `stop` returns: backend connections were
/// released at least best-effort. `graceful` is false when the
/// deregistration sweep outlived `max_wait` and kept running detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub graceful: bool,
    pub stopped: bool,
}

impl ShutdownReport {
    fn graceful() -> Self {
        Self {
            graceful: true,
            stopped: true,
        }
    }

    fn timed_out() -> Self {
        Self {
            graceful: false,
            stopped: true,
        }
    }
}

/// Top-level coordination client.
///
/// Construct with [`new`](Self::new), bring up with
/// [`start`](Self::start), then hand out per-group scopes to callers.
/// Dropping a running coordinator leaks its ephemeral registrations to the
/// backend's expiry; call [`stop`](Self::stop) for a clean teardown.
pub struct Coordinator {
    settings: ConnectionSettings,
    decoders: Arc<DecoderRegistry>,
    state: Mutex<LifecycleState>,
    scopes: ArcSwapOption<ScopeRegistry>,
}

impl Coordinator {
    /// Coordinator with the built-in `json`/`yaml` decoders.
    pub fn new(settings: ConnectionSettings) -> Self {
        Self::with_decoders(settings, DecoderRegistry::default())
    }

    /// Coordinator with a custom decoder registry.
    pub fn with_decoders(
        settings: ConnectionSettings,
        decoders: DecoderRegistry,
    ) -> Self {
        Self {
            settings,
            decoders: Arc::new(decoders),
            state: Mutex::new(LifecycleState::Stopped),
            scopes: ArcSwapOption::empty(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Connect the enabled backends and transition to `Running`.
    ///
    /// Order: validate settings, connect the configuration backend, apply
    /// the bootstrap load-and-watch (so dependents read fully populated
    /// values right after this returns), connect the naming backend. Any
    /// failure closes what was already opened and restores `Stopped`;
    /// there is no partial `Running` state.
    ///
    /// # Errors
    /// - `BadConfiguration` for contradictory or incomplete settings
    /// - `AlreadyStarted` when not in the `Stopped` state
    /// - backend connection errors, passed through
    pub async fn start(
        &self,
        provider: &dyn BackendProvider,
        bootstrap: Option<&BootstrapSettings>,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Stopped {
                return Err(SetupError::AlreadyStarted.into());
            }
            *state = LifecycleState::Starting;
        }

        match self.try_start(provider, bootstrap).await {
            Ok(registry) => {
                self.scopes.store(Some(Arc::new(registry)));
                *self.state.lock() = LifecycleState::Running;
                info!("coordinator running");
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = LifecycleState::Stopped;
                Err(e)
            }
        }
    }

    async fn try_start(
        &self,
        provider: &dyn BackendProvider,
        bootstrap: Option<&BootstrapSettings>,
    ) -> Result<ScopeRegistry> {
        let mut settings = self.settings.clone();
        settings.normalize();
        settings.validate()?;

        let config_backend = if settings.disable_config {
            None
        } else {
            Some(provider.connect_config(&settings).await?)
        };
        let mut registry = ScopeRegistry::new(config_backend.clone(), self.decoders.clone());

        let brought_up = self.bring_up(provider, &settings, &registry, bootstrap).await;
        match brought_up {
            Ok(registry_backend) => {
                registry.attach_registry_backend(registry_backend, settings.namespace.clone());
                Ok(registry)
            }
            Err(e) => {
                // Already-opened connections must not outlive a failed start.
                if let Some(backend) = config_backend {
                    backend.close().await;
                }
                Err(e)
            }
        }
    }

    async fn bring_up(
        &self,
        provider: &dyn BackendProvider,
        settings: &ConnectionSettings,
        registry: &ScopeRegistry,
        bootstrap: Option<&BootstrapSettings>,
    ) -> Result<Option<Arc<dyn RegistryBackend>>> {
        if let Some(bootstrap) = bootstrap {
            let scope = registry.config_scope(&bootstrap.group)?;
            scope.load_and_watch(&bootstrap.bindings).await?;
            debug!(group = %bootstrap.group, count = bootstrap.bindings.len(), "bootstrap configs loaded");
        }
        if settings.disable_naming {
            Ok(None)
        } else {
            Ok(Some(provider.connect_registry(settings).await?))
        }
    }

    /// Tear down within a bounded wait.
    ///
    /// Closes the configuration backend immediately, then races an
    /// asynchronous sweep - unregister every tracked instance of every
    /// group, close the naming backend, signal - against `max_wait`. On
    /// timeout the sweep keeps running detached and the report says
    /// `graceful: false`; an intentional best-effort leak, since the
    /// backend expires ephemeral instances on its own. Individual
    /// deregistration failures are logged, never fatal.
    ///
    /// Calling `stop` on an already stopped coordinator is a no-op that
    /// reports a graceful stop.
    pub async fn stop(
        &self,
        max_wait: Duration,
    ) -> Result<ShutdownReport> {
        {
            let mut state = self.state.lock();
            match *state {
                LifecycleState::Running => *state = LifecycleState::Stopping,
                _ => return Ok(ShutdownReport::graceful()),
            }
        }

        let report = match self.scopes.swap(None) {
            None => ShutdownReport::graceful(),
            Some(registry) => self.teardown(&registry, max_wait).await,
        };
        *self.state.lock() = LifecycleState::Stopped;
        info!(graceful = report.graceful, "coordinator stopped");
        Ok(report)
    }

    async fn teardown(
        &self,
        registry: &ScopeRegistry,
        max_wait: Duration,
    ) -> ShutdownReport {
        if let Some(config_backend) = registry.config_backend() {
            config_backend.close().await;
        }
        let registry_backend = match registry.registry_backend() {
            None => return ShutdownReport::graceful(),
            Some(backend) => backend,
        };

        let scopes = registry.naming_scopes();
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            sweep_registrations(scopes).await;
            registry_backend.close().await;
            let _ = done_tx.send(());
        });

        match timeout(max_wait, done_rx).await {
            Ok(_) => ShutdownReport::graceful(),
            Err(_) => {
                warn!(
                    max_wait_ms = max_wait.as_millis() as u64,
                    "deregistration sweep still running, detaching"
                );
                ShutdownReport::timed_out()
            }
        }
    }

    /// The configuration scope of `group`.
    ///
    /// # Errors
    /// `BackendDisabled` when the coordinator is not running or the
    /// configuration subsystem is disabled.
    pub fn config_scope(
        &self,
        group: &str,
    ) -> Result<Arc<ConfigScope>> {
        self.registry()?.config_scope(group)
    }

    /// The naming scope of `group`.
    ///
    /// # Errors
    /// `BackendDisabled` when the coordinator is not running or the naming
    /// subsystem is disabled.
    pub fn naming_scope(
        &self,
        group: &str,
    ) -> Result<Arc<NamingScope>> {
        self.registry()?.naming_scope(group)
    }

    /// Raw configuration backend of a running coordinator.
    pub fn config_backend(&self) -> Option<Arc<dyn ConfigBackend>> {
        self.scopes.load_full().and_then(|r| r.config_backend())
    }

    /// Raw registry backend of a running coordinator.
    pub fn registry_backend(&self) -> Option<Arc<dyn RegistryBackend>> {
        self.scopes.load_full().and_then(|r| r.registry_backend())
    }

    fn registry(&self) -> Result<Arc<ScopeRegistry>> {
        self.scopes.load_full().ok_or_else(|| {
            SetupError::BackendDisabled {
                scope: "coordination",
            }
            .into()
        })
    }
}

async fn sweep_registrations(scopes: Vec<Arc<NamingScope>>) {
    for scope in scopes {
        for instance_id in scope.tracked_ids().await {
            match scope.unregister(&instance_id).await {
                Ok(accepted) => {
                    debug!(group = %scope.group(), instance_id = %instance_id, accepted, "swept registration")
                }
                Err(e) => {
                    error!(group = %scope.group(), instance_id = %instance_id, "sweep unregister failed: {e}")
                }
            }
        }
    }
}
