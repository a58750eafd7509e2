//! Group-to-scope registry.
//!
//! Single source of truth mapping group names to their scoped clients,
//! safe under concurrent first use from any number of callers. The
//! configuration and naming sides live in two independent concurrent maps
//! so the subsystems never contend with each other; a scope is constructed
//! exactly once per group even under a race of concurrent first lookups
//! (the map's shard lock covers the whole get-or-create).


use std::sync::Arc;

use dashmap::DashMap;

use crate::ConfigBackend;
use crate::ConfigScope;
use crate::DecoderRegistry;
use crate::NamingScope;
use crate::RegistryBackend;
use crate::Result;
use crate::SetupError;

struct ConfigScopes {
    backend: Arc<dyn ConfigBackend>,
    decoders: Arc<DecoderRegistry>,
    scopes: DashMap<String, Arc<ConfigScope>>,
}

struct NamingScopes {
    backend: Arc<dyn RegistryBackend>,
    namespace: String,
    scopes: DashMap<String, Arc<NamingScope>>,
}

/// Process-wide map from group name to scoped client state.
///
/// Holds the two shared backend connections; all groups multiplex over
/// them. Groups are created implicitly on first lookup and live for the
/// registry's lifetime.
pub struct ScopeRegistry {
    config: Option<ConfigScopes>,
    naming: Option<NamingScopes>,
}

impl ScopeRegistry {
    pub(crate) fn new(
        config_backend: Option<Arc<dyn ConfigBackend>>,
        decoders: Arc<DecoderRegistry>,
    ) -> Self {
        Self {
            config: config_backend.map(|backend| ConfigScopes {
                backend,
                decoders,
                scopes: DashMap::new(),
            }),
            naming: None,
        }
    }

    pub(crate) fn attach_registry_backend(
        &mut self,
        backend: Option<Arc<dyn RegistryBackend>>,
        namespace: String,
    ) {
        self.naming = backend.map(|backend| NamingScopes {
            backend,
            namespace,
            scopes: DashMap::new(),
        });
    }

    /// The configuration scope of `group`, created on first use.
    ///
    /// # Errors
    /// `BackendDisabled` when the configuration backend was never started.
    pub fn config_scope(
        &self,
        group: &str,
    ) -> Result<Arc<ConfigScope>> {
        let scopes = self.config.as_ref().ok_or(SetupError::BackendDisabled {
            scope: "configuration",
        })?;
        Ok(scopes
            .scopes
            .entry(group.to_string())
            .or_insert_with(|| {
                Arc::new(ConfigScope::new(
                    group,
                    scopes.backend.clone(),
                    scopes.decoders.clone(),
                ))
            })
            .value()
            .clone())
    }

    /// The naming scope of `group`, created on first use.
    ///
    /// # Errors
    /// `BackendDisabled` when the naming backend was never started.
    pub fn naming_scope(
        &self,
        group: &str,
    ) -> Result<Arc<NamingScope>> {
        let scopes = self.naming.as_ref().ok_or(SetupError::BackendDisabled {
            scope: "naming",
        })?;
        Ok(scopes
            .scopes
            .entry(group.to_string())
            .or_insert_with(|| {
                Arc::new(NamingScope::new(
                    group,
                    scopes.namespace.clone(),
                    scopes.backend.clone(),
                ))
            })
            .value()
            .clone())
    }

    /// Raw configuration backend, when enabled.
    pub fn config_backend(&self) -> Option<Arc<dyn ConfigBackend>> {
        self.config.as_ref().map(|c| c.backend.clone())
    }

    /// Raw registry backend, when enabled.
    pub fn registry_backend(&self) -> Option<Arc<dyn RegistryBackend>> {
        self.naming.as_ref().map(|n| n.backend.clone())
    }

    /// Every naming scope created so far; the shutdown sweep walks these.
    pub(crate) fn naming_scopes(&self) -> Vec<Arc<NamingScope>> {
        self.naming
            .as_ref()
            .map(|n| n.scopes.iter().map(|entry| entry.value().clone()).collect())
            .unwrap_or_default()
    }
}
