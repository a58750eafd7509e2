//! Startup settings for the coordination client.
//!
//! Loading follows layered sources with priority:
//! 1. Struct defaults (hardcoded)
//! 2. Optional TOML settings file
//! 3. `CONFREG_`-prefixed environment variables (highest priority)
//!
//! Validation happens at [`Coordinator::start`](crate::Coordinator::start),
//! not at load time, so a host can assemble settings programmatically as
//! well.


use std::sync::Arc;
use std::time::Duration;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::ConfigSink;
use crate::Result;
use crate::SetupError;

/// Namespace value the backend treats as "no namespace".
const PUBLIC_NAMESPACE: &str = "public";

/// Connection parameters for both backend capabilities.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Backend server endpoints, e.g. `"10.0.0.5:8848"`
    pub endpoints: Vec<String>,
    /// Logical namespace isolating this deployment
    pub namespace: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_in_ms: u64,
    pub request_timeout_in_ms: u64,
    /// Skip the configuration subsystem entirely
    pub disable_config: bool,
    /// Skip the naming subsystem entirely
    pub disable_naming: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            namespace: String::new(),
            username: None,
            password: None,
            connect_timeout_in_ms: 3000,
            request_timeout_in_ms: 5000,
            disable_config: false,
            disable_naming: false,
        }
    }
}

impl ConnectionSettings {
    /// Load settings from an optional TOML file with environment overlay.
    ///
    /// # Arguments
    /// * `path` - Settings file without extension; `None` for env-only
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("CONFREG")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("endpoints"),
        );
        builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| SetupError::BadConfiguration(e.to_string()).into())
    }

    /// Reject contradictory or incomplete settings.
    pub fn validate(&self) -> Result<()> {
        if self.disable_config && self.disable_naming {
            return Err(
                SetupError::BadConfiguration("config and naming are both disabled".to_string()).into(),
            );
        }
        if self.endpoints.is_empty() {
            return Err(SetupError::BadConfiguration("no backend endpoints".to_string()).into());
        }
        if self.endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(SetupError::BadConfiguration("blank backend endpoint".to_string()).into());
        }
        Ok(())
    }

    /// The reserved public namespace addresses the backend default.
    pub fn normalize(&mut self) {
        if self.namespace == PUBLIC_NAMESPACE {
            self.namespace.clear();
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_in_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_in_ms)
    }
}

/// One config key bound to a typed decode target.
#[derive(Clone)]
pub struct ConfigBinding {
    pub data_id: String,
    /// Decoder name, e.g. `"json"` or `"yaml"`
    pub format: String,
    /// Keep the target synchronized with remote changes
    pub watch: bool,
    pub sink: Arc<dyn ConfigSink>,
}

impl ConfigBinding {
    pub fn new(
        data_id: impl Into<String>,
        format: impl Into<String>,
        watch: bool,
        sink: Arc<dyn ConfigSink>,
    ) -> Self {
        Self {
            data_id: data_id.into(),
            format: format.into(),
            watch,
            sink,
        }
    }
}

/// Config set loaded (and optionally watched) during startup, before any
/// dependent initialization runs.
#[derive(Clone)]
pub struct BootstrapSettings {
    pub group: String,
    pub bindings: Vec<ConfigBinding>,
}
