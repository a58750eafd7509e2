//! Startup and shutdown orchestration.
//!
//! The [`Coordinator`] is the explicit context object of the whole client:
//! it owns the connection settings, the lifecycle state machine and - once
//! running - the [`ScopeRegistry`](crate::ScopeRegistry) with both backend
//! connections. Nothing lives in process-wide globals, so any number of
//! independent coordinators can run in one process.
//!
//! # Lifecycle
//! `Stopped → Starting → Running → Stopping → Stopped`. A failed start
//! restores `Stopped`; there are no retries across states.
//!
//! # Basic Usage
//! ```rust,ignore
//! let coordinator = Coordinator::new(settings);
//! coordinator.start(&provider, None).await?;
//!
//! let config = coordinator.config_scope("CLOUD")?;
//! let raw = config.fetch_raw("demo-gateway.yml").await?;
//!
//! let report = coordinator.stop(Duration::from_secs(30)).await?;
//! assert!(report.stopped);
//! ```

mod coordinator;

pub use coordinator::*;
