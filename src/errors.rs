//! Error hierarchy for the coordination client.
//!
//! Errors are categorized by the operation that produced them: startup and
//! scope access, watch bookkeeping, instance registration, and the data path
//! (fetch/decode/delivery). Backend transport failures stay opaque; this
//! crate surfaces them without retrying.

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Startup validation and scope-availability failures
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// Watch and subscription bookkeeping failures (local, no backend call)
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Instance registration failures
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Data-path failures (fetch, decode, asynchronous delivery)
    #[error(transparent)]
    Data(#[from] DataError),

    /// Opaque failure reported by a backend capability
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// Invalid or contradictory startup settings; fatal, aborts `start`
    #[error("bad configuration: {0}")]
    BadConfiguration(String),

    /// Caller addressed a subsystem that was never started
    #[error("{scope} backend is disabled or was never started")]
    BackendDisabled { scope: &'static str },

    /// `start` called while the coordinator is not in the Stopped state
    #[error("coordinator already started")]
    AlreadyStarted,
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// A live watch already exists for this key in this group
    #[error("duplicate watch for {key} in group {group}")]
    DuplicateWatch { key: String, group: String },

    /// No live watch with this identifier
    #[error("unknown watch id {watch_id}")]
    UnknownWatch { watch_id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Identifier was never returned by `register`, or already unregistered
    #[error("unknown instance id {instance_id}")]
    UnknownInstance { instance_id: String },

    /// Backend refused the registration without reporting an error
    #[error("registry rejected registration for service {service}")]
    RegistrationRejected { service: String },

    /// Batch registration called with no instances
    #[error("empty instance batch")]
    EmptyBatch,
}

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Configuration payload could not be fetched from the backend
    #[error("failed to fetch config {data_id}")]
    Fetch {
        data_id: String,
        #[source]
        source: BackendError,
    },

    /// No decoder registered under this format name
    #[error("unrecognized config format: {0}")]
    UnknownFormat(String),

    /// Payload did not decode under the named format
    #[error("failed to deserialize {format} content")]
    Deserialize {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Notification-channel failure, surfaced through the caller's callback
    #[error("subscription delivery failed")]
    Delivery(#[source] BackendError),
}

/// Transport-level failure reported by a backend capability.
///
/// The backend owns retries, pooling and health checking; by the time one of
/// these reaches this crate it is final.
#[derive(Debug, thiserror::Error)]
#[error("backend failure: {message}")]
pub struct BackendError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
