use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::error;

use crate::utils::ident;
use crate::ConfigBackend;
use crate::ConfigBinding;
use crate::ConfigChange;
use crate::ConfigChangeHandler;
use crate::DataError;
use crate::DecoderRegistry;
use crate::Result;
use crate::WatchError;

struct WatchEntry {
    data_id: String,
}

/// Per-group configuration client: load payloads and keep values
/// synchronized with remote changes.
///
/// At most one live watch exists per `(data_id, group)` pair; a second
/// watch request fails with `DuplicateWatch` instead of replacing the
/// first.
pub struct ConfigScope {
    group: String,
    backend: Arc<dyn ConfigBackend>,
    decoders: Arc<DecoderRegistry>,
    watched: Mutex<HashMap<String, WatchEntry>>,
}

impl std::fmt::Debug for ConfigScope {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ConfigScope")
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl ConfigScope {
    pub(crate) fn new(
        group: impl Into<String>,
        backend: Arc<dyn ConfigBackend>,
        decoders: Arc<DecoderRegistry>,
    ) -> Self {
        Self {
            group: group.into(),
            backend,
            decoders,
            watched: Mutex::new(HashMap::new()),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Fetch the current raw payload for `data_id`.
    ///
    /// Round-trips to the backend on every call; no local caching.
    pub async fn fetch_raw(
        &self,
        data_id: &str,
    ) -> Result<String> {
        self.backend
            .fetch(data_id, &self.group)
            .await
            .map_err(|source| {
                DataError::Fetch {
                    data_id: data_id.to_string(),
                    source,
                }
                .into()
            })
    }

    /// Fetch and decode the payload for `data_id` under the named format.
    pub async fn fetch_into<T: DeserializeOwned>(
        &self,
        data_id: &str,
        format: &str,
    ) -> Result<T> {
        let raw = self.fetch_raw(data_id).await?;
        self.decoders.decode(format, &raw)
    }

    /// Install a change listener for `data_id`.
    ///
    /// The handler runs on the backend's delivery task for every remote
    /// change. The dedup check, the backend acknowledgment and the entry
    /// insert form one critical section, so two concurrent watches of the
    /// same key cannot both succeed.
    ///
    /// # Returns
    /// The watch identifier, stable for the `(data_id, group)` pair.
    pub async fn watch(
        &self,
        data_id: &str,
        handler: ConfigChangeHandler,
    ) -> Result<String> {
        let watch_id = ident::watch_id(data_id, &self.group);
        let mut watched = self.watched.lock().await;
        if watched.contains_key(&watch_id) {
            return Err(WatchError::DuplicateWatch {
                key: data_id.to_string(),
                group: self.group.clone(),
            }
            .into());
        }
        self.backend.subscribe(data_id, &self.group, handler).await?;
        watched.insert(
            watch_id.clone(),
            WatchEntry {
                data_id: data_id.to_string(),
            },
        );
        debug!(group = %self.group, data_id, watch_id = %watch_id, "config watch installed");
        Ok(watch_id)
    }

    /// Cancel the watch behind `watch_id`.
    ///
    /// The entry is removed only when backend cancellation succeeds, so a
    /// caller can retry after a failure. A callback already in flight may
    /// still complete after this returns.
    pub async fn unwatch(
        &self,
        watch_id: &str,
    ) -> Result<()> {
        let mut watched = self.watched.lock().await;
        let entry = watched.get(watch_id).ok_or_else(|| WatchError::UnknownWatch {
            watch_id: watch_id.to_string(),
        })?;
        self.backend.unsubscribe(&entry.data_id, &self.group).await?;
        watched.remove(watch_id);
        debug!(group = %self.group, watch_id, "config watch removed");
        Ok(())
    }

    /// Load every binding into its sink and keep the watched ones
    /// synchronized.
    ///
    /// On return every successfully loaded sink holds the value current at
    /// call time; watched sinks continue to update asynchronously. A decode
    /// failure inside an installed watch callback is logged and swallowed -
    /// one malformed update must not stop future valid updates - while a
    /// fetch or decode failure during the initial load fails fast.
    pub async fn load_and_watch(
        &self,
        bindings: &[ConfigBinding],
    ) -> Result<()> {
        for binding in bindings {
            let raw = self.fetch_raw(&binding.data_id).await?;
            binding.sink.apply(&self.decoders, &binding.format, &raw)?;
            if binding.watch {
                let sink = binding.sink.clone();
                let decoders = self.decoders.clone();
                let format = binding.format.clone();
                let handler: ConfigChangeHandler = Arc::new(move |change: ConfigChange| {
                    if let Err(e) = sink.apply(&decoders, &format, &change.content) {
                        error!(
                            group = %change.group,
                            data_id = %change.data_id,
                            "cannot apply config change: {e}"
                        );
                    }
                });
                self.watch(&binding.data_id, handler).await?;
            }
        }
        Ok(())
    }

    /// Identifiers of every live watch.
    pub async fn watched(&self) -> Vec<String> {
        self.watched.lock().await.keys().cloned().collect()
    }
}
