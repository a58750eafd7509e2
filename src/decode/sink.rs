//! Type-erased decode targets for load-and-watch.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::de::DeserializeOwned;

use super::DecoderRegistry;
use crate::Result;

/// Destination that a raw payload can be decoded into.
///
/// Erases the concrete target type so heterogeneous bindings can share one
/// load-and-watch call.
pub trait ConfigSink: Send + Sync {
    /// Decode `raw` under `format` and replace the held value.
    fn apply(
        &self,
        decoders: &DecoderRegistry,
        format: &str,
        raw: &str,
    ) -> Result<()>;
}

/// Lock-free slot holding the latest decoded value of a watched config.
///
/// `load_and_watch` populates it synchronously; an active watch keeps
/// replacing it on every remote change. Readers snapshot via [`get`](Self::get)
/// and are never blocked by an in-flight update.
pub struct ConfigValue<T> {
    slot: ArcSwapOption<T>,
}

impl<T> Default for ConfigValue<T> {
    fn default() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
        }
    }
}

impl<T> ConfigValue<T> {
    /// Empty shared slot, ready to hand to a [`ConfigBinding`](crate::ConfigBinding).
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Latest decoded value, or `None` before the first successful load.
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.load_full()
    }
}

impl<T> ConfigSink for ConfigValue<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn apply(
        &self,
        decoders: &DecoderRegistry,
        format: &str,
        raw: &str,
    ) -> Result<()> {
        let value: T = decoders.decode(format, raw)?;
        self.slot.store(Some(Arc::new(value)));
        Ok(())
    }
}
