//! Pluggable configuration payload decoding.
//!
//! Payloads travel through the core as opaque strings; decoding happens at
//! the edges through a [`DecoderRegistry`] - a strategy map from format name
//! to [`Decoder`]. `json` and `yaml` are registered by default and hosts
//! can add their own formats without touching any dispatch site.
//!
//! Decoders normalize raw text into a [`serde_json::Value`] tree, which the
//! registry then shapes into the caller's typed target. An unrecognized
//! format is a configuration error, never a panic.

mod sink;

pub use sink::*;


use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::DataError;
use crate::Result;

/// One named payload format.
pub trait Decoder: Send + Sync {
    /// Parse raw text into a format-neutral value tree.
    fn decode_value(
        &self,
        raw: &str,
    ) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error + Send + Sync>>;
}

struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode_value(
        &self,
        raw: &str,
    ) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error + Send + Sync>> {
        serde_json::from_str(raw).map_err(Into::into)
    }
}

struct YamlDecoder;

impl Decoder for YamlDecoder {
    fn decode_value(
        &self,
        raw: &str,
    ) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error + Send + Sync>> {
        serde_yaml::from_str(raw).map_err(Into::into)
    }
}

/// Strategy map from format name to decoder.
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn Decoder>>,
}

impl Default for DecoderRegistry {
    /// Registry with the built-in `json` and `yaml` decoders.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register("json", Arc::new(JsonDecoder));
        registry.register("yaml", Arc::new(YamlDecoder));
        registry
    }
}

impl DecoderRegistry {
    /// Empty registry; use [`Default`] for the built-in formats.
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register (or replace) a decoder under `format`.
    pub fn register(
        &mut self,
        format: impl Into<String>,
        decoder: Arc<dyn Decoder>,
    ) {
        self.decoders.insert(format.into(), decoder);
    }

    /// Decode `raw` under the named format into `T`.
    ///
    /// # Errors
    /// - [`DataError::UnknownFormat`] when no decoder is registered
    /// - [`DataError::Deserialize`] when parsing or shaping fails
    pub fn decode<T: DeserializeOwned>(
        &self,
        format: &str,
        raw: &str,
    ) -> Result<T> {
        let decoder = self
            .decoders
            .get(format)
            .ok_or_else(|| DataError::UnknownFormat(format.to_string()))?;
        let value = decoder.decode_value(raw).map_err(|source| DataError::Deserialize {
            format: format.to_string(),
            source,
        })?;
        serde_json::from_value(value).map_err(|e| {
            DataError::Deserialize {
                format: format.to_string(),
                source: Box::new(e),
            }
            .into()
        })
    }
}
