//! Call options for per-call configuration.
//!
//! This module provides [`CallOptions`], an immutable per-call configuration
//! snapshot, and [`CallOptionsBuilder`], the mutable accumulator it is built
//! from. Options carry metadata headers, an optional credential handle, and
//! transport-specific options; the dispatch layer applies all three to the
//! transport handle before every invocation.

use std::collections::BTreeMap;
use std::sync::Arc;

use callbridge_core::MetadataMap;

use crate::transport::{CallCredentials, TransportHandle};

/// Immutable per-call configuration snapshot.
///
/// A snapshot is frozen at [`CallOptionsBuilder::build`] and never mutated
/// afterwards, so it can be shared freely across concurrent calls. To derive
/// a variant, seed a new builder with [`CallOptions::to_builder`].
///
/// # Example
///
/// ```
/// use callbridge::CallOptions;
///
/// let options = CallOptions::builder()
///     .metadata("x-request-id", ["abc-123"])
///     .metadata("x-tags", ["alpha", "beta"])
///     .without_metadata("x-tags")
///     .build();
///
/// assert_eq!(options.metadata().get("x-request-id"), Some("abc-123"));
/// assert!(!options.metadata().contains("x-tags"));
/// ```
#[derive(Clone, Default)]
pub struct CallOptions {
    metadata: MetadataMap,
    credentials: Option<Arc<dyn CallCredentials>>,
    transport_options: BTreeMap<String, serde_json::Value>,
}

impl CallOptions {
    /// Create a builder with no options set.
    pub fn builder() -> CallOptionsBuilder {
        CallOptionsBuilder::default()
    }

    /// Create a builder seeded with this snapshot's entries.
    pub fn to_builder(&self) -> CallOptionsBuilder {
        CallOptionsBuilder {
            metadata: self.metadata.clone(),
            credentials: self.credentials.clone(),
            transport_options: self.transport_options.clone(),
        }
    }

    /// Get the metadata entries.
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    /// Get the credential handle, if any.
    pub fn credentials(&self) -> Option<&Arc<dyn CallCredentials>> {
        self.credentials.as_ref()
    }

    /// Iterate over the transport-specific options, sorted by key.
    pub fn transport_options(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.transport_options
            .iter()
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Apply this snapshot to a transport handle: metadata first, then
    /// credentials, then transport options in key order.
    pub(crate) fn apply_to<C: TransportHandle>(&self, handle: C) -> C {
        let mut handle = handle.apply_metadata(&self.metadata);
        if let Some(credentials) = &self.credentials {
            handle = handle.apply_credentials(credentials.clone());
        }
        for (key, value) in self.transport_options() {
            handle = handle.apply_option(key, value);
        }
        handle
    }
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("metadata", &self.metadata)
            .field("credentials", &self.credentials.is_some())
            .field("transport_options", &self.transport_options)
            .finish()
    }
}

/// Mutable accumulator for [`CallOptions`].
///
/// The builder exclusively owns its state; [`build`](Self::build) freezes it
/// into an immutable snapshot with no remaining mutable references.
#[derive(Default)]
pub struct CallOptionsBuilder {
    metadata: MetadataMap,
    credentials: Option<Arc<dyn CallCredentials>>,
    transport_options: BTreeMap<String, serde_json::Value>,
}

impl CallOptionsBuilder {
    /// Set the value sequence for a metadata key, replacing any existing
    /// values for that key (last write wins, no merge).
    pub fn metadata<K, I, V>(mut self, key: K, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.metadata.insert(key, values);
        self
    }

    /// Remove a metadata key. No-op if the key was never set.
    pub fn without_metadata(mut self, key: &str) -> Self {
        self.metadata.remove(key);
        self
    }

    /// Set the credential handle for the call.
    pub fn credentials(mut self, credentials: Arc<dyn CallCredentials>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set a transport-specific option.
    pub fn transport_option<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.transport_options.insert(key.into(), value.into());
        self
    }

    /// Freeze the accumulated state into an immutable snapshot.
    pub fn build(self) -> CallOptions {
        CallOptions {
            metadata: self.metadata,
            credentials: self.credentials,
            transport_options: self.transport_options,
        }
    }
}
