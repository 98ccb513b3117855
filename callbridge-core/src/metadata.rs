//! Key/value call metadata mappings.
//!
//! This module provides [`MetadataMap`], the out-of-band key/value mapping
//! attached to calls (request headers) and returned alongside results
//! (response headers and trailers).

use std::collections::BTreeMap;

use http::header::{HeaderMap, HeaderName, HeaderValue};

/// An ordered mapping from metadata key to a sequence of string values.
///
/// Keys are unique: inserting a key that is already present fully replaces
/// the prior value list, it never merges. Iteration order is deterministic
/// (sorted by key).
///
/// # Example
///
/// ```
/// use callbridge_core::MetadataMap;
///
/// let mut metadata = MetadataMap::new();
/// metadata.insert("x-request-id", ["abc-123"]);
/// metadata.insert("x-tags", ["alpha", "beta"]);
///
/// assert_eq!(metadata.get("x-request-id"), Some("abc-123"));
/// assert_eq!(metadata.get_all("x-tags").count(), 2);
///
/// // Last write wins, no merge
/// metadata.insert("x-tags", ["gamma"]);
/// assert_eq!(metadata.get_all("x-tags").collect::<Vec<_>>(), ["gamma"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl MetadataMap {
    /// Create an empty metadata map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key with its value sequence, replacing any existing values.
    pub fn insert<K, I, V>(&mut self, key: K, values: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.entries
            .insert(key.into(), values.into_iter().map(Into::into).collect());
    }

    /// Remove a key and its values. No-op if the key is absent.
    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Get the first value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Get all values for a key, in insertion order.
    pub fn get_all(&self, key: &str) -> impl Iterator<Item = &str> {
        self.entries
            .get(key)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Check if a key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over all entries, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Merge another map into this one, entry by entry.
    ///
    /// Each key present in `other` replaces this map's value list for that
    /// key (the same last-write-wins rule as [`insert`](Self::insert)).
    pub fn extend(&mut self, other: &MetadataMap) {
        for (key, values) in other.iter() {
            self.insert(key, values.iter().cloned());
        }
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Convert to an [`http::HeaderMap`], skipping entries that are not valid
    /// header names or values.
    ///
    /// HTTP-backed transports use this to splice call metadata directly into
    /// request headers.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (key, values) in self.iter() {
            let Ok(name) = HeaderName::try_from(key) else {
                continue;
            };
            for value in values {
                if let Ok(value) = HeaderValue::try_from(value.as_str()) {
                    headers.append(name.clone(), value);
                }
            }
        }
        headers
    }

    /// Build a metadata map from an [`http::HeaderMap`], skipping values that
    /// are not valid UTF-8.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut metadata = MetadataMap::new();
        for key in headers.keys() {
            let values: Vec<&str> = headers
                .get_all(key)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            metadata.insert(key.as_str(), values);
        }
        metadata
    }
}

impl<K, V> FromIterator<(K, Vec<V>)> for MetadataMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Vec<V>)>>(iter: I) -> Self {
        let mut metadata = MetadataMap::new();
        for (key, values) in iter {
            metadata.insert(key, values);
        }
        metadata
    }
}
