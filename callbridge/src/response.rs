//! Response types for dispatched calls.
//!
//! This module provides [`CallResponse`], the pairing of a typed response
//! body with its [`ResponseMetadata`].

use std::ops::Deref;

use callbridge_core::MetadataMap;

/// Metadata captured alongside a call result.
///
/// Two independent mappings: initial metadata (headers) and trailing metadata
/// (trailers). Both are empty placeholders when the transport does not
/// surface metadata separately, which is common for pure unary calls.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
    initial: MetadataMap,
    trailing: MetadataMap,
}

impl ResponseMetadata {
    /// Create response metadata from initial and trailing mappings.
    pub fn new(initial: MetadataMap, trailing: MetadataMap) -> Self {
        Self { initial, trailing }
    }

    /// Create empty response metadata.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get the initial metadata (headers).
    pub fn initial(&self) -> &MetadataMap {
        &self.initial
    }

    /// Get the trailing metadata (trailers).
    pub fn trailing(&self) -> &MetadataMap {
        &self.trailing
    }

    /// Decompose into initial and trailing mappings.
    pub fn into_parts(self) -> (MetadataMap, MetadataMap) {
        (self.initial, self.trailing)
    }
}

/// A typed response body paired with its response metadata.
///
/// Created exactly once per successfully completed call.
///
/// # Example
///
/// ```ignore
/// let response = handle.call_blocking(|channel| service.get_user(channel, &req))?;
///
/// // Access the body directly via Deref
/// println!("Name: {}", response.name);
///
/// // Or split body and metadata apart
/// let (user, metadata) = response.into_parts();
/// println!("trailers: {:?}", metadata.trailing());
/// ```
#[derive(Clone, Debug)]
pub struct CallResponse<T> {
    inner: T,
    metadata: ResponseMetadata,
}

impl<T> CallResponse<T> {
    /// Create a new response from a body and its metadata.
    pub fn new(inner: T, metadata: ResponseMetadata) -> Self {
        Self { inner, metadata }
    }

    /// Extract the body, discarding metadata.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Get a reference to the response metadata.
    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// Get a reference to the body.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Get a mutable reference to the body.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Transform the body, preserving metadata.
    pub fn map<U, F>(self, f: F) -> CallResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        CallResponse {
            inner: f(self.inner),
            metadata: self.metadata,
        }
    }

    /// Decompose into body and metadata.
    pub fn into_parts(self) -> (T, ResponseMetadata) {
        (self.inner, self.metadata)
    }
}

impl<T> Deref for CallResponse<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> AsRef<T> for CallResponse<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}
