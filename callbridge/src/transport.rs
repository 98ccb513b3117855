//! The contract between the dispatch layer and a transport.
//!
//! This layer never talks to the network itself. It configures a
//! caller-supplied transport handle ([`TransportHandle`]), hands it to a
//! caller-supplied transport operation, and bridges the observer pair the
//! operation produces for streaming shapes. Everything wire-level - encoding,
//! connection management, deadlines, retries - lives behind these seams.

use std::sync::Arc;

use callbridge_core::{MetadataMap, Status};

/// An opaque credential handle attached to calls via
/// [`CallOptions`](crate::CallOptions).
///
/// Credential material provisioning (token refresh, signing, key storage) is
/// out of scope here; the only obligation of a credential handle is to
/// produce the metadata entries the transport must attach to the request.
pub trait CallCredentials: Send + Sync {
    /// Metadata entries (e.g. authorization headers) for one call.
    fn request_metadata(&self) -> MetadataMap;
}

/// Configuration capability every transport handle must expose.
///
/// All three methods are builder-style: they consume the handle and return a
/// (possibly new) handle with the option applied, leaving the original
/// configuration untouched for other calls on clones of the same handle.
pub trait TransportHandle: Clone + Send {
    /// Return a handle carrying the given metadata entries.
    fn apply_metadata(self, metadata: &MetadataMap) -> Self;

    /// Return a handle carrying the given credentials.
    fn apply_credentials(self, credentials: Arc<dyn CallCredentials>) -> Self;

    /// Return a handle carrying a transport-specific option.
    ///
    /// Keys and value interpretation are transport-defined; unknown keys
    /// should be ignored, not rejected.
    fn apply_option(self, key: &str, value: &serde_json::Value) -> Self;
}

/// Push-based consumer half of a duplex stream.
///
/// Transports implement this for the outbound direction (the object returned
/// from a client- or bidi-streaming transport operation, fed by
/// [`RequestSink`](crate::RequestSink)); the dispatch layer implements it on
/// [`ResponseObserver`](crate::ResponseObserver) for the inbound direction.
///
/// After `on_error` or `on_completed` the stream is terminal and no further
/// events follow.
pub trait StreamObserver<T>: Send {
    /// Deliver the next message.
    fn on_next(&mut self, message: T) -> Result<(), Status>;

    /// Terminate the stream with an error.
    fn on_error(&mut self, status: Status);

    /// Terminate the stream normally.
    fn on_completed(&mut self);
}
