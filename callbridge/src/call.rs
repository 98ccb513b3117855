//! Call dispatch.
//!
//! This module provides [`CallHandle`], the entry point for invoking a
//! remote method in any of the supported call shapes. A handle pairs a
//! transport handle with a frozen [`CallOptions`] snapshot; every invocation
//! applies the options to the transport handle and hands the configured
//! handle to a caller-supplied transport operation. The handle itself is
//! stateless beyond that pair and is safely reused across concurrent calls.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use callbridge_core::OperationEnvelope;
use prost::Message;

#[cfg(feature = "tracing")]
use tracing::info_span;

use crate::error::CallError;
use crate::longrunning::LongRunningCall;
use crate::options::{CallOptions, CallOptionsBuilder};
use crate::response::{CallResponse, ResponseMetadata};
use crate::streaming::{
    BidiStreamingCall, ClientStreamingCall, ResponseObserver, ServerStreamingCall, StreamBridge,
};
use crate::transport::{StreamObserver, TransportHandle};

/// Dispatch handle for one (transport handle, options) pair.
///
/// Construct one per options configuration; derive variants with
/// [`prepare`](Self::prepare). The options snapshot is frozen at
/// construction and applied to a clone of the transport handle on every
/// invocation, so concurrent calls never observe each other's configuration.
///
/// # Example
///
/// ```ignore
/// use callbridge::{CallHandle, CallOptions};
///
/// let options = CallOptions::builder()
///     .metadata("x-request-id", ["abc-123"])
///     .build();
/// let handle = CallHandle::with_options(channel, options);
///
/// let response = handle.call_blocking(|channel| service.get_user(channel, &request))?;
/// println!("user: {:?}", response.into_inner());
/// ```
#[derive(Clone, Debug)]
pub struct CallHandle<C> {
    channel: C,
    options: CallOptions,
}

impl<C: TransportHandle> CallHandle<C> {
    /// Create a handle with default (empty) options.
    pub fn new(channel: C) -> Self {
        Self::with_options(channel, CallOptions::default())
    }

    /// Create a handle with the given options snapshot.
    pub fn with_options(channel: C, options: CallOptions) -> Self {
        Self { channel, options }
    }

    /// Get the options snapshot this handle applies.
    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    /// Derive a new handle over the same transport handle family, with
    /// options produced by `configure` from a builder seeded with the
    /// current snapshot. The receiver is not mutated.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let authed = handle.prepare(|options| {
    ///     options.metadata("authorization", ["Bearer token123"])
    /// });
    /// ```
    pub fn prepare<F>(&self, configure: F) -> Self
    where
        F: FnOnce(CallOptionsBuilder) -> CallOptionsBuilder,
    {
        Self {
            channel: self.channel.clone(),
            options: configure(self.options.to_builder()).build(),
        }
    }

    /// Clone the transport handle and apply the options snapshot to it.
    fn configured(&self) -> C {
        self.options.apply_to(self.channel.clone())
    }

    /// Invoke a unary operation on the calling thread.
    ///
    /// `op` receives the configured transport handle and must return the raw
    /// typed response synchronously; the calling thread is suspended until it
    /// does. Errors raised by `op` propagate unchanged.
    pub fn call_blocking<Res, F>(&self, op: F) -> Result<CallResponse<Res>, CallError>
    where
        F: FnOnce(C) -> Result<Res, CallError>,
    {
        #[cfg(feature = "tracing")]
        let _span = info_span!("rpc.call", rpc.type = "blocking", otel.kind = "client").entered();

        let response = op(self.configured())?;
        Ok(CallResponse::new(response, ResponseMetadata::empty()))
    }

    /// Invoke a unary operation returning a future of the raw response.
    ///
    /// The returned [`ResponseFuture`] resolves to the raw value wrapped
    /// together with metadata captured at dispatch time; failure of the
    /// inner future propagates as failure of the outer one, preserving the
    /// original error.
    pub fn call_future<Res, F, Op>(&self, op: Op) -> ResponseFuture<F>
    where
        Op: FnOnce(C) -> F,
        F: Future<Output = Result<Res, CallError>>,
    {
        #[cfg(feature = "tracing")]
        let _span = info_span!("rpc.call", rpc.type = "future", otel.kind = "client").entered();

        ResponseFuture {
            inner: op(self.configured()),
            metadata: Some(ResponseMetadata::empty()),
        }
    }

    /// Invoke an operation resolving to a long-running operation envelope.
    ///
    /// The returned [`LongRunningCall`] decodes the payload of a terminal
    /// envelope as `Res` and keeps the raw envelope synchronously
    /// inspectable. Polling an unfinished operation to completion is the
    /// caller's collaborator's job, not this layer's.
    pub fn call_long_running<Res, F, Op>(&self, op: Op) -> LongRunningCall<F, Res>
    where
        Op: FnOnce(C) -> F,
        F: Future<Output = Result<OperationEnvelope, CallError>>,
        Res: Message + Default,
    {
        #[cfg(feature = "tracing")]
        let _span =
            info_span!("rpc.call", rpc.type = "long_running", otel.kind = "client").entered();

        LongRunningCall::new(op(self.configured()))
    }

    /// Invoke a server-streaming operation.
    ///
    /// `op` receives the configured transport handle and the inbound
    /// observer to wire into the call, and issues the call as a side effect
    /// of being invoked. The returned handle starts inert: events pushed by
    /// the transport before [`ServerStreamingCall::start`] are dropped, not
    /// queued.
    pub fn call_server_stream<Res, Op>(&self, op: Op) -> ServerStreamingCall<Res>
    where
        Op: FnOnce(C, ResponseObserver<Res>),
    {
        #[cfg(feature = "tracing")]
        let _span =
            info_span!("rpc.call", rpc.type = "server_stream", otel.kind = "client").entered();

        let bridge = StreamBridge::new();
        op(self.configured(), bridge.observer());
        ServerStreamingCall::new(bridge)
    }

    /// Invoke a client-streaming operation.
    ///
    /// `op` receives the configured transport handle and the inbound
    /// observer, and returns the transport's outbound observer. It is NOT
    /// invoked here: [`ClientStreamingCall::start`] performs the transport
    /// call, and until then the outbound half does not exist -
    /// [`RequestSink::send`](crate::RequestSink::send) fails with
    /// [`CallError::NotStarted`].
    pub fn call_client_stream<Req, Res, Op>(&self, op: Op) -> ClientStreamingCall<Req, Res>
    where
        Op: FnOnce(C, ResponseObserver<Res>) -> Box<dyn StreamObserver<Req>> + Send + 'static,
        C: 'static,
        Res: Send + 'static,
    {
        #[cfg(feature = "tracing")]
        let _span =
            info_span!("rpc.call", rpc.type = "client_stream", otel.kind = "client").entered();

        let channel = self.configured();
        ClientStreamingCall::new(Box::new(move |observer| op(channel, observer)))
    }

    /// Invoke a full bidirectional streaming operation.
    ///
    /// Deferred like [`call_client_stream`](Self::call_client_stream):
    /// [`BidiStreamingCall::start`] registers the response callbacks and
    /// performs the transport call.
    pub fn call_bidi_stream<Req, Res, Op>(&self, op: Op) -> BidiStreamingCall<Req, Res>
    where
        Op: FnOnce(C, ResponseObserver<Res>) -> Box<dyn StreamObserver<Req>> + Send + 'static,
        C: 'static,
    {
        #[cfg(feature = "tracing")]
        let _span =
            info_span!("rpc.call", rpc.type = "bidi_stream", otel.kind = "client").entered();

        let channel = self.configured();
        BidiStreamingCall::new(Box::new(move |observer| op(channel, observer)))
    }
}

pin_project_lite::pin_project! {
    /// Future of a unary call's wrapped response.
    ///
    /// Resolves the inner raw-response future and pairs the value with the
    /// metadata captured at dispatch time. The inner error passes through
    /// untouched.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        metadata: Option<ResponseMetadata>,
    }
}

impl<F, Res> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Res, CallError>>,
{
    type Output = Result<CallResponse<Res>, CallError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx)).map(|response| {
            CallResponse::new(response, this.metadata.take().unwrap_or_default())
        });
        Poll::Ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callbridge_core::{Code, MetadataMap, Status};
    use std::sync::Arc;
    use std::sync::Mutex;

    use crate::transport::CallCredentials;

    /// In-memory transport handle recording what was applied to it.
    #[derive(Clone, Default)]
    struct TestChannel {
        metadata: MetadataMap,
    }

    impl TransportHandle for TestChannel {
        fn apply_metadata(mut self, metadata: &MetadataMap) -> Self {
            self.metadata.extend(metadata);
            self
        }

        fn apply_credentials(mut self, credentials: Arc<dyn CallCredentials>) -> Self {
            self.metadata.extend(&credentials.request_metadata());
            self
        }

        fn apply_option(self, _key: &str, _value: &serde_json::Value) -> Self {
            self
        }
    }

    struct StaticToken;

    impl CallCredentials for StaticToken {
        fn request_metadata(&self) -> MetadataMap {
            let mut metadata = MetadataMap::new();
            metadata.insert("authorization", ["Bearer tok"]);
            metadata
        }
    }

    fn handle_with_metadata() -> CallHandle<TestChannel> {
        let options = CallOptions::builder().metadata("k", ["v1"]).build();
        CallHandle::with_options(TestChannel::default(), options)
    }

    #[test]
    fn test_call_blocking_returns_operation_result() {
        let handle = handle_with_metadata();

        let response = handle
            .call_blocking(|channel| {
                // The configured handle carries the options metadata
                assert_eq!(channel.metadata.get("k"), Some("v1"));
                Ok("ok".to_string())
            })
            .unwrap();

        assert_eq!(*response, "ok");
        assert!(response.metadata().initial().is_empty());
    }

    #[test]
    fn test_call_blocking_propagates_error_unwrapped() {
        let handle = CallHandle::new(TestChannel::default());

        let err = handle
            .call_blocking::<String, _>(|_| Err(Status::unavailable("down").into()))
            .unwrap_err();

        assert_eq!(err.code(), Code::Unavailable);
    }

    #[tokio::test]
    async fn test_call_future_wraps_response() {
        let handle = handle_with_metadata();

        let response = handle
            .call_future(|channel| async move {
                assert_eq!(channel.metadata.get("k"), Some("v1"));
                Ok(7u32)
            })
            .await
            .unwrap();

        assert_eq!(*response, 7);
    }

    #[tokio::test]
    async fn test_call_future_preserves_inner_error() {
        let handle = CallHandle::new(TestChannel::default());

        let err = handle
            .call_future::<u32, _, _>(|_| async { Err(CallError::from(Status::aborted("race"))) })
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::Aborted);
        assert_eq!(err.to_string(), "aborted: race");
    }

    #[test]
    fn test_prepare_derives_without_mutating() {
        let base = handle_with_metadata();
        let derived = base.prepare(|options| {
            options
                .metadata("k", ["v2"])
                .credentials(Arc::new(StaticToken))
        });

        assert_eq!(base.options().metadata().get("k"), Some("v1"));
        assert!(base.options().credentials().is_none());

        assert_eq!(derived.options().metadata().get("k"), Some("v2"));
        assert!(derived.options().credentials().is_some());
    }

    #[test]
    fn test_options_application_order() {
        let applied = Arc::new(Mutex::new(Vec::new()));

        #[derive(Clone)]
        struct OrderChannel(Arc<Mutex<Vec<String>>>);

        impl TransportHandle for OrderChannel {
            fn apply_metadata(self, _metadata: &MetadataMap) -> Self {
                self.0.lock().unwrap().push("metadata".into());
                self
            }
            fn apply_credentials(self, _credentials: Arc<dyn CallCredentials>) -> Self {
                self.0.lock().unwrap().push("credentials".into());
                self
            }
            fn apply_option(self, key: &str, _value: &serde_json::Value) -> Self {
                self.0.lock().unwrap().push(format!("option:{key}"));
                self
            }
        }

        let options = CallOptions::builder()
            .metadata("k", ["v"])
            .credentials(Arc::new(StaticToken))
            .transport_option("b", 2)
            .transport_option("a", 1)
            .build();
        let handle = CallHandle::with_options(OrderChannel(applied.clone()), options);

        handle
            .call_blocking(|_| Ok::<_, CallError>(()))
            .unwrap();

        // Metadata, then credentials, then transport options in key order
        assert_eq!(
            *applied.lock().unwrap(),
            ["metadata", "credentials", "option:a", "option:b"]
        );
    }

    #[test]
    fn test_handle_reuse_across_calls() {
        let handle = handle_with_metadata();

        for _ in 0..3 {
            let response = handle
                .call_blocking(|channel| {
                    assert_eq!(channel.metadata.get("k"), Some("v1"));
                    Ok(1u8)
                })
                .unwrap();
            assert_eq!(*response, 1);
        }
    }
}
