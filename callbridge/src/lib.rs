//! Client-side call-shape dispatch over a pluggable duplex RPC transport.
//!
//! This crate removes the boilerplate that differs between RPC call shapes -
//! unary (blocking or future-based), long-running operations, and the three
//! streaming shapes - while uniformly attaching per-call options (metadata,
//! credentials, transport options) and uniformly exposing typed results with
//! response metadata.
//!
//! The transport itself is a collaborator, not part of this crate: calls are
//! dispatched through a caller-supplied [`TransportHandle`] and per-call
//! transport operations. Connection management, wire encoding, deadlines and
//! retries all live on the transport side of that seam.
//!
//! ## Call shapes
//!
//! - [`CallHandle::call_blocking`]: single request, single response, on the
//!   calling thread
//! - [`CallHandle::call_future`]: single request, future of the response
//! - [`CallHandle::call_long_running`]: future of an operation envelope,
//!   decoded on completion
//! - [`CallHandle::call_server_stream`]: single request, stream of responses
//! - [`CallHandle::call_client_stream`]: stream of requests, single response
//! - [`CallHandle::call_bidi_stream`]: full duplex streaming
//!
//! ## Example
//!
//! ```ignore
//! use callbridge::{CallHandle, CallOptions};
//!
//! let options = CallOptions::builder()
//!     .metadata("x-request-id", ["abc-123"])
//!     .build();
//! let handle = CallHandle::with_options(channel, options);
//!
//! // Unary call: the closure performs the actual transport call
//! let response = handle.call_blocking(|channel| service.get_user(channel, &request))?;
//! println!("user: {:?}", response.into_inner());
//! ```
//!
//! ## Streaming and `start()`
//!
//! Streaming handles bridge the transport's push-based observer model onto a
//! registrable callback set, gated by an explicit `start()`:
//!
//! ```ignore
//! use callbridge::StreamCallbacks;
//!
//! let call = handle.call_bidi_stream(|channel, observer| {
//!     service.chat(channel, observer) // returns the outbound observer
//! });
//!
//! call.start(
//!     StreamCallbacks::new()
//!         .on_next(|reply| println!("reply: {reply:?}"))
//!         .on_completed(|| println!("closed")),
//! )?;
//!
//! let requests = call.requests();
//! requests.send(message)?;
//! requests.close()?;
//! ```
//!
//! Two sharp edges are deliberate and fail fast or loudly rather than
//! buffering:
//!
//! - Server-streaming calls are issued at dispatch; inbound events arriving
//!   before `start()` are dropped, never queued or replayed.
//! - Client- and bidi-streaming requests sent before `start()` fail with
//!   [`CallError::NotStarted`]; the outbound stream does not exist yet.
//!
//! ## Result callbacks
//!
//! Any future-shaped result can be consumed through a filterable callback
//! executed on a caller-chosen context:
//!
//! ```ignore
//! use callbridge::{attach, ResultCallback, TokioExecutor};
//!
//! attach(
//!     handle.call_future(|channel| service.get_user(channel, &request)),
//!     &TokioExecutor,
//!     ResultCallback::new()
//!         .on_success(|response| println!("user: {:?}", *response))
//!         .on_error(|e| eprintln!("failed: {e}"))
//!         .ignore_error_if(|| shutting_down()),
//! );
//! ```

mod call;
mod callback;
mod error;
mod longrunning;
mod options;
mod response;
mod streaming;
mod transport;

pub use call::{CallHandle, ResponseFuture};
pub use callback::{BoxTask, Executor, InlineExecutor, ResultCallback, TokioExecutor, attach};
pub use error::CallError;
pub use longrunning::{LongRunningCall, RawOperation};
pub use options::{CallOptions, CallOptionsBuilder};
pub use response::{CallResponse, ResponseMetadata};
pub use streaming::{
    BidiStreamingCall, ClientStreamingCall, RequestSink, ResponseObserver, ServerStreamingCall,
    StreamCallbacks,
};
pub use transport::{CallCredentials, StreamObserver, TransportHandle};

// Re-export the core vocabulary so callers need a single dependency
pub use callbridge_core::{
    Code, ErrorDetail, MetadataMap, OperationEnvelope, OperationResult, Status,
};
