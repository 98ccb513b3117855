//! Long-running operation call handles.
//!
//! A long-running call resolves to an
//! [`OperationEnvelope`](callbridge_core::OperationEnvelope) rather than a
//! plain response. [`LongRunningCall`] wraps the envelope future: awaiting it
//! yields the decoded typed response of a terminal envelope, while the raw
//! envelope stays synchronously inspectable through [`RawOperation`] for
//! callers needing low-level introspection.
//!
//! Polling an unfinished operation to completion is not handled here; this
//! layer only decodes a terminal envelope.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll, ready};

use callbridge_core::OperationEnvelope;
use prost::Message;

use crate::error::CallError;
use crate::response::{CallResponse, ResponseMetadata};

/// Shared, synchronously-readable view of the raw operation envelope.
///
/// Empty until the envelope future resolves; set exactly once.
#[derive(Clone, Debug, Default)]
pub struct RawOperation {
    inner: Arc<OnceLock<OperationEnvelope>>,
}

impl RawOperation {
    /// Get the raw envelope, if it has been observed yet.
    pub fn get(&self) -> Option<&OperationEnvelope> {
        self.inner.get()
    }
}

pin_project_lite::pin_project! {
    /// Future of a long-running call's decoded result.
    ///
    /// Resolves to `CallResponse<Res>` once the envelope future completes
    /// with a terminal envelope carrying a response payload. An envelope
    /// carrying an error fails the future with that status; a non-terminal
    /// envelope fails it with [`CallError::Incomplete`]. In every case the
    /// raw envelope is retained and reachable via [`LongRunningCall::raw`].
    pub struct LongRunningCall<F, Res> {
        #[pin]
        inner: F,
        raw: RawOperation,
        _response: PhantomData<fn() -> Res>,
    }
}

impl<F, Res> LongRunningCall<F, Res> {
    pub(crate) fn new(inner: F) -> Self {
        Self {
            inner,
            raw: RawOperation::default(),
            _response: PhantomData,
        }
    }

    /// Get a clonable handle to the raw envelope, usable while (and after)
    /// the future is awaited elsewhere.
    pub fn raw(&self) -> RawOperation {
        self.raw.clone()
    }
}

impl<F, Res> Future for LongRunningCall<F, Res>
where
    F: Future<Output = Result<OperationEnvelope, CallError>>,
    Res: Message + Default,
{
    type Output = Result<CallResponse<Res>, CallError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let envelope = match ready!(this.inner.poll(cx)) {
            Ok(envelope) => envelope,
            Err(e) => return Poll::Ready(Err(e)),
        };

        // Retain the raw envelope before interpreting it
        let _ = this.raw.inner.set(envelope.clone());

        if !envelope.done() {
            return Poll::Ready(Err(CallError::Incomplete(envelope.name().to_string())));
        }
        if let Some(status) = envelope.error() {
            return Poll::Ready(Err(CallError::Status(status.clone())));
        }
        let result = envelope
            .decode_response::<Res>()
            .map(|response| CallResponse::new(response, ResponseMetadata::empty()))
            .map_err(|status| CallError::Decode(status.to_string()));
        Poll::Ready(result)
    }
}
