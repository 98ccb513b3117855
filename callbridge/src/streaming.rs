//! Streaming call handles and the push-to-pull bridge behind them.
//!
//! The transport pushes inbound events through a [`ResponseObserver`] on its
//! own delivery thread; consumers register a [`StreamCallbacks`] set and gate
//! delivery with an explicit `start()`. The bridge in between guarantees that
//! every event arriving while the stream is active reaches the currently
//! registered callback exactly once and in arrival order, and that events
//! arriving before `start()` are discarded, never replayed.
//!
//! # Starting and the pre-start window
//!
//! Server-streaming calls are issued as a side effect of dispatch, so the
//! remote side may emit before the consumer has registered callbacks. There
//! is no internal buffer: those events are dropped. Call
//! [`ServerStreamingCall::start`] before the remote side can usefully begin
//! emitting, or the early messages are lost (see
//! [`ServerStreamingCall::discarded`]).
//!
//! Client- and bidi-streaming calls defer the transport operation until
//! `start()`, so no pre-start inbound window exists; instead the outbound
//! half does not exist before `start()` and [`RequestSink::send`] fails with
//! [`CallError::NotStarted`] rather than queueing silently.

use std::sync::{Arc, Mutex, MutexGuard};

use callbridge_core::Status;
use tokio::sync::oneshot;

use crate::error::CallError;
use crate::response::{CallResponse, ResponseMetadata};
use crate::transport::StreamObserver;

type NextFn<T> = Arc<dyn Fn(T) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(Status) + Send + Sync>;
type CompletedFn = Arc<dyn Fn() + Send + Sync>;

/// A registrable triple of stream event callbacks.
///
/// Any subset may be set; a missing callback is a no-op branch for that event
/// kind.
///
/// # Example
///
/// ```
/// use callbridge::StreamCallbacks;
///
/// let callbacks = StreamCallbacks::<String>::new()
///     .on_next(|message| println!("got {message}"))
///     .on_error(|status| eprintln!("failed: {status}"))
///     .on_completed(|| println!("done"));
/// ```
pub struct StreamCallbacks<T> {
    on_next: Option<NextFn<T>>,
    on_error: Option<ErrorFn>,
    on_completed: Option<CompletedFn>,
}

impl<T> Default for StreamCallbacks<T> {
    fn default() -> Self {
        Self {
            on_next: None,
            on_error: None,
            on_completed: None,
        }
    }
}

impl<T> Clone for StreamCallbacks<T> {
    fn clone(&self) -> Self {
        Self {
            on_next: self.on_next.clone(),
            on_error: self.on_error.clone(),
            on_completed: self.on_completed.clone(),
        }
    }
}

impl<T> StreamCallbacks<T> {
    /// Create an empty callback set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the callback invoked for each inbound message.
    pub fn on_next(mut self, f: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.on_next = Some(Arc::new(f));
        self
    }

    /// Set the callback invoked when the stream terminates with an error.
    pub fn on_error(mut self, f: impl Fn(Status) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Set the callback invoked when the stream completes normally.
    pub fn on_completed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Arc::new(f));
        self
    }
}

/// Stream lifecycle: CREATED -> ACTIVE -> TERMINAL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Created,
    Active,
    Terminal,
}

struct BridgeInner<T> {
    phase: Phase,
    callbacks: StreamCallbacks<T>,
    discarded: u64,
}

/// Push-to-pull adapter between the transport's observer and the consumer's
/// callback set.
///
/// Phase and callbacks live behind one mutex; delivery clones the registered
/// callback under the lock and invokes it outside, so user callbacks never
/// run in the critical section. Arrival order is preserved for the serial
/// delivery the transport contract promises.
pub(crate) struct StreamBridge<T> {
    inner: Arc<Mutex<BridgeInner<T>>>,
}

impl<T> Clone for StreamBridge<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> StreamBridge<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BridgeInner {
                phase: Phase::Created,
                callbacks: StreamCallbacks::new(),
                discarded: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BridgeInner<T>> {
        self.inner.lock().unwrap()
    }

    /// The observer handed to the transport operation.
    pub(crate) fn observer(&self) -> ResponseObserver<T> {
        ResponseObserver {
            bridge: self.clone(),
        }
    }

    /// Switch delivery from "discarded" to "dispatched", optionally
    /// installing a callback set in the same critical section.
    ///
    /// Rejects a second activation: re-running the transport operation would
    /// issue a second call.
    pub(crate) fn activate(&self, callbacks: Option<StreamCallbacks<T>>) -> Result<(), CallError> {
        let mut inner = self.lock();
        if inner.phase != Phase::Created {
            return Err(CallError::AlreadyStarted);
        }
        if let Some(callbacks) = callbacks {
            inner.callbacks = callbacks;
        }
        inner.phase = Phase::Active;
        Ok(())
    }

    /// Replace the registered callback set.
    ///
    /// Legal in any phase; registration after the terminal event simply
    /// never fires.
    pub(crate) fn set_callbacks(&self, callbacks: StreamCallbacks<T>) {
        self.lock().callbacks = callbacks;
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.lock().phase == Phase::Terminal
    }

    /// Number of events discarded before activation.
    pub(crate) fn discarded(&self) -> u64 {
        self.lock().discarded
    }

    fn discard(inner: &mut BridgeInner<T>, kind: &'static str) {
        inner.discarded += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            event = kind,
            total = inner.discarded,
            "discarding stream event received before start()"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = kind;
    }

    fn deliver_next(&self, message: T) {
        let callback = {
            let mut inner = self.lock();
            match inner.phase {
                Phase::Created => {
                    Self::discard(&mut inner, "message");
                    None
                }
                Phase::Active => inner.callbacks.on_next.clone(),
                Phase::Terminal => None,
            }
        };
        if let Some(f) = callback {
            f(message);
        }
    }

    fn deliver_error(&self, status: Status) {
        let callback = {
            let mut inner = self.lock();
            match inner.phase {
                Phase::Created => {
                    Self::discard(&mut inner, "error");
                    None
                }
                Phase::Active => {
                    inner.phase = Phase::Terminal;
                    inner.callbacks.on_error.clone()
                }
                Phase::Terminal => None,
            }
        };
        if let Some(f) = callback {
            f(status);
        }
    }

    fn deliver_completed(&self) {
        let callback = {
            let mut inner = self.lock();
            match inner.phase {
                Phase::Created => {
                    Self::discard(&mut inner, "completed");
                    None
                }
                Phase::Active => {
                    inner.phase = Phase::Terminal;
                    inner.callbacks.on_completed.clone()
                }
                Phase::Terminal => None,
            }
        };
        if let Some(f) = callback {
            f();
        }
    }
}

/// The inbound half handed to a transport operation.
///
/// The transport pushes each inbound stream event through this handle from
/// its own delivery thread. Events delivered after the terminal event, or
/// before the stream is started, are ignored or discarded per the bridge
/// rules above.
pub struct ResponseObserver<T> {
    bridge: StreamBridge<T>,
}

impl<T> Clone for ResponseObserver<T> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
        }
    }
}

impl<T> ResponseObserver<T> {
    /// Push the next inbound message.
    pub fn on_next(&self, message: T) {
        self.bridge.deliver_next(message);
    }

    /// Terminate the stream with an error. Delivered at most once.
    pub fn on_error(&self, status: Status) {
        self.bridge.deliver_error(status);
    }

    /// Terminate the stream normally. Delivered at most once.
    pub fn on_completed(&self) {
        self.bridge.deliver_completed();
    }
}

impl<T: Send> StreamObserver<T> for ResponseObserver<T> {
    fn on_next(&mut self, message: T) -> Result<(), Status> {
        self.bridge.deliver_next(message);
        Ok(())
    }

    fn on_error(&mut self, status: Status) {
        self.bridge.deliver_error(status);
    }

    fn on_completed(&mut self) {
        self.bridge.deliver_completed();
    }
}

/// The caller-facing outbound half of a client- or bidi-streaming call.
///
/// The underlying observer exists only once the call is started; until then
/// every operation fails with [`CallError::NotStarted`].
pub struct RequestSink<Req> {
    outbound: Arc<Mutex<Option<Box<dyn StreamObserver<Req>>>>>,
}

impl<Req> Clone for RequestSink<Req> {
    fn clone(&self) -> Self {
        Self {
            outbound: self.outbound.clone(),
        }
    }
}

impl<Req> RequestSink<Req> {
    pub(crate) fn new() -> Self {
        Self {
            outbound: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn install(&self, observer: Box<dyn StreamObserver<Req>>) {
        *self.outbound.lock().unwrap() = Some(observer);
    }

    /// Send a request message to the remote side.
    ///
    /// # Errors
    ///
    /// [`CallError::NotStarted`] if the call has not been started, or the
    /// transport's status if the outbound observer rejects the message.
    pub fn send(&self, message: Req) -> Result<(), CallError> {
        let mut outbound = self.outbound.lock().unwrap();
        match outbound.as_mut() {
            None => Err(CallError::NotStarted),
            Some(observer) => observer.on_next(message).map_err(CallError::from),
        }
    }

    /// Signal that no further requests will be sent (half-close).
    ///
    /// # Errors
    ///
    /// [`CallError::NotStarted`] if the call has not been started.
    pub fn close(&self) -> Result<(), CallError> {
        let mut outbound = self.outbound.lock().unwrap();
        match outbound.as_mut() {
            None => Err(CallError::NotStarted),
            Some(observer) => {
                observer.on_completed();
                Ok(())
            }
        }
    }
}

/// Deferred transport operation for client- and bidi-streaming calls, with
/// the configured transport handle already captured.
pub(crate) type StreamingOp<Req, Res> =
    Box<dyn FnOnce(ResponseObserver<Res>) -> Box<dyn StreamObserver<Req>> + Send>;

/// Handle for a server-streaming call.
///
/// The call is already in flight when this handle is returned; events pushed
/// by the transport before [`start`](Self::start) are dropped.
///
/// # Example
///
/// ```ignore
/// let call = handle.call_server_stream(|channel, observer| {
///     service.watch(channel, &request, observer);
/// });
///
/// call.start(
///     StreamCallbacks::new()
///         .on_next(|event| println!("{event:?}"))
///         .on_completed(|| println!("watch closed")),
/// )?;
/// ```
pub struct ServerStreamingCall<Res> {
    bridge: StreamBridge<Res>,
}

impl<Res> ServerStreamingCall<Res> {
    pub(crate) fn new(bridge: StreamBridge<Res>) -> Self {
        Self { bridge }
    }

    /// Register callbacks and switch delivery on.
    ///
    /// # Errors
    ///
    /// [`CallError::AlreadyStarted`] on a second start.
    pub fn start(&self, callbacks: StreamCallbacks<Res>) -> Result<(), CallError> {
        self.bridge.activate(Some(callbacks))
    }

    /// Replace the registered callback set.
    ///
    /// Legal before or during the stream; after the terminal event the new
    /// callbacks simply never fire. An event racing a reassignment is
    /// delivered to exactly one of the two callback sets.
    pub fn set_responses(&self, callbacks: StreamCallbacks<Res>) {
        self.bridge.set_callbacks(callbacks);
    }

    /// Whether the stream has reached its terminal state.
    pub fn is_terminal(&self) -> bool {
        self.bridge.is_terminal()
    }

    /// Number of events dropped because they arrived before
    /// [`start`](Self::start).
    pub fn discarded(&self) -> u64 {
        self.bridge.discarded()
    }
}

/// Handle for a client-streaming call.
///
/// [`start`](Self::start) performs the transport call; requests then flow
/// through [`requests`](Self::requests) and the single aggregated response is
/// awaited via [`response`](Self::response).
pub struct ClientStreamingCall<Req, Res> {
    requests: RequestSink<Req>,
    op: Mutex<Option<StreamingOp<Req, Res>>>,
    bridge: StreamBridge<Res>,
    response: oneshot::Receiver<Result<Res, Status>>,
}

impl<Req, Res> ClientStreamingCall<Req, Res>
where
    Res: Send + 'static,
{
    pub(crate) fn new(op: StreamingOp<Req, Res>) -> Self {
        let bridge = StreamBridge::new();
        let (tx, rx) = oneshot::channel();

        // Aggregate the inbound side down to one response: exactly one
        // message followed by completion. Anything else is a broken remote.
        let tx = Arc::new(Mutex::new(Some(tx)));
        let slot: Arc<Mutex<Option<Res>>> = Arc::new(Mutex::new(None));
        let resolve = move |tx: &Arc<Mutex<Option<oneshot::Sender<Result<Res, Status>>>>>,
                            result: Result<Res, Status>| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(result);
            }
        };

        let callbacks = StreamCallbacks::new()
            .on_next({
                let tx = tx.clone();
                let slot = slot.clone();
                let resolve = resolve.clone();
                move |message| {
                    let mut slot = slot.lock().unwrap();
                    if slot.is_some() {
                        resolve(
                            &tx,
                            Err(Status::internal(
                                "more than one response message on a client-streaming call",
                            )),
                        );
                    } else {
                        *slot = Some(message);
                    }
                }
            })
            .on_error({
                let tx = tx.clone();
                let resolve = resolve.clone();
                move |status| resolve(&tx, Err(status))
            })
            .on_completed({
                let tx = tx.clone();
                move || {
                    let result = match slot.lock().unwrap().take() {
                        Some(message) => Ok(message),
                        None => Err(Status::internal(
                            "stream completed without a response message",
                        )),
                    };
                    resolve(&tx, result);
                }
            });
        bridge.set_callbacks(callbacks);

        Self {
            requests: RequestSink::new(),
            op: Mutex::new(Some(op)),
            bridge,
            response: rx,
        }
    }

    /// Get a clonable handle to the outbound request half.
    pub fn requests(&self) -> RequestSink<Req> {
        self.requests.clone()
    }

    /// Perform the transport call and install the outbound observer.
    ///
    /// # Errors
    ///
    /// [`CallError::AlreadyStarted`] on a second start.
    pub fn start(&self) -> Result<(), CallError> {
        let Some(op) = self.op.lock().unwrap().take() else {
            return Err(CallError::AlreadyStarted);
        };
        self.bridge.activate(None)?;
        let outbound = op(self.bridge.observer());
        self.requests.install(outbound);
        Ok(())
    }

    /// Await the single aggregated response.
    ///
    /// # Errors
    ///
    /// [`CallError::NotStarted`] if the call was never started, the remote
    /// status if the stream terminated with an error, and an `Internal`
    /// status if the remote side sent zero or multiple response messages.
    pub async fn response(self) -> Result<CallResponse<Res>, CallError> {
        if self.op.lock().unwrap().is_some() {
            return Err(CallError::NotStarted);
        }
        match self.response.await {
            Ok(Ok(message)) => Ok(CallResponse::new(message, ResponseMetadata::empty())),
            Ok(Err(status)) => Err(CallError::Status(status)),
            Err(_) => Err(CallError::Transport(
                "stream dropped without a terminal event".into(),
            )),
        }
    }
}

/// Handle for a full bidirectional streaming call.
///
/// [`start`](Self::start) registers the response callbacks and performs the
/// transport call; requests then flow through [`requests`](Self::requests)
/// while responses arrive on the registered callbacks.
pub struct BidiStreamingCall<Req, Res> {
    requests: RequestSink<Req>,
    op: Mutex<Option<StreamingOp<Req, Res>>>,
    bridge: StreamBridge<Res>,
}

impl<Req, Res> BidiStreamingCall<Req, Res> {
    pub(crate) fn new(op: StreamingOp<Req, Res>) -> Self {
        Self {
            requests: RequestSink::new(),
            op: Mutex::new(Some(op)),
            bridge: StreamBridge::new(),
        }
    }

    /// Get a clonable handle to the outbound request half.
    pub fn requests(&self) -> RequestSink<Req> {
        self.requests.clone()
    }

    /// Register callbacks, perform the transport call, and install the
    /// outbound observer.
    ///
    /// # Errors
    ///
    /// [`CallError::AlreadyStarted`] on a second start.
    pub fn start(&self, callbacks: StreamCallbacks<Res>) -> Result<(), CallError> {
        let Some(op) = self.op.lock().unwrap().take() else {
            return Err(CallError::AlreadyStarted);
        };
        self.bridge.activate(Some(callbacks))?;
        let outbound = op(self.bridge.observer());
        self.requests.install(outbound);
        Ok(())
    }

    /// Replace the registered callback set (see
    /// [`ServerStreamingCall::set_responses`]).
    pub fn set_responses(&self, callbacks: StreamCallbacks<Res>) {
        self.bridge.set_callbacks(callbacks);
    }

    /// Whether the stream has reached its terminal state.
    pub fn is_terminal(&self) -> bool {
        self.bridge.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collecting_callbacks(
        received: Arc<Mutex<Vec<String>>>,
        errors: Arc<Mutex<Vec<Status>>>,
        completions: Arc<AtomicUsize>,
    ) -> StreamCallbacks<String> {
        StreamCallbacks::new()
            .on_next({
                let received = received.clone();
                move |message| received.lock().unwrap().push(message)
            })
            .on_error({
                let errors = errors.clone();
                move |status| errors.lock().unwrap().push(status)
            })
            .on_completed(move || {
                completions.fetch_add(1, Ordering::SeqCst);
            })
    }

    #[test]
    fn test_pre_start_events_are_dropped() {
        let bridge: StreamBridge<String> = StreamBridge::new();
        let observer = bridge.observer();

        observer.on_next("a".to_string());
        observer.on_next("b".to_string());

        let received = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(AtomicUsize::new(0));
        bridge
            .activate(Some(collecting_callbacks(
                received.clone(),
                errors.clone(),
                completions.clone(),
            )))
            .unwrap();

        // Dropped permanently, never replayed
        assert!(received.lock().unwrap().is_empty());
        assert_eq!(bridge.discarded(), 2);

        observer.on_next("c".to_string());
        assert_eq!(*received.lock().unwrap(), ["c"]);
    }

    #[test]
    fn test_delivery_preserves_arrival_order() {
        let bridge: StreamBridge<String> = StreamBridge::new();
        let observer = bridge.observer();

        let received = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(AtomicUsize::new(0));
        bridge
            .activate(Some(collecting_callbacks(
                received.clone(),
                errors,
                completions.clone(),
            )))
            .unwrap();

        observer.on_next("m1".to_string());
        observer.on_next("m2".to_string());
        observer.on_next("m3".to_string());
        observer.on_completed();

        assert_eq!(*received.lock().unwrap(), ["m1", "m2", "m3"]);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_terminal_is_delivered_exactly_once() {
        let bridge: StreamBridge<String> = StreamBridge::new();
        let observer = bridge.observer();

        let received = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(AtomicUsize::new(0));
        bridge
            .activate(Some(collecting_callbacks(
                received.clone(),
                errors.clone(),
                completions.clone(),
            )))
            .unwrap();

        observer.on_error(Status::unavailable("gone"));

        // Nothing after the terminal event is delivered
        observer.on_next("late".to_string());
        observer.on_error(Status::internal("again"));
        observer.on_completed();

        assert_eq!(errors.lock().unwrap().len(), 1);
        assert!(received.lock().unwrap().is_empty());
        assert_eq!(completions.load(Ordering::SeqCst), 0);
        assert!(bridge.is_terminal());
    }

    #[test]
    fn test_double_activate_is_rejected() {
        let bridge: StreamBridge<String> = StreamBridge::new();
        bridge.activate(None).unwrap();

        let err = bridge.activate(None).unwrap_err();
        assert!(matches!(err, CallError::AlreadyStarted));
    }

    #[test]
    fn test_callback_reassignment_mid_stream() {
        let bridge: StreamBridge<String> = StreamBridge::new();
        let observer = bridge.observer();

        let first = Arc::new(Mutex::new(Vec::new()));
        bridge
            .activate(Some(StreamCallbacks::new().on_next({
                let first = first.clone();
                move |message| first.lock().unwrap().push(message)
            })))
            .unwrap();

        observer.on_next("one".to_string());

        let second = Arc::new(Mutex::new(Vec::new()));
        bridge.set_callbacks(StreamCallbacks::new().on_next({
            let second = second.clone();
            move |message| second.lock().unwrap().push(message)
        }));

        observer.on_next("two".to_string());

        assert_eq!(*first.lock().unwrap(), ["one"]);
        assert_eq!(*second.lock().unwrap(), ["two"]);
    }

    #[test]
    fn test_registration_after_terminal_never_fires() {
        let bridge: StreamBridge<String> = StreamBridge::new();
        let observer = bridge.observer();
        bridge.activate(None).unwrap();
        observer.on_completed();

        let received = Arc::new(Mutex::new(Vec::new()));
        bridge.set_callbacks(StreamCallbacks::new().on_next({
            let received = received.clone();
            move |message: String| received.lock().unwrap().push(message)
        }));

        observer.on_next("late".to_string());
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_before_start_fails_for_every_message() {
        let sink: RequestSink<String> = RequestSink::new();

        for message in ["a", "b", "c"] {
            let err = sink.send(message.to_string()).unwrap_err();
            assert!(matches!(err, CallError::NotStarted));
        }
        assert!(matches!(sink.close().unwrap_err(), CallError::NotStarted));
    }

    #[test]
    fn test_sink_forwards_after_install() {
        struct Recorder(Arc<Mutex<Vec<String>>>, Arc<AtomicUsize>);

        impl StreamObserver<String> for Recorder {
            fn on_next(&mut self, message: String) -> Result<(), Status> {
                self.0.lock().unwrap().push(message);
                Ok(())
            }
            fn on_error(&mut self, _status: Status) {}
            fn on_completed(&mut self) {
                self.1.fetch_add(1, Ordering::SeqCst);
            }
        }

        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicUsize::new(0));
        let sink: RequestSink<String> = RequestSink::new();
        sink.install(Box::new(Recorder(sent.clone(), closed.clone())));

        sink.send("x".to_string()).unwrap();
        sink.send("y".to_string()).unwrap();
        sink.close().unwrap();

        assert_eq!(*sent.lock().unwrap(), ["x", "y"]);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
