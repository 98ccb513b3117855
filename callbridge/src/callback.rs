//! Filterable callbacks for future-shaped results.
//!
//! [`attach`] subscribes a [`ResultCallback`] to any future-shaped result and
//! runs it on a caller-chosen [`Executor`]. Success and error handlers are
//! both optional, and three optional predicates can suppress dispatch; every
//! predicate is evaluated at completion time, never at attachment time.

use std::future::Future;
use std::pin::Pin;

/// A boxed task handed to an [`Executor`].
pub type BoxTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A minimal execution context for callback dispatch.
///
/// The dispatch layer owns no thread pool; the caller picks where callbacks
/// run by supplying an executor to [`attach`].
pub trait Executor {
    /// Run a task to completion.
    fn execute(&self, task: BoxTask);
}

/// Executor that spawns each task onto the current tokio runtime.
///
/// # Panics
///
/// Panics if used outside a tokio runtime context, like `tokio::spawn`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn execute(&self, task: BoxTask) {
        tokio::spawn(task);
    }
}

/// Executor that drives each task to completion on the calling thread.
///
/// Useful in tests and in synchronous callers; do not use from within an
/// async context, where blocking the thread can deadlock the runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: BoxTask) {
        futures::executor::block_on(task);
    }
}

type Predicate = Box<dyn Fn() -> bool + Send>;

/// A filterable success/error subscription.
///
/// # Example
///
/// ```
/// use callbridge::{attach, CallError, InlineExecutor, ResultCallback};
///
/// let future = async { Ok::<_, CallError>(41) };
/// attach(
///     future,
///     &InlineExecutor,
///     ResultCallback::new()
///         .on_success(|n| assert_eq!(n, 41))
///         .on_error(|e| panic!("unexpected: {e}")),
/// );
/// ```
pub struct ResultCallback<T, E> {
    on_success: Option<Box<dyn FnOnce(T) + Send>>,
    on_error: Option<Box<dyn FnOnce(E) + Send>>,
    ignore_if: Option<Predicate>,
    ignore_result_if: Option<Predicate>,
    ignore_error_if: Option<Predicate>,
}

impl<T, E> Default for ResultCallback<T, E> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            ignore_if: None,
            ignore_result_if: None,
            ignore_error_if: None,
        }
    }
}

impl<T, E> ResultCallback<T, E> {
    /// Create an empty callback; every branch is a no-op until set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handler invoked on successful completion.
    pub fn on_success(mut self, f: impl FnOnce(T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Set the handler invoked on failed completion.
    pub fn on_error(mut self, f: impl FnOnce(E) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Suppress both handlers when the predicate holds at completion time.
    pub fn ignore_if(mut self, predicate: impl Fn() -> bool + Send + 'static) -> Self {
        self.ignore_if = Some(Box::new(predicate));
        self
    }

    /// Suppress the success handler when the predicate holds at completion
    /// time. The error handler is unaffected.
    pub fn ignore_result_if(mut self, predicate: impl Fn() -> bool + Send + 'static) -> Self {
        self.ignore_result_if = Some(Box::new(predicate));
        self
    }

    /// Suppress the error handler when the predicate holds at completion
    /// time. The success handler is unaffected.
    pub fn ignore_error_if(mut self, predicate: impl Fn() -> bool + Send + 'static) -> Self {
        self.ignore_error_if = Some(Box::new(predicate));
        self
    }

    fn dispatch(self, outcome: Result<T, E>) {
        let ignored = self.ignore_if.map(|p| p()).unwrap_or(false);
        match outcome {
            Ok(value) => {
                if ignored || self.ignore_result_if.map(|p| p()).unwrap_or(false) {
                    return;
                }
                if let Some(f) = self.on_success {
                    f(value);
                }
            }
            Err(error) => {
                if ignored || self.ignore_error_if.map(|p| p()).unwrap_or(false) {
                    return;
                }
                if let Some(f) = self.on_error {
                    f(error);
                }
            }
        }
    }
}

/// Subscribe a [`ResultCallback`] to a future, dispatching on `executor`
/// when the future completes.
pub fn attach<F, T, E, Ex>(future: F, executor: &Ex, callback: ResultCallback<T, E>)
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    Ex: Executor + ?Sized,
{
    executor.execute(Box::pin(async move {
        callback.dispatch(future.await);
    }));
}
