//! Call dispatch error types.
//!
//! This module provides [`CallError`], the error type surfaced to callers for
//! every call shape.

use callbridge_core::{Code, Status};

/// Errors surfaced by the call dispatch layer.
///
/// Remote failures travel as [`Status`] values; the remaining variants are
/// local usage or decoding faults. The dispatch layer performs no retries and
/// no recovery: every failure is delivered once, at the caller's chosen
/// consumption point.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CallError {
    /// A status reported by the transport or carried by an operation envelope.
    #[error(transparent)]
    Status(#[from] Status),

    /// Transport-level failure outside the status space (connection lost,
    /// channel closed, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// A request was sent on a streaming handle before `start()`.
    ///
    /// The outbound half of the stream does not exist until the handle is
    /// started; sending fails loudly instead of queueing silently.
    #[error("stream not started: call start() before sending requests")]
    NotStarted,

    /// `start()` was called twice on the same streaming handle.
    #[error("stream already started")]
    AlreadyStarted,

    /// An operation envelope payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A long-running operation envelope was observed before completion.
    #[error("operation '{0}' has not completed")]
    Incomplete(String),
}

impl CallError {
    /// Get the status code for this error.
    ///
    /// For non-Status variants, returns an appropriate code:
    /// - Transport: `Unavailable`
    /// - NotStarted / AlreadyStarted / Incomplete: `FailedPrecondition`
    /// - Decode: `Internal`
    pub fn code(&self) -> Code {
        match self {
            CallError::Status(status) => status.code(),
            CallError::Transport(_) => Code::Unavailable,
            CallError::NotStarted | CallError::AlreadyStarted | CallError::Incomplete(_) => {
                Code::FailedPrecondition
            }
            CallError::Decode(_) => Code::Internal,
        }
    }

    /// Returns whether this error indicates a transient condition that may
    /// be resolved by retrying.
    ///
    /// This is a convenience wrapper for [`Code::is_retryable()`]; the
    /// dispatch layer itself never retries.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}
