//! Long-running operation envelopes.
//!
//! A long-running call resolves to an [`OperationEnvelope`]: a named
//! completion record carrying either the encoded response payload or an
//! error [`Status`]. The dispatch layer decodes terminal envelopes; polling a
//! non-terminal operation to completion is a collaborator's job.

use bytes::Bytes;
use prost::Message;

use crate::{Code, Status};

/// The terminal outcome carried by a completed envelope.
#[derive(Clone, Debug)]
pub enum OperationResult {
    /// Encoded response payload of a successful operation.
    Response(Bytes),
    /// Error descriptor of a failed operation.
    Error(Status),
}

/// Completion record of a long-running operation.
///
/// Mirrors the operation resource a transport polls or receives pushed:
/// a server-assigned name, a `done` flag, and - once done - exactly one of a
/// response payload or an error status.
///
/// # Example
///
/// ```
/// use callbridge_core::OperationEnvelope;
/// use bytes::Bytes;
///
/// let envelope = OperationEnvelope::completed("ops/42", Bytes::new());
/// assert!(envelope.done());
/// assert!(envelope.error().is_none());
/// ```
#[derive(Clone, Debug)]
pub struct OperationEnvelope {
    name: String,
    done: bool,
    result: Option<OperationResult>,
}

impl OperationEnvelope {
    /// Create an envelope for an operation that is still running.
    pub fn pending<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            done: false,
            result: None,
        }
    }

    /// Create a terminal envelope with a successful response payload.
    pub fn completed<S: Into<String>>(name: S, payload: Bytes) -> Self {
        Self {
            name: name.into(),
            done: true,
            result: Some(OperationResult::Response(payload)),
        }
    }

    /// Create a terminal envelope with an error descriptor.
    pub fn failed<S: Into<String>>(name: S, status: Status) -> Self {
        Self {
            name: name.into(),
            done: true,
            result: Some(OperationResult::Error(status)),
        }
    }

    /// The server-assigned operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the operation has reached a terminal state.
    pub fn done(&self) -> bool {
        self.done
    }

    /// The terminal outcome, if any.
    pub fn result(&self) -> Option<&OperationResult> {
        self.result.as_ref()
    }

    /// The error descriptor of a failed operation.
    pub fn error(&self) -> Option<&Status> {
        match &self.result {
            Some(OperationResult::Error(status)) => Some(status),
            _ => None,
        }
    }

    /// The encoded response payload of a successful operation.
    pub fn response(&self) -> Option<&Bytes> {
        match &self.result {
            Some(OperationResult::Response(payload)) => Some(payload),
            _ => None,
        }
    }

    /// Decode the response payload of a terminal, successful envelope.
    ///
    /// Fails with the envelope's own error if the operation failed, with
    /// [`Code::FailedPrecondition`] if the operation is not done, and with
    /// [`Code::Internal`] if the payload does not decode as `T`.
    pub fn decode_response<T>(&self) -> Result<T, Status>
    where
        T: Message + Default,
    {
        if !self.done {
            return Err(Status::new(
                Code::FailedPrecondition,
                format!("operation '{}' has not completed", self.name),
            ));
        }
        match &self.result {
            Some(OperationResult::Error(status)) => Err(status.clone()),
            Some(OperationResult::Response(payload)) => {
                T::decode(payload.clone()).map_err(|e| {
                    Status::internal(format!("operation response decoding failed: {}", e))
                })
            }
            None => Err(Status::internal(format!(
                "operation '{}' is done but carries no result",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal prost message for payload decode tests
    #[derive(Clone, PartialEq, prost::Message)]
    struct TestPayload {
        #[prost(string, tag = "1")]
        value: String,
    }

    #[test]
    fn test_pending_envelope() {
        let envelope = OperationEnvelope::pending("ops/1");
        assert_eq!(envelope.name(), "ops/1");
        assert!(!envelope.done());
        assert!(envelope.result().is_none());
        assert!(envelope.error().is_none());
        assert!(envelope.response().is_none());
    }

    #[test]
    fn test_decode_response_roundtrip() {
        let payload = TestPayload {
            value: "hello".to_string(),
        };
        let envelope =
            OperationEnvelope::completed("ops/2", Bytes::from(payload.encode_to_vec()));

        let decoded: TestPayload = envelope.decode_response().unwrap();
        assert_eq!(decoded.value, "hello");
    }

    #[test]
    fn test_decode_response_not_done() {
        let envelope = OperationEnvelope::pending("ops/3");
        let err = envelope.decode_response::<TestPayload>().unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
    }

    #[test]
    fn test_decode_response_surfaces_operation_error() {
        let envelope = OperationEnvelope::failed("ops/4", Status::not_found("gone"));
        let err = envelope.decode_response::<TestPayload>().unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(err.message(), Some("gone"));
    }

    #[test]
    fn test_decode_response_garbage_payload() {
        // 0xff is not a valid field tag, so decoding must fail
        let envelope =
            OperationEnvelope::completed("ops/5", Bytes::from_static(&[0xff, 0xff, 0xff]));
        let err = envelope.decode_response::<TestPayload>().unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }
}
