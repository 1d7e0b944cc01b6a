use std::collections::{HashMap, hash_map::Entry};

use slt_core::{RequestId, RequestResponse};
use tokio::sync::oneshot;

use crate::ClientError;

/// Outcome delivered to the caller waiting on a request.
pub type Outcome = Result<RequestResponse, ClientError>;
/// Receiving half handed to the caller of a registered request.
pub type ResponseReceiver = oneshot::Receiver<Outcome>;

/// One in-flight request awaiting its response frame.
struct PendingRequest {
    /// Logical request type, used in failure messages.
    request_type: String,
    /// Single-use completion handle.
    completion: oneshot::Sender<Outcome>,
}

/// Matches inbound responses to outbound requests by request id.
///
/// Every registered entry leaves the map exactly once: through
/// [`Correlator::complete`], [`Correlator::cancel`] or [`Correlator::fail_all`].
#[derive(Default)]
pub struct Correlator {
    pending: HashMap<RequestId, PendingRequest>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new in-flight request and returns the handle its outcome is
    /// delivered on.
    pub fn register(
        &mut self,
        id: RequestId,
        request_type: impl Into<String>,
    ) -> Result<ResponseReceiver, ClientError> {
        match self.pending.entry(id) {
            Entry::Occupied(entry) => Err(ClientError::DuplicateRequestId(entry.key().0.clone())),
            Entry::Vacant(entry) => {
                let (completion, receiver) = oneshot::channel();
                entry.insert(PendingRequest {
                    request_type: request_type.into(),
                    completion,
                });
                Ok(receiver)
            }
        }
    }

    /// Resolves the request matching `response`. Returns `false` without any
    /// other effect when no request is pending under that id.
    pub fn complete(&mut self, response: RequestResponse) -> bool {
        let Some(pending) = self.pending.remove(&response.request_id) else {
            tracing::debug!(
                request_id = %response.request_id,
                request_type = %response.request_type,
                "dropping unmatched response"
            );
            return false;
        };

        let outcome = if response.request_status.result {
            Ok(response)
        } else {
            Err(ClientError::RequestFailed {
                request_type: pending.request_type,
                code: response.request_status.code,
                comment: response.request_status.comment,
            })
        };

        // the caller may already have given up on the request
        let _ = pending.completion.send(outcome);
        true
    }

    /// Removes a pending request without resolving it.
    pub fn cancel(&mut self, id: &RequestId) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Rejects every pending request, building one error per entry.
    pub fn fail_all(&mut self, mut error: impl FnMut() -> ClientError) -> usize {
        let drained = self.pending.len();
        for (id, pending) in self.pending.drain() {
            tracing::debug!(request_id = %id, request_type = %pending.request_type, "rejecting pending request");
            let _ = pending.completion.send(Err(error()));
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use slt_core::{RequestId, RequestResponse, RequestStatus};
    use tokio::sync::oneshot::error::TryRecvError;

    use super::Correlator;
    use crate::ClientError;

    fn response(id: &str, request_type: &str, status: RequestStatus) -> RequestResponse {
        RequestResponse {
            request_type: request_type.to_string(),
            request_id: RequestId::from(id),
            request_status: status,
            response_data: Some(json!({ "items": [] })),
        }
    }

    fn ok() -> RequestStatus {
        RequestStatus {
            result: true,
            code: 100,
            comment: None,
        }
    }

    #[test]
    fn successful_response_resolves_and_removes_entry() {
        let mut correlator = Correlator::new();
        let mut rx = correlator
            .register(RequestId::from("req_1_0"), "ListItems")
            .expect("register");
        assert_eq!(correlator.len(), 1);

        assert!(correlator.complete(response("req_1_0", "ListItems", ok())));
        assert!(correlator.is_empty());

        let resolved = rx.try_recv().expect("outcome delivered").expect("success");
        assert_eq!(resolved.request_id, RequestId::from("req_1_0"));
    }

    #[test]
    fn failed_status_rejects_with_type_code_and_comment() {
        let mut correlator = Correlator::new();
        let mut rx = correlator
            .register(RequestId::from("x"), "ToggleVisible")
            .expect("register");

        let failed = RequestStatus {
            result: false,
            code: 500,
            comment: Some("not found".to_string()),
        };
        assert!(correlator.complete(response("x", "CallVendorRequest", failed)));

        let err = rx
            .try_recv()
            .expect("outcome delivered")
            .expect_err("failure status must reject");
        assert!(matches!(err, ClientError::RequestFailed { code: 500, .. }));
        assert!(
            err.to_string().contains("ToggleVisible failed: 500 not found"),
            "got {err}"
        );
    }

    #[test]
    fn unmatched_response_has_no_effect() {
        let mut correlator = Correlator::new();
        let mut rx = correlator
            .register(RequestId::from("a"), "GetVisible")
            .expect("register");

        assert!(!correlator.complete(response("b", "GetVisible", ok())));
        assert_eq!(correlator.len(), 1);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn duplicate_response_is_dropped_after_first() {
        let mut correlator = Correlator::new();
        let mut rx = correlator
            .register(RequestId::from("a"), "GetVisible")
            .expect("register");

        assert!(correlator.complete(response("a", "GetVisible", ok())));
        assert!(!correlator.complete(response("a", "GetVisible", ok())));
        assert!(rx.try_recv().expect("first outcome").is_ok());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut correlator = Correlator::new();
        let _rx = correlator
            .register(RequestId::from("a"), "GetVisible")
            .expect("register");

        let err = correlator
            .register(RequestId::from("a"), "GetVisible")
            .expect_err("same id twice");
        assert!(matches!(err, ClientError::DuplicateRequestId(id) if id == "a"));
        assert_eq!(correlator.len(), 1);
    }

    #[test]
    fn cancel_removes_entry_and_closes_receiver() {
        let mut correlator = Correlator::new();
        let mut rx = correlator
            .register(RequestId::from("a"), "GetVisible")
            .expect("register");

        assert!(correlator.cancel(&RequestId::from("a")));
        assert!(!correlator.cancel(&RequestId::from("a")));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Closed)));
    }

    #[test]
    fn fail_all_rejects_every_pending_request() {
        let mut correlator = Correlator::new();
        let mut receivers: Vec<_> = (0..3)
            .map(|n| {
                correlator
                    .register(RequestId(format!("req_{n}")), "GetVisible")
                    .expect("register")
            })
            .collect();

        assert_eq!(correlator.fail_all(|| ClientError::ChannelClosed), 3);
        assert!(correlator.is_empty());

        for rx in &mut receivers {
            let outcome = rx.try_recv().expect("outcome delivered");
            assert!(matches!(outcome, Err(ClientError::ChannelClosed)));
        }
    }

    #[test]
    fn completion_after_caller_gave_up_is_harmless() {
        let mut correlator = Correlator::new();
        let rx = correlator
            .register(RequestId::from("a"), "GetVisible")
            .expect("register");
        drop(rx);

        assert!(correlator.complete(response("a", "GetVisible", ok())));
        assert!(correlator.is_empty());
    }
}
