//! Request/response correlation
//!
//! Every outbound request registers a one-shot completion under its id before
//! it is written. The receive loop resolves it when a response or error with
//! that id arrives. Each entry is resolved exactly once: by the reply, by the
//! timeout (which removes it, so a late reply finds nothing), or by
//! [`PendingCalls::cancel_all`] when the channel goes away.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use mcplink_protocol::{JsonRpcErrorResponse, JsonRpcRequest, JsonRpcResponse, RequestId};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{TransportError, TransportResult};

type Completion = oneshot::Sender<TransportResult<JsonRpcResponse>>;

#[derive(Debug, Default)]
struct Waiters {
    by_id: HashMap<RequestId, Completion>,
    closed: Option<String>,
}

/// Outstanding requests of one transport.
#[derive(Debug, Default)]
pub struct PendingCalls {
    inner: Mutex<Waiters>,
}

impl PendingCalls {
    /// An empty, open table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding requests
    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    /// `true` if nothing is outstanding
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if `id` is outstanding
    pub fn contains(&self, id: &RequestId) -> bool {
        self.inner.lock().by_id.contains_key(id)
    }

    /// Register a completion for `id`.
    ///
    /// Fails with `ConnectionClosed` once the table has been cancelled, and
    /// with `Internal` if `id` is already outstanding.
    pub fn register(
        &self,
        id: RequestId,
    ) -> TransportResult<oneshot::Receiver<TransportResult<JsonRpcResponse>>> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.closed {
            return Err(TransportError::ConnectionClosed(reason.clone()));
        }
        if inner.by_id.contains_key(&id) {
            return Err(TransportError::Internal(format!(
                "request id {id} is already outstanding"
            )));
        }
        let (tx, rx) = oneshot::channel();
        inner.by_id.insert(id, tx);
        Ok(rx)
    }

    /// Drop the entry for `id` without resolving it.
    pub fn forget(&self, id: &RequestId) -> bool {
        self.inner.lock().by_id.remove(id).is_some()
    }

    /// Resolve the caller waiting on `response.id`.
    ///
    /// Returns `false` when nobody is waiting (unknown id, timed out, or
    /// already resolved); the response is discarded.
    pub fn resolve_response(&self, response: JsonRpcResponse) -> bool {
        let id = response.id.clone();
        self.complete(&id, Ok(response))
    }

    /// Resolve the caller waiting on `error.id` with an `Rpc` error.
    pub fn resolve_error(&self, error: JsonRpcErrorResponse) -> bool {
        let Some(id) = error.id else {
            warn!(
                code = error.error.code,
                message = %error.error.message,
                "Error response without an id cannot be correlated"
            );
            return false;
        };
        self.complete(&id, Err(TransportError::from(error.error)))
    }

    fn complete(&self, id: &RequestId, outcome: TransportResult<JsonRpcResponse>) -> bool {
        let waiter = self.inner.lock().by_id.remove(id);
        match waiter {
            Some(tx) => {
                trace!(%id, "Resolving pending call");
                // The caller may have given up between removal and send.
                let _ = tx.send(outcome);
                true
            }
            None => {
                warn!(%id, "Discarding reply for unknown or expired request id");
                false
            }
        }
    }

    /// Fail every outstanding call with `ConnectionClosed` and refuse new ones.
    ///
    /// Returns how many calls were cancelled.
    pub fn cancel_all(&self, reason: impl Into<String>) -> usize {
        let reason = reason.into();
        let drained: Vec<_> = {
            let mut inner = self.inner.lock();
            inner.closed = Some(reason.clone());
            inner.by_id.drain().collect()
        };
        let count = drained.len();
        for (id, tx) in drained {
            trace!(%id, "Cancelling pending call");
            let _ = tx.send(Err(TransportError::ConnectionClosed(reason.clone())));
        }
        if count > 0 {
            debug!(count, %reason, "Cancelled pending calls");
        }
        count
    }

    /// Accept registrations again after a reconnect.
    pub fn reopen(&self) {
        self.inner.lock().closed = None;
    }

    /// Register `request`, run `transmit`, then wait up to `timeout` for the reply.
    ///
    /// The entry is removed on every exit path other than a normal resolution.
    /// A [`cancel_all`](Self::cancel_all) that lands while `transmit` is still
    /// blocked (a peer that stopped reading) abandons the write and returns
    /// `ConnectionClosed` at once.
    pub async fn exchange<F>(
        &self,
        request: &JsonRpcRequest,
        timeout: Duration,
        transmit: F,
    ) -> TransportResult<JsonRpcResponse>
    where
        F: Future<Output = TransportResult<()>>,
    {
        let mut rx = self.register(request.id.clone())?;

        tokio::pin!(transmit);
        let early = tokio::select! {
            biased;
            sent = &mut transmit => {
                if let Err(e) = sent {
                    self.forget(&request.id);
                    return Err(e);
                }
                None
            }
            outcome = &mut rx => Some(outcome),
        };

        match early {
            Some(Ok(Ok(response))) => {
                // Reply raced ahead of the final flush; let the write finish.
                if let Err(e) = transmit.await {
                    debug!(id = %request.id, error = %e, "Write failed after reply arrived");
                }
                return Ok(response);
            }
            Some(Ok(Err(e))) => return Err(e),
            Some(Err(_)) => {
                return Err(TransportError::ConnectionClosed(
                    "response channel dropped".to_string(),
                ));
            }
            None => {}
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(TransportError::ConnectionClosed(
                "response channel dropped".to_string(),
            )),
            Err(_) => {
                self.forget(&request.id);
                warn!(id = %request.id, method = %request.method, ?timeout, "Request timed out");
                Err(TransportError::RequestTimeout {
                    method: request.method.clone(),
                    timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplink_protocol::{JsonRpcError, Method};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn ping() -> JsonRpcRequest {
        JsonRpcRequest::fresh(Method::Ping, None)
    }

    #[tokio::test]
    async fn test_resolves_by_id_not_by_order() {
        let pending = Arc::new(PendingCalls::new());
        let first = ping();
        let second = ping();

        let a = {
            let pending = Arc::clone(&pending);
            let first = first.clone();
            tokio::spawn(async move {
                pending
                    .exchange(&first, Duration::from_secs(5), async { Ok(()) })
                    .await
            })
        };
        let b = {
            let pending = Arc::clone(&pending);
            let second = second.clone();
            tokio::spawn(async move {
                pending
                    .exchange(&second, Duration::from_secs(5), async { Ok(()) })
                    .await
            })
        };

        while pending.len() < 2 {
            tokio::task::yield_now().await;
        }

        assert!(pending.resolve_response(JsonRpcResponse::success(
            second.id.clone(),
            json!({"n": 2})
        )));
        assert!(pending.resolve_response(JsonRpcResponse::success(
            first.id.clone(),
            json!({"n": 1})
        )));

        assert_eq!(a.await.unwrap().unwrap().result, json!({"n": 1}));
        assert_eq!(b.await.unwrap().unwrap().result, json!({"n": 2}));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_rpc_error() {
        let pending = PendingCalls::new();
        let request = ping();
        let rx = pending.register(request.id.clone()).unwrap();

        pending.resolve_error(JsonRpcErrorResponse::new(
            Some(request.id.clone()),
            JsonRpcError::new(-32000, "boom"),
        ));

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            TransportError::Rpc {
                code: -32000,
                message: "boom".into(),
                data: None
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry_and_late_reply_is_discarded() {
        let pending = PendingCalls::new();
        let request = ping();

        let err = pending
            .exchange(&request, Duration::from_secs(30), async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransportError::RequestTimeout { ref method, timeout }
                if method == "ping" && timeout == Duration::from_secs(30)
        ));
        assert!(!pending.contains(&request.id));
        assert!(!pending.resolve_response(JsonRpcResponse::success(request.id, json!({}))));
    }

    #[tokio::test]
    async fn test_failed_transmit_forgets_the_call() {
        let pending = PendingCalls::new();
        let request = ping();

        let err = pending
            .exchange(&request, Duration::from_secs(5), async {
                Err(TransportError::SendFailed("broken pipe".into()))
            })
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::SendFailed("broken pipe".into()));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_all_releases_a_call_stuck_in_transmit() {
        let pending = Arc::new(PendingCalls::new());
        let request = ping();

        let call = {
            let pending = Arc::clone(&pending);
            let request = request.clone();
            tokio::spawn(async move {
                pending
                    .exchange(&request, Duration::from_secs(30), std::future::pending())
                    .await
            })
        };
        while !pending.contains(&request.id) {
            tokio::task::yield_now().await;
        }

        assert_eq!(pending.cancel_all("transport disconnected"), 1);
        let err = tokio::time::timeout(Duration::from_secs(1), call)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::ConnectionClosed("transport disconnected".into())
        );
    }

    #[tokio::test]
    async fn test_cancel_all_fails_every_waiter_and_later_callers() {
        let pending = Arc::new(PendingCalls::new());
        let mut tasks = Vec::new();
        for _ in 0..3 {
            let pending = Arc::clone(&pending);
            tasks.push(tokio::spawn(async move {
                pending
                    .exchange(&ping(), Duration::from_secs(30), async { Ok(()) })
                    .await
            }));
        }
        while pending.len() < 3 {
            tokio::task::yield_now().await;
        }

        assert_eq!(pending.cancel_all("disconnected"), 3);

        for task in tasks {
            let err = task.await.unwrap().unwrap_err();
            assert_eq!(err, TransportError::ConnectionClosed("disconnected".into()));
        }

        let late = pending.register(RequestId::random()).unwrap_err();
        assert!(late.is_closed());

        pending.reopen();
        assert!(pending.register(RequestId::random()).is_ok());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let pending = PendingCalls::new();
        let _rx = pending.register(RequestId::from("same")).unwrap();
        assert!(matches!(
            pending.register(RequestId::from("same")),
            Err(TransportError::Internal(_))
        ));
    }

    #[test]
    fn test_error_without_id_is_not_correlated() {
        let pending = PendingCalls::new();
        assert!(!pending.resolve_error(JsonRpcErrorResponse::new(
            None,
            JsonRpcError::new(-32700, "Parse error")
        )));
    }

    proptest! {
        #[test]
        fn prop_fresh_ids_never_collide_while_outstanding(n in 1usize..200) {
            let pending = PendingCalls::new();
            let mut receivers = Vec::with_capacity(n);
            let mut seen = HashSet::with_capacity(n);

            for _ in 0..n {
                let request = ping();
                prop_assert!(seen.insert(request.id.clone()));
                receivers.push(pending.register(request.id).unwrap());
            }

            prop_assert_eq!(pending.len(), n);
        }
    }
}
