//! Inbound frame routing
//!
//! The receive loop of every transport hands each complete inbound frame to
//! [`InboundRouter::route_text`] and moves on. Responses resolve pending
//! calls synchronously; peer requests and log notifications are served on
//! spawned tasks so a slow callback never stalls the loop.

use std::sync::Arc;

use mcplink_protocol::{JsonRpcMessage, Method};
use tracing::{debug, trace, warn};

use crate::correlation::PendingCalls;
use crate::dispatch::Dispatcher;
use crate::traits::TransportFuture;

/// Where replies to peer requests are written.
pub trait MessageSink: Send + Sync + std::fmt::Debug {
    /// Write one message on the channel the request came from.
    fn deliver(&self, message: JsonRpcMessage) -> TransportFuture<'_, ()>;
}

/// What happened to a routed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// A pending call was resolved
    Resolved,
    /// A response matched no pending call and was dropped
    Discarded,
    /// A peer request was handed to the dispatcher
    Dispatched,
    /// A notification was consumed
    Notified,
    /// The frame was empty or malformed
    Skipped,
}

/// Classifies inbound frames for one connection.
#[derive(Debug, Clone)]
pub struct InboundRouter {
    pending: Arc<PendingCalls>,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<dyn MessageSink>,
}

impl InboundRouter {
    /// Router resolving into `pending` and replying through `sink`
    pub fn new(
        pending: Arc<PendingCalls>,
        dispatcher: Dispatcher,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            pending,
            dispatcher: Arc::new(dispatcher),
            sink,
        }
    }

    /// Parse and route one frame. Malformed frames are logged and skipped.
    pub fn route_text(&self, frame: &str) -> Routed {
        let frame = frame.trim();
        if frame.is_empty() {
            return Routed::Skipped;
        }
        trace!(frame, "Inbound frame");
        match frame.parse::<JsonRpcMessage>() {
            Ok(message) => self.route(message),
            Err(e) => {
                warn!(error = %e, frame = %preview(frame), "Skipping malformed frame");
                Routed::Skipped
            }
        }
    }

    /// Route an already classified message.
    pub fn route(&self, message: JsonRpcMessage) -> Routed {
        match message {
            JsonRpcMessage::Response(response) => {
                if self.pending.resolve_response(response) {
                    Routed::Resolved
                } else {
                    Routed::Discarded
                }
            }
            JsonRpcMessage::Error(error) => {
                if self.pending.resolve_error(error) {
                    Routed::Resolved
                } else {
                    Routed::Discarded
                }
            }
            JsonRpcMessage::Request(request) => {
                debug!(id = %request.id, method = %request.method, "Peer request");
                let dispatcher = Arc::clone(&self.dispatcher);
                let sink = Arc::clone(&self.sink);
                tokio::spawn(async move {
                    let id = request.id.clone();
                    let reply = dispatcher.respond(request).await;
                    if let Err(e) = sink.deliver(reply).await {
                        warn!(%id, error = %e, "Failed to deliver reply to peer request");
                    }
                });
                Routed::Dispatched
            }
            JsonRpcMessage::Notification(notification) => {
                let wants_callback = notification.method == Method::LogMessage.as_str()
                    && self.dispatcher.callbacks().logging.is_some();
                if wants_callback {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    tokio::spawn(async move { dispatcher.notify(notification).await });
                } else {
                    debug!(method = %notification.method, "Notification");
                }
                Routed::Notified
            }
        }
    }
}

fn preview(frame: &str) -> &str {
    const LIMIT: usize = 200;
    if frame.len() <= LIMIT {
        return frame;
    }
    let mut end = LIMIT;
    while !frame.is_char_boundary(end) {
        end -= 1;
    }
    &frame[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::CapabilityCallbacks;
    use mcplink_protocol::{JsonRpcRequest, Method, RequestId};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[derive(Debug)]
    struct Recorder(mpsc::UnboundedSender<JsonRpcMessage>);

    impl MessageSink for Recorder {
        fn deliver(&self, message: JsonRpcMessage) -> TransportFuture<'_, ()> {
            Box::pin(async move {
                let _ = self.0.send(message);
                Ok(())
            })
        }
    }

    fn router() -> (
        InboundRouter,
        Arc<PendingCalls>,
        mpsc::UnboundedReceiver<JsonRpcMessage>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingCalls::new());
        let router = InboundRouter::new(
            Arc::clone(&pending),
            Dispatcher::new(CapabilityCallbacks::new()),
            Arc::new(Recorder(tx)),
        );
        (router, pending, rx)
    }

    #[tokio::test]
    async fn test_response_resolves_pending_call() {
        let (router, pending, _rx) = router();
        let request = JsonRpcRequest::fresh(Method::Ping, None);
        let waiter = pending.register(request.id.clone()).unwrap();

        let frame = json!({"jsonrpc": "2.0", "id": request.id, "result": {}}).to_string();
        assert_eq!(router.route_text(&frame), Routed::Resolved);
        assert_eq!(waiter.await.unwrap().unwrap().result, json!({}));

        assert_eq!(router.route_text(&frame), Routed::Discarded);
    }

    #[tokio::test]
    async fn test_peer_request_without_callback_gets_error_reply_and_loop_survives() {
        let (router, pending, mut rx) = router();

        let routed = router.route_text(r#"{"jsonrpc":"2.0","id":"srv-1","method":"roots/list"}"#);
        assert_eq!(routed, Routed::Dispatched);

        let JsonRpcMessage::Error(reply) = rx.recv().await.unwrap() else {
            panic!("expected error reply");
        };
        assert_eq!(reply.id, Some(RequestId::from("srv-1")));
        assert_eq!(reply.error.data.unwrap()["kind"], "CallbackMissing");

        // Still routing afterwards.
        let request = JsonRpcRequest::fresh(Method::Ping, None);
        let waiter = pending.register(request.id.clone()).unwrap();
        let frame = json!({"jsonrpc": "2.0", "id": request.id, "result": {}}).to_string();
        assert_eq!(router.route_text(&frame), Routed::Resolved);
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_garbage_and_notifications() {
        let (router, _pending, mut rx) = router();

        assert_eq!(router.route_text("not json at all"), Routed::Skipped);
        assert_eq!(router.route_text("   "), Routed::Skipped);
        assert_eq!(
            router.route_text(r#"{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}"#),
            Routed::Notified
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let long = "é".repeat(150);
        let cut = preview(&long);
        assert!(cut.len() <= 200);
        assert!(long.starts_with(cut));
    }
}
