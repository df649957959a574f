//! Message bus interface
//!
//! The transport itself lives outside the gateway. [`LocalBus`] is an
//! in-process implementation that dispatches messages to registered handlers.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::logger::{self, Level};
use crate::message::{ApiEvent, ApiMessage, ErrorCode, MessageReply};

/// Error code of replies for messages no service handles
pub const NO_SERVICE_ERROR: &str = "SYS.1000";

#[async_trait]
pub trait Bus: Send + Sync {
    /// Send and wait for the reply; transport failures come back as failed replies
    async fn call(&self, msg: Box<dyn ApiMessage>) -> MessageReply;

    /// Fire-and-forget; completion is published as an [`ApiEvent`]
    fn send(&self, msg: Box<dyn ApiMessage>);

    fn subscribe(&self, listener: Arc<dyn EventListener>);
}

/// Receives API completion events from the bus
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn handle_event(&self, event: ApiEvent);
}

/// Service-side handler for one message type
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: Box<dyn ApiMessage>) -> Result<Value, ErrorCode>;
}

#[async_trait]
impl<F> MessageHandler for F
where
    F: Fn(Box<dyn ApiMessage>) -> Result<Value, ErrorCode> + Send + Sync,
{
    async fn handle(&self, msg: Box<dyn ApiMessage>) -> Result<Value, ErrorCode> {
        self(msg)
    }
}

struct Service {
    reply_type: &'static str,
    handler: Arc<dyn MessageHandler>,
}

#[derive(Default)]
struct Inner {
    services: HashMap<&'static str, Service>,
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl Inner {
    async fn process(&self, msg: Box<dyn ApiMessage>) -> (String, Result<Value, ErrorCode>) {
        if logger::enabled(Level::Debug) {
            match msg.to_json() {
                Ok(wire) => logger::log_debug(&format!("[Bus] {} {wire}", msg.type_name())),
                Err(err) => logger::log_warning(&format!(
                    "[Bus] {} has no wire form: {err}",
                    msg.type_name()
                )),
            }
        }

        match self.services.get(msg.type_name()) {
            Some(service) => (
                service.reply_type.to_string(),
                service.handler.handle(msg).await,
            ),
            None => (
                format!("{}Reply", msg.type_name()),
                Err(ErrorCode::new(
                    NO_SERVICE_ERROR,
                    format!("no service is handling message {}", msg.type_name()),
                )),
            ),
        }
    }

    async fn publish(&self, event: ApiEvent) {
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.handle_event(event.clone()).await;
        }
    }
}

/// In-process bus routing messages by type name
#[derive(Clone, Default)]
pub struct LocalBus {
    inner: Arc<Inner>,
}

impl LocalBus {
    pub fn builder() -> LocalBusBuilder {
        LocalBusBuilder::default()
    }
}

/// Collects handlers before the bus starts serving
#[derive(Default)]
pub struct LocalBusBuilder {
    services: HashMap<&'static str, Service>,
}

impl LocalBusBuilder {
    #[must_use]
    pub fn handler(
        mut self,
        message_type: &'static str,
        reply_type: &'static str,
        handler: impl MessageHandler + 'static,
    ) -> Self {
        self.services.insert(
            message_type,
            Service {
                reply_type,
                handler: Arc::new(handler),
            },
        );
        self
    }

    pub fn build(self) -> LocalBus {
        LocalBus {
            inner: Arc::new(Inner {
                services: self.services,
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }
}

#[async_trait]
impl Bus for LocalBus {
    async fn call(&self, msg: Box<dyn ApiMessage>) -> MessageReply {
        match self.inner.process(msg).await {
            (reply_type, Ok(body)) => MessageReply::ok(reply_type, body),
            (reply_type, Err(error)) => MessageReply::failed(reply_type, error),
        }
    }

    fn send(&self, msg: Box<dyn ApiMessage>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let api_id = msg.header().id.clone();
            let event = match inner.process(msg).await {
                (event_type, Ok(body)) => ApiEvent::ok(api_id, event_type, body),
                (event_type, Err(error)) => ApiEvent::failed(api_id, event_type, error),
            };
            inner.publish(event).await;
        });
    }

    fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CreateVmInstanceMsg, StartVmInstanceMsg};
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Forward(mpsc::UnboundedSender<ApiEvent>);

    #[async_trait]
    impl EventListener for Forward {
        async fn handle_event(&self, event: ApiEvent) {
            let _ = self.0.send(event);
        }
    }

    fn bus() -> LocalBus {
        LocalBus::builder()
            .handler(
                "APIStartVmInstanceMsg",
                "APIStartVmInstanceEvent",
                |msg: Box<dyn ApiMessage>| -> Result<Value, ErrorCode> {
                    let start = msg
                        .as_any()
                        .downcast_ref::<StartVmInstanceMsg>()
                        .ok_or_else(|| ErrorCode::new("SYS.1001", "unexpected message"))?;
                    Ok(json!({"inventory": {"uuid": start.uuid, "state": "Running"}}))
                },
            )
            .build()
    }

    #[tokio::test]
    async fn test_call_routes_to_handler() {
        let mut msg = StartVmInstanceMsg::default();
        msg.uuid = "vm-1".to_string();
        let reply = bus().call(Box::new(msg)).await;
        assert!(reply.success);
        assert_eq!(reply.type_name, "APIStartVmInstanceEvent");
        assert_eq!(reply.body["inventory"]["uuid"], "vm-1");
    }

    #[tokio::test]
    async fn test_call_without_service_fails() {
        let reply = bus().call(Box::new(CreateVmInstanceMsg::default())).await;
        assert!(!reply.success);
        assert_eq!(reply.error.unwrap().code, NO_SERVICE_ERROR);
    }

    #[tokio::test]
    async fn test_send_publishes_event() {
        let bus = bus();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe(Arc::new(Forward(tx)));

        let mut msg = StartVmInstanceMsg::default();
        msg.uuid = "vm-2".to_string();
        let id = msg.header().id.clone();
        bus.send(Box::new(msg));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.api_id, id);
        assert!(event.success);
        assert_eq!(event.body["inventory"]["state"], "Running");
    }
}
