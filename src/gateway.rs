//! REST gateway
//!
//! Ties the registry, dispatcher and message bridge together: one call per
//! request, from decoded path to the reply sent back.

use hyper::StatusCode;

use crate::bridge::{Delivery, MessageBridge};
use crate::error::{GatewayError, GatewayResult, RegistryError};
use crate::handler::{dispatch, jobs, RequestBody, RequestContext};
use crate::http::{projector, ApiResponse, Reply};
use crate::logger;
use crate::message::MessageReply;
use crate::routing::{ApiDescriptor, ApiRegistry, PathPattern};

/// Path variable holding the job id on the polling path
const JOB_ID_VARIABLE: &str = "uuid";

pub struct Gateway {
    registry: ApiRegistry,
    bridge: MessageBridge,
    job_pattern: PathPattern,
    schema_header: String,
}

impl Gateway {
    /// Subscribes the bridge's job store to bus events
    pub fn new(
        registry: ApiRegistry,
        bridge: MessageBridge,
        api_version: &str,
        async_job_path: &str,
        schema_header: &str,
    ) -> Result<Self, RegistryError> {
        let job_pattern =
            PathPattern::parse(&format!("{api_version}{async_job_path}/{{{JOB_ID_VARIABLE}}}"))?;
        bridge.listen();
        Ok(Self {
            registry,
            bridge,
            job_pattern,
            schema_header: schema_header.to_string(),
        })
    }

    pub const fn registry(&self) -> &ApiRegistry {
        &self.registry
    }

    /// Handle one request; errors are turned into their replies here
    pub async fn handle(&self, ctx: &RequestContext, body: &[u8]) -> Reply {
        match self.dispatch(ctx, body).await {
            Ok(reply) => reply,
            Err(err) => {
                if err.is_internal() {
                    logger::log_internal_error(ctx, &err);
                }
                Reply::from(err)
            }
        }
    }

    async fn dispatch(&self, ctx: &RequestContext, body: &[u8]) -> GatewayResult<Reply> {
        let with_schema = ctx.headers.contains_key(self.schema_header.as_str());

        if let Some(variables) = self.job_pattern.extract(&ctx.path) {
            let job_id = variables.get(JOB_ID_VARIABLE).map_or("", String::as_str);
            return jobs::query_job(&self.bridge, &self.registry, ctx, job_id, with_schema).await;
        }

        let found = self
            .registry
            .lookup(&ctx.path)
            .ok_or_else(|| GatewayError::NotFound(format!("no api mapping to {}", ctx.path)))?;

        let body = RequestBody::parse(body)?;
        let selected = dispatch::select(found.route, &ctx.method, &body, &ctx.path)?;
        let session = dispatch::authorize(selected.api, &ctx.headers)?;
        let msg = dispatch::build_message(
            selected,
            &body,
            session,
            &found.variables,
            ctx.query.as_deref(),
        )?;

        logger::log_debug(&format!(
            "[ID: {}] {} -> {} ({})",
            ctx.request_id,
            ctx.path,
            selected.api.type_name(),
            selected.api.path()
        ));
        let delivery = self.bridge.send(msg, selected.api.kind()).await?;
        self.compose(selected.api, delivery, with_schema)
    }

    fn compose(
        &self,
        api: &ApiDescriptor,
        delivery: Delivery,
        with_schema: bool,
    ) -> GatewayResult<Reply> {
        match delivery {
            Delivery::Accepted { location } => Ok(Reply::json(
                StatusCode::ACCEPTED,
                ApiResponse::located(location),
            )),
            // the declared response type wins over whatever the bus labelled the reply
            Delivery::Replied(MessageReply {
                success: true,
                body,
                ..
            }) => {
                let response =
                    projector::project(&self.registry, api.response_type(), &body, with_schema)?;
                Ok(Reply::json(StatusCode::OK, response))
            }
            Delivery::Replied(MessageReply { error, .. }) => {
                logger::log_debug(&format!("{} failed: {error:?}", api.type_name()));
                Ok(Reply::json(
                    StatusCode::SERVICE_UNAVAILABLE,
                    error.map_or_else(ApiResponse::default, ApiResponse::failed),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{JobLocator, JobStore, LocalBus, MemoryJobStore, MessageHandler};
    use crate::catalog;
    use crate::http::ReplyBody;
    use crate::message::{
        build_message, ApiMessage, ErrorCode, MessageKind, MessageType, ResponseType, RestMethod,
        RestRequest, RestResponse,
    };
    use hyper::{Method, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    const BASE: &str = "http://gw.example.com:8080";

    fn gateway_with(types: Vec<MessageType>, bus: LocalBus, expiry: Duration) -> Gateway {
        let registry = ApiRegistry::build("/v1", types).unwrap();
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new(expiry));
        let locator = JobLocator::new(Arc::new(Url::parse(BASE).unwrap()), "/v1", "/api-jobs");
        let bridge = MessageBridge::new(Arc::new(bus), store, locator);
        Gateway::new(registry, bridge, "/v1", "/api-jobs", "X-JSON-Schema").unwrap()
    }

    fn gateway() -> Gateway {
        gateway_with(
            catalog::message_types(),
            catalog::local_bus(),
            Duration::from_secs(60),
        )
    }

    fn ctx(method: Method, uri: &str, headers: &[(&str, &str)]) -> RequestContext {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        RequestContext::from_parts(&parts, "127.0.0.1:40000".parse().unwrap())
    }

    const AUTH: (&str, &str) = ("Authorization", "OAuth session-1");

    async fn call(gw: &Gateway, method: Method, uri: &str, body: &Value) -> Reply {
        let raw = if body.is_null() {
            String::new()
        } else {
            body.to_string()
        };
        gw.handle(&ctx(method, uri, &[AUTH]), raw.as_bytes()).await
    }

    fn text(reply: &Reply) -> &str {
        match &reply.body {
            ReplyBody::Text(message) => message,
            other => panic!("expected a text body, got {other:?}"),
        }
    }

    fn envelope(reply: &Reply) -> &ApiResponse {
        reply.envelope().expect("expected a JSON body")
    }

    /// Poll the job behind a 202 until it leaves `processing`
    async fn settle(gw: &Gateway, accepted: &Reply) -> Reply {
        let location = envelope(accepted).location.clone().unwrap();
        let path = location.strip_prefix(BASE).unwrap().to_string();
        for _ in 0..200 {
            let reply = call(gw, Method::GET, &path, &Value::Null).await;
            if reply.status != StatusCode::ACCEPTED {
                return reply;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job at {path} never completed");
    }

    async fn create_vm(gw: &Gateway, name: &str) -> String {
        let accepted = call(
            gw,
            Method::POST,
            "/v1/vm-instances",
            &json!({"params": {"name": name}}),
        )
        .await;
        assert_eq!(accepted.status, StatusCode::ACCEPTED);
        let done = settle(gw, &accepted).await;
        assert_eq!(done.status, StatusCode::OK);
        envelope(&done).fields["inventory"]["uuid"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_async_create_then_poll() {
        let gw = gateway();
        let accepted = call(
            &gw,
            Method::POST,
            "/v1/vm-instances",
            &json!({"params": {"name": "web", "imageUuid": "img-1"}}),
        )
        .await;

        assert_eq!(accepted.status, StatusCode::ACCEPTED);
        let response = envelope(&accepted);
        assert!(response.fields.is_empty());
        let location = response.location.as_deref().unwrap();
        assert!(location.starts_with("http://gw.example.com:8080/v1/api-jobs/"));

        let done = settle(&gw, &accepted).await;
        assert_eq!(done.status, StatusCode::OK);
        let inventory = &envelope(&done).fields["inventory"];
        assert_eq!(inventory["name"], "web");
        assert_eq!(inventory["imageUuid"], "img-1");
    }

    #[tokio::test]
    async fn test_shared_path_dispatch_by_method() {
        let gw = gateway();
        let uuid = create_vm(&gw, "db").await;

        let listed = call(&gw, Method::GET, "/v1/vm-instances", &Value::Null).await;
        assert_eq!(listed.status, StatusCode::OK);
        assert_eq!(envelope(&listed).fields["inventories"][0]["uuid"], uuid.as_str());

        let destroyed = call(&gw, Method::DELETE, &format!("/v1/vm-instances/{uuid}"), &Value::Null).await;
        assert_eq!(destroyed.status, StatusCode::ACCEPTED);
        // the destroy event projects nothing, so the body is empty
        let done = settle(&gw, &destroyed).await;
        assert_eq!(done, Reply::empty(StatusCode::OK));

        let missing = call(&gw, Method::POST, &format!("/v1/vm-instances/{uuid}"), &Value::Null).await;
        assert_eq!(missing.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            text(&missing),
            format!("No creational API found for the path[/v1/vm-instances/{uuid}]")
        );
    }

    #[tokio::test]
    async fn test_put_action_selection() {
        let gw = gateway();
        let uuid = create_vm(&gw, "app").await;
        let path = format!("/v1/vm-instances/{uuid}/actions");

        // named projection with a mapped URL variable
        let accepted = call(&gw, Method::PUT, &path, &json!({"rebootVmInstance": {}})).await;
        let done = settle(&gw, &accepted).await;
        assert_eq!(done.status, StatusCode::OK);
        let response = envelope(&done);
        assert_eq!(response.fields.len(), 2);
        assert_eq!(response.fields["uuid"], uuid.as_str());
        assert_eq!(response.fields["state"], "Running");

        let unknown = call(&gw, Method::PUT, &path, &json!({"reboot": {}})).await;
        assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            text(&unknown),
            format!("the body doesn't contain action mapping to the URL[{path}]")
        );
    }

    #[tokio::test]
    async fn test_failed_job_is_503() {
        let gw = gateway();
        let accepted = call(
            &gw,
            Method::PUT,
            "/v1/vm-instances/ghost/actions",
            &json!({"startVmInstance": {}}),
        )
        .await;
        let done = settle(&gw, &accepted).await;
        assert_eq!(done.status, StatusCode::SERVICE_UNAVAILABLE);
        let error = envelope(&done).error.as_ref().unwrap();
        assert_eq!(error.code, catalog::VM_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_single_resource_query() {
        let gw = gateway();
        let uuid = create_vm(&gw, "one").await;
        create_vm(&gw, "two").await;

        let reply = call(
            &gw,
            Method::GET,
            &format!("/v1/vm-instances/{uuid}?q=name=two"),
            &Value::Null,
        )
        .await;
        let inventories = envelope(&reply).fields["inventories"].as_array().unwrap();
        assert_eq!(inventories.len(), 1);
        assert_eq!(inventories[0]["name"], "one");

        let reply = call(&gw, Method::GET, "/v1/vm-instances?q=name=two", &Value::Null).await;
        let inventories = envelope(&reply).fields["inventories"].as_array().unwrap();
        assert_eq!(inventories.len(), 1);
        assert_eq!(inventories[0]["name"], "two");

        let reply = call(&gw, Method::GET, "/v1/vm-instances?limit=ten", &Value::Null).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(text(&reply), "Invalid query parameter. 'limit' must be an integer");
    }

    #[tokio::test]
    async fn test_sync_login_is_exempt_and_failure_is_503() {
        let gw = gateway();
        let body = json!({"logInByAccount": {"accountName": "admin", "password": "pw"}});
        let reply = gw
            .handle(
                &ctx(Method::PUT, "/v1/accounts/login", &[]),
                body.to_string().as_bytes(),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(envelope(&reply).fields["inventory"]["accountName"], "admin");

        let reply = gw
            .handle(&ctx(Method::PUT, "/v1/accounts/login", &[]), b"")
            .await;
        assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            envelope(&reply).error.as_ref().unwrap().code,
            catalog::LOGIN_FAILED
        );
    }

    #[tokio::test]
    async fn test_authorization_required() {
        let gw = gateway();
        let reply = gw
            .handle(&ctx(Method::GET, "/v1/vm-instances", &[]), b"")
            .await;
        assert_eq!(reply, Reply::text(StatusCode::BAD_REQUEST, "missing header 'Authorization'"));

        let reply = gw
            .handle(
                &ctx(Method::GET, "/v1/vm-instances", &[("Authorization", "Basic Zm9v")]),
                b"",
            )
            .await;
        assert_eq!(
            reply,
            Reply::text(StatusCode::BAD_REQUEST, "Authorization type must be 'OAuth'")
        );
    }

    #[tokio::test]
    async fn test_schema_header() {
        let gw = gateway();
        let body = json!({"logInByAccount": {"accountName": "admin", "password": "pw"}});
        let reply = gw
            .handle(
                &ctx(Method::PUT, "/v1/accounts/login", &[("X-JSON-Schema", "true")]),
                body.to_string().as_bytes(),
            )
            .await;
        let schema = envelope(&reply).schema.as_ref().unwrap();
        assert_eq!(schema["inventory"], "object");
        assert_eq!(schema["inventory.accountName"], "string");
    }

    #[tokio::test]
    async fn test_job_path_rules() {
        let gw = gateway();
        let reply = call(&gw, Method::DELETE, "/v1/api-jobs/abc", &Value::Null).await;
        assert_eq!(
            reply,
            Reply::text(
                StatusCode::METHOD_NOT_ALLOWED,
                "only GET method is allowed for querying job status"
            )
        );

        let reply = call(&gw, Method::GET, "/v1/api-jobs/abc", &Value::Null).await;
        assert_eq!(
            reply,
            Reply::text(StatusCode::NOT_FOUND, "the job has been expired")
        );
    }

    #[tokio::test]
    async fn test_stale_job_is_expired() {
        let gw = gateway_with(
            catalog::message_types(),
            catalog::local_bus(),
            Duration::ZERO,
        );
        let accepted = call(
            &gw,
            Method::POST,
            "/v1/vm-instances",
            &json!({"params": {"name": "old"}}),
        )
        .await;
        let reply = settle(&gw, &accepted).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_path_and_bad_body() {
        let gw = gateway();
        let reply = call(&gw, Method::GET, "/v1/clusters", &Value::Null).await;
        assert_eq!(
            reply,
            Reply::text(StatusCode::NOT_FOUND, "no api mapping to /v1/clusters")
        );

        let reply = gw
            .handle(&ctx(Method::POST, "/v1/vm-instances", &[AUTH]), b"[]")
            .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[derive(Debug, Default, serde::Deserialize)]
    struct ProbeMsg {
        #[serde(skip)]
        header: crate::message::MessageHeader,
    }

    impl ApiMessage for ProbeMsg {
        fn type_name(&self) -> &'static str {
            "APIProbeMsg"
        }

        fn header(&self) -> &crate::message::MessageHeader {
            &self.header
        }

        fn header_mut(&mut self) -> &mut crate::message::MessageHeader {
            &mut self.header
        }

        fn set_field(&mut self, name: &str, _value: &str) -> Result<(), crate::error::FieldError> {
            Err(crate::error::FieldError::Unknown {
                field: name.to_string(),
                type_name: "APIProbeMsg",
            })
        }

        fn to_json(&self) -> Result<Value, serde_json::Error> {
            Ok(json!({}))
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn probe(path: &'static str, all_to: &'static str) -> MessageType {
        let mut request = RestRequest::new(path, RestMethod::Get);
        request.parameter_name = "params";
        MessageType {
            name: "APIProbeMsg",
            kind: MessageKind::Sync,
            request,
            response: ResponseType {
                name: "APIProbeReply",
                rest: Some(RestResponse {
                    all_to,
                    fields_to: &[],
                }),
            },
            suppress_credential_check: true,
            build: build_message::<ProbeMsg>,
        }
    }

    fn probe_bus() -> LocalBus {
        LocalBus::builder()
            .handler(
                "APIProbeMsg",
                "APIProbeReply",
                |_msg: Box<dyn ApiMessage>| -> Result<Value, ErrorCode> {
                    Ok(json!({"inventory": {"uuid": "p-1"}}))
                },
            )
            .build()
    }

    #[tokio::test]
    async fn test_sync_reply_projected_by_declared_response_type() {
        let bus = LocalBus::builder()
            .handler(
                "APIProbeMsg",
                "MessageReply",
                |_msg: Box<dyn ApiMessage>| -> Result<Value, ErrorCode> {
                    Ok(json!({"inventory": {"uuid": "p-2"}}))
                },
            )
            .build();
        let gw = gateway_with(
            vec![probe("/probe", "inventory")],
            bus,
            Duration::from_secs(60),
        );
        let reply = call(&gw, Method::GET, "/v1/probe", &Value::Null).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(envelope(&reply).fields["inventory"]["uuid"], "p-2");
    }

    /// Never answers, so its job stays in `processing`
    struct Stalled;

    #[async_trait::async_trait]
    impl MessageHandler for Stalled {
        async fn handle(&self, _msg: Box<dyn ApiMessage>) -> Result<Value, ErrorCode> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_processing_job_is_202_with_empty_body() {
        let mut message = probe("/probe", "inventory");
        message.kind = MessageKind::Async;
        let bus = LocalBus::builder()
            .handler("APIProbeMsg", "APIProbeReply", Stalled)
            .build();
        let gw = gateway_with(vec![message], bus, Duration::from_secs(60));

        let accepted = call(&gw, Method::GET, "/v1/probe", &Value::Null).await;
        assert_eq!(accepted.status, StatusCode::ACCEPTED);
        let location = envelope(&accepted).location.clone().unwrap();
        let path = location.strip_prefix(BASE).unwrap().to_string();

        for _ in 0..3 {
            let reply = call(&gw, Method::GET, &path, &Value::Null).await;
            assert_eq!(reply, Reply::empty(StatusCode::ACCEPTED));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_unknown_url_variable_is_internal() {
        let gw = gateway_with(
            vec![probe("/zones/{zoneUuid}/probe", "inventory")],
            probe_bus(),
            Duration::from_secs(60),
        );
        let reply = call(&gw, Method::GET, "/v1/zones/z-1/probe", &Value::Null).await;
        assert_eq!(
            reply,
            Reply::text(
                StatusCode::INTERNAL_SERVER_ERROR,
                "unknown property 'zoneUuid' on APIProbeMsg"
            )
        );
    }

    #[tokio::test]
    async fn test_missing_reply_field_is_internal() {
        let gw = gateway_with(
            vec![probe("/probe", "inventories")],
            probe_bus(),
            Duration::from_secs(60),
        );
        let reply = call(&gw, Method::GET, "/v1/probe", &Value::Null).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text(&reply), "unknown property 'inventories' on APIProbeReply");
    }
}
