//! Request dispatcher
//!
//! Picks the descriptor a request is meant for, checks its credentials and
//! builds the internal message from body, URL variables and query string.

use hyper::header::{HeaderMap, AUTHORIZATION};
use hyper::Method;
use serde_json::{Map, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::message::{ApiMessage, MessageKind, SessionInventory};
use crate::query::{apply_query_string, single_resource};
use crate::routing::{ApiDescriptor, PathVariables, Route};

pub(super) const AUTH_SCHEME: &str = "OAuth";
const SYSTEM_TAGS: &str = "systemTags";
const USER_TAGS: &str = "userTags";

/// Request body as a flat JSON mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestBody(Map<String, Value>);

impl RequestBody {
    /// An empty body is an empty mapping; anything but a JSON object is rejected
    pub fn parse(raw: &[u8]) -> GatewayResult<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        match serde_json::from_slice(raw) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err(GatewayError::bad_request(
                "the request body must be a JSON object",
            )),
            Err(e) => Err(GatewayError::bad_request(format!(
                "the request body is not valid JSON: {e}"
            ))),
        }
    }

    /// Value under `key`; an explicit `null` counts as absent
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn string_list(&self, key: &str) -> GatewayResult<Option<Vec<String>>> {
        self.get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|_| {
                    GatewayError::bad_request(format!("'{key}' must be a list of strings"))
                })
            })
            .transpose()
    }
}

/// The descriptor a request resolved to
#[derive(Debug, Clone, Copy)]
pub struct Selected<'a> {
    pub api: &'a ApiDescriptor,
    /// Body key the payload is read from
    pub parameter_name: &'a str,
}

/// Resolve a route to one descriptor
///
/// A lone descriptor answers any method. Shared paths are told apart by
/// method, and for `PUT` by which action name appears as a body key.
pub fn select<'a>(
    route: &'a Route,
    method: &Method,
    body: &RequestBody,
    path: &str,
) -> GatewayResult<Selected<'a>> {
    let apis = match route {
        Route::Unique(api) => {
            return Ok(Selected {
                api,
                parameter_name: api.parameter_name(),
            })
        }
        Route::Shared(apis) => apis,
    };

    let by_method = |kind: &str| {
        apis.iter()
            .find(|api| api.method().matches(method))
            .map(|api| Selected {
                api,
                parameter_name: api.parameter_name(),
            })
            .ok_or_else(|| {
                GatewayError::internal(format!("No {kind} API found for the path[{path}]"))
            })
    };

    match *method {
        Method::POST => by_method("creational"),
        Method::GET => by_method("query"),
        Method::DELETE => by_method("delete"),
        Method::PUT => apis
            .iter()
            .find_map(|api| {
                let action = api.action_name()?;
                body.contains_key(action).then_some(Selected {
                    api,
                    parameter_name: action,
                })
            })
            .ok_or_else(|| {
                GatewayError::bad_request(format!(
                    "the body doesn't contain action mapping to the URL[{path}]"
                ))
            }),
        _ => Err(GatewayError::MethodNotAllowed(format!(
            "The method[{method}] is not allowed for the path[{path}]"
        ))),
    }
}

/// Session named by the `Authorization: OAuth <session>` header
///
/// Exempt descriptors skip the check and carry no session.
pub fn authorize(api: &ApiDescriptor, headers: &HeaderMap) -> GatewayResult<Option<SessionInventory>> {
    if api.message().suppress_credential_check {
        return Ok(None);
    }

    let auth = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| GatewayError::bad_request("missing header 'Authorization'"))?;
    let session = auth
        .to_str()
        .ok()
        .and_then(|auth| auth.trim().strip_prefix(AUTH_SCHEME))
        .ok_or_else(|| GatewayError::bad_request("Authorization type must be 'OAuth'"))?;

    Ok(Some(SessionInventory::new(session.trim())))
}

/// Build the message for `selected` from everything the request carries
pub fn build_message(
    selected: Selected<'_>,
    body: &RequestBody,
    session: Option<SessionInventory>,
    variables: &PathVariables,
    query: Option<&str>,
) -> GatewayResult<Box<dyn ApiMessage>> {
    let api = selected.api;
    if api.kind() == MessageKind::Query {
        return build_query(api, session, variables, query);
    }

    let mut msg = (api.message().build)(body.get(selected.parameter_name)).map_err(|e| {
        GatewayError::bad_request(format!(
            "invalid value of '{}' for {}: {e}",
            selected.parameter_name,
            api.type_name()
        ))
    })?;

    let header = msg.header_mut();
    header.session = session;
    if let Some(tags) = body.string_list(SYSTEM_TAGS)? {
        header.system_tags = Some(tags);
    }
    if let Some(tags) = body.string_list(USER_TAGS)? {
        header.user_tags = Some(tags);
    }

    for (name, value) in variables {
        msg.set_field(api.field_for(name), value)?;
    }
    Ok(msg)
}

/// Query messages take their parameters from the URL only
fn build_query(
    api: &ApiDescriptor,
    session: Option<SessionInventory>,
    variables: &PathVariables,
    query: Option<&str>,
) -> GatewayResult<Box<dyn ApiMessage>> {
    let mut msg = (api.message().build)(None).map_err(|e| {
        GatewayError::internal(format!("cannot build {}: {e}", api.type_name()))
    })?;
    msg.header_mut().session = session;

    let params = msg.query_mut().ok_or_else(|| {
        GatewayError::internal(format!(
            "{} is declared as a query API but has no query parameters",
            api.type_name()
        ))
    })?;

    // GET /resources/{uuid} returns that resource directly
    if let Some(uuid) = variables.get("uuid") {
        params.conditions.push(single_resource(uuid));
    } else {
        apply_query_string(query, params)?;
    }
    Ok(msg)
}
