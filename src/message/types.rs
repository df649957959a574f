// Message type metadata
// The declarative routing description an embedding application supplies per message type

use hyper::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ApiMessage;

/// How a message travels over the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Blocking call, answered with a reply
    Sync,
    /// One-way send, completion arrives later as an event
    Async,
    /// Synchronous list/query call fed from the URL query string
    Query,
}

impl MessageKind {
    pub const fn is_sync(self) -> bool {
        matches!(self, Self::Sync | Self::Query)
    }
}

/// HTTP method a descriptor answers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RestMethod {
    pub fn matches(self, method: &Method) -> bool {
        match self {
            Self::Get => *method == Method::GET,
            Self::Post => *method == Method::POST,
            Self::Put => *method == Method::PUT,
            Self::Delete => *method == Method::DELETE,
        }
    }
}

/// Request-side routing metadata
#[derive(Debug, Clone, Copy)]
pub struct RestRequest {
    /// Path template relative to the API version prefix
    pub path: &'static str,
    pub optional_paths: &'static [&'static str],
    pub method: RestMethod,
    /// Selected by a body key derived from the type name rather than by method
    pub is_action: bool,
    /// Body key the message payload is nested under
    pub parameter_name: &'static str,
    /// `urlVariable=fieldName` overrides
    pub mapping_fields: &'static [&'static str],
}

impl RestRequest {
    pub const fn new(path: &'static str, method: RestMethod) -> Self {
        Self {
            path,
            optional_paths: &[],
            method,
            is_action: false,
            parameter_name: "",
            mapping_fields: &[],
        }
    }
}

/// Response-side projection metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct RestResponse {
    /// Copy this one field verbatim; empty when `fields_to` is used
    pub all_to: &'static str,
    /// `outputKey=replyField` pairs
    pub fields_to: &'static [&'static str],
}

/// Reply or event type answering an API message
#[derive(Debug, Clone, Copy)]
pub struct ResponseType {
    pub name: &'static str,
    pub rest: Option<RestResponse>,
}

pub type MessageBuilder = fn(Option<&Value>) -> Result<Box<dyn ApiMessage>, serde_json::Error>;

/// One routable message type
#[derive(Debug, Clone, Copy)]
pub struct MessageType {
    pub name: &'static str,
    pub kind: MessageKind,
    pub request: RestRequest,
    pub response: ResponseType,
    /// Skip the `Authorization` header check
    pub suppress_credential_check: bool,
    pub build: MessageBuilder,
}

/// Build `T` from the nested payload, or its default when the body carries none
pub fn build_message<T>(payload: Option<&Value>) -> Result<Box<dyn ApiMessage>, serde_json::Error>
where
    T: ApiMessage + DeserializeOwned + Default,
{
    let msg = match payload {
        Some(value) => T::deserialize(value)?,
        None => T::default(),
    };
    Ok(Box::new(msg))
}
