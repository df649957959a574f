// Bus replies and events

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured error reported by the bus or a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode {
    pub code: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorCode>>,
}

impl ErrorCode {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            details: None,
            cause: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Answer to a synchronous call
#[derive(Debug, Clone, PartialEq)]
pub struct MessageReply {
    pub type_name: String,
    pub success: bool,
    pub error: Option<ErrorCode>,
    pub body: Value,
}

impl MessageReply {
    pub fn ok(type_name: impl Into<String>, body: Value) -> Self {
        Self {
            type_name: type_name.into(),
            success: true,
            error: None,
            body,
        }
    }

    pub fn failed(type_name: impl Into<String>, error: ErrorCode) -> Self {
        Self {
            type_name: type_name.into(),
            success: false,
            error: Some(error),
            body: Value::Null,
        }
    }
}

/// Completion event of an asynchronous API message
#[derive(Debug, Clone, PartialEq)]
pub struct ApiEvent {
    /// Id of the message this event completes
    pub api_id: String,
    pub type_name: String,
    pub success: bool,
    pub error: Option<ErrorCode>,
    pub body: Value,
}

impl ApiEvent {
    pub fn ok(api_id: impl Into<String>, type_name: impl Into<String>, body: Value) -> Self {
        Self {
            api_id: api_id.into(),
            type_name: type_name.into(),
            success: true,
            error: None,
            body,
        }
    }

    pub fn failed(api_id: impl Into<String>, type_name: impl Into<String>, error: ErrorCode) -> Self {
        Self {
            api_id: api_id.into(),
            type_name: type_name.into(),
            success: false,
            error: Some(error),
            body: Value::Null,
        }
    }
}
