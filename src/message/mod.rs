//! Internal message model
//!
//! Message types are described by plain [`MessageType`] values supplied by the
//! embedding application. Each value carries its REST routing metadata and a
//! constructor, so the gateway never needs runtime type introspection.
//! Fields addressed by name (URL variables) go through a per-type
//! [`FieldTable`] instead of reflection.

mod fields;
mod reply;
mod types;

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

use crate::error::FieldError;
use crate::query::QueryParams;

pub use fields::{FieldTable, InvalidValue, Setter};
pub use reply::{ApiEvent, ErrorCode, MessageReply};
pub use types::{
    build_message, MessageBuilder, MessageKind, MessageType, ResponseType, RestMethod,
    RestRequest, RestResponse,
};

/// Service every API message is addressed to
pub const API_SERVICE_ID: &str = "api.portal";

/// Session attached to an authenticated message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInventory {
    pub uuid: String,
}

impl SessionInventory {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }
}

/// Fields every API message carries besides its own payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    pub id: String,
    pub service_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionInventory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_tags: Option<Vec<String>>,
}

impl Default for MessageHeader {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            service_id: API_SERVICE_ID.to_string(),
            session: None,
            system_tags: None,
            user_tags: None,
        }
    }
}

/// A message the gateway can build from an HTTP request and put on the bus
pub trait ApiMessage: fmt::Debug + Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    fn header(&self) -> &MessageHeader;

    fn header_mut(&mut self) -> &mut MessageHeader;

    /// Set a field addressed by name; unknown names are an error
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), FieldError>;

    /// Query block of query-style messages
    fn query_mut(&mut self) -> Option<&mut QueryParams> {
        None
    }

    fn query(&self) -> Option<&QueryParams> {
        None
    }

    /// Wire representation put on the bus
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>;

    fn as_any(&self) -> &dyn Any;
}
