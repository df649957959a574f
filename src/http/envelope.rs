// Response envelope
// The JSON body of every answer built from a bus reply or event

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::message::ErrorCode;

/// Projected output keys plus the optional reserved keys
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiResponse {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Polling URL of an accepted async job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    /// Dotted field path -> JSON type of the projected values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<BTreeMap<String, String>>,
}

impl ApiResponse {
    pub fn located(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: ErrorCode) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Nothing to send; answered with an empty body
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.location.is_none()
            && self.error.is_none()
            && self.schema.is_none()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
