//! API and response descriptors
//!
//! Built once per message type from its [`MessageType`] metadata.

use std::collections::HashMap;

use crate::error::RegistryError;
use crate::message::{MessageKind, MessageType, RestMethod, RestResponse};

const ACTION_PREFIX: &str = "API";
const ACTION_SUFFIX: &str = "Msg";

/// Routing and behaviour metadata for one message type
#[derive(Debug, Clone)]
pub struct ApiDescriptor {
    message: MessageType,
    path: String,
    optional_paths: Vec<String>,
    action_name: Option<String>,
    mapping_fields: HashMap<String, String>,
}

impl ApiDescriptor {
    pub fn new(api_version: &str, message: MessageType) -> Result<Self, RegistryError> {
        let request = &message.request;

        let mapping_fields = parse_pairs(message.name, request.mapping_fields)?
            .into_iter()
            .collect();

        if !request.is_action && request.parameter_name.is_empty() {
            return Err(RegistryError::MissingParameterName(message.name));
        }

        Ok(Self {
            path: format!("{api_version}{}", request.path),
            optional_paths: request
                .optional_paths
                .iter()
                .map(|p| format!("{api_version}{p}"))
                .collect(),
            action_name: request.is_action.then(|| derive_action_name(message.name)),
            mapping_fields,
            message,
        })
    }

    pub const fn message(&self) -> &MessageType {
        &self.message
    }

    pub const fn type_name(&self) -> &'static str {
        self.message.name
    }

    pub const fn kind(&self) -> MessageKind {
        self.message.kind
    }

    pub const fn method(&self) -> RestMethod {
        self.message.request.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Primary path followed by the optional ones
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.path.as_str()).chain(self.optional_paths.iter().map(String::as_str))
    }

    pub fn action_name(&self) -> Option<&str> {
        self.action_name.as_deref()
    }

    /// Body key the payload is nested under when this descriptor is picked alone
    pub fn parameter_name(&self) -> &str {
        match &self.action_name {
            Some(action) if self.message.request.parameter_name.is_empty() => action,
            _ => self.message.request.parameter_name,
        }
    }

    /// Message field a URL variable is written to
    pub fn field_for<'a>(&'a self, variable: &'a str) -> &'a str {
        self.mapping_fields
            .get(variable)
            .map_or(variable, String::as_str)
    }

    pub const fn response_type(&self) -> &'static str {
        self.message.response.name
    }
}

/// `APIRebootVmInstanceMsg` -> `rebootVmInstance`
pub fn derive_action_name(type_name: &str) -> String {
    let name = type_name.strip_prefix(ACTION_PREFIX).unwrap_or(type_name);
    let name = name.strip_suffix(ACTION_SUFFIX).unwrap_or(name);

    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}

/// How a reply or event is copied into the response envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Copy this field verbatim under its own name
    All(String),
    /// Output key -> source field path
    Fields(Vec<(String, String)>),
}

/// Field-mapping metadata for one reply or event type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDescriptor {
    type_name: &'static str,
    projection: Projection,
}

impl ResponseDescriptor {
    pub fn new(type_name: &'static str, rest: &RestResponse) -> Result<Self, RegistryError> {
        let projection = if rest.all_to.is_empty() {
            Projection::Fields(parse_pairs(type_name, rest.fields_to)?)
        } else {
            Projection::All(rest.all_to.to_string())
        };
        Ok(Self {
            type_name,
            projection,
        })
    }

    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub const fn projection(&self) -> &Projection {
        &self.projection
    }
}

/// Parse `key=value` entries, both sides trimmed
fn parse_pairs(
    type_name: &'static str,
    entries: &[&str],
) -> Result<Vec<(String, String)>, RegistryError> {
    entries
        .iter()
        .map(|entry| {
            let parts: Vec<&str> = entry.split('=').collect();
            match parts.as_slice() {
                [key, value] if !key.trim().is_empty() && !value.trim().is_empty() => {
                    Ok((key.trim().to_string(), value.trim().to_string()))
                }
                _ => Err(RegistryError::BadMappingField {
                    entry: (*entry).to_string(),
                    type_name,
                }),
            }
        })
        .collect()
}
