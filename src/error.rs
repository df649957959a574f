//! Gateway error types
//!
//! Protocol errors are caused by the client and map to 4xx; everything else
//! the gateway itself fails at maps to 5xx. Bus failures are not errors here:
//! they travel as [`ErrorCode`](crate::message::ErrorCode) payloads.

use hyper::StatusCode;
use thiserror::Error;

/// Request-path errors, each carrying the message echoed to the client
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal errors are logged with full detail before answering
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl From<FieldError> for GatewayError {
    fn from(err: FieldError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ProjectionError> for GatewayError {
    fn from(err: ProjectionError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<JobStoreError> for GatewayError {
    fn from(err: JobStoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Startup configuration errors raised while building the API registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("bad mapping field[{entry}] of {type_name}")]
    BadMappingField {
        entry: String,
        type_name: &'static str,
    },

    #[error("{response} of {type_name} must declare a REST response descriptor")]
    MissingResponse {
        response: &'static str,
        type_name: &'static str,
    },

    #[error(
        "invalid REST request of {0}, either is_action must be set to true or parameter_name must be non-empty"
    )]
    MissingParameterName(&'static str),

    #[error("invalid path template[{template}]: {reason}")]
    InvalidTemplate { template: String, reason: String },
}

/// Errors raised by a message's settable-field table
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("unknown property '{field}' on {type_name}")]
    Unknown {
        field: String,
        type_name: &'static str,
    },

    #[error("invalid value '{value}' for property '{field}' on {type_name}")]
    InvalidValue {
        field: String,
        value: String,
        type_name: &'static str,
    },
}

/// Errors raised while copying fields out of a reply or event
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("unknown property '{field}' on {type_name}")]
    MissingField { field: String, type_name: String },

    #[error("no REST response descriptor registered for {0}")]
    NoDescriptor(String),
}

/// Async job store failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobStoreError {
    #[error("failed to persist async job for {type_name}: {reason}")]
    Save {
        type_name: &'static str,
        reason: String,
    },
}
