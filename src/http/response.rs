//! HTTP response building module
//!
//! [`Reply`] is what the gateway decides to answer; it is turned into a hyper
//! response only at the connection boundary.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

use super::envelope::ApiResponse;
use crate::error::GatewayError;
use crate::logger;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json; charset=utf-8";

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Empty,
    /// Protocol and internal error messages
    Text(String),
    Json(ApiResponse),
}

/// Status plus body of an answer
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: ReplyBody,
}

impl Reply {
    pub const fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: ReplyBody::Empty,
        }
    }

    pub fn text(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ReplyBody::Text(message.into()),
        }
    }

    /// An envelope with nothing in it is sent as an empty body
    pub fn json(status: StatusCode, response: ApiResponse) -> Self {
        if response.is_empty() {
            return Self::empty(status);
        }
        Self {
            status,
            body: ReplyBody::Json(response),
        }
    }

    pub fn envelope(&self) -> Option<&ApiResponse> {
        match &self.body {
            ReplyBody::Json(response) => Some(response),
            _ => None,
        }
    }

    /// Serialized body and its content type
    pub fn render(&self) -> (Option<&'static str>, Bytes) {
        match &self.body {
            ReplyBody::Empty => (None, Bytes::new()),
            ReplyBody::Text(message) => (Some(TEXT_PLAIN), Bytes::from(message.clone())),
            ReplyBody::Json(response) => match response.to_json() {
                Ok(json) => (Some(APPLICATION_JSON), Bytes::from(json)),
                Err(e) => {
                    logger::log_error(&format!("Failed to serialize response: {e}"));
                    (Some(TEXT_PLAIN), Bytes::from(e.to_string()))
                }
            },
        }
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let (content_type, body) = self.render();
        let mut builder = Response::builder().status(self.status);
        if let Some(content_type) = content_type {
            builder = builder.header("Content-Type", content_type);
        }

        builder.body(Full::new(body)).unwrap_or_else(|e| {
            log_build_error(self.status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
    }
}

impl From<GatewayError> for Reply {
    fn from(err: GatewayError) -> Self {
        Self::text(err.status(), err.to_string())
    }
}

/// Log response build error
fn log_build_error(response_type: &str, error: &hyper::http::Error) {
    logger::log_error(&format!("Failed to build {response_type} response: {error}"));
}
