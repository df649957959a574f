// Per-request context
// Built once at request entry and passed explicitly to everything that needs it

use hyper::header::{HeaderMap, AUTHORIZATION};
use hyper::http::request::Parts;
use hyper::{Method, Version};
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;
use std::time::Instant;

use super::dispatch::AUTH_SCHEME;

/// What the gateway knows about the request being handled
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlates trace, access and error lines of one request
    pub request_id: String,
    pub method: Method,
    /// Percent-decoded request path
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub version: Version,
    pub remote_host: String,
    /// Session handle the client presented, if any; not validated here
    pub session: Option<String>,
    pub started: Instant,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts, remote: SocketAddr) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().simple().to_string(),
            method: parts.method.clone(),
            path: decode_path(parts.uri.path()),
            query: parts.uri.query().map(ToString::to_string),
            headers: parts.headers.clone(),
            version: parts.version,
            remote_host: remote.ip().to_string(),
            session: session_handle(&parts.headers),
            started: Instant::now(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `1.1` style version label for the access log
    pub const fn http_version(&self) -> &'static str {
        match self.version {
            Version::HTTP_09 => "0.9",
            Version::HTTP_10 => "1.0",
            Version::HTTP_2 => "2",
            Version::HTTP_3 => "3",
            _ => "1.1",
        }
    }
}

/// `<id>` of an `Authorization: OAuth <id>` header
fn session_handle(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let session = value.trim().strip_prefix(AUTH_SCHEME)?.trim();
    (!session.is_empty()).then(|| session.to_string())
}

/// Percent-decode a path; `+` is left alone
pub fn decode_path(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;

    fn parts(uri: &str) -> Parts {
        Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header("Authorization", "OAuth abc")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_context_from_parts() {
        let ctx = RequestContext::from_parts(
            &parts("/v1/zones/my%20zone/actions?limit=1"),
            "10.0.0.7:5123".parse().unwrap(),
        );
        assert_eq!(ctx.method, Method::PUT);
        assert_eq!(ctx.path, "/v1/zones/my zone/actions");
        assert_eq!(ctx.query.as_deref(), Some("limit=1"));
        assert_eq!(ctx.remote_host, "10.0.0.7");
        assert_eq!(ctx.header("authorization"), Some("OAuth abc"));
        assert_eq!(ctx.session.as_deref(), Some("abc"));
        assert_eq!(ctx.http_version(), "1.1");
        assert_eq!(ctx.request_id.len(), 32);
    }

    #[test]
    fn test_session_handle() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_handle(&headers), None);

        headers.insert(AUTHORIZATION, "  OAuth   s-1 ".parse().unwrap());
        assert_eq!(session_handle(&headers).as_deref(), Some("s-1"));

        headers.insert(AUTHORIZATION, "Basic Zm9v".parse().unwrap());
        assert_eq!(session_handle(&headers), None);

        headers.insert(AUTHORIZATION, "OAuth".parse().unwrap());
        assert_eq!(session_handle(&headers), None);
    }

    #[test]
    fn test_plus_is_not_a_space() {
        assert_eq!(decode_path("/v1/a+b%2Fc"), "/v1/a+b/c");
    }
}
