//! Request entry module
//!
//! Entry point for HTTP request processing: body size checks, request context
//! construction, hand-off to the gateway, then tracing and access logging.

use crate::config::AppState;
use crate::error::GatewayError;
use crate::http::Reply;
use crate::logger::{self, AccessLogEntry};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use super::RequestContext;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();
    let ctx = RequestContext::from_parts(&parts, remote);
    let max_body_size = state.config.performance.max_body_size;

    // 1. Check declared body size before reading anything
    if let Some(err) = check_body_size(&ctx, max_body_size) {
        logger::log_request_trace(&ctx, "");
        return Ok(finish(&ctx, Reply::from(err), &state));
    }

    // 2. Collect the body, still capped for chunked uploads
    let bytes = match read_body(body, max_body_size).await {
        Ok(bytes) => bytes,
        Err(err) => {
            logger::log_request_trace(&ctx, "");
            return Ok(finish(&ctx, Reply::from(err), &state));
        }
    };
    logger::log_request_trace(&ctx, &String::from_utf8_lossy(&bytes));

    // 3. Dispatch
    let reply = state.gateway.handle(&ctx, &bytes).await;
    Ok(finish(&ctx, reply, &state))
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(ctx: &RequestContext, max_body_size: u64) -> Option<GatewayError> {
    let size_str = ctx.header("content-length")?;
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => Some(too_large(max_body_size)),
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            None
        }
        _ => None,
    }
}

async fn read_body<B>(body: B, max_body_size: u64) -> Result<Bytes, GatewayError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(too_large(max_body_size))
        }
        Err(err) => Err(GatewayError::bad_request(format!(
            "failed to read the request body: {err}"
        ))),
    }
}

fn too_large(max_body_size: u64) -> GatewayError {
    GatewayError::PayloadTooLarge(format!(
        "the request body exceeds {max_body_size} bytes"
    ))
}

/// Trace and access-log the reply, then turn it into a hyper response
fn finish(ctx: &RequestContext, reply: Reply, state: &AppState) -> Response<Full<Bytes>> {
    let (_, body) = reply.render();
    logger::log_response_trace(ctx, reply.status.as_u16(), &String::from_utf8_lossy(&body));

    if state.config.logging.access_log {
        let mut entry = AccessLogEntry::new(
            ctx.request_id.clone(),
            ctx.remote_host.clone(),
            ctx.method.to_string(),
            ctx.path.clone(),
        );
        entry.query = ctx.query.clone();
        entry.http_version = ctx.http_version().to_string();
        entry.status = reply.status.as_u16();
        entry.body_bytes = body.len();
        entry.user_agent = ctx.header("user-agent").map(ToString::to_string);
        entry.request_time_us = u64::try_from(ctx.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    reply.into_response()
}
