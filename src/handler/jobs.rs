// Job query handler
// Serves polling GETs on the async job path

use hyper::{Method, StatusCode};

use crate::bridge::{JobStatus, MessageBridge};
use crate::error::{GatewayError, GatewayResult};
use crate::http::{projector, ApiResponse, Reply};
use crate::logger;
use crate::routing::ApiRegistry;

use super::RequestContext;

/// Answer a poll for `job_id` according to the job's state
pub async fn query_job(
    bridge: &MessageBridge,
    registry: &ApiRegistry,
    ctx: &RequestContext,
    job_id: &str,
    with_schema: bool,
) -> GatewayResult<Reply> {
    if ctx.method != Method::GET {
        return Err(GatewayError::MethodNotAllowed(
            "only GET method is allowed for querying job status".to_string(),
        ));
    }

    let status = bridge.query_job(job_id).await;
    logger::log_debug(&format!(
        "[ID: {}] job {job_id} is {}",
        ctx.request_id,
        status.state()
    ));

    match status {
        JobStatus::Expired => Err(GatewayError::NotFound(
            "the job has been expired".to_string(),
        )),
        JobStatus::Processing => Ok(Reply::empty(StatusCode::ACCEPTED)),
        JobStatus::Done(event) if event.success => {
            let response = projector::project(registry, &event.type_name, &event.body, with_schema)?;
            Ok(Reply::json(StatusCode::OK, response))
        }
        JobStatus::Done(event) => Ok(Reply::json(
            StatusCode::SERVICE_UNAVAILABLE,
            event.error.map_or_else(ApiResponse::default, ApiResponse::failed),
        )),
    }
}
