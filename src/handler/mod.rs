//! Request handler module
//!
//! Responsible for turning an HTTP request into a gateway reply:
//! - per-request context
//! - descriptor selection, authorization and message building
//! - async job polling

mod context;
pub mod dispatch;
pub mod jobs;
pub mod router;

pub use context::{decode_path, RequestContext};
pub use dispatch::RequestBody;
pub use router::handle_request;
