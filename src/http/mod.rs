//! HTTP protocol layer module
//!
//! Wire-side types of the gateway: the JSON response envelope, the projector
//! filling it from bus replies, and the reply-to-hyper conversion.

mod envelope;
pub mod projector;
pub mod response;

pub use envelope::ApiResponse;
pub use projector::write_response;
pub use response::{Reply, ReplyBody};
