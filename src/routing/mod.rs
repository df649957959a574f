//! Routing module
//!
//! Provides the request routing layer:
//! - Ant-style path templates with variable extraction
//! - API/response descriptors derived from message type metadata
//! - The immutable routing table built at startup

mod descriptor;
mod matcher;
mod registry;

pub use descriptor::{derive_action_name, ApiDescriptor, Projection, ResponseDescriptor};
pub use matcher::{PathPattern, PathVariables};
pub use registry::{ApiRegistry, Route, RouteMatch, RoutingTable};
