//! REST gateway over an asynchronous message bus.
//!
//! HTTP requests are matched against registered API message types, turned
//! into messages and sent over a [`bridge::Bus`]. Synchronous calls are
//! answered with the projected reply; asynchronous calls get a `202` and a
//! job location that can be polled until the bus publishes the result.

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod http;
pub mod logger;
pub mod message;
pub mod query;
pub mod routing;
pub mod server;
