//! Routing engine and action executor for EdgeStack.
//!
//! This crate hosts the behavior half of the edge layer: the transport-
//! independent [`EdgeRequest`]/[`EdgeResponse`] pair, the ordered
//! [`Router`], the action [`executor`], streaming output [`compression`],
//! the outbound [`OutboundClient`] abstraction with its recursion
//! [`RecursionGuard`], and the per-invocation [`RequestContext`] that ties
//! them together. Transports (cloud proxy events, raw sockets) live in
//! `edgestack-http`.

pub mod client;
pub mod compression;
pub mod config;
pub mod context;
pub mod executor;
pub mod functions;
pub mod guard;
pub mod request;
pub mod response;
pub mod router;

pub use client::{GuardedClient, OutboundClient, OutboundRequest, OutboundResponse};
pub use compression::{CompressionWriter, Encoding};
pub use config::EdgeConfig;
pub use context::RequestContext;
pub use functions::{EdgeFunction, FunctionRegistry};
pub use guard::RecursionGuard;
pub use request::{EdgeRequest, RequestBody};
pub use response::{EdgeResponse, ResponseBody, ResponseState};
pub use router::Router;
