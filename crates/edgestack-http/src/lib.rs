//! HTTP transports for EdgeStack.
//!
//! Two ways into the same pipeline: [`EdgeHttpService`] adapts a hyper
//! server connection (the raw socket transport), and
//! [`EdgeHttpService::handle_event`] adapts a cloud proxy event. Both
//! normalize into `edgestack-core`'s request/response pair and project the
//! finished response back out in the transport's native shape.

pub mod body;
pub mod client;
mod entry;
pub mod service;

pub use body::EdgeResponseBody;
pub use client::HyperOutboundClient;
pub use service::EdgeHttpService;
