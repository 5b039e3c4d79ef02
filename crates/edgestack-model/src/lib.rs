//! Data model for the EdgeStack edge routing layer.
//!
//! This crate contains the pure-data half of the system: the case-insensitive
//! [`HeaderBag`], route table entries ([`Route`], [`RouteCondition`],
//! [`RouteAction`]), compiled path patterns, the cloud proxy event/result
//! wire shapes, the [`EdgeError`] taxonomy, and the external header
//! contract shared with the edge proxy process. Behavior (matching a table,
//! executing actions, talking to upstreams) lives in `edgestack-core`.

pub mod condition;
pub mod contract;
pub mod error;
pub mod event;
pub mod headers;
pub mod pattern;
pub mod route;

pub use condition::{ConditionSpec, Predicate, PredicateSpec, RouteCondition};
pub use error::{EdgeError, EdgeResult};
pub use event::{ProxyEvent, ProxyResult, PROXY_EVENT_VERSION};
pub use headers::{HeaderBag, HeaderValues};
pub use pattern::{Params, ParamValue, PathPattern};
pub use route::{RewriteFrom, Route, RouteAction, RouteSpec, RoutesFile};
