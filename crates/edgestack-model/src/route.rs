//! Route table entries and the declarative routes-file shapes.
//!
//! A [`Route`] pairs an optional [`RouteCondition`] with an ordered action
//! list and a terminal flag. Actions are pure data; the executor in
//! `edgestack-core` interprets them. [`RouteSpec`]/[`RoutesFile`] are the
//! serde-facing shapes a routes JSON file deserializes into before being
//! compiled into runtime routes.

use serde::{Deserialize, Serialize};

use crate::condition::{ConditionSpec, RouteCondition};
use crate::error::EdgeError;

/// The `from` side of a rewrite action: a literal substring or a regular
/// expression (`{"regex": "..."}`). Absent means the rewrite ignores the
/// current path entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RewriteFrom {
    /// `{ "regex": "^/old/(.*)$" }` — capture groups referenced as `$1…` in
    /// the rewrite target.
    Regex {
        /// The regular expression source.
        regex: String,
    },
    /// A literal substring to replace.
    Literal(String),
}

fn default_redirect_status() -> u16 {
    302
}

/// One step of a route's action pipeline.
///
/// The wire form is a `type`-tagged JSON object; each variant carries only
/// the fields relevant to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RouteAction {
    /// Unconditionally set a response header.
    SetResponseHeader {
        /// Header name.
        key: String,
        /// Header value.
        value: String,
    },
    /// Unconditionally set a request header.
    SetRequestHeader {
        /// Header name.
        key: String,
        /// Header value.
        value: String,
    },
    /// Merge a value into a response header (comma-join, or append for
    /// `set-cookie`).
    AddResponseHeader {
        /// Header name.
        key: String,
        /// Header value.
        value: String,
    },
    /// Merge a value into a request header.
    AddRequestHeader {
        /// Header name.
        key: String,
        /// Header value.
        value: String,
    },
    /// Remove a response header.
    DeleteResponseHeader {
        /// Header name.
        key: String,
    },
    /// Remove a request header.
    DeleteRequestHeader {
        /// Header name.
        key: String,
    },
    /// Set a response header only when absent.
    SetDefaultResponseHeader {
        /// Header name.
        key: String,
        /// Header value.
        value: String,
    },
    /// Set a request header only when absent.
    SetDefaultRequestHeader {
        /// Header name.
        key: String,
        /// Header value.
        value: String,
    },
    /// Overwrite the response status. Last write wins across a chain.
    SetResponseStatus {
        /// The HTTP status code.
        status_code: u16,
    },
    /// Replace the response body, recomputing `content-length` and clearing
    /// any stale `content-encoding`.
    SetResponseBody {
        /// The new body text.
        body: String,
    },
    /// Rewrite the request path.
    Rewrite {
        /// What to replace; absent replaces the whole path with `to`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<RewriteFrom>,
        /// The rewrite target; may reference regex groups (`$1`) or pattern
        /// params (`:id`).
        to: String,
    },
    /// Respond with a `location` header and redirect status; no body.
    Redirect {
        /// The redirect target.
        to: String,
        /// The redirect status code (302 when omitted).
        #[serde(default = "default_redirect_status")]
        status_code: u16,
    },
    /// Proxy the request to an upstream and copy its status/headers/body
    /// into the response.
    Proxy {
        /// The destination URL.
        url: String,
        /// Forward the inbound `host` header instead of the destination's.
        #[serde(default)]
        preserve_host_header: bool,
        /// Forward the full inbound header set instead of a minimal one.
        #[serde(default)]
        preserve_headers: bool,
        /// Use the inbound path instead of the destination URL's path.
        #[serde(default)]
        preserve_path: bool,
        /// Use the inbound query string instead of the destination URL's.
        #[serde(default)]
        preserve_query: bool,
    },
    /// Serve a build-time static asset.
    ServeAsset {
        /// Asset path; defaults to the request path.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// Serve an immutable build-time asset with a long-lived cache policy.
    ServePermanentAsset {
        /// Asset path; defaults to the request path.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// Proxy to the locally-running user application process.
    ServeApp,
    /// Return a diagnostic response describing the received request.
    Echo,
    /// Optimize the image named by the `url` query parameter.
    ImageOptimizer,
    /// Invoke a registered user transform function against the
    /// request/response pair.
    NodeFunction {
        /// Registry path of the function.
        path: String,
    },
    /// Short-circuit with `200 OK`, body `"OK"`.
    HealthCheck,
}

/// One route table entry: optional condition, ordered actions, terminal flag.
#[derive(Debug, Clone)]
pub struct Route {
    /// When absent, the route matches every request.
    pub condition: Option<RouteCondition>,
    /// Actions executed in order on match.
    pub actions: Vec<RouteAction>,
    /// When `true`, a match stops evaluation of later routes.
    pub terminal: bool,
}

impl Route {
    /// Build a non-terminal route.
    #[must_use]
    pub fn new(condition: Option<RouteCondition>, actions: Vec<RouteAction>) -> Self {
        Self {
            condition,
            actions,
            terminal: false,
        }
    }

    /// Build a terminal route.
    #[must_use]
    pub fn terminal(condition: Option<RouteCondition>, actions: Vec<RouteAction>) -> Self {
        Self {
            condition,
            actions,
            terminal: true,
        }
    }
}

/// Wire shape of one route in the routes file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteSpec {
    /// Match condition; absent matches everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionSpec>,
    /// Ordered action list.
    pub actions: Vec<RouteAction>,
    /// Stop evaluating later routes on match.
    pub terminal: bool,
}

impl RouteSpec {
    /// Compile to a runtime [`Route`].
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::InvalidRoute`] when the condition carries an
    /// invalid regex or path pattern.
    pub fn compile(&self) -> Result<Route, EdgeError> {
        Ok(Route {
            condition: self.condition.as_ref().map(ConditionSpec::compile).transpose()?,
            actions: self.actions.clone(),
            terminal: self.terminal,
        })
    }
}

/// Top-level shape of a routes JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutesFile {
    /// Routes in priority order.
    pub routes: Vec<RouteSpec>,
}

impl RoutesFile {
    /// Compile every entry to a runtime route, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::InvalidRoute`] on the first invalid entry.
    pub fn compile(&self) -> Result<Vec<Route>, EdgeError> {
        self.routes.iter().map(RouteSpec::compile).collect()
    }
}
