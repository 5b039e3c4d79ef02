//! Header names shared with external processes.
//!
//! The names in this module are wire contracts: the recursion-count header is
//! read and written by every compute hop, and the cooperation headers are
//! interpreted by the separately operated edge proxy. They must stay
//! byte-compatible with that proxy and must never be renamed independently
//! of it.

/// Identifies that a request arrived through the platform's edge proxy and
/// carries the proxy's version.
pub const EDGE_PROXY_VERSION_HEADER: &str = "x-edge-proxy-version";

/// Instructs the edge proxy to follow a redirect itself instead of
/// forwarding it to the client.
pub const FOLLOW_REDIRECT_HEADER: &str = "x-edge-follow-redirect";

/// Instructs the edge proxy to merge the final upstream status code and
/// headers into the response it ultimately returns.
pub const MERGE_UPSTREAM_HEADER: &str = "x-edge-merge-upstream";

/// Numeric-string hop counter incremented on every outbound call; absent on
/// first entry (treated as `0`).
pub const RECURSION_COUNT_HEADER: &str = "x-edge-recursion-count";

/// Marks a response that went through the image optimizer action.
pub const IMAGE_OPTIMIZED_HEADER: &str = "x-edge-image-optimized";

/// Request id stamped on every response.
pub const REQUEST_ID_HEADER: &str = "x-edge-request-id";

/// Provider-internal header families stripped from inbound requests and
/// outbound proxy results; re-forwarding them triggers gateway errors on
/// some providers.
pub const PROVIDER_INTERNAL_PREFIXES: &[&str] = &["x-amz-", "x-amzn-"];

/// Headers some cloud providers refuse to return as multi-value entries
/// even when they carry a single value.
pub const SINGLE_VALUE_ONLY_HEADERS: &[&str] =
    &["content-disposition", "content-type", "content-length", "location"];
