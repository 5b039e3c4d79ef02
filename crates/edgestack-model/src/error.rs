//! Error taxonomy for the edge request-handling layer.
//!
//! Fatal errors (`UnsupportedEvent`, `RecursionLimitExceeded`) surface as 5xx
//! responses; action-level failures (missing asset, upstream connect failure)
//! are recovered into a structured error response by the request context
//! rather than crashing the invocation.

/// Error type for the edge routing and action pipeline.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    /// The inbound cloud event did not carry a recognized version marker.
    #[error("unsupported event payload: {0}")]
    UnsupportedEvent(String),

    /// The inbound hop count exceeded the configured recursion limit.
    #[error("recursion limit exceeded: count {count} > limit {limit}")]
    RecursionLimitExceeded {
        /// The hop count observed on the inbound request.
        count: u32,
        /// The configured maximum.
        limit: u32,
    },

    /// An outbound call to an upstream failed.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// A static asset could not be served.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// A `nodeFunction` action referenced an unregistered function path.
    #[error("edge function not found: {0}")]
    FunctionNotFound(String),

    /// A route condition or action carried an invalid pattern or URL.
    #[error("invalid route configuration: {0}")]
    InvalidRoute(String),

    /// A destination URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// An I/O failure, typically from the compression stream.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl EdgeError {
    /// The HTTP status code this error renders as.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnsupportedEvent(_)
            | Self::FunctionNotFound(_)
            | Self::InvalidRoute(_)
            | Self::InvalidUrl(_)
            | Self::Io(_) => 500,
            Self::RecursionLimitExceeded { .. } => 508,
            Self::Upstream(_) => 502,
            Self::AssetNotFound(_) => 404,
        }
    }
}

/// Convenience result type for edge operations.
pub type EdgeResult<T> = Result<T, EdgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_errors_to_status_codes() {
        assert_eq!(EdgeError::UnsupportedEvent("v9".into()).status_code(), 500);
        assert_eq!(
            EdgeError::RecursionLimitExceeded { count: 6, limit: 5 }.status_code(),
            508
        );
        assert_eq!(EdgeError::Upstream("refused".into()).status_code(), 502);
        assert_eq!(EdgeError::AssetNotFound("/x".into()).status_code(), 404);
    }

    #[test]
    fn test_should_format_recursion_error_with_count() {
        let err = EdgeError::RecursionLimitExceeded { count: 6, limit: 5 };
        assert_eq!(
            err.to_string(),
            "recursion limit exceeded: count 6 > limit 5"
        );
    }
}
