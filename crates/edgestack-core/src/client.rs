//! Outbound HTTP client abstraction.
//!
//! The executor never talks to the network directly; it goes through an
//! [`OutboundClient`] so the hyper-backed implementation lives in the
//! transport crate and tests can substitute a recording fake. Every call
//! path shares one [`GuardedClient`] per invocation, which enforces the
//! recursion limit and stamps the incremented hop count on the way out.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use edgestack_model::contract::RECURSION_COUNT_HEADER;
use edgestack_model::{EdgeResult, HeaderBag};

use crate::guard::RecursionGuard;

/// An outbound HTTP request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// Upper-cased method.
    pub method: String,
    /// Absolute destination URL.
    pub url: String,
    /// Headers to send.
    pub headers: HeaderBag,
    /// Body bytes; must be empty for GET/HEAD.
    pub body: Bytes,
}

impl OutboundRequest {
    /// Build a body-less request.
    #[must_use]
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
            headers: HeaderBag::new(),
            body: Bytes::new(),
        }
    }
}

/// An upstream response, body fully read.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    /// The upstream status code.
    pub status: u16,
    /// Upstream headers, lower-cased.
    pub headers: HeaderBag,
    /// The complete upstream body.
    pub body: Bytes,
}

/// The outbound HTTP call seam.
#[async_trait]
pub trait OutboundClient: Send + Sync {
    /// Execute one request and read the response to completion.
    async fn execute(&self, request: OutboundRequest) -> EdgeResult<OutboundResponse>;
}

/// An [`OutboundClient`] wrapper that enforces the recursion limit for one
/// invocation and stamps the hop-count header on every outbound call.
#[derive(Clone)]
pub struct GuardedClient {
    inner: Arc<dyn OutboundClient>,
    guard: RecursionGuard,
    inbound_count: u32,
}

impl std::fmt::Debug for GuardedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedClient")
            .field("guard", &self.guard)
            .field("inbound_count", &self.inbound_count)
            .finish_non_exhaustive()
    }
}

impl GuardedClient {
    /// Wrap a client for one invocation that arrived with `inbound_count`
    /// hops already taken.
    #[must_use]
    pub fn new(inner: Arc<dyn OutboundClient>, guard: RecursionGuard, inbound_count: u32) -> Self {
        Self {
            inner,
            guard,
            inbound_count,
        }
    }

    /// Execute an outbound call, failing fast on a recursion-limit breach
    /// before any network activity.
    ///
    /// # Errors
    ///
    /// Returns [`edgestack_model::EdgeError::RecursionLimitExceeded`] when
    /// the inbound hop count is over the limit, or the inner client's error.
    pub async fn execute(&self, mut request: OutboundRequest) -> EdgeResult<OutboundResponse> {
        self.guard.check(self.inbound_count)?;
        request.headers.set(
            RECURSION_COUNT_HEADER,
            self.guard.next_count(self.inbound_count).to_string(),
        );
        self.inner.execute(request).await
    }
}
