//! The socket-transport hyper service.
//!
//! One [`EdgeHttpService`] is built at startup and cheaply cloned per
//! connection. Each call collects the inbound body, normalizes the request,
//! runs the route chain, and projects the finished response back onto the
//! hyper connection.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use edgestack_core::{
    EdgeConfig, EdgeRequest, FunctionRegistry, OutboundClient, RequestBody, RequestContext, Router,
};
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tracing::{debug, warn};

use crate::body::EdgeResponseBody;
use crate::client::{bag_to_header_map, header_map_to_bag};

/// Shared per-process state behind the service handle.
pub(crate) struct Shared {
    pub(crate) router: Router,
    pub(crate) config: EdgeConfig,
    pub(crate) client: Arc<dyn OutboundClient>,
    pub(crate) functions: FunctionRegistry,
}

/// The hyper service for the socket transport.
#[derive(Clone)]
pub struct EdgeHttpService {
    inner: Arc<Shared>,
    peer: Option<SocketAddr>,
}

impl std::fmt::Debug for EdgeHttpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeHttpService")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl EdgeHttpService {
    /// Build the service from its parts.
    #[must_use]
    pub fn new(
        router: Router,
        config: EdgeConfig,
        client: Arc<dyn OutboundClient>,
        functions: FunctionRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                router,
                config,
                client,
                functions,
            }),
            peer: None,
        }
    }

    /// A clone of the service bound to one peer address, so requests can
    /// carry the caller's IP.
    #[must_use]
    pub fn for_peer(&self, peer: SocketAddr) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            peer: Some(peer),
        }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.inner
    }

    /// Build a context for one normalized request.
    pub(crate) fn context_for(&self, request: EdgeRequest) -> RequestContext {
        RequestContext::new(
            request,
            self.inner.config.clone(),
            Arc::clone(&self.inner.client),
            self.inner.functions.clone(),
        )
    }

    async fn handle_connection_request(
        self,
        req: Request<Incoming>,
    ) -> Response<EdgeResponseBody> {
        let (parts, body) = req.into_parts();

        let headers = header_map_to_bag(&parts.headers);
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", http::uri::PathAndQuery::as_str);

        let body = match body.collect().await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                if bytes.is_empty() {
                    RequestBody::Empty
                } else {
                    RequestBody::Buffered(bytes)
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read request body");
                return plain_response(StatusCode::BAD_REQUEST, "failed to read request body");
            }
        };

        let request = match EdgeRequest::from_parts(
            parts.method.as_str(),
            path_and_query,
            headers,
            body,
            self.peer.map(|p| p.ip().to_string()),
        ) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "failed to normalize request");
                return plain_response(StatusCode::BAD_REQUEST, "malformed request");
            }
        };

        debug!(method = %request.method, path = request.path(), "handling socket request");

        let mut ctx = self.context_for(request);
        ctx.handle(self.shared().router()).await;

        match ctx.response.into_wire_parts() {
            Ok((status, headers, body)) => {
                let mut builder = Response::builder()
                    .status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
                if let Some(out) = builder.headers_mut() {
                    *out = bag_to_header_map(&headers);
                }
                builder
                    .body(EdgeResponseBody::from(body))
                    .unwrap_or_else(|_| {
                        plain_response(StatusCode::INTERNAL_SERVER_ERROR, "response build failed")
                    })
            }
            Err(e) => {
                warn!(error = %e, "failed to finalize response");
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl Shared {
    pub(crate) fn router(&self) -> &Router {
        &self.router
    }
}

fn plain_response(status: StatusCode, message: &'static str) -> Response<EdgeResponseBody> {
    let mut response = Response::new(EdgeResponseBody::from_bytes(message.as_bytes()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert("content-type", http::HeaderValue::from_static("text/plain"));
    response
}

impl hyper::service::Service<Request<Incoming>> for EdgeHttpService {
    type Response = Response<EdgeResponseBody>;
    type Error = std::convert::Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle_connection_request(req).await) })
    }
}
