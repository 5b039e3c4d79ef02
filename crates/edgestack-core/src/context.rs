//! Per-invocation request context.
//!
//! One [`RequestContext`] owns the request/response pair for exactly one
//! inbound request, plus the guarded outbound client every downstream call
//! path shares. It drives the route chain and is the single interception
//! point where pipeline errors are normalized into a structured response.

use std::sync::Arc;

use edgestack_model::contract::REQUEST_ID_HEADER;
use edgestack_model::{EdgeError, EdgeResult, Params};
use uuid::Uuid;

use crate::client::{GuardedClient, OutboundClient};
use crate::compression::Encoding;
use crate::config::EdgeConfig;
use crate::executor::execute_action;
use crate::functions::FunctionRegistry;
use crate::guard::RecursionGuard;
use crate::request::EdgeRequest;
use crate::response::EdgeResponse;
use crate::router::{Router, condition_matches};

/// The value of the `server` response header.
const SERVER_NAME: &str = "edgestack";

/// Everything one invocation needs: the live request/response pair, the
/// configuration, the guarded outbound client, and the function registry.
#[derive(Debug)]
pub struct RequestContext {
    /// The live inbound request.
    pub request: EdgeRequest,
    /// The response under construction.
    pub response: EdgeResponse,
    /// Effective configuration.
    pub config: EdgeConfig,
    /// The outbound client, recursion-guarded for this invocation.
    pub client: GuardedClient,
    /// Registered edge functions.
    pub functions: FunctionRegistry,
    /// Unique id for this invocation, stamped on the response.
    pub request_id: String,
}

impl RequestContext {
    /// Build a context for one inbound request. Output compression is
    /// negotiated from the request's `accept-encoding` up front.
    #[must_use]
    pub fn new(
        request: EdgeRequest,
        config: EdgeConfig,
        client: Arc<dyn OutboundClient>,
        functions: FunctionRegistry,
    ) -> Self {
        let guard = RecursionGuard::new(config.recursion_limit);
        let client = GuardedClient::new(client, guard, request.recursion_count);

        let mut response = EdgeResponse::new();
        response.set_output_compression(Encoding::negotiate(request.headers.get("accept-encoding")));

        Self {
            request,
            response,
            config,
            client,
            functions,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Run the route chain: iterate routes in table order, execute every
    /// matching route's actions in order, stop at the first terminal match.
    ///
    /// # Errors
    ///
    /// Propagates the first action failure.
    pub async fn run(&mut self, router: &Router) -> EdgeResult<()> {
        for route in router.routes() {
            let matched = match &route.condition {
                None => Some(Params::new()),
                Some(condition) => condition_matches(condition, &self.request),
            };
            let Some(mut params) = matched else {
                continue;
            };
            self.request.params.append(&mut params);

            for action in &route.actions {
                execute_action(self, action).await?;
            }
            if route.terminal {
                break;
            }
        }
        Ok(())
    }

    /// Run the route chain and absorb any failure into a structured error
    /// response. After this the response is complete.
    pub async fn handle(&mut self, router: &Router) {
        if let Err(err) = self.run(router).await {
            self.render_error(&err);
        }

        self.response.headers.set_default("server", SERVER_NAME);
        self.response
            .headers
            .set(REQUEST_ID_HEADER, self.request_id.clone());

        if let Err(err) = self.response.end(None) {
            tracing::error!(request_id = %self.request_id, error = %err, "failed to finish response");
        }
    }

    /// Normalize a pipeline error into a response. The body format follows
    /// the request's `accept` header: JSON, HTML, or plain text.
    fn render_error(&mut self, err: &EdgeError) {
        tracing::error!(
            request_id = %self.request_id,
            method = %self.request.method,
            path = self.request.path(),
            error = %err,
            "request failed"
        );

        if self.response.head_sent() {
            // The head is on the wire; the best we can do is truncate the
            // body by ending the stream.
            return;
        }

        self.response.clear();
        self.response.status = err.status_code();

        let accept = self.request.headers.get("accept").unwrap_or("");
        let version = env!("CARGO_PKG_VERSION");
        if accept.contains("application/json") {
            let payload = serde_json::json!({
                "error": {
                    "message": err.to_string(),
                    "statusCode": err.status_code(),
                    "requestId": self.request_id,
                    "version": version,
                }
            });
            self.response
                .headers
                .set("content-type", "application/json");
            self.response.set_body(payload.to_string());
        } else if accept.contains("text/html") {
            let body = format!(
                "<!DOCTYPE html><html><head><title>{status}</title></head>\
                 <body><h1>{status}</h1><p>{message}</p>\
                 <p><small>request {request_id} &middot; v{version}</small></p></body></html>",
                status = err.status_code(),
                message = err,
                request_id = self.request_id,
            );
            self.response
                .headers
                .set("content-type", "text/html; charset=utf-8");
            self.response.set_body(body);
        } else {
            self.response.headers.set("content-type", "text/plain");
            self.response
                .set_body(format!("{err} (request {} v{version})", self.request_id));
        }
    }
}
