//! Hyper-backed outbound client.
//!
//! Upstreams (the asset origin, the app process, proxy destinations) are
//! reached over plain HTTP inside the platform network; TLS terminates at
//! the edge proxy in front of this layer.

use async_trait::async_trait;
use bytes::Bytes;
use edgestack_core::{OutboundClient, OutboundRequest, OutboundResponse};
use edgestack_model::{EdgeError, EdgeResult, HeaderBag, HeaderValues};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

/// Convert a [`HeaderBag`] into an [`http::HeaderMap`], skipping names or
/// values hyper rejects.
pub(crate) fn bag_to_header_map(bag: &HeaderBag) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, values) in bag {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        match values {
            HeaderValues::One(v) => {
                if let Ok(value) = HeaderValue::from_str(v) {
                    map.insert(name, value);
                }
            }
            HeaderValues::Many(list) => {
                for v in list {
                    if let Ok(value) = HeaderValue::from_str(v) {
                        map.append(name.clone(), value);
                    }
                }
            }
        }
    }
    map
}

/// Convert an [`http::HeaderMap`] into a [`HeaderBag`], accumulating
/// repeated names with `add` semantics.
pub(crate) fn header_map_to_bag(map: &HeaderMap) -> HeaderBag {
    let mut bag = HeaderBag::new();
    for (name, value) in map {
        if let Ok(value) = value.to_str() {
            bag.add(name.as_str(), value);
        }
    }
    bag
}

/// An [`OutboundClient`] backed by hyper's legacy pooling client.
#[derive(Clone)]
pub struct HyperOutboundClient {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl std::fmt::Debug for HyperOutboundClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperOutboundClient").finish_non_exhaustive()
    }
}

impl Default for HyperOutboundClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperOutboundClient {
    /// Create a client with a shared connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

#[async_trait]
impl OutboundClient for HyperOutboundClient {
    async fn execute(&self, request: OutboundRequest) -> EdgeResult<OutboundResponse> {
        let method: http::Method = request
            .method
            .parse()
            .map_err(|_| EdgeError::Upstream(format!("invalid method '{}'", request.method)))?;
        let uri: http::Uri = request
            .url
            .parse()
            .map_err(|e| EdgeError::InvalidUrl(format!("{}: {e}", request.url)))?;

        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = bag_to_header_map(&request.headers);
        }
        let outbound = builder
            .body(Full::new(request.body))
            .map_err(|e| EdgeError::Upstream(format!("failed to build request: {e}")))?;

        let response = self
            .client
            .request(outbound)
            .await
            .map_err(|e| EdgeError::Upstream(format!("{}: {e}", request.url)))?;

        let status = response.status().as_u16();
        let headers = header_map_to_bag(response.headers());
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| EdgeError::Upstream(format!("failed to read upstream body: {e}")))?
            .to_bytes();

        Ok(OutboundResponse {
            status,
            headers,
            body,
        })
    }
}
