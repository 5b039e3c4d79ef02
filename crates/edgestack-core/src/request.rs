//! The unified inbound request model.
//!
//! [`EdgeRequest`] normalizes both transports — cloud proxy events and raw
//! sockets — into one mutable object the router and action executor work
//! against. The URL is absolute (scheme and host reconstructed from
//! forwarding headers when the transport does not carry them), headers live
//! in a lower-cased [`HeaderBag`], and the body is fully in memory by the
//! time the pipeline starts.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use edgestack_model::contract::{PROVIDER_INTERNAL_PREFIXES, RECURSION_COUNT_HEADER};
use edgestack_model::{EdgeError, EdgeResult, HeaderBag, Params, ProxyEvent};
use url::Url;

/// The inbound request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    /// No body was sent.
    #[default]
    Empty,
    /// A fully-read body.
    Buffered(Bytes),
}

impl RequestBody {
    /// The body bytes; empty for [`RequestBody::Empty`].
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Empty => &[],
            Self::Buffered(bytes) => bytes,
        }
    }

    /// Returns `true` when no body was sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty) || self.as_bytes().is_empty()
    }
}

/// A transport-independent inbound request.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    /// The absolute request URL.
    pub url: Url,
    /// The upper-cased HTTP method.
    pub method: String,
    /// Inbound headers, lower-cased.
    pub headers: HeaderBag,
    /// The request body.
    pub body: RequestBody,
    /// Params captured by the most recent path-pattern match.
    pub params: Params,
    /// The caller's IP address, when the transport knows it.
    pub source_ip: Option<String>,
    /// The inbound hop count (0 on first entry).
    pub recursion_count: u32,
}

impl EdgeRequest {
    /// Build a request from a cloud proxy event.
    ///
    /// The event carries only a path; scheme, host, and port are
    /// reconstructed from forwarding headers with sensible local defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::UnsupportedEvent`] for an unrecognized payload
    /// version and [`EdgeError::InvalidUrl`] when the reconstructed URL does
    /// not parse.
    pub fn from_event(event: &ProxyEvent) -> EdgeResult<Self> {
        event.validate()?;

        let mut headers = HeaderBag::new();
        headers.set_many(event.headers.iter().map(|(k, v)| (k.as_str(), v.clone())));
        headers.delete_by_prefix(PROVIDER_INTERNAL_PREFIXES);

        let source_ip = if event.request_context.http.source_ip.is_empty() {
            None
        } else {
            Some(event.request_context.http.source_ip.clone())
        };

        let mut path_and_query = event.raw_path.clone();
        if !event.raw_query_string.is_empty() {
            path_and_query.push('?');
            path_and_query.push_str(&event.raw_query_string);
        }
        let url = absolute_url(&mut headers, &path_and_query, "https", source_ip.as_deref())?;

        let body = match &event.body {
            None => RequestBody::Empty,
            Some(text) if event.is_base64_encoded => {
                let decoded = BASE64
                    .decode(text)
                    .map_err(|e| EdgeError::UnsupportedEvent(format!("invalid base64 body: {e}")))?;
                RequestBody::Buffered(Bytes::from(decoded))
            }
            Some(text) => RequestBody::Buffered(Bytes::from(text.clone())),
        };

        let recursion_count = parse_recursion_count(&headers);

        Ok(Self {
            url,
            method: event.request_context.http.method.to_ascii_uppercase(),
            headers,
            body,
            params: Params::new(),
            source_ip,
            recursion_count,
        })
    }

    /// Build a request from socket-transport parts. The header bag is taken
    /// as already assembled by the transport layer; the socket itself is
    /// plain HTTP, with TLS terminating in front of this process and
    /// announced through `x-forwarded-proto`.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::InvalidUrl`] when the reconstructed URL does not
    /// parse.
    pub fn from_parts(
        method: &str,
        path_and_query: &str,
        mut headers: HeaderBag,
        body: RequestBody,
        source_ip: Option<String>,
    ) -> EdgeResult<Self> {
        headers.delete_by_prefix(PROVIDER_INTERNAL_PREFIXES);
        let url = absolute_url(&mut headers, path_and_query, "http", source_ip.as_deref())?;
        let recursion_count = parse_recursion_count(&headers);

        Ok(Self {
            url,
            method: method.to_ascii_uppercase(),
            headers,
            body,
            params: Params::new(),
            source_ip,
            recursion_count,
        })
    }

    /// The request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Replace the request path (rewrite support). The query string is
    /// untouched.
    pub fn set_path(&mut self, path: &str) {
        self.url.set_path(path);
    }

    /// The `host` header, falling back to the URL's host.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        self.headers
            .get("host")
            .map(ToOwned::to_owned)
            .or_else(|| self.url.host_str().map(ToOwned::to_owned))
    }

    /// The file extension of the request path, without the dot.
    #[must_use]
    pub fn path_extension(&self) -> Option<String> {
        let last_segment = self.url.path_segments()?.next_back()?.to_owned();
        let (_, ext) = last_segment.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }

    /// The first value of a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// All values of a repeated query parameter, in order.
    #[must_use]
    pub fn query_param_array(&self, name: &str) -> Vec<String> {
        self.url
            .query_pairs()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .collect()
    }

    /// All query parameters in order.
    #[must_use]
    pub fn query_params(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Set a query parameter, replacing every existing occurrence.
    pub fn set_query(&mut self, name: &str, value: &str) {
        let kept: Vec<(String, String)> = self
            .query_params()
            .into_iter()
            .filter(|(k, _)| k != name)
            .collect();
        {
            let mut pairs = self.url.query_pairs_mut();
            pairs.clear();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
            pairs.append_pair(name, value);
        }
    }

    /// The raw `cookie` header as ordered name/value pairs, duplicates
    /// preserved.
    fn cookie_pairs(&self) -> Vec<(String, String)> {
        let Some(header) = self.headers.get("cookie") else {
            return Vec::new();
        };
        header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                Some((name.trim().to_owned(), value.trim().to_owned()))
            })
            .collect()
    }

    /// Parse the `cookie` header into name/value pairs. Later duplicates
    /// win, matching the common server-side convention.
    #[must_use]
    pub fn cookies(&self) -> BTreeMap<String, String> {
        self.cookie_pairs().into_iter().collect()
    }

    /// The first value of one cookie.
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<String> {
        self.cookie_pairs()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// All values of a duplicated cookie name, in order.
    #[must_use]
    pub fn get_cookie_array(&self, name: &str) -> Vec<String> {
        self.cookie_pairs()
            .into_iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect()
    }

    /// Set a cookie, replacing every existing occurrence and
    /// re-serializing the `cookie` header.
    pub fn set_cookie(&mut self, name: &str, value: &str) {
        let mut pairs: Vec<(String, String)> = self
            .cookie_pairs()
            .into_iter()
            .filter(|(n, _)| n != name)
            .collect();
        pairs.push((name.to_owned(), value.to_owned()));
        self.write_cookie_header(&pairs);
    }

    /// Remove a cookie, re-serializing (or dropping) the `cookie` header.
    pub fn delete_cookie(&mut self, name: &str) {
        let pairs: Vec<(String, String)> = self
            .cookie_pairs()
            .into_iter()
            .filter(|(n, _)| n != name)
            .collect();
        self.write_cookie_header(&pairs);
    }

    fn write_cookie_header(&mut self, pairs: &[(String, String)]) {
        if pairs.is_empty() {
            self.headers.delete("cookie");
            return;
        }
        let serialized = pairs
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        self.headers.set("cookie", serialized);
    }
}

/// Reconstruct the absolute URL from forwarding headers, then write the
/// derived values back so every downstream hop sees the same picture:
/// `x-forwarded-proto`/`-host`/`-port` reflect what was used, the caller's
/// IP lands in `x-forwarded-for`, and the hop counter starts at zero when
/// no upstream set it.
fn absolute_url(
    headers: &mut HeaderBag,
    path_and_query: &str,
    default_scheme: &str,
    peer_ip: Option<&str>,
) -> EdgeResult<Url> {
    let scheme = headers
        .get("x-forwarded-proto")
        .unwrap_or(default_scheme)
        .to_owned();
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .unwrap_or("localhost")
        .to_owned();
    let default_port = if scheme == "http" { "80" } else { "443" };
    let port = headers
        .get("x-forwarded-port")
        .unwrap_or(default_port)
        .to_owned();

    let mut address = format!("{scheme}://{host}");
    if !host.contains(':') {
        address.push(':');
        address.push_str(&port);
    }
    address.push_str(path_and_query);
    let url = Url::parse(&address).map_err(|e| EdgeError::InvalidUrl(format!("{address}: {e}")))?;

    headers.set_default("x-forwarded-proto", scheme);
    headers.set_default("x-forwarded-host", host);
    headers.set_default("x-forwarded-port", port);
    if let Some(ip) = peer_ip {
        headers.set_default("x-forwarded-for", ip);
    }
    headers.set_default(RECURSION_COUNT_HEADER, "0");
    Ok(url)
}

fn parse_recursion_count(headers: &HeaderBag) -> u32 {
    headers
        .get(RECURSION_COUNT_HEADER)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
