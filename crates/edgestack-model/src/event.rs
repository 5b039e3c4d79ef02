//! Cloud proxy event and result wire shapes.
//!
//! These mirror the JSON payloads exchanged with the cloud function runtime.
//! [`ProxyEvent::validate`] enforces the single recognized payload version;
//! anything else is rejected before a request object is built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EdgeError;

/// The only payload version this layer accepts.
pub const PROXY_EVENT_VERSION: &str = "2.0";

/// The `http` block of a proxy event's request context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpContext {
    /// The HTTP method.
    pub method: String,
    /// The negotiated protocol, e.g. `HTTP/1.1`.
    pub protocol: String,
    /// The caller's IP address.
    pub source_ip: String,
}

/// The request context of a proxy event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestContext {
    /// The nested HTTP details.
    pub http: HttpContext,
}

/// An inbound cloud proxy event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyEvent {
    /// Payload version; must equal [`PROXY_EVENT_VERSION`].
    pub version: String,
    /// The raw (already percent-encoded) request path.
    pub raw_path: String,
    /// The raw query string, without the leading `?`.
    pub raw_query_string: String,
    /// Inbound headers. The runtime pre-joins duplicates with commas.
    pub headers: BTreeMap<String, String>,
    /// Invocation context.
    pub request_context: RequestContext,
    /// Request body, possibly base64-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Whether `body` is base64-encoded.
    pub is_base64_encoded: bool,
}

impl ProxyEvent {
    /// Check the payload version.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::UnsupportedEvent`] for any version other than
    /// [`PROXY_EVENT_VERSION`].
    pub fn validate(&self) -> Result<(), EdgeError> {
        if self.version == PROXY_EVENT_VERSION {
            Ok(())
        } else {
            Err(EdgeError::UnsupportedEvent(format!(
                "unrecognized payload version '{}'",
                self.version
            )))
        }
    }
}

/// The outbound cloud proxy result.
///
/// Single-valued headers go in `headers`; genuinely multi-valued ones
/// (`set-cookie`) in `multi_value_headers`. The body is always
/// base64-encoded so binary payloads survive the JSON envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyResult {
    /// The response status code.
    pub status_code: u16,
    /// Single-valued response headers.
    pub headers: BTreeMap<String, String>,
    /// Multi-valued response headers.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub multi_value_headers: BTreeMap<String, Vec<String>>,
    /// Base64-encoded response body.
    pub body: String,
    /// Always `true`; the body is base64-encoded.
    pub is_base64_encoded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_proxy_event() {
        let event: ProxyEvent = serde_json::from_str(
            r#"{
                "version": "2.0",
                "rawPath": "/users/42",
                "rawQueryString": "page=2",
                "headers": {"host": "app.example.com", "accept": "text/html"},
                "requestContext": {
                    "http": {"method": "GET", "protocol": "HTTP/1.1", "sourceIp": "203.0.113.9"}
                },
                "isBase64Encoded": false
            }"#,
        )
        .expect("valid event");
        assert_eq!(event.raw_path, "/users/42");
        assert_eq!(event.request_context.http.method, "GET");
        assert_eq!(event.headers.get("host").map(String::as_str), Some("app.example.com"));
        assert!(event.body.is_none());
        event.validate().expect("version 2.0 is accepted");
    }

    #[test]
    fn test_should_reject_unknown_event_version() {
        let event = ProxyEvent {
            version: "1.0".into(),
            ..ProxyEvent::default()
        };
        assert!(matches!(
            event.validate(),
            Err(EdgeError::UnsupportedEvent(_))
        ));
    }

    #[test]
    fn test_should_serialize_result_in_camel_case() {
        let result = ProxyResult {
            status_code: 200,
            headers: BTreeMap::from([("content-type".to_owned(), "text/plain".to_owned())]),
            multi_value_headers: BTreeMap::new(),
            body: "T0s=".into(),
            is_base64_encoded: true,
        };
        let json = serde_json::to_value(&result).expect("serializes");
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["isBase64Encoded"], true);
        assert_eq!(json["body"], "T0s=");
        assert!(json.get("multiValueHeaders").is_none());
    }
}
