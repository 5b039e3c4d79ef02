//! End-to-end pipeline tests: route table in, wire-shaped response out,
//! with a recording fake standing in for the network.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use edgestack_core::{
    EdgeConfig, EdgeRequest, FunctionRegistry, OutboundClient, OutboundRequest, OutboundResponse,
    RequestContext, ResponseBody, Router,
};
use edgestack_model::contract::{
    EDGE_PROXY_VERSION_HEADER, FOLLOW_REDIRECT_HEADER, MERGE_UPSTREAM_HEADER,
    RECURSION_COUNT_HEADER,
};
use edgestack_model::event::{HttpContext, RequestContext as EventContext};
use edgestack_model::{
    EdgeResult, HeaderBag, Predicate, ProxyEvent, RouteAction, RouteCondition,
};

/// Records outbound requests and replies with a canned upstream response.
struct FakeUpstream {
    seen: Mutex<Vec<OutboundRequest>>,
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: &'static [u8],
}

impl FakeUpstream {
    fn ok(body: &'static [u8]) -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            status: 200,
            headers: vec![("content-type", "text/html")],
            body,
        })
    }

    fn with_headers(
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: &'static [u8],
    ) -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            status,
            headers,
            body,
        })
    }

    fn requests(&self) -> Vec<OutboundRequest> {
        self.seen.lock().expect("lock").clone()
    }
}

#[async_trait]
impl OutboundClient for FakeUpstream {
    async fn execute(&self, request: OutboundRequest) -> EdgeResult<OutboundResponse> {
        self.seen.lock().expect("lock").push(request);
        let mut headers = HeaderBag::new();
        for (k, v) in &self.headers {
            headers.add(*k, *v);
        }
        Ok(OutboundResponse {
            status: self.status,
            headers,
            body: Bytes::from_static(self.body),
        })
    }
}

fn event(path: &str, extra_headers: &[(&str, &str)]) -> ProxyEvent {
    let mut headers = BTreeMap::from([("host".to_owned(), "app.example.com".to_owned())]);
    for (k, v) in extra_headers {
        headers.insert((*k).to_owned(), (*v).to_owned());
    }
    ProxyEvent {
        version: "2.0".into(),
        raw_path: path.into(),
        raw_query_string: "utm=1".into(),
        headers,
        request_context: EventContext {
            http: HttpContext {
                method: "GET".into(),
                protocol: "HTTP/1.1".into(),
                source_ip: "203.0.113.9".into(),
            },
        },
        body: None,
        is_base64_encoded: false,
    }
}

fn context(
    path: &str,
    extra_headers: &[(&str, &str)],
    upstream: Arc<FakeUpstream>,
) -> RequestContext {
    let request = EdgeRequest::from_event(&event(path, extra_headers)).expect("valid event");
    RequestContext::new(
        request,
        EdgeConfig::default(),
        upstream,
        FunctionRegistry::new(),
    )
}

#[tokio::test]
async fn test_should_proxy_rewritten_path_to_upstream() {
    let upstream = FakeUpstream::ok(b"<p>hi</p>");

    let mut router = Router::new();
    router
        .get(
            "/old/:slug",
            vec![
                RouteAction::Rewrite {
                    from: None,
                    to: "/new/:slug".into(),
                },
                RouteAction::Proxy {
                    url: "http://upstream.internal".into(),
                    preserve_host_header: false,
                    preserve_headers: false,
                    preserve_path: true,
                    preserve_query: true,
                },
            ],
        )
        .expect("valid route");

    let mut ctx = context("/old/widget", &[], upstream.clone());
    ctx.handle(&router).await;

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "http://upstream.internal/new/widget?utm=1");
    assert_eq!(
        requests[0].headers.get("host"),
        Some("upstream.internal"),
        "destination host is sent unless preserveHostHeader is set"
    );
    assert_eq!(ctx.response.status, 200);
}

#[tokio::test]
async fn test_should_forward_original_host_when_preserved() {
    let upstream = FakeUpstream::ok(b"ok");

    let mut router = Router::new();
    router
        .get(
            "/",
            vec![RouteAction::Proxy {
                url: "http://upstream.internal/api".into(),
                preserve_host_header: true,
                preserve_headers: true,
                preserve_path: false,
                preserve_query: false,
            }],
        )
        .expect("valid route");

    let mut ctx = context("/", &[("x-custom", "kept")], upstream.clone());
    ctx.handle(&router).await;

    let requests = upstream.requests();
    assert_eq!(requests[0].headers.get("host"), Some("app.example.com"));
    assert_eq!(requests[0].headers.get("x-custom"), Some("kept"));
}

#[tokio::test]
async fn test_should_strip_upstream_content_encoding() {
    let upstream = FakeUpstream::with_headers(
        200,
        vec![("content-type", "text/html"), ("content-encoding", "gzip")],
        b"pretend-encoded",
    );

    let mut router = Router::new();
    router
        .get(
            "/",
            vec![RouteAction::Proxy {
                url: "http://upstream.internal".into(),
                preserve_host_header: false,
                preserve_headers: false,
                preserve_path: false,
                preserve_query: false,
            }],
        )
        .expect("valid route");

    let mut ctx = context("/", &[], upstream.clone());
    ctx.run(&router).await.expect("runs");

    assert!(!ctx.response.headers.contains("content-encoding"));
    // Upstreams are asked for identity bodies so the stripped header is honest.
    assert_eq!(
        upstream.requests()[0].headers.get("accept-encoding"),
        Some("identity")
    );
}

#[tokio::test]
async fn test_should_stamp_incremented_recursion_count_on_outbound() {
    let upstream = FakeUpstream::ok(b"ok");

    let mut router = Router::new();
    router
        .get(
            "/",
            vec![RouteAction::Proxy {
                url: "http://upstream.internal".into(),
                preserve_host_header: false,
                preserve_headers: false,
                preserve_path: false,
                preserve_query: false,
            }],
        )
        .expect("valid route");

    let mut ctx = context("/", &[(RECURSION_COUNT_HEADER, "2")], upstream.clone());
    ctx.handle(&router).await;

    assert_eq!(
        upstream.requests()[0].headers.get(RECURSION_COUNT_HEADER),
        Some("3")
    );
}

#[tokio::test]
async fn test_should_reject_request_over_recursion_limit_without_network() {
    let upstream = FakeUpstream::ok(b"never seen");

    let mut router = Router::new();
    router
        .get(
            "/",
            vec![RouteAction::Proxy {
                url: "http://upstream.internal".into(),
                preserve_host_header: false,
                preserve_headers: false,
                preserve_path: false,
                preserve_query: false,
            }],
        )
        .expect("valid route");

    // Default limit is 5; a count of exactly 5 is still allowed, 6 is not.
    let mut ctx = context("/", &[(RECURSION_COUNT_HEADER, "6")], upstream.clone());
    ctx.handle(&router).await;

    assert_eq!(ctx.response.status, 508);
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn test_should_redirect_and_merge_for_assets_behind_edge_proxy() {
    let upstream = FakeUpstream::ok(b"never fetched");

    let mut router = Router::new();
    router
        .get("/docs", vec![RouteAction::ServeAsset { path: None }])
        .expect("valid route");

    let mut ctx = context(
        "/docs",
        &[(EDGE_PROXY_VERSION_HEADER, "1")],
        upstream.clone(),
    );
    ctx.run(&router).await.expect("runs");

    assert_eq!(ctx.response.status, 302);
    assert_eq!(
        ctx.response.headers.get("location"),
        Some("http://127.0.0.1:3211/docs/index.html"),
        "extension-less paths get index.html appended"
    );
    assert_eq!(ctx.response.headers.get(FOLLOW_REDIRECT_HEADER), Some("true"));
    assert_eq!(ctx.response.headers.get(MERGE_UPSTREAM_HEADER), Some("true"));
    assert!(upstream.requests().is_empty(), "no second hop inside the runtime");
}

#[tokio::test]
async fn test_should_fetch_assets_directly_without_edge_proxy() {
    let upstream = FakeUpstream::ok(b"asset bytes");

    let mut router = Router::new();
    router
        .get(
            "/logo.svg",
            vec![RouteAction::ServePermanentAsset { path: None }],
        )
        .expect("valid route");

    let mut ctx = context("/logo.svg", &[], upstream.clone());
    ctx.run(&router).await.expect("runs");

    assert_eq!(upstream.requests()[0].url, "http://127.0.0.1:3211/logo.svg");
    assert_eq!(ctx.response.status, 200);
    assert_eq!(
        ctx.response.headers.get("cache-control"),
        Some("public, max-age=31536000, immutable")
    );
}

#[tokio::test]
async fn test_should_compress_proxied_body_for_gzip_client() {
    let upstream = FakeUpstream::ok(b"<html>hello hello hello hello hello</html>");

    let mut router = Router::new();
    router
        .get(
            "/",
            vec![RouteAction::Proxy {
                url: "http://upstream.internal".into(),
                preserve_host_header: false,
                preserve_headers: false,
                preserve_path: false,
                preserve_query: false,
            }],
        )
        .expect("valid route");

    let mut ctx = context("/", &[("accept-encoding", "gzip")], upstream);
    ctx.handle(&router).await;

    let (status, headers, body) = ctx.response.into_wire_parts().expect("parts");
    assert_eq!(status, 200);
    assert_eq!(headers.get("content-encoding"), Some("gzip"));

    let ResponseBody::Buffered(bytes) = body else {
        panic!("expected buffered body");
    };
    let mut decoder = flate2::read::GzDecoder::new(bytes.as_ref());
    let mut decoded = String::new();
    decoder.read_to_string(&mut decoded).expect("decodes");
    assert_eq!(decoded, "<html>hello hello hello hello hello</html>");
}

#[tokio::test]
async fn test_should_run_both_routes_when_first_is_not_terminal() {
    let upstream = FakeUpstream::ok(b"unused");

    let mut router = Router::new();
    router.matching(
        None,
        vec![RouteAction::SetResponseHeader {
            key: "x-frame-options".into(),
            value: "DENY".into(),
        }],
        false,
    );
    router.matching(
        Some(RouteCondition::on_path("/").expect("valid")),
        vec![RouteAction::SetResponseStatus { status_code: 204 }],
        true,
    );
    router.matching(
        None,
        vec![RouteAction::SetResponseStatus { status_code: 500 }],
        false,
    );

    let mut ctx = context("/", &[], upstream);
    ctx.run(&router).await.expect("runs");

    assert_eq!(ctx.response.headers.get("x-frame-options"), Some("DENY"));
    assert_eq!(ctx.response.status, 204, "terminal route stops the chain");
}

#[tokio::test]
async fn test_should_not_send_body_on_get_proxy() {
    let upstream = FakeUpstream::ok(b"ok");

    let mut router = Router::new();
    let mut condition = RouteCondition::on_path("/").expect("valid");
    condition.method = Some(Predicate::exact("GET"));
    router.matching(
        Some(condition),
        vec![RouteAction::Proxy {
            url: "http://upstream.internal".into(),
            preserve_host_header: false,
            preserve_headers: false,
            preserve_path: false,
            preserve_query: false,
        }],
        false,
    );

    let mut ctx = context("/", &[], upstream.clone());
    ctx.run(&router).await.expect("runs");
    assert!(upstream.requests()[0].body.is_empty());
}
