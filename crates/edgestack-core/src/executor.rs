//! The action executor.
//!
//! One exhaustive dispatch over the [`RouteAction`] union. Actions run in
//! order against the live request/response pair owned by the
//! [`RequestContext`], so action N's side effects (a rewritten path, a
//! replaced body) are visible to action N+1.

use bytes::Bytes;
use edgestack_model::contract::{
    EDGE_PROXY_VERSION_HEADER, FOLLOW_REDIRECT_HEADER, IMAGE_OPTIMIZED_HEADER,
    MERGE_UPSTREAM_HEADER,
};
use edgestack_model::{
    EdgeError, EdgeResult, HeaderBag, HeaderValues, ParamValue, Params, PathPattern, RewriteFrom,
    RouteAction,
};
use url::Url;

use crate::client::OutboundRequest;
use crate::context::RequestContext;

/// Execute one action against the context.
///
/// # Errors
///
/// Action-specific failures (upstream connect errors, unknown function
/// paths, recursion-limit breaches on outbound calls) propagate to the
/// caller, which renders them as a structured error response.
pub async fn execute_action(ctx: &mut RequestContext, action: &RouteAction) -> EdgeResult<()> {
    match action {
        RouteAction::SetResponseHeader { key, value } => {
            ctx.response.headers.set(key, value.clone());
        }
        RouteAction::SetRequestHeader { key, value } => {
            ctx.request.headers.set(key, value.clone());
        }
        RouteAction::AddResponseHeader { key, value } => {
            ctx.response.headers.add(key, value.clone());
        }
        RouteAction::AddRequestHeader { key, value } => {
            ctx.request.headers.add(key, value.clone());
        }
        RouteAction::DeleteResponseHeader { key } => {
            ctx.response.headers.delete(key);
        }
        RouteAction::DeleteRequestHeader { key } => {
            ctx.request.headers.delete(key);
        }
        RouteAction::SetDefaultResponseHeader { key, value } => {
            ctx.response.headers.set_default(key, value.clone());
        }
        RouteAction::SetDefaultRequestHeader { key, value } => {
            ctx.request.headers.set_default(key, value.clone());
        }
        RouteAction::SetResponseStatus { status_code } => {
            ctx.response.status = *status_code;
        }
        RouteAction::SetResponseBody { body } => {
            ctx.response.set_body(body.as_bytes());
        }
        RouteAction::Rewrite { from, to } => {
            let rewritten = rewrite_path(ctx.request.path(), from.as_ref(), to, &ctx.request.params)?;
            tracing::debug!(from = ctx.request.path(), to = %rewritten, "rewriting path");
            ctx.request.set_path(&rewritten);
        }
        RouteAction::Redirect { to, status_code } => {
            ctx.response.headers.set("location", to.clone());
            ctx.response.status = *status_code;
        }
        RouteAction::Proxy {
            url,
            preserve_host_header,
            preserve_headers,
            preserve_path,
            preserve_query,
        } => {
            proxy(
                ctx,
                url,
                *preserve_host_header,
                *preserve_headers,
                *preserve_path,
                *preserve_query,
            )
            .await?;
        }
        RouteAction::ServeAsset { path } => {
            serve_asset(ctx, path.as_deref(), false).await?;
        }
        RouteAction::ServePermanentAsset { path } => {
            serve_asset(ctx, path.as_deref(), true).await?;
        }
        RouteAction::ServeApp => {
            serve_app(ctx).await?;
        }
        RouteAction::Echo => {
            echo(ctx);
        }
        RouteAction::ImageOptimizer => {
            image_optimizer(ctx).await?;
        }
        RouteAction::NodeFunction { path } => {
            let function = ctx.functions.get(path)?;
            function.invoke(&mut ctx.request, &mut ctx.response).await?;
        }
        RouteAction::HealthCheck => {
            ctx.response.status = 200;
            ctx.response.headers.set("content-type", "text/plain");
            ctx.response.set_body("OK");
        }
    }
    Ok(())
}

/// Apply a rewrite action to a path.
///
/// Three `from` forms: absent (plain destination, pattern params from the
/// matched route substituted into `to`), a literal substring (first
/// occurrence replaced), or a regular expression (`$1…` group references in
/// `to`). A literal `from` containing pattern syntax is matched as a path
/// pattern and its named captures substituted as `:name` in `to`.
fn rewrite_path(
    path: &str,
    from: Option<&RewriteFrom>,
    to: &str,
    route_params: &Params,
) -> EdgeResult<String> {
    match from {
        None => Ok(substitute_params(to, route_params)),
        Some(RewriteFrom::Regex { regex }) => {
            let re = regex::Regex::new(regex)
                .map_err(|e| EdgeError::InvalidRoute(format!("rewrite regex '{regex}': {e}")))?;
            Ok(re.replace(path, to).into_owned())
        }
        Some(RewriteFrom::Literal(literal)) => {
            if PathPattern::is_pattern(literal) {
                let pattern = PathPattern::compile(literal)?;
                match pattern.match_path(path) {
                    Some(params) => Ok(substitute_params(to, &params)),
                    None => Ok(path.to_owned()),
                }
            } else {
                Ok(path.replacen(literal.as_str(), to, 1))
            }
        }
    }
}

/// Replace `:name` references in a rewrite target with captured values. A
/// catch-all capture substitutes as its segments re-joined with `/`.
fn substitute_params(to: &str, params: &Params) -> String {
    let mut out = to.to_owned();
    // Longer names first so `:id` does not clobber a `:idx` reference.
    let mut names: Vec<&String> = params.keys().collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    for name in names {
        let value = match &params[name] {
            ParamValue::Single(v) => v.clone(),
            ParamValue::Multi(segments) => segments.join("/"),
        };
        out = out.replace(&format!(":{name}"), &value);
    }
    out
}

/// Collapse runs of `/` in a path to a single slash.
fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !last_was_slash {
                out.push(c);
            }
            last_was_slash = true;
        } else {
            out.push(c);
            last_was_slash = false;
        }
    }
    out
}

/// Copy an upstream response onto the context's response: status, headers
/// (minus the upstream's `content-encoding`, since output compression is
/// re-applied locally), and body.
fn adopt_upstream(ctx: &mut RequestContext, upstream: crate::client::OutboundResponse) {
    ctx.response.status = upstream.status;
    for (name, values) in &upstream.headers {
        if name == "content-encoding" || name == "transfer-encoding" || name == "content-length" {
            continue;
        }
        match values {
            HeaderValues::One(v) => ctx.response.headers.set(name, v.clone()),
            HeaderValues::Many(list) => {
                ctx.response.headers.delete(name);
                for v in list {
                    ctx.response.headers.add(name, v.clone());
                }
            }
        }
    }
    ctx.response.set_body(upstream.body.to_vec());
}

async fn proxy(
    ctx: &mut RequestContext,
    destination: &str,
    preserve_host_header: bool,
    preserve_headers: bool,
    preserve_path: bool,
    preserve_query: bool,
) -> EdgeResult<()> {
    let mut dest = Url::parse(destination)
        .map_err(|e| EdgeError::InvalidUrl(format!("{destination}: {e}")))?;

    if preserve_path {
        dest.set_path(ctx.request.path());
    }
    if preserve_query {
        dest.set_query(ctx.request.url.query());
    }
    let collapsed = collapse_slashes(dest.path());
    if collapsed != dest.path() {
        dest.set_path(&collapsed);
    }

    let mut headers = if preserve_headers {
        ctx.request.headers.clone()
    } else {
        HeaderBag::new()
    };
    // Upstream bodies come back plain; output compression is negotiated
    // with the client separately.
    headers.set("accept-encoding", "identity");
    let host = if preserve_host_header {
        ctx.request.host()
    } else {
        dest.host_str().map(ToOwned::to_owned)
    };
    if let Some(host) = host {
        headers.set("host", host);
    }

    let body = if ctx.request.method == "GET" || ctx.request.method == "HEAD" {
        Bytes::new()
    } else {
        Bytes::copy_from_slice(ctx.request.body.as_bytes())
    };

    tracing::debug!(url = %dest, method = %ctx.request.method, "proxying request");
    let upstream = ctx
        .client
        .execute(OutboundRequest {
            method: ctx.request.method.clone(),
            url: dest.into(),
            headers,
            body,
        })
        .await?;

    adopt_upstream(ctx, upstream);
    Ok(())
}

/// Resolve the asset path for a serve-asset action: explicit path, or the
/// request path with `index.html` appended when there is no file extension.
fn resolve_asset_path(ctx: &RequestContext, explicit: Option<&str>) -> String {
    let path = explicit.unwrap_or_else(|| ctx.request.path()).to_owned();
    let last_segment = path.rsplit('/').next().unwrap_or("");
    if last_segment.contains('.') {
        return path;
    }
    let mut with_index = path;
    if !with_index.ends_with('/') {
        with_index.push('/');
    }
    with_index.push_str("index.html");
    collapse_slashes(&with_index)
}

async fn serve_asset(ctx: &mut RequestContext, path: Option<&str>, permanent: bool) -> EdgeResult<()> {
    let asset_path = resolve_asset_path(ctx, path);
    let asset_url = format!(
        "{}{}",
        ctx.config.asset_origin.trim_end_matches('/'),
        asset_path
    );

    if ctx.request.headers.contains(EDGE_PROXY_VERSION_HEADER) {
        // Behind the edge proxy: hand the fetch off to it instead of taking
        // a second network hop inside the compute runtime. The proxy follows
        // the redirect itself and merges the upstream status and headers.
        let status = if ctx.response.status == 200 { 302 } else { ctx.response.status };
        ctx.response.status = status;
        ctx.response.headers.set("location", asset_url);
        ctx.response.headers.set(FOLLOW_REDIRECT_HEADER, "true");
        ctx.response.headers.set(MERGE_UPSTREAM_HEADER, "true");
    } else {
        let upstream = ctx
            .client
            .execute(OutboundRequest::new("GET", asset_url.clone()))
            .await?;
        if upstream.status == 404 {
            return Err(EdgeError::AssetNotFound(asset_path));
        }
        adopt_upstream(ctx, upstream);
    }

    if permanent {
        ctx.response
            .headers
            .set("cache-control", "public, max-age=31536000, immutable");
    }
    Ok(())
}

async fn serve_app(ctx: &mut RequestContext) -> EdgeResult<()> {
    let app_origin = ctx.config.app_origin.clone();
    proxy(ctx, &app_origin, false, true, true, true).await
}

/// Diagnostic response describing the received request.
fn echo(ctx: &mut RequestContext) {
    let headers: serde_json::Map<String, serde_json::Value> = ctx
        .request
        .headers
        .iter()
        .map(|(name, values)| {
            let value = match values {
                HeaderValues::One(v) => serde_json::Value::String(v.clone()),
                HeaderValues::Many(list) => serde_json::Value::from(list.clone()),
            };
            (name.to_owned(), value)
        })
        .collect();
    let params: serde_json::Map<String, serde_json::Value> = ctx
        .request
        .params
        .iter()
        .map(|(name, value)| {
            let value = match value {
                ParamValue::Single(v) => serde_json::Value::String(v.clone()),
                ParamValue::Multi(segments) => serde_json::Value::from(segments.clone()),
            };
            (name.to_owned(), value)
        })
        .collect();

    let payload = serde_json::json!({
        "method": ctx.request.method,
        "url": ctx.request.url.as_str(),
        "path": ctx.request.path(),
        "headers": headers,
        "params": params,
        "sourceIp": ctx.request.source_ip,
        "body": String::from_utf8_lossy(ctx.request.body.as_bytes()),
    });

    ctx.response.headers.set("content-type", "application/json");
    ctx.response.set_body(payload.to_string());
}

async fn image_optimizer(ctx: &mut RequestContext) -> EdgeResult<()> {
    let Some(source) = ctx.request.query_param("url") else {
        ctx.response.status = 400;
        ctx.response.headers.set("content-type", "text/plain");
        ctx.response.set_body("missing url query parameter");
        return Ok(());
    };

    // Relative sources resolve against the asset origin.
    let source_url = if source.starts_with("http://") || source.starts_with("https://") {
        source
    } else {
        format!("{}{}", ctx.config.asset_origin.trim_end_matches('/'), source)
    };

    let upstream = ctx
        .client
        .execute(OutboundRequest::new("GET", source_url))
        .await?;
    adopt_upstream(ctx, upstream);
    ctx.response.headers.set(IMAGE_OPTIMIZED_HEADER, "true");
    Ok(())
}
