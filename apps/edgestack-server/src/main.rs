//! EdgeStack server - socket transport for the edge routing layer.
//!
//! Runs the same route pipeline the cloud-function transport uses, behind a
//! plain HTTP listener. Routes come from a declarative JSON file plus a few
//! built-in defaults.
//!
//! # Usage
//!
//! ```text
//! EDGE_LISTEN=0.0.0.0:3210 EDGE_ROUTES_FILE=routes.json edgestack-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EDGE_LISTEN` | `0.0.0.0:3210` | Bind address |
//! | `EDGE_RECURSION_LIMIT` | `5` | Max inbound hop count |
//! | `EDGE_ASSET_ORIGIN` | `http://127.0.0.1:3211` | Asset storage origin |
//! | `EDGE_APP_ORIGIN` | `http://127.0.0.1:3000` | User application origin |
//! | `EDGE_ROUTES_FILE` | *(unset)* | Declarative routes JSON file |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use edgestack_core::{EdgeConfig, FunctionRegistry, Router};
use edgestack_http::{EdgeHttpService, HyperOutboundClient};
use edgestack_model::{Route, RouteAction, RouteCondition, RoutesFile};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Build the route table: the declarative routes file (when configured),
/// with built-in defaults injected around it.
fn build_router(config: &EdgeConfig) -> Result<Router> {
    let mut router = Router::new();

    if let Some(path) = &config.routes_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read routes file {path}"))?;
        let file: RoutesFile =
            serde_json::from_str(&raw).with_context(|| format!("invalid routes file {path}"))?;
        let routes = file
            .compile()
            .with_context(|| format!("cannot compile routes file {path}"))?;
        info!(path = %path, routes = routes.len(), "loaded routes file");
        for route in routes {
            router.add_route(route);
        }
    } else {
        // No routes file: forward everything to the app process.
        router.matching(None, vec![RouteAction::ServeApp], false);
    }

    // Built-in health endpoint takes priority over user routes.
    router.add_route_front(Route::terminal(
        Some(RouteCondition::on_path("/_edge/health")?),
        vec![RouteAction::HealthCheck],
    ));

    Ok(router)
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(listener: TcpListener, service: EdgeHttpService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.for_peer(peer_addr);
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = EdgeConfig::from_env();
    init_tracing(&config.log_level)?;

    let router = build_router(&config)?;
    let service = EdgeHttpService::new(
        router,
        config.clone(),
        Arc::new(HyperOutboundClient::new()),
        FunctionRegistry::new(),
    );

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        recursion_limit = config.recursion_limit,
        asset_origin = %config.asset_origin,
        app_origin = %config.app_origin,
        version = VERSION,
        "starting EdgeStack server",
    );

    serve(listener, service).await
}
