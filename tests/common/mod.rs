//! Shared utilities for integration tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analysis_gateway::config::GatewayConfig;
use analysis_gateway::http::AppState;
use analysis_gateway::{HttpServer, Shutdown};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;

/// What the mock backend answers with.
#[derive(Clone)]
pub struct Reply {
    pub status: u16,
    pub body: &'static str,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status: 200,
            body,
            delay: Duration::ZERO,
        }
    }
}

/// A request seen by the mock backend.
#[derive(Debug, Clone)]
pub struct Seen {
    pub target: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Clone)]
struct BackendState {
    reply: Reply,
    seen: Arc<Mutex<Vec<Seen>>>,
}

#[derive(Deserialize)]
struct AnalyzeQuery {
    target: Option<String>,
}

async fn analyze(
    State(state): State<BackendState>,
    Query(query): Query<AnalyzeQuery>,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    state.seen.lock().unwrap().push(Seen {
        target: query.target,
        request_id: headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });
    tokio::time::sleep(state.reply.delay).await;
    (StatusCode::from_u16(state.reply.status).unwrap(), state.reply.body)
}

/// Start a mock analysis backend on an ephemeral port.
///
/// Returns its address and the log of requests it received.
pub async fn start_mock_backend(reply: Reply) -> (SocketAddr, Arc<Mutex<Vec<Seen>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/analyze", get(analyze))
        .with_state(BackendState {
            reply,
            seen: seen.clone(),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, seen)
}

/// An address nothing is listening on.
pub fn dead_address() -> SocketAddr {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}

/// Gateway config pointing at `backend`, with a short cooldown for tests.
pub fn gateway_config(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.base_url = format!("http://{}", backend);
    config.upstream.timeout_ms = 5_000;
    config.rate_limit.cooldown_ms = 3_000;
    config
}

/// A running gateway.
pub struct Gateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl Gateway {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> Gateway {
    let server = HttpServer::new(config).unwrap();
    serve(server).await
}

/// Start the gateway around an existing state, to inspect it afterwards.
pub async fn start_gateway_with_state(config: GatewayConfig, state: AppState) -> Gateway {
    serve(HttpServer::with_state(config, state)).await
}

async fn serve(server: HttpServer) -> Gateway {
    let listener = TcpListener::bind(&server.config().listener.bind_address)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    Gateway { addr, shutdown }
}

/// HTTP client that never pools connections or goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
