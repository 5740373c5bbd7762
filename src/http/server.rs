//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the single `/analyze` route
//! - Wire up middleware (tracing, request ID, method guard, admission)
//! - Bind server to listener and serve until shutdown
//! - Forward admitted requests upstream and relay the response
//! - Run the idle-record sweep alongside the server
//!
//! # Request order
//! ```text
//! require_get (405) → rate_limit_middleware (429) → analyze_handler
//!     → target check (400) → UpstreamClient::forward (503) → relay
//! ```

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::{require_get, target_param, RequestIdExt, UuidRequestId, X_REQUEST_ID};
use crate::http::response::relay;
use crate::observability::metrics;
use crate::security::client_identity::ClientIdentity;
use crate::security::rate_limit::{rate_limit_middleware, AdmissionController, ClientId};
use crate::upstream::UpstreamClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionController>,
    pub identity: Arc<ClientIdentity>,
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            admission: Arc::new(AdmissionController::new(config.rate_limit.cooldown())),
            identity: Arc::new(ClientIdentity::from_config(&config.identity)),
            upstream: Arc::new(UpstreamClient::new(&config.upstream)?),
        })
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    admission: Arc<AdmissionController>,
}

impl HttpServer {
    /// Create a new HTTP server with the given (validated) configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let state = AppState::from_config(&config)?;
        Ok(Self::with_state(config, state))
    }

    /// Create a server around an existing state, e.g. a shared admission controller.
    pub fn with_state(config: GatewayConfig, state: AppState) -> Self {
        let admission = state.admission.clone();
        let router = Self::build_router(state);
        Self {
            router,
            config,
            admission,
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/analyze", any(analyze_handler))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ))
            .route_layer(middleware::from_fn(require_get))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// The router, for driving the gateway without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener, until
    /// Ctrl+C or a shutdown broadcast.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            cooldown = ?self.config.rate_limit.cooldown(),
            "HTTP server starting"
        );

        let sweeper = self.config.rate_limit.sweep_interval().map(|interval| {
            self.admission.clone().spawn_sweeper(
                interval,
                self.config.rate_limit.max_idle(),
                shutdown.resubscribe(),
            )
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Handler for admitted requests.
async fn analyze_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request.request_id().cloned();
    let client = request
        .extensions()
        .get::<ClientId>()
        .map(|c| c.0.clone())
        .unwrap_or_default();

    let Some(target) = target_param(request.uri()) else {
        tracing::debug!(client = %client, "Missing target parameter");
        let error = GatewayError::MissingTarget;
        metrics::record_rejected(error.kind());
        return error.into_response();
    };

    tracing::debug!(client = %client, target = %target, "Proxying request");

    match state.upstream.forward(&target, request_id.as_ref()).await {
        Ok(upstream) => {
            metrics::record_request(upstream.status.as_u16(), start_time);
            relay(upstream, request_id.as_ref())
        }
        Err(error) => {
            tracing::error!(
                client = %client,
                target = %target,
                error = %error,
                "Error contacting upstream"
            );
            metrics::record_upstream_error(error.kind());
            metrics::record_request(error.status().as_u16(), start_time);
            error.into_response()
        }
    }
}

/// Wait for Ctrl+C or a shutdown broadcast.
async fn shutdown_signal(mut shutdown: broadcast::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Without a signal handler, only the broadcast can stop us.
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = shutdown.recv() => {}
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{header, Method, StatusCode};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        HttpServer::new(GatewayConfig::default()).unwrap()
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn rejects_non_get_without_admission() {
        let server = server();
        let response = server
            .router()
            .oneshot(request(Method::PUT, "/analyze?target=x"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(server.admission.tracked_clients(), 0);
    }

    #[tokio::test]
    async fn missing_target_is_checked_after_admission() {
        let server = server();
        let peer: SocketAddr = "192.0.2.7:40000".parse().unwrap();
        let router = server.router().layer(MockConnectInfo(peer));

        let response = router
            .clone()
            .oneshot(request(Method::GET, "/analyze"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(server.admission.last_admitted_at("192.0.2.7").is_some());

        let response = router
            .oneshot(request(Method::GET, "/analyze?target=x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }

    #[tokio::test]
    async fn missing_connect_info_is_an_unknown_client() {
        let server = server();
        let response = server
            .router()
            .oneshot(request(Method::GET, "/analyze"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(server.admission.last_admitted_at("unknown").is_some());
    }

    #[test]
    fn keeps_config() {
        assert_eq!(server().config().upstream.path, "/analyze");
    }
}
