//! Per-client admission control.
//!
//! A client may have at most one admitted request per cooldown, measured from
//! its last *admitted* request. Rejections leave the record untouched, so they
//! neither reset nor extend the cooldown.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{rejection::ExtensionRejection, ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Identifier of the client a request was admitted for, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

/// One tracked client.
#[derive(Debug, Clone, Copy)]
struct ClientRecord {
    last_admitted_at: Instant,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Owns the client registry. All access goes through a single lock that is
/// held only for the map operation, never across I/O.
#[derive(Debug)]
pub struct AdmissionController {
    clients: Mutex<HashMap<String, ClientRecord>>,
    cooldown: Duration,
}

impl AdmissionController {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    /// Decide whether `client` may proceed now.
    pub fn admit(&self, client: &str) -> Admission {
        self.admit_at(client, Instant::now())
    }

    /// Decide whether `client` may proceed at `now`.
    pub fn admit_at(&self, client: &str, now: Instant) -> Admission {
        let mut clients = self.registry();

        match clients.get_mut(client) {
            None => {
                clients.insert(client.to_string(), ClientRecord { last_admitted_at: now });
                metrics::set_tracked_clients(clients.len());
                Admission::Allowed
            }
            Some(record) => {
                let elapsed = now.saturating_duration_since(record.last_admitted_at);
                if elapsed < self.cooldown {
                    Admission::Rejected {
                        retry_after: self.cooldown - elapsed,
                    }
                } else {
                    record.last_admitted_at = now;
                    Admission::Allowed
                }
            }
        }
    }

    /// Evict records whose last admission is at least `max_idle` old.
    ///
    /// With `max_idle >= cooldown` this never changes a decision: such a
    /// client would be admitted whether or not its record exists.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        self.sweep_idle_at(max_idle, Instant::now())
    }

    pub fn sweep_idle_at(&self, max_idle: Duration, now: Instant) -> usize {
        let max_idle = max_idle.max(self.cooldown);
        let mut clients = self.registry();
        let before = clients.len();
        clients.retain(|_, record| now.saturating_duration_since(record.last_admitted_at) < max_idle);
        let evicted = before - clients.len();
        metrics::set_tracked_clients(clients.len());
        evicted
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.registry().len()
    }

    /// When `client` was last admitted, if it is tracked.
    pub fn last_admitted_at(&self, client: &str) -> Option<Instant> {
        self.registry().get(client).map(|r| r.last_admitted_at)
    }

    /// Run the idle sweep every `interval` until shutdown is signalled.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        max_idle: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.sweep_idle(max_idle);
                        metrics::record_evicted(evicted);
                        tracing::debug!(
                            evicted,
                            remaining = self.tracked_clients(),
                            "Swept idle client records"
                        );
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Idle sweeper stopped");
                        break;
                    }
                }
            }
        })
    }

    // A panic while holding the lock cannot leave a record half-written, so a
    // poisoned registry is still consistent.
    fn registry(&self) -> MutexGuard<'_, HashMap<String, ClientRecord>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Middleware gating every request through the admission controller.
///
/// Resolves the client identifier, admits or rejects, and on admission
/// records the identifier in the request extensions for the handler.
/// Without connection info the peer is unknown rather than a rejection.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    connect_info: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let peer = connect_info.ok().map(|ConnectInfo(addr)| addr);
    let client = state.identity.resolve(request.headers(), peer);

    match state.admission.admit(&client) {
        Admission::Allowed => {
            request.extensions_mut().insert(ClientId(client));
            next.run(request).await
        }
        Admission::Rejected { retry_after } => {
            tracing::warn!(client = %client, retry_after = ?retry_after, "Rate limit exceeded");
            metrics::record_rate_limited();
            GatewayError::RateLimited { client, retry_after }.into_response()
        }
    }
}
