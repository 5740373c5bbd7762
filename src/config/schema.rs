//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every default reproduces the gateway's fixed out-of-the-box behaviour.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the analysis gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend analysis service the gateway forwards to.
    pub upstream: UpstreamConfig,

    /// Per-client admission settings.
    pub rate_limit: RateLimitConfig,

    /// How client identifiers are derived.
    pub identity: IdentityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream (backend analysis service) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base address of the backend, without path (e.g., "http://localhost:8001").
    pub base_url: String,

    /// Fixed path appended to the base address.
    pub path: String,

    /// Total time allowed for one upstream exchange, body included, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            path: "/analyze".to_string(),
            timeout_ms: 40_000,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Admission control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum interval between two admitted requests of one client, in milliseconds.
    pub cooldown_ms: u64,

    /// How often idle client records are swept, in seconds (0 disables the sweep).
    pub sweep_interval_secs: u64,

    /// Records idle for at least `idle_multiplier * cooldown` are evicted.
    pub idle_multiplier: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 3_000,
            sweep_interval_secs: 60,
            idle_multiplier: 10,
        }
    }
}

impl RateLimitConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Idle age after which a record may be evicted.
    pub fn max_idle(&self) -> Duration {
        self.cooldown().saturating_mul(self.idle_multiplier)
    }

    /// Sweep period, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Client identity configuration.
///
/// `X-Forwarded-For` is client supplied and trivially spoofable. It is only
/// advisory: consult it when the gateway sits behind a proxy that sets it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Consult the `X-Forwarded-For` header at all.
    pub trust_forwarded_header: bool,

    /// Peers whose `X-Forwarded-For` is honoured. Empty means every peer.
    pub trusted_proxies: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            trust_forwarded_header: true,
            trusted_proxies: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
