//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, cooldown > 0)
//! - Check addresses and URLs parse before anything binds or connects
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError::new("listener.bind_address", e.to_string()));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() != "http" => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme '{}', expected http", url.scheme()),
        )),
        Ok(url) if url.host().is_none() => {
            errors.push(ValidationError::new("upstream.base_url", "missing host"))
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new("upstream.base_url", e.to_string())),
    }

    if !config.upstream.path.starts_with('/') {
        errors.push(ValidationError::new("upstream.path", "must start with '/'"));
    }
    if config.upstream.timeout_ms == 0 {
        errors.push(ValidationError::new("upstream.timeout_ms", "must be greater than 0"));
    }

    if config.rate_limit.cooldown_ms == 0 {
        errors.push(ValidationError::new("rate_limit.cooldown_ms", "must be greater than 0"));
    }
    if config.rate_limit.idle_multiplier == 0 {
        errors.push(ValidationError::new("rate_limit.idle_multiplier", "must be greater than 0"));
    }

    for proxy in &config.identity.trusted_proxies {
        if proxy.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::new(
                "identity.trusted_proxies",
                format!("'{}' is not an IP address", proxy),
            ));
        }
    }

    if config.observability.metrics_enabled {
        if let Err(e) = config.observability.metrics_address.parse::<SocketAddr>() {
            errors.push(ValidationError::new("observability.metrics_address", e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
