//! Client-visible failure outcomes of the gateway.
//!
//! Every variant maps to exactly one response. Nothing here is fatal to the
//! process and nothing is retried.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

pub const RATE_LIMITED_BODY: &str = "429 Too Many Requests: Rate limit exceeded. Try again later.";
pub const UPSTREAM_UNAVAILABLE_BODY: &str = "503 Service Unavailable (upstream timeout or error)";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(axum::http::Method),

    #[error("query parameter 'target' is missing or empty")]
    MissingTarget,

    #[error("client {client} is cooling down for another {retry_after:?}")]
    RateLimited { client: String, retry_after: Duration },

    #[error("invalid upstream url: {0}")]
    InvalidUpstreamUrl(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::MissingTarget => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::InvalidUpstreamUrl(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Upstream(_) | GatewayError::UpstreamTimeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Label used for the upstream error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MethodNotAllowed(_) => "method_not_allowed",
            GatewayError::MissingTarget => "missing_target",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::InvalidUpstreamUrl(_) => "invalid_upstream_url",
            GatewayError::Upstream(_) => "connect",
            GatewayError::UpstreamTimeout(_) => "timeout",
        }
    }

    fn body(&self) -> &'static str {
        match self {
            GatewayError::MethodNotAllowed(_) => "Method not allowed",
            GatewayError::MissingTarget => "Query parameter 'target' is required.",
            GatewayError::RateLimited { .. } => RATE_LIMITED_BODY,
            GatewayError::InvalidUpstreamUrl(_) => "Internal configuration error",
            GatewayError::Upstream(_) | GatewayError::UpstreamTimeout(_) => {
                UPSTREAM_UNAVAILABLE_BODY
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.body()).into_response();
        match &self {
            GatewayError::MethodNotAllowed(_) => {
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static("GET"));
            }
            GatewayError::RateLimited { retry_after, .. } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
            }
            _ => {}
        }
        response
    }
}
