//! HTTP client for the backend analysis service.
//!
//! # Responsibilities
//! - Compose the upstream URL (fixed base + fixed path + encoded `target`)
//! - Issue a single GET under one total deadline
//! - Hand back status and the still-streaming body with that deadline
//!
//! # Design Decisions
//! - Single attempt, fail fast: no retries, no backoff
//! - The deadline also bounds the body, enforced by the relay
//! - Called only after admission, never under the registry lock

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, StatusCode, Uri},
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time::Instant;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::GatewayError;
use crate::http::request::X_REQUEST_ID;

/// Response from the backend whose body has not been read yet.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Incoming,
    /// Point in time by which the body must be fully received.
    pub deadline: Instant,
}

/// Forwards admitted requests to the backend.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
    base_url: Url,
    path: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GatewayError::InvalidUpstreamUrl(format!("{}: {}", config.base_url, e)))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            base_url,
            path: config.path.clone(),
            timeout: config.timeout(),
        })
    }

    /// URL for one target: `<base><path>?target=<form-encoded target>`.
    pub fn upstream_url(&self, target: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&self.path);
        url.query_pairs_mut().clear().append_pair("target", target);
        url
    }

    /// Issue the upstream GET for `target`.
    ///
    /// Connection failures and a missed deadline both surface as errors that
    /// map to 503. The returned body is still bound by the same deadline.
    pub async fn forward(
        &self,
        target: &str,
        request_id: Option<&HeaderValue>,
    ) -> Result<UpstreamResponse, GatewayError> {
        let url = self.upstream_url(target);
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| GatewayError::InvalidUpstreamUrl(format!("{}: {}", url, e)))?;

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::ACCEPT, "application/json");
        if let Some(id) = request_id {
            builder = builder.header(X_REQUEST_ID, id.clone());
        }
        let request = builder
            .body(Body::empty())
            .map_err(|e| GatewayError::InvalidUpstreamUrl(e.to_string()))?;

        let deadline = Instant::now() + self.timeout;
        tracing::debug!(url = %url, timeout = ?self.timeout, "Forwarding to upstream");

        let response = tokio::time::timeout_at(deadline, self.client.request(request))
            .await
            .map_err(|_| GatewayError::UpstreamTimeout(self.timeout))??;

        let (parts, body) = response.into_parts();
        Ok(UpstreamResponse {
            status: parts.status,
            body,
            deadline,
        })
    }
}
