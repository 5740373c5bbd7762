//! Request handling and inspection.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Reject anything but GET before admission is consulted
//! - Extract the `target` query parameter
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Only the first `target` value counts; an empty value is the same as none

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::observability::metrics;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Access to the request ID set by the request-id layer.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&HeaderValue>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&HeaderValue> {
        self.extensions()
            .get::<RequestId>()
            .map(RequestId::header_value)
            .or_else(|| self.headers().get(X_REQUEST_ID))
    }
}

/// Middleware letting only GET through.
pub async fn require_get(request: Request<Body>, next: Next) -> Response {
    if request.method() == Method::GET {
        return next.run(request).await;
    }

    let method = request.method().clone();
    tracing::debug!(method = %method, uri = %request.uri(), "Rejected method");
    let error = GatewayError::MethodNotAllowed(method);
    metrics::record_rejected(error.kind());
    error.into_response()
}

/// The first non-empty `target` query value, decoded.
pub fn target_param(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "target")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
