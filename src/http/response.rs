//! Relaying the upstream response to the caller.
//!
//! # Responsibilities
//! - Propagate the upstream status code unchanged
//! - Label the body as JSON and stream it through byte for byte
//! - Enforce the upstream deadline on the body as well
//! - Report bodies that were not fully delivered (client gone, upstream
//!   broke off, deadline hit) to logs and metrics only
//!
//! # Design Decisions
//! - Streaming, never buffered
//! - A delivery failure aborts the connection; there is no one to tell

use axum::{
    body::{Body, BodyDataStream},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use futures_util::{stream, StreamExt};

use crate::observability::metrics;
use crate::upstream::UpstreamResponse;

/// Failure while relaying the upstream body.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("upstream body failed: {0}")]
    Body(#[from] axum::Error),
    #[error("upstream body exceeded the deadline")]
    Deadline,
}

/// Tracks how much of a body reached the caller; logs on drop if unfinished.
struct Delivery {
    request_id: String,
    bytes: usize,
    outcome: Option<&'static str>,
}

impl Delivery {
    fn finish(&mut self, outcome: &'static str) {
        self.outcome = Some(outcome);
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        match self.outcome {
            Some("complete") => {
                tracing::debug!(request_id = %self.request_id, bytes = self.bytes, "Response relayed");
            }
            outcome => {
                // No outcome means the stream was dropped mid-way: the caller went away.
                let reason = outcome.unwrap_or("client_disconnected");
                tracing::warn!(
                    request_id = %self.request_id,
                    bytes = self.bytes,
                    reason,
                    "Response body not fully delivered"
                );
                metrics::record_relay_failure(reason);
            }
        }
    }
}

/// Whether a response with `status` may carry a body at all.
fn carries_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

fn json_response(status: StatusCode, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Build the caller-facing response from an upstream response.
pub fn relay(upstream: UpstreamResponse, request_id: Option<&HeaderValue>) -> Response {
    let UpstreamResponse {
        status,
        body,
        deadline,
    } = upstream;

    // The server never polls the body of these, so there is nothing to track.
    if !carries_body(status) {
        return json_response(status, Body::empty());
    }

    let delivery = Delivery {
        request_id: request_id
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string(),
        bytes: 0,
        outcome: None,
    };
    let data = Body::new(body).into_data_stream();

    let chunks = stream::unfold(
        Some((data, delivery)),
        move |state: Option<(BodyDataStream, Delivery)>| async move {
            let Some((mut data, mut delivery)) = state else {
                return None;
            };
            match tokio::time::timeout_at(deadline, data.next()).await {
                Ok(Some(Ok(chunk))) => {
                    delivery.bytes += chunk.len();
                    Some((Ok(chunk), Some((data, delivery))))
                }
                Ok(Some(Err(e))) => {
                    delivery.finish("upstream_body_error");
                    Some((Err(RelayError::Body(e)), None))
                }
                Ok(None) => {
                    delivery.finish("complete");
                    None
                }
                Err(_) => {
                    delivery.finish("deadline");
                    Some((Err(RelayError::Deadline), None))
                }
            }
        },
    );

    json_response(status, Body::from_stream(chunks))
}
