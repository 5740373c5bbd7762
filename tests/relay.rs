//! Relay bookkeeping: bodies the caller never received are counted, bodies
//! that do not exist are not.
//!
//! The Prometheus recorder is process-global, so every scenario lives in one
//! test to keep the counters unambiguous.

use std::time::Duration;

use axum::{body::Body, extract::Query, http::StatusCode, response::IntoResponse, routing::get, Router};
use futures_util::stream;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;

mod common;
use common::Reply;

const DISCONNECTED: &str = r#"gateway_relay_failures_total{reason="client_disconnected"}"#;

#[derive(Deserialize)]
struct AnalyzeQuery {
    target: String,
}

/// Backend that trickles a long body for `target=slow` and answers at once otherwise.
async fn start_trickling_backend() -> std::net::SocketAddr {
    let app = Router::new().route(
        "/analyze",
        get(|Query(query): Query<AnalyzeQuery>| async move {
            if query.target != "slow" {
                return (StatusCode::OK, r#"{"fast":true}"#).into_response();
            }
            let chunks = stream::unfold(0u32, |n| async move {
                if n >= 40 {
                    return None;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                Some((Ok::<_, std::io::Error>(vec![b' '; 1024]), n + 1))
            });
            Body::from_stream(chunks).into_response()
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn wait_for(metrics: &PrometheusHandle, needle: &str) -> bool {
    for _ in 0..50 {
        if metrics.render().contains(needle) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn relay_failures_are_counted_only_for_undelivered_bodies() {
    let metrics = PrometheusBuilder::new().install_recorder().unwrap();
    let client = common::client();

    // An upstream 204 has no body to deliver.
    let reply = Reply {
        status: 204,
        body: "",
        delay: Duration::ZERO,
    };
    let (backend, _) = common::start_mock_backend(reply).await;
    let gateway = common::start_gateway(common::gateway_config(backend)).await;

    let res = client
        .get(gateway.url("/analyze?target=example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NO_CONTENT);
    assert!(res.bytes().await.unwrap().is_empty());

    assert!(wait_for(&metrics, r#"gateway_requests_total{status="204"}"#).await);
    assert!(!metrics.render().contains("gateway_relay_failures_total"));
    drop(gateway);

    // A caller that walks away mid-body is recorded, and the gateway carries on.
    let gateway = common::start_gateway(common::gateway_config(start_trickling_backend().await)).await;

    let mut res = client
        .get(gateway.url("/analyze?target=slow"))
        .header("x-forwarded-for", "1.2.3.4")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert!(res.chunk().await.unwrap().is_some());
    drop(res);

    assert!(wait_for(&metrics, DISCONNECTED).await, "disconnect was not recorded");

    let res = client
        .get(gateway.url("/analyze?target=fast"))
        .header("x-forwarded-for", "5.6.7.8")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), r#"{"fast":true}"#);
}
