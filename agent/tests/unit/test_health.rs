//! Health prober tests against in-process HTTP servers

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use dockhand::deploy::health::{HealthProber, HealthVerdict};

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_probe_health_endpoint_succeeds() {
    let app = Router::new().route("/health", get(|| async { "ok" }));
    let base = spawn_server(app).await;

    let prober = HealthProber::new();
    let result = prober
        .probe(&base, 3, Duration::from_millis(100), tokio::time::sleep)
        .await;

    assert_eq!(result.verdict, HealthVerdict::Healthy);
    assert_eq!(result.attempts.last().unwrap().status, Some(200));
}

#[tokio::test]
async fn test_probe_accepts_alive_service_without_health_route() {
    // Responds 404 on every path; the service is demonstrably serving
    let app = Router::new();
    let base = spawn_server(app).await;

    let prober = HealthProber::new();
    let result = prober
        .probe(&base, 3, Duration::from_millis(100), tokio::time::sleep)
        .await;

    assert_eq!(result.verdict, HealthVerdict::Healthy);
}

#[tokio::test]
async fn test_probe_server_errors_are_unhealthy() {
    let app = Router::new().fallback(|| async { StatusCode::INTERNAL_SERVER_ERROR });
    let base = spawn_server(app).await;

    let prober = HealthProber::new();
    let result = prober
        .probe(&base, 2, Duration::from_millis(250), tokio::time::sleep)
        .await;

    assert_eq!(result.verdict, HealthVerdict::Unhealthy);
    // Every candidate path tried on every round
    assert_eq!(result.attempts.len(), 8);
}

#[tokio::test]
async fn test_probe_unreachable_service_is_inconclusive() {
    // Bind then drop so the port is known dead
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let prober = HealthProber::new();
    let result = prober
        .probe(
            &format!("http://{}", addr),
            2,
            Duration::from_millis(100),
            tokio::time::sleep,
        )
        .await;

    assert_eq!(result.verdict, HealthVerdict::Inconclusive);
    assert!(result.attempts.iter().all(|probe| probe.status.is_none()));
}

#[tokio::test]
async fn test_probe_recovers_on_fourth_round() {
    // Unavailable for the first three full rounds, then healthy
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let app = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 12 {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::OK
            }
        }
    });
    let base = spawn_server(app).await;

    let prober = HealthProber::new();
    let result = prober
        .probe(&base, 5, Duration::from_millis(200), tokio::time::sleep)
        .await;

    assert_eq!(result.verdict, HealthVerdict::Healthy);
    // Three exhausted rounds of four paths, then the first probe of round four
    assert_eq!(result.attempts.len(), 13);
}

#[tokio::test]
async fn test_probe_window_bounded_against_unresponsive_endpoint() {
    // Accepts connections but never answers; the poll must still end within
    // its max_attempts * interval window instead of waiting out every
    // per-request timeout
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut open = Vec::new();
        loop {
            if let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        }
    });

    let started = std::time::Instant::now();
    let prober = HealthProber::new();
    let result = prober
        .probe(
            &format!("http://{}", addr),
            3,
            Duration::from_millis(100),
            tokio::time::sleep,
        )
        .await;

    assert_eq!(result.verdict, HealthVerdict::Inconclusive);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "poll overran its window: {:?}",
        started.elapsed()
    );
}
