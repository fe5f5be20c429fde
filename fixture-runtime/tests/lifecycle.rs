//! Single-service lifecycle: start, readiness failures, health, stop

#![cfg(unix)]

mod common;

use assert_matches::assert_matches;
use common::{failing_service, ready_service, script_service};
use fixture_runtime::*;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_ready_marker_service_is_alive() {
    let service = start_service(ready_service("marker")).await.unwrap();

    assert!(service.is_alive());
    assert!(service.is_healthy().await);
    assert!(service.stdout().contains("READY"));
    assert!(ProcessRegistry::global().contains(service.pid()));

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let service = start_service(ready_service("idempotent")).await.unwrap();

    let first = service.stop().await.unwrap();
    assert_matches!(first, StopOutcome::Graceful | StopOutcome::Forced);
    assert!(!service.is_alive());

    let started = Instant::now();
    assert_eq!(service.stop().await.unwrap(), StopOutcome::AlreadyStopped);
    assert!(started.elapsed() < Duration::from_millis(50));
    assert_eq!(service.shutdown_state(), ShutdownState::Stopped);
}

#[tokio::test]
async fn test_slow_marker_times_out() {
    let mut config = script_service("slow", "sleep 0.5; echo READY; exec sleep 30");
    config.startup_timeout = Duration::from_millis(50);
    let started = Instant::now();

    let err = start_service(config).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_matches!(err, FixtureError::ReadinessTimeout { timeout, .. } if timeout == Duration::from_millis(50));
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(450), "timed out too late: {elapsed:?}");
}

#[tokio::test]
async fn test_early_exit_reports_code_quickly() {
    let started = Instant::now();

    let err = start_service(failing_service("crashy", 3)).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_matches!(&err, FixtureError::EarlyExit { service, status, .. } => {
        assert_eq!(service, "crashy");
        assert_eq!(status.code, Some(3));
    });
    let message = err.to_string();
    assert!(message.contains("exit code 3"));
    assert!(message.contains("fatal: crashy cannot start"));
}

#[tokio::test]
async fn test_missing_readiness_fails_fast() {
    let mut config = ready_service("unconfigured");
    config.readiness = None;

    let err = start_service(config).await.unwrap_err();

    assert_matches!(err, FixtureError::MissingReadiness { .. });
}

#[tokio::test]
async fn test_endpoint_readiness_and_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ready"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = ServiceConfig::builder("http-backed", "sleep")
        .arg("30")
        .ready_on_endpoint(format!("{}/ready", server.uri()))
        .poll_interval(std::time::Duration::from_millis(20))
        .health_endpoint(format!("{}/ready", server.uri()))
        .startup_timeout(Duration::from_secs(5))
        .build();

    let service = start_service(config).await.unwrap();

    assert!(service.is_healthy().await);
    assert!(assert_performance(&service, &PerformanceBounds::new().max_startup_ms(5_000)).is_ok());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_performance_bound_violation_names_service() {
    let service = start_service(script_service("laggard", "sleep 0.2; echo READY; exec sleep 30"))
        .await
        .unwrap();

    let err = assert_performance(&service, &PerformanceBounds::new().max_startup_ms(10)).unwrap_err();

    assert_matches!(&err, FixtureError::PerformanceViolation { service: name, .. } if name == "laggard");
    assert!(err.to_string().contains(&format!("{}ms", service.startup_ms())));

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_auto_cleanup_stops_once() {
    let service = start_service(ready_service("guarded")).await.unwrap();
    let guard = auto_cleanup(service.clone());

    guard.run().await;
    guard.run().await;

    assert!(!service.is_alive());
    assert_eq!(service.shutdown_state(), ShutdownState::Stopped);
}

#[tokio::test]
async fn test_dropped_guard_kills() {
    let service = start_service(ready_service("abandoned")).await.unwrap();

    drop(auto_cleanup(service.clone()));

    assert!(!service.is_alive());
    let status = service.process().wait_for_exit().await;
    assert_eq!(status.signal, Some(9));
}

#[tokio::test]
async fn test_measure_ms_wraps_health_check() {
    let service = start_service(ready_service("timed")).await.unwrap();

    let measured = measure_ms(service.is_healthy()).await;

    assert!(measured.result);
    assert!(measured.ms < 1_000);

    service.stop().await.unwrap();
}
