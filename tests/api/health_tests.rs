//! Health Check API Tests

use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new().await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;

    let response = app.server.get("/health/live").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "alive");
}

#[tokio::test]
async fn test_readiness_with_in_memory_storage() {
    let app = TestApp::new().await;

    let response = app.server.get("/health/ready").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"]["backend"], "memory");
    assert!(body["storage"].get("database").is_none());
    assert_eq!(body["gateway"]["sessions"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() {
    let app = TestApp::new().await;

    let response = app.server.get("/metrics").await;
    response.assert_status_ok();
}
