//! `GET /data` through the full HTTP stack, backed by mocks.

mod support;

use axum::http::StatusCode;
use dataserve_api::ErrorCode;
use dataserve_test_utils::{
    record_fixture, test_prefix, two_owner_rows, AccessResolutionError, DataError,
    MockAccessResolver,
};
use serde_json::json;
use support::app::TestApp;

fn error_code(body: &serde_json::Value) -> Result<ErrorCode, String> {
    serde_json::from_value(body["code"].clone()).map_err(|e| e.to_string())
}

#[tokio::test]
async fn test_second_request_is_served_from_cache() -> Result<(), String> {
    let record = record_fixture(1, 1, "some_data");
    let app = TestApp::new(MockAccessResolver::new().with_user(1), vec![record.clone()])?;
    let expected = json!({ "data": [{ "id": 1, "user_id": 1, "data": "some_data" }] });

    let (status, body) = app.get_data_as(1).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, expected);
    assert_eq!(app.source.owner_calls(), vec![1]);
    assert_eq!(app.cache.stored(&test_prefix().key(1)), Some(vec![record]));

    let (status, body) = app.get_data_as(1).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, expected);
    assert_eq!(app.source.total_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_user_without_records_gets_empty_array() -> Result<(), String> {
    let app = TestApp::new(MockAccessResolver::new().with_user(9), two_owner_rows())?;

    let (status, body) = app.get_data_as(9).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": [] }));
    Ok(())
}

#[tokio::test]
async fn test_admin_reads_everything_and_fans_out() -> Result<(), String> {
    let app = TestApp::new(MockAccessResolver::new().with_admin(1), two_owner_rows())?;

    let (status, body) = app.get_data_as(1).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));
    assert_eq!(app.source.all_calls(), 1);
    assert!(app.source.owner_calls().is_empty());

    let prefix = test_prefix();
    assert_eq!(
        app.cache.stored(&prefix.key(1)),
        Some(vec![record_fixture(1, 1, "a"), record_fixture(2, 1, "b")])
    );
    assert_eq!(
        app.cache.stored(&prefix.key(2)),
        Some(vec![record_fixture(3, 2, "c")])
    );
    Ok(())
}

#[tokio::test]
async fn test_fanned_out_entry_serves_owner_read() -> Result<(), String> {
    let resolver = MockAccessResolver::new().with_admin(1).with_user(2);
    let app = TestApp::new(resolver, two_owner_rows())?;

    app.get_data_as(1).await?;
    let (status, body) = app.get_data_as(2).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": [{ "id": 3, "user_id": 2, "data": "c" }] }));
    assert!(app.source.owner_calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_access_lookup_degrades_to_owner_read() -> Result<(), String> {
    let app = TestApp::new(MockAccessResolver::new().with_admin(1), two_owner_rows())?;
    app.resolver
        .fail_with(AccessResolutionError::lookup("connection reset"));

    let (status, body) = app.get_data_as(1).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(app.source.all_calls(), 0);
    assert_eq!(app.source.owner_calls(), vec![1]);
    Ok(())
}

#[tokio::test]
async fn test_data_source_failure_is_generic_500() -> Result<(), String> {
    let app = TestApp::new(MockAccessResolver::new().with_user(1), two_owner_rows())?;
    app.source
        .fail_with(DataError::query("relation \"data\" does not exist"));

    let (status, body) = app.get_data_as(1).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&body)?, ErrorCode::DatabaseError);
    assert!(!body.to_string().contains("relation"));
    assert!(app.cache.set_calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cache_outage_is_invisible_to_clients() -> Result<(), String> {
    let app = TestApp::new(MockAccessResolver::new().with_user(1), two_owner_rows())?;
    app.cache.fail_gets();
    app.cache.fail_sets();

    let (status, body) = app.get_data_as(1).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_missing_authorization_is_401() -> Result<(), String> {
    let app = TestApp::new(MockAccessResolver::new(), Vec::new())?;

    let (status, body) = app.get("/data", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body)?, ErrorCode::Unauthorized);
    assert_eq!(app.resolver.lookups(), 0);
    Ok(())
}

#[tokio::test]
async fn test_malformed_authorization_is_401() -> Result<(), String> {
    let app = TestApp::new(MockAccessResolver::new(), Vec::new())?;

    for header in ["Basic dXNlcg==", "Bearer", "Bearer a b"] {
        let (status, body) = app.get("/data", Some(header)).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header {:?}", header);
        assert_eq!(body["message"], "invalid token format");
    }
    Ok(())
}

#[tokio::test]
async fn test_tampered_token_is_401() -> Result<(), String> {
    let app = TestApp::new(MockAccessResolver::new().with_user(1), Vec::new())?;
    let token = app.token_for(1)?;
    let tampered = format!("{}x", token);

    let (status, body) = app.get("/data", Some(&format!("Bearer {}", tampered))).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body)?, ErrorCode::InvalidToken);
    assert_eq!(app.source.total_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_health_and_metrics_need_no_auth() -> Result<(), String> {
    let app = TestApp::new(MockAccessResolver::new(), Vec::new())?;

    let (status, body) = app.get("/health/ready", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/health/ping", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "pong");

    app.get_data_as(1).await?;
    let (status, body) = app.get("/metrics", None).await?;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().ok_or("metrics body is not text")?;
    assert!(text.contains("dataserve_http_requests_total"));
    assert!(text.contains("route=\"GET /data\""));
    Ok(())
}
