//! Integration tests for the supporting HTTP routes
//!
//! Tests cover:
//! - Health and build info
//! - Usage summary
//! - Payment webhook (signature, payload shapes, tier mapping)
//! - Billing redirects
//! - CORS preflight

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use helpers::*;
use hmz_api::api::webhook::{sign, SIGNATURE_HEADER};
use hmz_common::config::ServiceConfig;
use hmz_common::db::subscriptions::insert_subscription;
use hmz_common::Tier;
use serde_json::{json, Value};

const WEBHOOK: &str = "/api/webhooks/payment";

fn webhook_request(body: &Value, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(WEBHOOK)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn upgrade_payload(user_id: &str, plan_id: &str) -> Value {
    json!({
        "event": "subscription.created",
        "data": {"metadata": {"user_id": user_id}, "plan_id": plan_id}
    })
}

async fn usage(app: &TestApp) -> Value {
    let response = app.send(get("/api/usage", Some(TOKEN))).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

// =============================================================================
// Health / build info
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup(Some(StubProvider::chunks(&["x"]))).await;

    let response = app.send(get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "hmz-api");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_number());
    assert_eq!(body["llm_configured"], true);
}

#[tokio::test]
async fn test_health_reports_missing_llm() {
    let app = setup(None).await;
    let body = body_json(app.send(get("/health", None)).await).await;
    assert_eq!(body["llm_configured"], false);
}

#[tokio::test]
async fn test_buildinfo_endpoint() {
    let app = setup(None).await;

    let response = app.send(get("/api/buildinfo", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["git_hash"].is_string());
    assert!(body["build_timestamp"].is_string());
    assert!(body["build_profile"].is_string());
}

// =============================================================================
// Usage
// =============================================================================

#[tokio::test]
async fn test_usage_requires_auth() {
    let app = setup(None).await;
    let response = app.send(get("/api/usage", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_usage_summary() {
    let app = setup(None).await;
    seed_usage(&app.db, USER_ID, 40).await;
    seed_usage(&app.db, USER_ID, 60).await;

    let body = usage(&app).await;
    assert_eq!(body["tier"], "free");
    assert_eq!(body["tierSource"], "profile");
    assert_eq!(body["monthlyUsage"], 100);
    assert_eq!(body["monthlyLimit"], 250);
    assert_eq!(body["perRequestLimit"], 250);
    assert_eq!(body["remaining"], 150);

    let recent = body["recent"].as_array().unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0]["wordCount"], 60);
    assert_eq!(recent[0]["outcome"], "success");
    assert_eq!(recent[0]["inputPreview"], "earlier");
}

#[tokio::test]
async fn test_usage_after_a_humanize() {
    let app = setup(Some(StubProvider::chunks(&["Sure thing."]))).await;
    let long_input = format!("{} end", "word ".repeat(30));

    let response = app
        .send(post_json("/api/humanize", Some(TOKEN), &json!({"inputText": long_input})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = usage(&app).await;
    assert_eq!(body["monthlyUsage"], 31);
    let preview = body["recent"][0]["inputPreview"].as_str().unwrap();
    assert!(preview.ends_with("..."));
    assert_eq!(preview.chars().count(), 83);
}

#[tokio::test]
async fn test_usage_unavailable() {
    let app = setup(None).await;
    sqlx::query("DROP TABLE humanizations").execute(&app.db).await.unwrap();

    let response = app.send(get("/api/usage", Some(TOKEN))).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    let request_id = body["requestId"].as_str().unwrap();
    let parts: Vec<&str> = request_id.split('_').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "usage");
    assert!(parts[1].parse::<i64>().is_ok());
    assert_eq!(parts[2].len(), 9);
}

#[tokio::test]
async fn test_active_subscription_sets_tier() {
    let app = setup(None).await;
    insert_subscription(&app.db, USER_ID, "active", 999, Some("polar_pro")).await.unwrap();

    let body = usage(&app).await;
    assert_eq!(body["tier"], "pro");
    assert_eq!(body["tierSource"], "subscription");
    assert_eq!(body["monthlyLimit"], 20_000);
}

// =============================================================================
// Payment webhook
// =============================================================================

#[tokio::test]
async fn test_webhook_upgrades_tier() {
    let app = setup(None).await;

    let response = app.send(webhook_request(&upgrade_payload(USER_ID, "polar_premium"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["received"], true);
    assert_eq!(body["tier"], "premium");

    let summary = usage(&app).await;
    assert_eq!(summary["tier"], "premium");
    assert_eq!(summary["perRequestLimit"], 5_000);
}

#[tokio::test]
async fn test_webhook_legacy_metadata_key() {
    let app = setup(None).await;
    let payload = json!({
        "event": "subscription.updated",
        "data": {"metadata": {"supabase_uid": USER_ID}, "plan_id": "polar_basic"}
    });

    let response = app.send(webhook_request(&payload, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(usage(&app).await["tier"], "basic");
}

#[tokio::test]
async fn test_webhook_unknown_plan_is_free() {
    let app = setup(None).await;
    seed_user(&app.db, "user-2", "token-2", Tier::Pro).await;

    let response = app.send(webhook_request(&upgrade_payload("user-2", "mystery"), None)).await;
    assert_eq!(body_json(response).await["tier"], "free");
}

#[tokio::test]
async fn test_webhook_rejects_incomplete_payloads() {
    let app = setup(None).await;

    let missing_plan = json!({"data": {"metadata": {"user_id": USER_ID}}});
    let response = app.send(webhook_request(&missing_plan, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing user_id or plan_id");

    let request = Request::builder()
        .method("POST")
        .uri(WEBHOOK)
        .body(Body::from("not json"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid webhook payload");
}

#[tokio::test]
async fn test_webhook_unknown_user() {
    let app = setup(None).await;
    let response = app.send(webhook_request(&upgrade_payload("ghost", "polar_pro"), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_signature_enforced_when_configured() {
    let mut config = ServiceConfig::default();
    config.billing.webhook_secret = Some("whsec".to_string());
    let app = setup_with_config(None, config).await;
    let payload = upgrade_payload(USER_ID, "polar_pro");

    let response = app.send(webhook_request(&payload, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(webhook_request(&payload, Some(&sign("wrong", payload.to_string().as_bytes())))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(usage(&app).await["tier"], "free");

    let signature = sign("whsec", payload.to_string().as_bytes());
    let response = app.send(webhook_request(&payload, Some(&signature))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(usage(&app).await["tier"], "pro");
}

// =============================================================================
// Billing redirects
// =============================================================================

#[tokio::test]
async fn test_billing_redirects() {
    let mut config = ServiceConfig::default();
    config
        .billing
        .checkout_urls
        .insert("pro".to_string(), "https://pay.example.com/checkout/pro".to_string());
    config.billing.portal_url = Some("https://pay.example.com/portal".to_string());
    let app = setup_with_config(None, config).await;

    let response = app.send(get("/billing/checkout/pro", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://pay.example.com/checkout/pro"
    );

    let response = app.send(get("/billing/portal", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "https://pay.example.com/portal");

    let response = app.send(get("/billing/checkout/enterprise", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_portal_not_configured() {
    let app = setup(None).await;
    let response = app.send(get("/billing/portal", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_cors_preflight() {
    let app = setup(None).await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/humanize-stream")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,authorization")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    let methods = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));
}
