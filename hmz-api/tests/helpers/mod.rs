//! Test Helper Utilities
//!
//! Shared utilities for hmz-api integration tests: in-memory app setup,
//! user/session seeding, request builders and SSE body parsing.

#![allow(dead_code)]

pub mod stub_provider;

pub use stub_provider::{RewriteScript, StubProvider};

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use hmz_api::llm::CompletionProvider;
use hmz_api::{build_router, AppState};
use hmz_common::config::ServiceConfig;
use hmz_common::db::init::init_in_memory;
use hmz_common::db::usage::{insert_usage_record, usage_records_for_user};
use hmz_common::db::users::{create_session, set_user_tier, upsert_user};
use hmz_common::db::{NewUsageRecord, Outcome, UsageRecord};
use hmz_common::Tier;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

pub const TOKEN: &str = "test-token";
pub const USER_ID: &str = "user-1";

pub struct TestApp {
    pub app: Router,
    pub db: SqlitePool,
    pub provider: Option<Arc<StubProvider>>,
}

impl TestApp {
    pub fn provider(&self) -> &StubProvider {
        self.provider.as_deref().expect("app was built with a provider")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::util::ServiceExt;
        self.app.clone().oneshot(request).await.expect("router is infallible")
    }

    pub async fn records(&self) -> Vec<UsageRecord> {
        usage_records_for_user(&self.db, USER_ID).await.unwrap()
    }
}

/// App with one seeded user (`USER_ID`, bearer `TOKEN`, free tier)
pub async fn setup(provider: Option<StubProvider>) -> TestApp {
    setup_with_config(provider, ServiceConfig::default()).await
}

pub async fn setup_with_config(provider: Option<StubProvider>, config: ServiceConfig) -> TestApp {
    let db = init_in_memory().await.expect("in-memory database");
    seed_user(&db, USER_ID, TOKEN, Tier::Free).await;

    let provider = provider.map(Arc::new);
    let llm = provider.clone().map(|p| p as Arc<dyn CompletionProvider>);
    let state = AppState::new(db.clone(), llm, config);

    TestApp { app: build_router(state), db, provider }
}

pub async fn seed_user(db: &SqlitePool, user_id: &str, token: &str, tier: Tier) {
    upsert_user(db, user_id, &format!("{}@example.com", user_id), None).await.unwrap();
    set_user_tier(db, user_id, tier, tier.as_str()).await.unwrap();
    create_session(db, token, user_id, None).await.unwrap();
}

/// Bill `words` to `user_id` as an earlier successful attempt
pub async fn seed_usage(db: &SqlitePool, user_id: &str, words: u64) {
    insert_usage_record(
        db,
        &NewUsageRecord {
            user_id: user_id.to_string(),
            input_text: "earlier".to_string(),
            output_text: "earlier".to_string(),
            word_count: words,
            outcome: Outcome::Success,
            initial_score: None,
            final_score: None,
            request_id: None,
        },
    )
    .await
    .unwrap();
}

pub fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.expect("body").to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON body")
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("UTF-8 body")
}

/// `data:` payloads of an SSE body, in order, `[DONE]` included
pub fn sse_payloads(text: &str) -> Vec<String> {
    text.split("\n\n")
        .filter_map(|block| {
            let data: Vec<&str> = block
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|v| v.strip_prefix(' ').unwrap_or(v))
                .collect();
            (!data.is_empty()).then(|| data.join("\n"))
        })
        .collect()
}

/// JSON events of an SSE body, `[DONE]` excluded
pub fn sse_events(text: &str) -> Vec<Value> {
    sse_payloads(text)
        .into_iter()
        .filter(|p| p != "[DONE]")
        .map(|p| serde_json::from_str(&p).expect("event JSON"))
        .collect()
}

/// Wait until `user_id` has at least `count` records
pub async fn wait_for_records(db: &SqlitePool, user_id: &str, count: usize) -> Vec<UsageRecord> {
    for _ in 0..100 {
        let records = usage_records_for_user(db, user_id).await.unwrap();
        if records.len() >= count {
            return records;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    usage_records_for_user(db, user_id).await.unwrap()
}
