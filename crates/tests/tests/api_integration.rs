use std::path::PathBuf;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use ballot_api::{build_app, build_app_with, ApiConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

const API_KEY: &str = "dev-ballot-key";

fn kb_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../kb")
}

async fn app() -> Router {
    build_app_with(ApiConfig::new(kb_root()))
        .await
        .expect("app should build")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = build_app(kb_root()).await.expect("app should build");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let parsed = read_json(response).await;
    assert_eq!(parsed["status"], "ok");
    assert!(parsed.get("escalation").is_some());
    assert!(parsed["knowledge"]["chunks_loaded"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn health_reports_disabled_escalation_without_key() {
    let response = app()
        .await
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let parsed = read_json(response).await;
    assert_eq!(parsed["escalation"], "disabled_missing_key");
    assert_eq!(parsed["selection"], "random");
    assert_eq!(parsed["storage"], "memory");
}

#[tokio::test]
async fn chat_requires_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "text": "Hello" }).to_string()))
        .unwrap();

    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let parsed = read_json(response).await;
    assert_eq!(parsed["error"], "unauthorized");
}

#[tokio::test]
async fn chat_returns_structured_payload() {
    let response = app()
        .await
        .oneshot(post_json("/v1/chat", json!({ "text": "Thank you" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    assert_eq!(parsed["category"], "thanks");
    assert_eq!(parsed["source"], "rules");
    assert!(!parsed["reply_text"].as_str().unwrap().is_empty());
    assert!(parsed["session_id"].as_str().is_some());
}

#[tokio::test]
async fn chat_continues_session_without_repeating_variant() {
    let app = app().await;

    let first = read_json(
        app.clone()
            .oneshot(post_json("/v1/chat", json!({ "text": "Hello" })))
            .await
            .unwrap(),
    )
    .await;
    let session_id = first["session_id"].as_str().unwrap().to_string();

    let second = read_json(
        app.oneshot(post_json(
            "/v1/chat",
            json!({ "text": "Hello", "session_id": session_id }),
        ))
        .await
        .unwrap(),
    )
    .await;

    assert_eq!(second["session_id"], first["session_id"]);
    assert_eq!(second["category"], "greeting");
    assert_ne!(second["variant"], first["variant"]);
}

#[tokio::test]
async fn chat_routes_admin_phrases_by_role() {
    let app = app().await;

    let admin = read_json(
        app.clone()
            .oneshot(post_json(
                "/v1/chat",
                json!({ "text": "I'm an admin", "is_admin": true }),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(admin["category"], "admin");

    let voter = read_json(
        app.oneshot(post_json("/v1/chat", json!({ "text": "I'm an admin" })))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(voter["category"], "admin_restricted");
}

#[tokio::test]
async fn chat_rejects_blank_text() {
    let response = app()
        .await
        .oneshot(post_json("/v1/chat", json!({ "text": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let parsed = read_json(response).await;
    assert_eq!(parsed["error"], "empty_text");
}

#[tokio::test]
async fn classify_reports_category_and_phrase() {
    let response = app()
        .await
        .oneshot(post_json(
            "/v1/classify",
            json!({ "text": "Can I change my vote?" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    assert_eq!(parsed["category"], "vote_change");
    assert_eq!(parsed["matched_phrase"], "change my vote");
}

#[tokio::test]
async fn intents_lists_table_in_priority_order() {
    let response = app().await.oneshot(get("/v1/intents")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    let rules = parsed.as_array().unwrap();
    assert_eq!(rules[0]["category"], "admin");
    assert_eq!(rules[0]["audience"], "admin_only");
    assert_eq!(rules[1]["category"], "admin_restricted");
    assert!(rules
        .iter()
        .all(|rule| !rule["triggers"].as_array().unwrap().is_empty()));
}

#[tokio::test]
async fn kb_search_returns_ranked_hits() {
    let response = app()
        .await
        .oneshot(get("/v1/kb/search?q=can%20I%20change%20my%20vote&limit=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    let hits = parsed["hits"].as_array().unwrap();
    assert!(!hits.is_empty() && hits.len() <= 2);
    assert_eq!(hits[0]["source_path"], "faq.md");
}

#[tokio::test]
async fn kb_search_requires_query() {
    let response = app().await.oneshot(get("/v1/kb/search?q=")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rate_limit_applies_per_ip() {
    let app = build_app_with(
        ApiConfig::new(kb_root()).with_rate_limit(Duration::from_secs(60), 2),
    )
    .await
    .unwrap();

    let from = |ip: &str| {
        Request::builder()
            .uri("/v1/intents")
            .header("x-api-key", API_KEY)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(from("10.1.1.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let limited = app.clone().oneshot(from("10.1.1.1")).await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));

    let other = app.oneshot(from("10.2.2.2")).await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}
