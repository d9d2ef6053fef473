use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use ballot_agents::AssistantAgent;
use ballot_api::{build_app_with, ApiConfig};
use ballot_core::{pool, AssistantConfig, Category, ChatInput, ReplySource};
use ballot_llm::{EscalationStatus, Escalator, OpenAiSettings};
use ballot_observability::AppMetrics;
use ballot_retrieval::KnowledgeBase;
use ballot_storage::Store;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

const TEST_KEY: &str = "sk-test-0123456789abcdefghij";

#[derive(Clone)]
struct MockModel {
    status: StatusCode,
    body: Value,
    calls: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<(Option<String>, Value)>>>,
}

async fn responses_endpoint(
    State(mock): State<MockModel>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    mock.calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    *mock.last_request.lock() = Some((auth, payload));
    (mock.status, Json(mock.body.clone()))
}

async fn spawn_model(status: StatusCode, body: Value) -> (SocketAddr, MockModel) {
    let mock = MockModel {
        status,
        body,
        calls: Arc::new(AtomicUsize::new(0)),
        last_request: Arc::new(Mutex::new(None)),
    };
    let app = Router::new()
        .route("/v1/responses", post(responses_endpoint))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve mock model") });

    (addr, mock)
}

fn settings_for(addr: SocketAddr) -> OpenAiSettings {
    OpenAiSettings::default()
        .with_api_key(TEST_KEY)
        .with_base_url(format!("http://{addr}"))
}

fn agent_with(settings: &OpenAiSettings) -> AssistantAgent<Store> {
    AssistantAgent::new(
        Arc::new(KnowledgeBase::builtin()),
        Arc::new(Escalator::from_settings(settings)),
        Arc::new(Store::memory()),
        AppMetrics::shared(),
        AssistantConfig::default(),
    )
}

fn input(text: &str, is_admin: bool) -> ChatInput {
    ChatInput {
        session_id: Some("escalation-session".to_string()),
        text: text.to_string(),
        is_admin,
        user_id: None,
    }
}

#[tokio::test]
async fn working_endpoint_replaces_rule_reply() {
    let (addr, mock) = spawn_model(
        StatusCode::OK,
        json!({ "output_text": "You can vote from the Elections page 🗳️" }),
    )
    .await;
    let agent = agent_with(&settings_for(addr));
    assert_eq!(agent.escalation_status(), EscalationStatus::Enabled);

    let reply = agent.handle_chat(input("How do I vote?", false)).await.unwrap();

    assert_eq!(reply.source, ReplySource::Openai);
    assert_eq!(reply.category, Category::Voting);
    assert_eq!(reply.reply_text, "You can vote from the Elections page 🗳️");
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);

    let (auth, payload) = mock.last_request.lock().take().expect("request captured");
    assert_eq!(auth.as_deref(), Some(format!("Bearer {TEST_KEY}").as_str()));
    assert_eq!(payload["model"], "gpt-4o-mini");
    let input = payload["input"].as_array().unwrap();
    assert_eq!(input[0]["role"], "system");
    let system = input[0]["content"].as_str().unwrap();
    assert!(system.contains("Current Context:"));
    assert!(system.contains("voting"));
    assert_eq!(input.last().unwrap()["content"], "How do I vote?");
}

#[tokio::test]
async fn escalated_request_carries_history() {
    let (addr, mock) = spawn_model(StatusCode::OK, json!({ "output_text": "Sure!" })).await;
    let agent = agent_with(&settings_for(addr));

    agent.handle_chat(input("Hello", false)).await.unwrap();
    mock.last_request.lock().take();
    agent.handle_chat(input("What time is it?", false)).await.unwrap();

    let (_, payload) = mock.last_request.lock().take().expect("request captured");
    let input = payload["input"].as_array().unwrap();
    assert_eq!(input.len(), 4);
    assert_eq!(input[1]["role"], "user");
    assert_eq!(input[1]["content"], "Hello");
    assert_eq!(input[2]["role"], "assistant");
    assert_eq!(input[2]["content"], "Sure!");
}

#[tokio::test]
async fn failing_endpoint_falls_back_to_rules() {
    let (addr, mock) = spawn_model(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": { "message": "upstream exploded" } }),
    )
    .await;
    let agent = agent_with(&settings_for(addr));

    let reply = agent.handle_chat(input("Thank you", false)).await.unwrap();

    assert_eq!(reply.source, ReplySource::Rules);
    assert!(pool(Category::Thanks).contains(&reply.reply_text.as_str()));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    assert_eq!(agent.escalation_status(), EscalationStatus::Enabled);
}

#[tokio::test]
async fn empty_output_falls_back_to_rules() {
    let (addr, _mock) = spawn_model(StatusCode::OK, json!({ "output": [] })).await;
    let agent = agent_with(&settings_for(addr));

    let reply = agent.handle_chat(input("Hello", false)).await.unwrap();
    assert_eq!(reply.source, ReplySource::Rules);
    assert!(pool(Category::Greeting).contains(&reply.reply_text.as_str()));
}

#[tokio::test]
async fn rejected_credential_stops_further_escalation() {
    let (addr, mock) = spawn_model(
        StatusCode::UNAUTHORIZED,
        json!({ "error": { "message": "Incorrect API key provided" } }),
    )
    .await;
    let agent = agent_with(&settings_for(addr));

    let first = agent.handle_chat(input("Hello", false)).await.unwrap();
    assert_eq!(first.source, ReplySource::Rules);
    assert_eq!(agent.escalation_status(), EscalationStatus::Rejected);

    let second = agent.handle_chat(input("Hello", false)).await.unwrap();
    assert_eq!(second.source, ReplySource::Rules);
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_endpoint_falls_back_to_rules() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let agent = agent_with(&settings_for(addr));
    let reply = agent.handle_chat(input("I'm an admin", true)).await.unwrap();

    assert_eq!(reply.source, ReplySource::Rules);
    assert_eq!(reply.category, Category::Admin);
    assert!(pool(Category::Admin).contains(&reply.reply_text.as_str()));
}

#[tokio::test]
async fn api_serves_model_reply_and_reports_status() {
    let (addr, _mock) = spawn_model(
        StatusCode::OK,
        json!({
            "output": [
                { "type": "reasoning", "summary": [] },
                {
                    "type": "message",
                    "content": [
                        { "type": "output_text", "text": "Votes are final once submitted." },
                        { "type": "output_text", "text": "Contact an administrator if something went wrong." }
                    ]
                }
            ]
        }),
    )
    .await;
    let app = build_app_with(ApiConfig::new(kb_root()).with_openai(settings_for(addr)))
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .header("x-api-key", "dev-ballot-key")
        .body(Body::from(json!({ "text": "Can I change my vote?" }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["source"], "openai");
    assert_eq!(parsed["category"], "vote_change");
    assert_eq!(
        parsed["reply_text"],
        "Votes are final once submitted.\n\nContact an administrator if something went wrong."
    );
    assert!(!parsed["knowledge_sources"].as_array().unwrap().is_empty());

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = to_bytes(health.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["escalation"], "enabled");
    assert_eq!(parsed["model"], "gpt-4o-mini");
    assert_eq!(parsed["metrics"]["escalations_total"], 1);
}

fn kb_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../kb")
}
