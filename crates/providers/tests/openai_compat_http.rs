//! Round-trips against a local axum server standing in for the upstream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use sr_domain::error::Error;
use sr_domain::tool::Message;
use sr_providers::{ChatRequest, LlmProvider, OpenAiCompatProvider};

#[derive(Clone, Default)]
struct Seen {
    auth: Arc<Mutex<Option<String>>>,
    body: Arc<Mutex<Option<Value>>>,
}

async fn spawn_upstream(status: StatusCode, reply: Value) -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(
                move |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| {
                    let reply = reply.clone();
                    async move {
                        *seen.auth.lock().unwrap() = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        *seen.body.lock().unwrap() = Some(body);
                        (status, Json(reply))
                    }
                },
            ),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1/"), seen)
}

#[tokio::test]
async fn chat_sends_bearer_and_returns_assistant_message() {
    let (base, seen) = spawn_upstream(
        StatusCode::OK,
        json!({
            "model": "m1",
            "choices": [{"finish_reason": "stop",
                         "message": {"role": "assistant", "content": "hello"}}]
        }),
    )
    .await;

    let provider =
        OpenAiCompatProvider::new(&base, Some("sk-abc".into()), "m1", Duration::from_secs(5))
            .unwrap();
    let req = ChatRequest {
        messages: vec![Message::user("hi")],
        ..Default::default()
    };
    let resp = provider.chat(&req).await.unwrap();

    assert_eq!(resp.message.content.as_deref(), Some("hello"));
    assert_eq!(resp.model, "m1");
    assert_eq!(seen.auth.lock().unwrap().as_deref(), Some("Bearer sk-abc"));
    let body = seen.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "m1");
    assert_eq!(body["messages"][0]["content"], "hi");
}

#[tokio::test]
async fn non_success_status_is_provider_error() {
    let (base, _seen) = spawn_upstream(
        StatusCode::UNAUTHORIZED,
        json!({"error": {"message": "bad key"}}),
    )
    .await;

    let provider =
        OpenAiCompatProvider::new(&base, None, "m1", Duration::from_secs(5)).unwrap();
    let err = provider
        .chat(&ChatRequest {
            messages: vec![Message::user("hi")],
            ..Default::default()
        })
        .await
        .unwrap_err();

    match err {
        Error::Provider { message, .. } => {
            assert!(message.contains("401"));
            assert!(message.contains("bad key"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
