//! Mock AI provider servers for integration tests
//!
//! One server per protocol family, returning canned responses with
//! scriptable failures and delays.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Wire protocol spoken by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    OpenAi,
    Anthropic,
    Google,
    Ollama,
}

/// Scripted behavior for a mock provider
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Canned answer content
    pub content: String,
    /// Fail this many requests before succeeding
    pub fail_count: u32,
    /// Status code used for scripted failures
    pub fail_status: u16,
    /// Artificial latency before responding
    pub delay: Option<Duration>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            content: "Hello from the mock provider".to_owned(),
            fail_count: 0,
            fail_status: 500,
            delay: None,
        }
    }
}

impl Behavior {
    pub fn with_content(content: &str) -> Self {
        Self {
            content: content.to_owned(),
            ..Self::default()
        }
    }

    pub fn failing(fail_count: u32, fail_status: u16) -> Self {
        Self {
            fail_count,
            fail_status,
            ..Self::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

struct MockState {
    protocol: Protocol,
    behavior: Behavior,
    calls: AtomicU32,
    remaining_failures: AtomicU32,
}

/// A mock provider backend on an ephemeral local port
pub struct MockProvider {
    addr: SocketAddr,
    protocol: Protocol,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockProvider {
    /// Start a mock speaking the given protocol
    pub async fn start(protocol: Protocol, behavior: Behavior) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            protocol,
            remaining_failures: AtomicU32::new(behavior.fail_count),
            behavior,
            calls: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_completion))
            .route("/v1/messages", routing::post(handle_completion))
            .route("/v1beta/models/{model_action}", routing::post(handle_google))
            .route("/api/chat", routing::post(handle_completion))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            protocol,
            shutdown,
            state,
        })
    }

    /// Base URL for configuring this mock as a provider
    pub fn base_url(&self) -> String {
        match self.protocol {
            Protocol::OpenAi | Protocol::Anthropic => format!("http://{}/v1", self.addr),
            Protocol::Google => format!("http://{}/v1beta", self.addr),
            Protocol::Ollama => format!("http://{}", self.addr),
        }
    }

    /// Number of completion calls received
    pub fn calls(&self) -> u32 {
        self.state.calls.load(Ordering::Relaxed)
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[derive(Debug, Deserialize)]
struct AnyRequest {
    #[serde(default)]
    model: Option<String>,
}

async fn handle_completion(
    State(state): State<Arc<MockState>>,
    Json(request): Json<AnyRequest>,
) -> axum::response::Response {
    let model = request.model.unwrap_or_else(|| "mock-model".to_owned());
    respond(&state, &model).await
}

async fn handle_google(
    State(state): State<Arc<MockState>>,
    Path(model_action): Path<String>,
) -> axum::response::Response {
    // Path segment is "{model}:generateContent"
    let model = model_action
        .split(':')
        .next()
        .unwrap_or("mock-model")
        .to_owned();
    respond(&state, &model).await
}

async fn respond(state: &MockState, model: &str) -> axum::response::Response {
    state.calls.fetch_add(1, Ordering::Relaxed);

    if let Some(delay) = state.behavior.delay {
        tokio::time::sleep(delay).await;
    }

    let remaining = state.remaining_failures.load(Ordering::Relaxed);
    if remaining > 0 {
        state.remaining_failures.fetch_sub(1, Ordering::Relaxed);
        let status =
            StatusCode::from_u16(state.behavior.fail_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "mock failure").into_response();
    }

    let content = &state.behavior.content;
    let body = match state.protocol {
        Protocol::OpenAi => serde_json::json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 7, "total_tokens": 12}
        }),
        Protocol::Anthropic => serde_json::json!({
            "id": "msg_mock",
            "type": "message",
            "role": "assistant",
            "model": model,
            "content": [{"type": "text", "text": content}],
            "stop_reason": "end_turn"
        }),
        Protocol::Google => serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": content}], "role": "model"},
                "finishReason": "STOP"
            }]
        }),
        Protocol::Ollama => serde_json::json!({
            "model": model,
            "message": {"role": "assistant", "content": content},
            "done": true
        }),
    };

    Json(body).into_response()
}
