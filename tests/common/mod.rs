#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use step_tutor::{
    AppState, HistoryStore, HttpTransport, ResilientExecutor, RetryPolicy, TutorService,
    UpstreamConfig, router,
};

pub const TEST_API_KEY: &str = "test-key";

/// One scripted reply from the fake upstream
#[derive(Clone)]
pub enum Reply {
    /// 200 with a chat completion carrying this content
    Completion(String),
    /// Arbitrary status and raw body
    Status(u16, String),
    /// Wait before sending the inner reply
    Delayed(Duration, Box<Reply>),
}

/// What the fake upstream received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct FakeState {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// A chat-completion endpoint on an ephemeral local port that replays
/// scripted replies in order.
pub struct FakeUpstream {
    pub url: String,
    state: Arc<FakeState>,
}

impl FakeUpstream {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let state = Arc::new(FakeState {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .with_state(state.clone());
        let addr = spawn(app).await;

        Self {
            url: format!("http://{}/v1/chat/completions", addr),
            state,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

async fn chat_completions(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.requests.lock().unwrap().push(RecordedRequest {
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let reply = state.replies.lock().unwrap().pop_front();
    match reply {
        Some(reply) => render(reply).await,
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no more scripted replies").into_response(),
    }
}

async fn render(mut reply: Reply) -> Response {
    loop {
        match reply {
            Reply::Delayed(delay, inner) => {
                tokio::time::sleep(delay).await;
                reply = *inner;
            }
            Reply::Completion(content) => {
                return Json(json!({
                    "id": "chatcmpl-test",
                    "object": "chat.completion",
                    "choices": [{
                        "index": 0,
                        "message": { "role": "assistant", "content": content },
                        "finish_reason": "stop"
                    }]
                }))
                .into_response();
            }
            Reply::Status(status, body) => {
                let status = StatusCode::from_u16(status).expect("valid status");
                return (status, body).into_response();
            }
        }
    }
}

async fn spawn(app: Router) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

/// Retry limits small enough for tests on a real clock
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        request_timeout: Duration::from_secs(5),
    }
}

/// Start the tutor HTTP service against `upstream_url`, returning its base URL
pub async fn start_tutor(
    upstream_url: &str,
    policy: RetryPolicy,
    history: Option<Arc<dyn HistoryStore>>,
) -> String {
    let transport = HttpTransport::new(upstream_url, TEST_API_KEY).expect("create transport");
    let executor = ResilientExecutor::new(Arc::new(transport), policy);
    let service = TutorService::new(executor, UpstreamConfig::default());
    let state = match history {
        Some(history) => AppState::with_history(service, history),
        None => AppState::new(service),
    };

    let addr = spawn(router(Arc::new(state))).await;
    format!("http://{}", addr)
}

/// A fenced, one-step reply like models commonly produce
pub fn fenced_reply(answer: &str, final_answer: &str) -> String {
    let body = json!({
        "topic": "Mathematics - Arithmetic",
        "difficulty": "beginner",
        "steps": [{
            "step_number": 1,
            "thinking_prompt": "What do we get when we combine the numbers?",
            "answer": answer,
            "explanation": "Add the two values."
        }],
        "final_answer": final_answer
    });
    format!("```json\n{}\n```", body)
}
