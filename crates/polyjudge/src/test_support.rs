//! Shared fixtures for unit tests

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::config::RemoteConfig;
use crate::types::{RunEvent, RunObserver};

/// Reply the mock execution service sends back
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Raw(StatusCode, &'static str),
    Slow(Duration),
}

impl Reply {
    /// A successful run that printed `stdout`
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Reply::Json(json!({
            "run": {"stdout": stdout.into(), "stderr": "", "code": 0, "signal": null}
        }))
    }
}

#[derive(Clone)]
struct MockState {
    reply: Reply,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn execute_handler(
    State(state): State<MockState>,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    state.requests.lock().unwrap().push(body);
    match state.reply {
        Reply::Json(value) => (StatusCode::OK, value.to_string()),
        Reply::Raw(status, body) => (status, body.to_owned()),
        Reply::Slow(delay) => {
            tokio::time::sleep(delay).await;
            (
                StatusCode::OK,
                json!({"run": {"stdout": "", "code": 0}}).to_string(),
            )
        }
    }
}

/// Execution service stand-in on a random local port
pub struct MockService {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockService {
    pub async fn start(reply: Reply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            reply,
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/api/v2/execute", post(execute_handler))
            .with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, requests }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/api/v2/execute", self.addr)
    }

    pub fn config(&self) -> RemoteConfig {
        RemoteConfig {
            endpoint: self.endpoint(),
            request_timeout_secs: None,
        }
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

/// Observer that keeps every event
#[derive(Debug, Default)]
pub struct Recorder(Mutex<Vec<RunEvent>>);

impl Recorder {
    pub fn events(&self) -> Vec<RunEvent> {
        self.0.lock().unwrap().clone()
    }

    /// Content of every log event, in order
    pub fn log_lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RunEvent::Log(entry) => Some(entry.content),
                RunEvent::Render(_) => None,
            })
            .collect()
    }
}

impl RunObserver for Recorder {
    fn on_event(&self, event: RunEvent) {
        self.0.lock().unwrap().push(event);
    }
}
