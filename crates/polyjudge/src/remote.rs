//! Client for the external code execution service
//!
//! Compiled and native languages are not run locally. Their source is posted
//! once to a Piston-compatible `execute` endpoint and the reply is mapped onto
//! an [`ExecutionResult`]. Failed requests are not retried.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::{LanguageConfig, RemoteConfig};
use crate::types::ExecutionResult;

/// Error reported when the compile stage exits with a non-zero code
pub const COMPILATION_FAILED: &str = "Compilation failed";

/// Error reported when the run stage exits with a non-zero code
pub const EXECUTION_FAILED: &str = "Execution failed";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to execution service failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("execution service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response from execution service: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: [SourceFile<'a>; 1],
}

#[derive(Debug, Serialize)]
struct SourceFile<'a> {
    name: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    compile: Option<Stage>,
    run: Stage,
}

#[derive(Debug, Default, Deserialize)]
struct Stage {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    signal: Option<String>,
}

impl Stage {
    fn failed(&self) -> bool {
        self.code.is_some_and(|code| code != 0) || self.signal.is_some()
    }
}

fn lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_owned).collect()
}

/// Sends source to the execution service
#[derive(Debug, Clone)]
pub struct RemoteDelegate {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteDelegate {
    pub fn new(config: &RemoteConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to configure HTTP client, using defaults");
            reqwest::Client::new()
        });
        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute `source` as `file_name` in the given language
    ///
    /// Never fails: transport and protocol errors are reported through
    /// `ExecutionResult::error` with empty output.
    #[instrument(skip(self, language, source), fields(runtime = %language.runtime_id))]
    pub async fn execute(
        &self,
        language: &LanguageConfig,
        file_name: &str,
        source: &str,
    ) -> ExecutionResult {
        let started = Instant::now();
        let result = self.try_execute(language, file_name, source).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(mut result) => {
                result.duration_ms = duration_ms;
                debug!(duration_ms, error = ?result.error, "remote execution complete");
                result
            }
            Err(e) => {
                warn!(error = %e, "remote execution failed");
                ExecutionResult {
                    duration_ms,
                    ..ExecutionResult::failure(e.to_string())
                }
            }
        }
    }

    async fn try_execute(
        &self,
        language: &LanguageConfig,
        file_name: &str,
        source: &str,
    ) -> Result<ExecutionResult, RemoteError> {
        let request = ExecuteRequest {
            language: &language.runtime_id,
            version: &language.runtime_version,
            files: [SourceFile {
                name: file_name,
                content: source,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(RemoteError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(RemoteError::Transport)?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ExecuteResponse = serde_json::from_str(&body).map_err(RemoteError::Decode)?;
        Ok(Self::to_result(reply))
    }

    fn to_result(reply: ExecuteResponse) -> ExecutionResult {
        if let Some(compile) = reply.compile.as_ref().filter(|stage| stage.failed()) {
            return ExecutionResult {
                stdout: lines(&compile.stdout),
                stderr: lines(&compile.stderr),
                error: Some(COMPILATION_FAILED.to_owned()),
                ..Default::default()
            };
        }

        let run = reply.run;
        ExecutionResult {
            stdout: lines(&run.stdout),
            stderr: lines(&run.stderr),
            error: run.failed().then(|| EXECUTION_FAILED.to_owned()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::Config;
    use crate::test_support::{MockService, Reply};

    fn python() -> LanguageConfig {
        Config::default().get_language("py").unwrap().clone()
    }

    #[tokio::test]
    async fn successful_run() {
        let service = MockService::start(Reply::Json(json!({
            "run": {"stdout": "hello\nworld\n", "stderr": "", "code": 0, "signal": null}
        })))
        .await;
        let delegate = RemoteDelegate::new(&service.config());

        let result = delegate.execute(&python(), "main.py", "print('hello')").await;

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.stdout, vec!["hello", "world"]);
        assert!(result.stderr.is_empty());

        let requests = service.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["language"], "python");
        assert_eq!(requests[0]["version"], python().runtime_version);
        assert_eq!(
            requests[0]["files"],
            json!([{"name": "main.py", "content": "print('hello')"}])
        );
    }

    #[tokio::test]
    async fn non_zero_exit_is_execution_failure() {
        let service = MockService::start(Reply::Json(json!({
            "run": {"stdout": "partial\n", "stderr": "Traceback\nValueError\n", "code": 1}
        })))
        .await;
        let delegate = RemoteDelegate::new(&service.config());

        let result = delegate.execute(&python(), "main.py", "raise ValueError").await;

        assert_eq!(result.error.as_deref(), Some(EXECUTION_FAILED));
        assert_eq!(result.stdout, vec!["partial"]);
        assert_eq!(result.stderr, vec!["Traceback", "ValueError"]);
    }

    #[tokio::test]
    async fn killed_by_signal_is_execution_failure() {
        let service = MockService::start(Reply::Json(json!({
            "run": {"stdout": "", "stderr": "", "code": null, "signal": "SIGKILL"}
        })))
        .await;
        let delegate = RemoteDelegate::new(&service.config());
        let result = delegate.execute(&python(), "main.py", "while True: pass").await;
        assert_eq!(result.error.as_deref(), Some(EXECUTION_FAILED));
    }

    #[tokio::test]
    async fn compile_failure_reported() {
        let service = MockService::start(Reply::Json(json!({
            "compile": {"stdout": "", "stderr": "main.cpp:1: error: expected ';'\n", "code": 1},
            "run": {"stdout": "", "stderr": "", "code": null}
        })))
        .await;
        let delegate = RemoteDelegate::new(&service.config());
        let cpp = Config::default().get_language("cpp").unwrap().clone();

        let result = delegate.execute(&cpp, "main.cpp", "int main() { return 0 }").await;

        assert_eq!(result.error.as_deref(), Some(COMPILATION_FAILED));
        assert_eq!(result.stderr, vec!["main.cpp:1: error: expected ';'"]);
    }

    #[tokio::test]
    async fn successful_compile_stage_is_ignored() {
        let service = MockService::start(Reply::Json(json!({
            "compile": {"stdout": "", "stderr": "", "code": 0},
            "run": {"stdout": "42\n", "stderr": "", "code": 0}
        })))
        .await;
        let delegate = RemoteDelegate::new(&service.config());
        let result = delegate.execute(&python(), "main.py", "").await;
        assert!(result.is_success());
        assert_eq!(result.stdout, vec!["42"]);
    }

    #[tokio::test]
    async fn server_error_becomes_result_error() {
        let service =
            MockService::start(Reply::Raw(StatusCode::INTERNAL_SERVER_ERROR, "boom")).await;
        let delegate = RemoteDelegate::new(&service.config());

        let result = delegate.execute(&python(), "main.py", "").await;

        let error = result.error.unwrap();
        assert!(error.contains("500"), "{error}");
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_becomes_result_error() {
        let service = MockService::start(Reply::Raw(StatusCode::OK, "{\"message\": 1}")).await;
        let delegate = RemoteDelegate::new(&service.config());

        let result = delegate.execute(&python(), "main.py", "").await;

        assert!(result.error.unwrap().starts_with("malformed response"));
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_becomes_result_error() {
        // Bind and release a port so nothing is listening on it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let delegate = RemoteDelegate::new(&RemoteConfig {
            endpoint: format!("http://{addr}/api/v2/execute"),
            request_timeout_secs: None,
        });
        let result = delegate.execute(&python(), "main.py", "").await;

        assert!(result.error.unwrap().starts_with("request to execution service failed"));
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn configured_timeout_is_enforced() {
        let service = MockService::start(Reply::Slow(Duration::from_secs(5))).await;
        let delegate = RemoteDelegate::new(&RemoteConfig {
            request_timeout_secs: Some(1),
            ..service.config()
        });

        let result = delegate.execute(&python(), "main.py", "").await;

        assert!(result.error.is_some());
        assert!(result.duration_ms < 5000);
    }
}
