use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// In-memory project: file path to source text
pub type VirtualFileMap = BTreeMap<String, String>;

/// A single declarative test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Display name of the case
    pub name: String,

    /// Positional arguments passed to the function under test
    #[serde(default)]
    pub input: Vec<Value>,

    /// Expected return value
    pub expected: Value,
}

impl TestCase {
    pub fn new(name: impl Into<String>, input: Vec<Value>, expected: Value) -> Self {
        Self {
            name: name.into(),
            input,
            expected,
        }
    }
}

/// Outcome of one test case
///
/// `actual` holds the error message as a JSON string when the invocation
/// raised instead of returning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub actual: Value,
    #[serde(default)]
    pub expected: Value,
}

/// Result of a single run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Standard output, one entry per line or console message
    pub stdout: Vec<String>,

    /// Standard error, one entry per line or console message
    pub stderr: Vec<String>,

    /// Wall clock duration in milliseconds
    pub duration_ms: u64,

    /// Failure summary ("Timeout", "Execution failed", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Error reported when the sandbox wall clock limit is hit
    pub const TIMEOUT: &'static str = "Timeout";

    /// Error reported when a run is stopped by a newer one
    pub const CANCELLED: &'static str = "Cancelled";

    /// Create a failed result with no output
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Check if the run completed without an error
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Check if the run was cut off by the wall clock limit
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.error.as_deref() == Some(Self::TIMEOUT)
    }

    /// Joined stdout, as the program would have printed it
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }
}

/// Result of a test run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestRunResult {
    pub results: Vec<TestCaseResult>,

    /// The underlying execution, including diagnostics
    pub execution: ExecutionResult,
}

impl TestRunResult {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// True when there is at least one result and all of them passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.passed)
    }
}

/// Console method that produced a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    #[default]
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl LogType {
    /// Whether entries of this type belong on stderr
    pub fn is_stderr(&self) -> bool {
        matches!(self, LogType::Warn | LogType::Error)
    }
}

/// A single console message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub log_type: LogType,
    pub content: String,
}

impl LogEntry {
    pub fn new(log_type: LogType, content: impl Into<String>) -> Self {
        Self {
            log_type,
            content: content.into(),
        }
    }

    pub fn log(content: impl Into<String>) -> Self {
        Self::new(LogType::Log, content)
    }

    pub fn warn(content: impl Into<String>) -> Self {
        Self::new(LogType::Warn, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(LogType::Error, content)
    }
}

/// Event streamed to the caller while a run is in progress
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// One console message
    Log(LogEntry),

    /// An HTML document to render instead of capturing logs
    Render(String),
}

/// Receives events while a run is in progress
pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: RunEvent);

    fn on_log(&self, entry: LogEntry) {
        self.on_event(RunEvent::Log(entry));
    }
}

impl RunObserver for () {
    fn on_event(&self, _event: RunEvent) {}
}

impl RunObserver for mpsc::UnboundedSender<RunEvent> {
    fn on_event(&self, event: RunEvent) {
        // The receiver going away just means nobody is listening anymore
        let _ = self.send(event);
    }
}

/// Collects log entries into stdout/stderr buckets
#[derive(Debug, Default)]
pub(crate) struct LogBuffer {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl LogBuffer {
    pub fn push(&mut self, entry: &LogEntry) {
        if entry.log_type.is_stderr() {
            self.stderr.push(entry.content.clone());
        } else {
            self.stdout.push(entry.content.clone());
        }
    }

    pub fn into_result(self, duration_ms: u64, error: Option<String>) -> ExecutionResult {
        ExecutionResult {
            stdout: self.stdout,
            stderr: self.stderr,
            duration_ms,
            error,
        }
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn log_buffer_preserves_every_entry(contents in proptest::collection::vec(".*", 0..20), stderr_mask in proptest::collection::vec(any::<bool>(), 20)) {
            let mut buffer = LogBuffer::default();
            for (content, is_err) in contents.iter().zip(stderr_mask.iter()) {
                let log_type = if *is_err { LogType::Error } else { LogType::Log };
                buffer.push(&LogEntry::new(log_type, content.clone()));
            }
            let result = buffer.into_result(0, None);
            prop_assert_eq!(result.stdout.len() + result.stderr.len(), contents.len());
        }
    }
}
