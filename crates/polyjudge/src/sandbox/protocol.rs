//! Worker wire protocol
//!
//! Messages are JSON objects, one per line. The host writes a single
//! `execute` message; the worker answers with any number of `log` messages
//! and one `done`. Anything else on the worker's stdout is treated as plain
//! console output.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Notify;

use crate::types::{LogBuffer, LogEntry, LogType, RunObserver};

/// Message sent from the host to the worker
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostMessage<'a> {
    Execute {
        code: &'a str,
        /// Strip TypeScript types before running
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        typescript: bool,
    },
}

impl HostMessage<'_> {
    /// Encode as one protocol line, newline included
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Message sent from the worker to the host
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    Log {
        #[serde(rename = "logType", default)]
        log_type: LogType,
        content: String,
    },
    Done {
        #[serde(rename = "durationMs", default)]
        duration_ms: u64,
        #[serde(default)]
        error: Option<String>,
    },
}

impl WorkerMessage {
    /// Parse a stdout line, falling back to a plain log entry
    pub fn parse(line: &str) -> WorkerMessage {
        serde_json::from_str(line).unwrap_or_else(|_| WorkerMessage::Log {
            log_type: LogType::Log,
            content: line.to_owned(),
        })
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The worker reported completion
    Done {
        duration_ms: u64,
        error: Option<String>,
    },
    /// The wall clock limit passed first
    Timeout,
    /// The kill switch fired first
    Cancelled,
    /// The worker's stdout closed without a `done` message
    Exited,
}

/// Read worker output until the run settles
///
/// Exactly one of done, timeout, cancellation or exit settles the run; the
/// select is biased so that cancellation beats an expired deadline and the
/// deadline beats output still waiting in the pipe.
pub(crate) async fn drive<O, E>(
    stdout: O,
    stderr: E,
    timeout: Duration,
    kill: &Notify,
    observer: &dyn RunObserver,
    buffer: &mut LogBuffer,
) -> Settlement
where
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    let mut stdout = stdout.lines();
    let mut stderr = stderr.lines();
    let mut stderr_open = true;

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut emit = |entry: LogEntry| {
        buffer.push(&entry);
        observer.on_log(entry);
    };

    loop {
        tokio::select! {
            biased;

            _ = kill.notified() => return Settlement::Cancelled,

            _ = &mut deadline => return Settlement::Timeout,

            line = stdout.next_line() => match line {
                Ok(Some(line)) => match WorkerMessage::parse(&line) {
                    WorkerMessage::Log { log_type, content } => {
                        emit(LogEntry::new(log_type, content));
                    }
                    WorkerMessage::Done { duration_ms, error } => {
                        return Settlement::Done { duration_ms, error };
                    }
                },
                Ok(None) | Err(_) => return Settlement::Exited,
            },

            line = stderr.next_line(), if stderr_open => match line {
                Ok(Some(line)) => emit(LogEntry::error(line)),
                Ok(None) | Err(_) => stderr_open = false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncWriteExt, BufReader, duplex};

    use super::*;
    use crate::test_support::Recorder;

    const LONG: Duration = Duration::from_secs(60);

    #[test]
    fn execute_message_wire_format() {
        let line = HostMessage::Execute {
            code: "1 + 1",
            typescript: false,
        }
        .to_line()
        .unwrap();
        assert_eq!(line, "{\"type\":\"execute\",\"code\":\"1 + 1\"}\n");

        let line = HostMessage::Execute {
            code: "",
            typescript: true,
        }
        .to_line()
        .unwrap();
        assert!(line.contains("\"typescript\":true"));
    }

    #[test]
    fn parse_worker_messages() {
        assert_eq!(
            WorkerMessage::parse(r#"{"type":"log","logType":"warn","content":"careful"}"#),
            WorkerMessage::Log {
                log_type: LogType::Warn,
                content: "careful".to_owned()
            }
        );
        assert_eq!(
            WorkerMessage::parse(r#"{"type":"done","durationMs":12}"#),
            WorkerMessage::Done {
                duration_ms: 12,
                error: None
            }
        );
        assert_eq!(
            WorkerMessage::parse(r#"{"type":"done","durationMs":3,"error":"TypeError: x"}"#),
            WorkerMessage::Done {
                duration_ms: 3,
                error: Some("TypeError: x".to_owned())
            }
        );
    }

    #[test]
    fn non_protocol_lines_become_logs() {
        for line in ["hello", "{\"type\":\"other\"}", "[1,2]", ""] {
            assert_eq!(
                WorkerMessage::parse(line),
                WorkerMessage::Log {
                    log_type: LogType::Log,
                    content: line.to_owned()
                }
            );
        }
    }

    #[tokio::test]
    async fn done_settles_with_logs_collected() {
        let stdout = concat!(
            "{\"type\":\"log\",\"logType\":\"log\",\"content\":\"a\"}\n",
            "raw line\n",
            "{\"type\":\"log\",\"logType\":\"error\",\"content\":\"b\"}\n",
            "{\"type\":\"done\",\"durationMs\":7}\n",
            "{\"type\":\"log\",\"logType\":\"log\",\"content\":\"late\"}\n",
        );
        let recorder = Recorder::default();
        let mut buffer = LogBuffer::default();
        let settlement = drive(
            stdout.as_bytes(),
            &b""[..],
            LONG,
            &Notify::new(),
            &recorder,
            &mut buffer,
        )
        .await;

        assert_eq!(
            settlement,
            Settlement::Done {
                duration_ms: 7,
                error: None
            }
        );
        let result = buffer.into_result(0, None);
        assert_eq!(result.stdout, vec!["a", "raw line"]);
        assert_eq!(result.stderr, vec!["b"]);
        assert_eq!(recorder.events().len(), 3);
    }

    #[tokio::test]
    async fn stderr_lines_are_error_entries() {
        let (mut stdout_tx, stdout_rx) = duplex(256);
        let recorder = Recorder::default();
        let mut buffer = LogBuffer::default();

        let writer = tokio::spawn(async move {
            tokio::task::yield_now().await;
            stdout_tx
                .write_all(b"{\"type\":\"done\",\"durationMs\":1}\n")
                .await
                .unwrap();
            stdout_tx
        });

        let settlement = drive(
            BufReader::new(stdout_rx),
            &b"Warning: something\n"[..],
            LONG,
            &Notify::new(),
            &recorder,
            &mut buffer,
        )
        .await;
        drop(writer.await.unwrap());

        assert!(matches!(settlement, Settlement::Done { .. }));
        assert_eq!(buffer.into_result(0, None).stderr, vec!["Warning: something"]);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_worker_times_out() {
        // Keep the write half alive so stdout never reaches EOF
        let (_stdout_tx, stdout_rx) = duplex(64);
        let (_stderr_tx, stderr_rx) = duplex(64);
        let mut buffer = LogBuffer::default();

        let settlement = drive(
            BufReader::new(stdout_rx),
            BufReader::new(stderr_rx),
            Duration::from_millis(5000),
            &Notify::new(),
            &(),
            &mut buffer,
        )
        .await;

        assert_eq!(settlement, Settlement::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn done_before_deadline_wins() {
        let (mut stdout_tx, stdout_rx) = duplex(256);
        let (_stderr_tx, stderr_rx) = duplex(64);
        let mut buffer = LogBuffer::default();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(4999)).await;
            stdout_tx
                .write_all(b"{\"type\":\"done\",\"durationMs\":4999}\n")
                .await
                .unwrap();
            // Hold the pipe open past the deadline
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let settlement = drive(
            BufReader::new(stdout_rx),
            BufReader::new(stderr_rx),
            Duration::from_millis(5000),
            &Notify::new(),
            &(),
            &mut buffer,
        )
        .await;

        assert_eq!(
            settlement,
            Settlement::Done {
                duration_ms: 4999,
                error: None
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn done_at_the_deadline_settles_once_as_timeout() {
        let (mut stdout_tx, stdout_rx) = duplex(256);
        let (_stderr_tx, stderr_rx) = duplex(64);
        let recorder = Recorder::default();
        let mut buffer = LogBuffer::default();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5000)).await;
            stdout_tx
                .write_all(b"{\"type\":\"done\",\"durationMs\":5000}\n")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let settlement = drive(
            BufReader::new(stdout_rx),
            BufReader::new(stderr_rx),
            Duration::from_millis(5000),
            &Notify::new(),
            &recorder,
            &mut buffer,
        )
        .await;

        // Whenever the driver wakes at 5000 ms the deadline is already due
        assert_eq!(settlement, Settlement::Timeout);
        assert!(recorder.events().is_empty());
        let result = buffer.into_result(5000, None);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_beats_pending_output() {
        let (_stdout_tx, stdout_rx) = duplex(64);
        let (_stderr_tx, stderr_rx) = duplex(64);
        let kill = Notify::new();
        // A permit stored before the driver starts still cancels it
        kill.notify_one();
        let mut buffer = LogBuffer::default();

        let settlement = drive(
            BufReader::new(stdout_rx),
            BufReader::new(stderr_rx),
            Duration::from_millis(5000),
            &kill,
            &(),
            &mut buffer,
        )
        .await;

        assert_eq!(settlement, Settlement::Cancelled);
    }

    #[tokio::test]
    async fn closed_stdout_without_done_is_exit() {
        let mut buffer = LogBuffer::default();
        let settlement = drive(
            &b"partial output\n"[..],
            &b""[..],
            LONG,
            &Notify::new(),
            &(),
            &mut buffer,
        )
        .await;
        assert_eq!(settlement, Settlement::Exited);
        assert_eq!(buffer.into_result(0, None).stdout, vec!["partial output"]);
    }
}
