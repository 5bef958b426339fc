use std::time::Duration;

use polyjudge::config::{Config, SandboxConfig};
use polyjudge::{ExecutionResult, RunRequest, Runner, SandboxExecutor};

use super::{fixture_project, project};

fn sandbox(timeout_ms: u64) -> SandboxExecutor {
    SandboxExecutor::new(
        SandboxConfig {
            timeout_ms,
            ..SandboxConfig::default()
        },
        "https://cdn.jsdelivr.net",
    )
}

#[tokio::test]
async fn test_console_output_is_split_by_stream() {
    let result = sandbox(5000)
        .execute(
            "console.log('out', 1); console.info({ a: 1 }); console.warn('careful'); console.error('bad');",
            &(),
        )
        .await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.stdout, vec!["out 1", "{ a: 1 }"]);
    assert_eq!(result.stderr, vec!["careful", "bad"]);
}

#[tokio::test]
async fn test_uncaught_error_is_reported() {
    let result = sandbox(5000)
        .execute("console.log('before'); throw new TypeError('boom');", &())
        .await;

    assert_eq!(result.error.as_deref(), Some("TypeError: boom"));
    assert_eq!(result.stdout, vec!["before"]);
    assert_eq!(result.stderr, vec!["TypeError: boom"]);
}

#[tokio::test]
async fn test_rejected_promise_is_reported() {
    let result = sandbox(5000)
        .execute("Promise.reject(new Error('later'));", &())
        .await;
    assert_eq!(result.error.as_deref(), Some("Error: later"));
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    let result = sandbox(500).execute("while (true) {}", &()).await;

    assert!(result.timed_out());
    assert_eq!(result.duration_ms, 500);
    assert_eq!(result.stderr, vec!["Execution timed out after 500 ms"]);
}

#[tokio::test]
async fn test_globals_do_not_leak_between_runs() {
    let sandbox = sandbox(5000);
    let first = sandbox.execute("globalThis.leaked = 42;", &()).await;
    assert!(first.is_success());

    let second = sandbox.execute("console.log(typeof leaked);", &()).await;
    assert_eq!(second.stdout, vec!["undefined"]);
}

#[tokio::test]
async fn test_run_fixture_project() {
    let runner = Runner::new(Config::default());
    let files = fixture_project("greeter");

    let result = runner.run(RunRequest { files: &files, entry: "main.js" }, &()).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.stdout, vec!["Hello, polyjudge!"]);
}

#[tokio::test]
async fn test_new_run_cancels_previous() {
    let runner = Runner::new(Config::default());
    let slow = project(&[("main.js", "while (true) {}")]);
    let quick = project(&[("main.js", "console.log('second');")]);

    let first = runner.run(RunRequest { files: &slow, entry: "main.js" }, &());
    let second = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        runner.run(RunRequest { files: &quick, entry: "main.js" }, &()).await
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.error.as_deref(), Some(ExecutionResult::CANCELLED));
    assert!(second.is_success());
    assert_eq!(second.stdout, vec!["second"]);
}

#[tokio::test]
async fn test_explicit_cancel() {
    let runner = Runner::new(Config::default());
    let slow = project(&[("main.js", "while (true) {}")]);

    let run = runner.run(RunRequest { files: &slow, entry: "main.js" }, &());
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        runner.cancel();
    };
    let (result, ()) = tokio::join!(run, cancel);

    assert_eq!(result.error.as_deref(), Some(ExecutionResult::CANCELLED));
}

#[tokio::test]
#[ignore = "requires node 22.13 or newer"]
async fn test_typescript_types_are_stripped() {
    let runner = Runner::new(Config::default());
    let files = project(&[(
        "main.ts",
        "interface Point { x: number }\nconst p: Point = { x: 3 };\nconsole.log(p.x * 2);",
    )]);

    let result = runner.run(RunRequest { files: &files, entry: "main.ts" }, &()).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.stdout, vec!["6"]);
}
