use polyjudge::config::Config;
use polyjudge::{LogType, RunEvent, Runner, TestCase, TestRunRequest};
use serde_json::json;
use tokio::sync::mpsc;

use super::project;

fn add_cases() -> Vec<TestCase> {
    vec![
        TestCase::new("small", vec![json!(1), json!(2)], json!(3)),
        TestCase::new("zero", vec![json!(0), json!(0)], json!(0)),
        TestCase::new("wrong", vec![json!(2), json!(2)], json!(5)),
    ]
}

#[tokio::test]
async fn test_javascript_function_is_checked() {
    let runner = Runner::new(Config::default());
    let files = project(&[(
        "main.js",
        "function add(a, b) {\n  console.log('adding', a, b);\n  return a + b;\n}\n",
    )]);
    let cases = add_cases();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let run = runner
        .run_tests(
            TestRunRequest {
                files: &files,
                entry: "main.js",
                function_name: "add",
                cases: &cases,
            },
            &tx,
        )
        .await;
    drop(tx);

    assert_eq!(run.results.len(), 3);
    assert_eq!(run.passed_count(), 2);
    assert!(!run.results[2].passed);
    assert_eq!(run.results[2].actual, json!(4));
    assert_eq!(run.execution.stdout, vec!["adding 1 2", "adding 0 0", "adding 2 2"]);

    let mut logged = Vec::new();
    while let Some(event) = rx.recv().await {
        if let RunEvent::Log(entry) = event {
            logged.push(entry.content);
        }
    }
    assert_eq!(logged, vec!["adding 1 2", "adding 0 0", "adding 2 2"]);
}

#[tokio::test]
async fn test_declared_name_mismatch_is_resolved() {
    let runner = Runner::new(Config::default());
    let files = project(&[("main.js", "const sum = (a, b) => a + b;\n")]);
    let cases = add_cases();

    let run = runner
        .run_tests(
            TestRunRequest {
                files: &files,
                entry: "main.js",
                function_name: "solution",
                cases: &cases,
            },
            &(),
        )
        .await;

    assert_eq!(run.passed_count(), 2);
}

#[tokio::test]
async fn test_exported_async_function() {
    let runner = Runner::new(Config::default());
    let files = project(&[
        ("main.js", "import { twice } from './lib.js';\nexport async function solve(x) { return twice(x); }\n"),
        ("lib.js", "export const twice = (x) => x * 2;\n"),
    ]);
    let cases = vec![TestCase::new("double", vec![json!(21)], json!(42))];

    let run = runner
        .run_tests(
            TestRunRequest {
                files: &files,
                entry: "main.js",
                function_name: "solve",
                cases: &cases,
            },
            &(),
        )
        .await;

    assert!(run.all_passed(), "{:?}", run.results);
}

#[tokio::test]
async fn test_throwing_case_reports_message() {
    let runner = Runner::new(Config::default());
    let files = project(&[(
        "main.js",
        "function check(x) {\n  if (x < 0) throw new RangeError('negative');\n  return x;\n}\n",
    )]);
    let cases = vec![
        TestCase::new("ok", vec![json!(1)], json!(1)),
        TestCase::new("bad", vec![json!(-1)], json!(-1)),
    ];

    let run = runner
        .run_tests(
            TestRunRequest {
                files: &files,
                entry: "main.js",
                function_name: "check",
                cases: &cases,
            },
            &(),
        )
        .await;

    assert!(run.results[0].passed);
    assert!(!run.results[1].passed);
    assert_eq!(run.results[1].actual, json!("RangeError: negative"));
}

#[tokio::test]
async fn test_object_key_order_does_not_matter() {
    let runner = Runner::new(Config::default());
    let files = project(&[("main.js", "function point() { return { y: 2, x: 1 }; }\n")]);
    let cases = vec![TestCase::new("point", vec![], json!({"x": 1, "y": 2}))];

    let run = runner
        .run_tests(
            TestRunRequest {
                files: &files,
                entry: "main.js",
                function_name: "point",
                cases: &cases,
            },
            &(),
        )
        .await;

    assert!(run.all_passed());
}

#[tokio::test]
async fn test_syntax_error_yields_no_results() {
    let runner = Runner::new(Config::default());
    let files = project(&[("main.js", "function broken( {\n")]);
    let cases = add_cases();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let run = runner
        .run_tests(
            TestRunRequest {
                files: &files,
                entry: "main.js",
                function_name: "broken",
                cases: &cases,
            },
            &tx,
        )
        .await;
    drop(tx);

    assert!(run.results.is_empty());
    assert!(run.execution.error.unwrap().starts_with("SyntaxError"));
    let mut saw_error = false;
    while let Some(event) = rx.recv().await {
        if let RunEvent::Log(entry) = event {
            saw_error |= entry.log_type == LogType::Error;
        }
    }
    assert!(saw_error);
}
