//! Tests against the public execution service

use polyjudge::config::Config;
use polyjudge::{RunRequest, Runner, TestCase, TestRunRequest};
use serde_json::json;

use super::project;

#[tokio::test]
#[ignore = "requires network access"]
async fn test_python_run() {
    let runner = Runner::new(Config::default());
    let files = project(&[("main.py", "print('hello from python')")]);

    let result = runner.run(RunRequest { files: &files, entry: "main.py" }, &()).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.stdout, vec!["hello from python"]);
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_python_function_is_checked() {
    let runner = Runner::new(Config::default());
    let files = project(&[(
        "main.py",
        "def merge(a, b):\n    return sorted(a + b)\n",
    )]);
    let cases = vec![
        TestCase::new("lists", vec![json!([3, 1]), json!([2])], json!([1, 2, 3])),
        TestCase::new("empty", vec![json!([]), json!([])], json!([])),
    ];

    let run = runner
        .run_tests(
            TestRunRequest {
                files: &files,
                entry: "main.py",
                function_name: "merge",
                cases: &cases,
            },
            &(),
        )
        .await;

    assert!(run.all_passed(), "{:?} {:?}", run.results, run.execution);
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_cpp_compile_error() {
    let runner = Runner::new(Config::default());
    let files = project(&[("main.cpp", "int main() { return 0 }")]);

    let result = runner.run(RunRequest { files: &files, entry: "main.cpp" }, &()).await;

    assert_eq!(result.error.as_deref(), Some(polyjudge::remote::COMPILATION_FAILED));
    assert!(!result.stderr.is_empty());
}
