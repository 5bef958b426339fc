//! Runner facade
//!
//! Entry point for running a project or testing one function. The entry
//! file's extension selects the engine: the scripting family is bundled and
//! run in the local sandbox, everything else goes to the execution service.
//! Failures along the way never escape as errors; they are logged to the
//! observer and reported in the returned result.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::bundler::{BundleError, Bundler, CdnFetcher, ModuleFetcher, normalize_path};
use crate::config::{Config, ConfigError, FileExtension, LanguageConfig};
use crate::harness::{generate_harness, javascript, resolve_function_name};
use crate::remote::RemoteDelegate;
use crate::results;
pub use crate::runner::filter::{FilteredObserver, ResultBlockFilter, strip_block_lines};
use crate::sandbox::{ExecuteOptions, KillSwitch, SandboxExecutor, render};
use crate::types::{
    ExecutionResult, LogEntry, RunObserver, TestCase, TestRunResult, VirtualFileMap,
};

mod filter;

/// Request to run a project and capture its output
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    /// Every file of the project
    pub files: &'a VirtualFileMap,
    /// Path of the file to run
    pub entry: &'a str,
}

/// Request to test one function of a project
#[derive(Debug, Clone, Copy)]
pub struct TestRunRequest<'a> {
    pub files: &'a VirtualFileMap,
    pub entry: &'a str,
    /// Name of the function under test, as declared in the problem metadata
    pub function_name: &'a str,
    pub cases: &'a [TestCase],
}

/// Errors that stop a run before or after execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("bundling failed: {0}")]
    Bundle(#[from] BundleError),

    #[error("entry file '{0}' not found")]
    MissingSource(String),

    #[error("no test harness available for '{0}'")]
    HarnessUnsupported(String),

    #[error("test results missing or malformed in program output")]
    ResultParse,

    #[error("program needs a DOM to run; test cases were not executed")]
    NeedsDom,
}

/// Find a file by path, ignoring leading `/` and `./`
fn find_source<'a>(files: &'a VirtualFileMap, path: &str) -> Option<&'a str> {
    let wanted = normalize_path(path);
    files
        .iter()
        .find(|(candidate, _)| normalize_path(candidate) == wanted)
        .map(|(_, source)| source.as_str())
}

fn is_typescript(extension: &FileExtension) -> bool {
    matches!(extension.as_str(), "ts" | "tsx")
}

/// High-level runner
///
/// At most one sandboxed run is live per runner: starting a new one kills the
/// worker of the previous one.
pub struct Runner<F: ModuleFetcher = CdnFetcher> {
    config: Arc<Config>,
    bundler: Bundler<F>,
    sandbox: SandboxExecutor,
    remote: RemoteDelegate,
    active: Mutex<Option<KillSwitch>>,
}

impl Runner<CdnFetcher> {
    /// Create a new runner with the given configuration
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        let config = config.into();
        let bundler = Bundler::new(&config.bundler);
        Self::with_bundler(config, bundler)
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }
}

impl<F: ModuleFetcher> Runner<F> {
    /// Create a runner that fetches remote modules through `fetcher`
    pub fn with_fetcher(config: impl Into<Arc<Config>>, fetcher: F) -> Self {
        let config = config.into();
        let bundler = Bundler::with_fetcher(fetcher, config.bundler.cdn_base.clone());
        Self::with_bundler(config, bundler)
    }

    fn with_bundler(config: Arc<Config>, bundler: Bundler<F>) -> Self {
        Self {
            sandbox: SandboxExecutor::new(config.sandbox.clone(), config.bundler.cdn_base.clone()),
            remote: RemoteDelegate::new(&config.remote),
            bundler,
            active: Mutex::new(None),
            config,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Kill the live sandboxed run, if any
    pub fn cancel(&self) {
        if let Some(switch) = self.active_slot().take() {
            debug!("cancelling active run");
            switch.kill();
        }
    }

    /// Run a project, streaming its console output to `observer`
    #[instrument(skip(self, request, observer), fields(entry = request.entry))]
    pub async fn run(&self, request: RunRequest<'_>, observer: &dyn RunObserver) -> ExecutionResult {
        match self.try_run(request, observer).await {
            Ok(result) => result,
            Err(e) => fail(observer, &e),
        }
    }

    async fn try_run(
        &self,
        request: RunRequest<'_>,
        observer: &dyn RunObserver,
    ) -> Result<ExecutionResult, RunnerError> {
        let (extension, language) = self.config.language_for_path(request.entry)?;
        info!(language = %language.name, "running");

        if language.is_sandboxed() {
            let options = ExecuteOptions {
                typescript: is_typescript(&extension),
                render: self.project_needs_dom(request.files),
            };
            let code = self.bundler.bundle(request.files, request.entry).await?;
            return Ok(self.execute_sandboxed(&code, options, observer).await);
        }

        let source = find_source(request.files, request.entry)
            .ok_or_else(|| RunnerError::MissingSource(request.entry.to_owned()))?;
        let result = self
            .remote
            .execute(language, &language.source_name(&extension), source)
            .await;
        FilteredObserver::new(observer).replay(&result.stdout, &result.stderr);
        Ok(result)
    }

    /// Run the test cases against one function of a project
    ///
    /// Result block output is consumed here: it is neither forwarded to the
    /// observer nor left in the returned stdout.
    #[instrument(
        skip(self, request, observer),
        fields(entry = request.entry, function = request.function_name, cases = request.cases.len())
    )]
    pub async fn run_tests(
        &self,
        request: TestRunRequest<'_>,
        observer: &dyn RunObserver,
    ) -> TestRunResult {
        let (extension, language) = match self.config.language_for_path(request.entry) {
            Ok(found) => found,
            Err(e) => {
                return TestRunResult {
                    results: Vec::new(),
                    execution: fail(observer, &RunnerError::from(e)),
                };
            }
        };

        let execution = if language.is_sandboxed() {
            if self.project_needs_dom(request.files) {
                return skipped(observer, RunnerError::NeedsDom);
            }
            self.test_sandboxed(request, &extension, observer).await
        } else {
            match self.test_remote(request, &extension, language, observer).await {
                Some(execution) => execution,
                None => {
                    let e = RunnerError::HarnessUnsupported(language.harness_id().to_owned());
                    return skipped(observer, e);
                }
            }
        };

        let execution = match execution {
            Ok(execution) => execution,
            Err(e) => {
                return TestRunResult {
                    results: Vec::new(),
                    execution: fail(observer, &e),
                };
            }
        };

        let Some(results) = results::extract(&execution.stdout_text()) else {
            let e = RunnerError::ResultParse;
            warn!(error = %e, error_detail = ?execution.error, "no test results");
            observer.on_log(LogEntry::error(e.to_string()));
            let mut execution = execution;
            execution.stdout = strip_block_lines(execution.stdout);
            execution.stderr.push(e.to_string());
            return TestRunResult {
                results: Vec::new(),
                execution,
            };
        };

        let mut execution = execution;
        execution.stdout = strip_block_lines(execution.stdout);
        let run = TestRunResult {
            results,
            execution,
        };
        info!(
            passed = run.passed_count(),
            total = run.results.len(),
            "test run complete"
        );
        run
    }

    async fn test_sandboxed(
        &self,
        request: TestRunRequest<'_>,
        extension: &FileExtension,
        observer: &dyn RunObserver,
    ) -> Result<ExecutionResult, RunnerError> {
        let source = find_source(request.files, request.entry).unwrap_or_default();
        let function_name = resolve_function_name("javascript", source, request.function_name);
        let suffix = javascript::local_harness(&function_name, request.cases);
        let code = self
            .bundler
            .bundle_with_suffix(request.files, request.entry, &suffix)
            .await?;
        let options = ExecuteOptions {
            typescript: is_typescript(extension),
            render: false,
        };
        let filtered = FilteredObserver::new(observer);
        Ok(self.execute_sandboxed(&code, options, &filtered).await)
    }

    /// `None` when the language has no harness generator
    async fn test_remote(
        &self,
        request: TestRunRequest<'_>,
        extension: &FileExtension,
        language: &LanguageConfig,
        observer: &dyn RunObserver,
    ) -> Option<Result<ExecutionResult, RunnerError>> {
        let Some(source) = find_source(request.files, request.entry) else {
            return Some(Err(RunnerError::MissingSource(request.entry.to_owned())));
        };
        let harness = generate_harness(
            language.harness_id(),
            source,
            request.function_name,
            request.cases,
        )?;
        let result = self
            .remote
            .execute(language, &language.source_name(extension), &harness)
            .await;
        FilteredObserver::new(observer).replay(&result.stdout, &result.stderr);
        Some(Ok(result))
    }

    /// Whether any of the project's own script files touches the DOM
    ///
    /// Fetched modules are never scanned; libraries commonly feature-test
    /// `window` and would force pure computations into render mode.
    fn project_needs_dom(&self, files: &VirtualFileMap) -> bool {
        files.iter().any(|(path, source)| {
            self.config
                .language_for_path(path)
                .is_ok_and(|(_, language)| language.is_sandboxed())
                && render::needs_dom(source)
        })
    }

    async fn execute_sandboxed(
        &self,
        code: &str,
        options: ExecuteOptions,
        observer: &dyn RunObserver,
    ) -> ExecutionResult {
        let switch = KillSwitch::new();
        if let Some(previous) = self.active_slot().replace(switch.clone()) {
            debug!("killing previous run");
            previous.kill();
        }

        let result = self.sandbox.execute_with(code, options, &switch, observer).await;

        let mut slot = self.active_slot();
        if slot.as_ref().is_some_and(|active| active.same_as(&switch)) {
            *slot = None;
        }
        result
    }

    fn active_slot(&self) -> std::sync::MutexGuard<'_, Option<KillSwitch>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Test run whose cases were never executed, reported as a warning
fn skipped(observer: &dyn RunObserver, reason: RunnerError) -> TestRunResult {
    warn!(reason = %reason, "test cases not run");
    let entry = LogEntry::warn(reason.to_string());
    observer.on_log(entry.clone());
    TestRunResult {
        results: Vec::new(),
        execution: ExecutionResult {
            stderr: vec![entry.content],
            ..Default::default()
        },
    }
}

fn fail(observer: &dyn RunObserver, error: &RunnerError) -> ExecutionResult {
    warn!(error = %error, "run failed");
    let message = error.to_string();
    observer.on_log(LogEntry::error(message.clone()));
    ExecutionResult {
        stderr: vec![message.clone()],
        ..ExecutionResult::failure(message)
    }
}
