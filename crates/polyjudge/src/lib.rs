//! A polyglot code execution and verification engine.
//!
//! Polyjudge runs in-memory projects and checks one function of them against
//! declarative test cases. Scripting languages are bundled with their imports
//! and executed in a local `node` worker; compiled and native languages are
//! sent to a Piston-compatible execution service.
//!
//! # Features
//!
//! - **Bundling**: relative imports resolve against the project, bare imports against a CDN.
//! - **Sandboxed scripts**: a fresh worker per run, with a wall clock limit and cancellation.
//! - **Remote execution**: one request per run for every non-scripting language.
//! - **Test harnesses**: driver programs for a dozen languages with structured results.
//! - **TOML configuration**: per-language runtime ids, versions and templates.

pub use bundler::{BundleError, Bundler, CdnFetcher, ModuleFetcher};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Engine, FileExtension, LanguageConfig};
pub use harness::{RESULTS_END_MARKER, RESULTS_START_MARKER, generate_harness};
pub use remote::{RemoteDelegate, RemoteError};
pub use runner::{RunRequest, Runner, RunnerError, TestRunRequest};
pub use sandbox::{ExecuteOptions, KillSwitch, SandboxError, SandboxExecutor};
pub use types::{
    ExecutionResult, LogEntry, LogType, RunEvent, RunObserver, TestCase, TestCaseResult,
    TestRunResult, VirtualFileMap,
};

pub mod bundler;
pub mod config;
pub mod harness;
pub mod literal;
pub mod remote;
pub mod results;
pub mod runner;
pub mod sandbox;
pub mod types;

#[cfg(test)]
mod test_support;
