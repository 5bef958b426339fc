//! Polyjudge CLI
//!
//! A command-line tool for running projects and checking them against test
//! cases.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polyjudge::{
    Config, EXAMPLE_CONFIG, Engine, RunEvent, RunRequest, Runner, TestCase, TestRunRequest,
    VirtualFileMap,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Directories never loaded into the project
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", ".git"];

#[derive(Parser)]
#[command(name = "polyjudge")]
#[command(about = "Run code in many languages and check it against test cases")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: polyjudge.toml)
        #[arg(short, long, default_value = "polyjudge.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a project and print its console output
    Run {
        /// Entry file, relative to the project directory
        #[arg(value_name = "ENTRY")]
        entry: String,

        /// Project directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Check one function of a project against test cases
    Test {
        /// Entry file, relative to the project directory
        #[arg(value_name = "ENTRY")]
        entry: String,

        /// JSON file holding an array of test cases
        #[arg(long)]
        cases: PathBuf,

        /// Function under test
        #[arg(short, long, default_value = "solution")]
        function: String,

        /// Project directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// List available languages
    Languages,

    /// Show the active configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run { entry, dir } => run_project(config, &dir, &entry).await,
        Commands::Test {
            entry,
            cases,
            function,
            dir,
        } => run_tests(config, &dir, &entry, &cases, &function).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

/// Load every UTF-8 file under `dir`, keyed by its path relative to `dir`
async fn load_project(dir: &Path) -> Result<VirtualFileMap> {
    let mut files = VirtualFileMap::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .with_context(|| format!("failed to read directory '{}'", current.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                let name = entry.file_name();
                if !SKIPPED_DIRS.iter().any(|skipped| name == *skipped) {
                    pending.push(path);
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            let Ok(source) = String::from_utf8(bytes) else {
                debug!(path = %path.display(), "skipping binary file");
                continue;
            };
            let relative = path.strip_prefix(dir).unwrap_or(&path);
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key, source);
        }
    }

    debug!(files = files.len(), "project loaded");
    Ok(files)
}

/// Print events as they arrive: console output to stdout or stderr by type,
/// render documents to stdout
fn print_events(mut events: mpsc::UnboundedReceiver<RunEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RunEvent::Log(entry) if entry.log_type.is_stderr() => {
                    eprintln!("{}", entry.content);
                }
                RunEvent::Log(entry) => println!("{}", entry.content),
                RunEvent::Render(html) => {
                    info!("program needs a DOM, printing render document");
                    let mut stdout = std::io::stdout().lock();
                    let _ = writeln!(stdout, "{html}");
                }
            }
        }
    })
}

/// Cancel the live run on Ctrl-C
fn cancel_on_interrupt(runner: &Arc<Runner>) -> JoinHandle<()> {
    let runner = Arc::clone(runner);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling run");
            runner.cancel();
        }
    })
}

async fn run_project(config: Config, dir: &Path, entry: &str) -> Result<()> {
    let files = load_project(dir).await?;
    let runner = Arc::new(Runner::new(config));
    let interrupt = cancel_on_interrupt(&runner);

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = print_events(rx);

    info!(entry, "running project");
    let result = runner.run(RunRequest { files: &files, entry }, &tx).await;
    drop(tx);
    printer.await.context("output printer failed")?;
    interrupt.abort();

    info!(
        duration_ms = result.duration_ms,
        error = result.error.as_deref(),
        "run complete"
    );

    if result.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

async fn run_tests(
    config: Config,
    dir: &Path,
    entry: &str,
    cases_path: &Path,
    function_name: &str,
) -> Result<()> {
    let files = load_project(dir).await?;
    let raw = tokio::fs::read_to_string(cases_path)
        .await
        .context("failed to read test cases")?;
    let cases: Vec<TestCase> = serde_json::from_str(&raw).context("failed to parse test cases")?;

    let runner = Arc::new(Runner::new(config));
    let interrupt = cancel_on_interrupt(&runner);

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = print_events(rx);

    info!(entry, function = function_name, cases = cases.len(), "running tests");
    let run = runner
        .run_tests(
            TestRunRequest {
                files: &files,
                entry,
                function_name,
                cases: &cases,
            },
            &tx,
        )
        .await;
    drop(tx);
    printer.await.context("output printer failed")?;
    interrupt.abort();

    println!();
    for result in &run.results {
        if result.passed {
            println!("PASS  {}", result.name);
        } else {
            println!(
                "FAIL  {}: expected {}, got {}",
                result.name, result.expected, result.actual
            );
        }
    }
    println!();
    println!("{}/{} passed", run.passed_count(), run.results.len());

    if let Some(error) = &run.execution.error {
        warn!(%error, "execution reported an error");
    }

    if run.all_passed() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    let mut languages: Vec<_> = config.languages.iter().collect();
    languages.sort_by_key(|(extension, _)| *extension);

    for (extension, lang) in languages {
        let engine = match lang.engine {
            Engine::Sandbox => "sandbox".to_owned(),
            Engine::Remote => format!("remote {} {}", lang.runtime_id, lang.runtime_version),
        };
        println!("  {:<8} {:<12} ({})", extension, lang.name, engine);
    }
}

fn show_config(config: &Config) {
    println!("Sandbox:");
    println!("  Node binary: {}", config.node_binary().display());
    println!("  Node args: {:?}", config.sandbox.node_args);
    println!("  Timeout: {} ms", config.sandbox.timeout_ms);
    println!();
    println!("Bundler CDN: {}", config.bundler.cdn_base);
    println!();
    println!("Execution service: {}", config.remote.endpoint);
    match config.remote.request_timeout_secs {
        Some(secs) => println!("  Request timeout: {secs} s"),
        None => println!("  Request timeout: transport default"),
    }
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
