use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{
    Engine, FileExtension, LanguageConfig, SCRIPTING_EXTENSIONS,
};

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../polyjudge.example.toml");

/// Default wall clock limit for sandboxed scripts
pub const DEFAULT_SANDBOX_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to read config file at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("no language configured for extension '{0}'")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for the local worker process
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    /// Path to the node binary (uses PATH if not specified)
    #[serde(default = "default_node_path")]
    pub node_path: PathBuf,

    /// Extra arguments passed to node before the bootstrap script
    #[serde(default)]
    pub node_args: Vec<String>,

    /// Wall clock limit in milliseconds, measured from dispatch
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            node_path: default_node_path(),
            node_args: Vec::new(),
            timeout_ms: DEFAULT_SANDBOX_TIMEOUT_MS,
        }
    }
}

/// Settings for dependency bundling
#[derive(Debug, Clone, Deserialize)]
pub struct BundlerConfig {
    /// CDN origin used for bare module imports
    #[serde(default = "default_cdn_base")]
    pub cdn_base: String,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            cdn_base: default_cdn_base(),
        }
    }
}

/// Settings for the external execution service
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Execute endpoint of the service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds.
    ///
    /// Unset means the transport default applies, so a remote call may take
    /// longer than a sandboxed run.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: None,
        }
    }
}

/// Config for polyjudge
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub bundler: BundlerConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    /// Language configurations keyed by file extension
    #[serde(default)]
    pub languages: HashMap<String, LanguageConfig>,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
            bundler: BundlerConfig::default(),
            remote: RemoteConfig::default(),
            languages: HashMap::new(),
        }
    }

    /// Get a language by file extension
    pub fn get_language(&self, extension: &str) -> Result<&LanguageConfig, ConfigError> {
        self.languages
            .get(&extension.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::LanguageNotFound(extension.to_string()))
    }

    /// Get the language for a file path by its extension
    pub fn language_for_path(
        &self,
        path: &str,
    ) -> Result<(FileExtension, &LanguageConfig), ConfigError> {
        let extension = FileExtension::from_path(path)
            .ok_or_else(|| ConfigError::LanguageNotFound(path.to_string()))?;
        let language = self.get_language(extension.as_str())?;
        Ok((extension, language))
    }

    /// Get the path to the node binary
    pub fn node_binary(&self) -> PathBuf {
        self.sandbox.node_path.clone()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_node_path() -> PathBuf {
    PathBuf::from("node")
}

fn default_timeout_ms() -> u64 {
    DEFAULT_SANDBOX_TIMEOUT_MS
}

fn default_cdn_base() -> String {
    "https://cdn.jsdelivr.net".to_owned()
}

fn default_endpoint() -> String {
    "https://emkc.org/api/v2/piston/execute".to_owned()
}
