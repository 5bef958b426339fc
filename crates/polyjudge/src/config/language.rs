use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// File extensions handled by the local scripting engine
pub const SCRIPTING_EXTENSIONS: [&str; 5] = ["js", "mjs", "ts", "tsx", "jsx"];

/// Where code for a language is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Bundled and run in a local worker process
    Sandbox,

    /// Submitted to the external execution service
    #[default]
    Remote,
}

/// Configuration for a programming language, keyed by file extension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Human-readable name (e.g., "Python 3")
    pub name: String,

    /// Runtime identifier understood by the execution service
    pub runtime_id: String,

    /// Runtime version requested from the execution service
    pub runtime_version: String,

    /// Language identifier used by the editor
    pub editor_language_id: String,

    /// Starter source shown for new files
    #[serde(default)]
    pub template: String,

    /// Execution engine for this language
    #[serde(default)]
    pub engine: Engine,

    /// Harness generator id (defaults to the editor language id)
    #[serde(default)]
    pub harness: Option<String>,

    /// File name sent to the execution service (defaults to `main.<ext>`)
    #[serde(default)]
    pub source_name: Option<String>,
}

impl LanguageConfig {
    /// Check if the language runs in the local sandbox
    pub fn is_sandboxed(&self) -> bool {
        self.engine == Engine::Sandbox
    }

    /// Id used to look up the harness generator
    pub fn harness_id(&self) -> &str {
        self.harness.as_deref().unwrap_or(&self.editor_language_id)
    }

    /// Get the source file name for this language
    pub fn source_name(&self, extension: &FileExtension) -> String {
        match self.source_name {
            Some(ref name) => name.clone(),
            None => format!("main.{extension}"),
        }
    }
}

/// File extension without dot (e.g., "cpp")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_ascii_lowercase()))
    }

    /// Extract the extension of a file path (`src/main.PY` -> `py`)
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?;
        Self::new(ext).ok().filter(|ext| !ext.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this extension belongs to the scripting family
    pub fn is_scripting(&self) -> bool {
        SCRIPTING_EXTENSIONS.contains(&self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
