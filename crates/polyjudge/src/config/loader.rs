//! Configuration file loading for polyjudge
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError, FileExtension};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }

        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sandbox.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "sandbox timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.remote.endpoint.is_empty() {
            return Err(ConfigError::Invalid("remote endpoint is empty".to_owned()));
        }

        for (ext, lang) in &self.languages {
            let parsed = FileExtension::new(ext)?;
            if parsed.is_empty() {
                return Err(ConfigError::Invalid("language key is empty".to_owned()));
            }
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{ext}' has empty name"
                )));
            }
            if lang.runtime_id.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{ext}' has empty runtime_id"
                )));
            }
            if lang.is_sandboxed() && !parsed.is_scripting() {
                return Err(ConfigError::Invalid(format!(
                    "language '{ext}' cannot use the sandbox engine"
                )));
            }
        }

        Ok(())
    }
}
