//! TOML-based configuration for dtspec.
//!
//! Supports a config file (dtspec.toml) with environment variable expansion
//! in path values.
//!
//! Example configuration:
//! ```toml
//! [generation]
//! seed = 42                     # reproducible identifiers across runs
//! anonymous_identifiers = true
//!
//! [selection]
//! scenarios = "^Enrollment"
//! cases = "new student"
//!
//! [logging]
//! level = "info"
//!
//! [paths]
//! spec = "${PROJECT_ROOT}/spec.json"
//! actuals = "./target/actuals.json"
//! sources_out = "./target/sources.json"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Data generation options.
    pub generation: GenerationSettings,

    /// Scenario and case selectors.
    pub selection: SelectionSettings,

    /// Logging options.
    pub logging: LoggingSettings,

    /// Default file locations.
    pub paths: PathSettings,
}

/// Data generation options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Seed for every random value. Required to assert against actuals
    /// produced from an earlier `generate` run.
    pub seed: Option<u64>,

    /// Give rows without identifying columns a fresh anonymous identity.
    pub anonymous_identifiers: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            seed: None,
            anonymous_identifiers: true,
        }
    }
}

/// Regex selectors applied to scenario and case names.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionSettings {
    pub scenarios: Option<String>,
    pub cases: Option<String>,
}

/// Logging options.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// One of error, warn, info, debug, trace.
    pub level: Option<String>,
}

/// Default file locations (supports ${ENV_VAR} expansion).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PathSettings {
    pub spec: Option<String>,
    pub actuals: Option<String>,
    pub sources_out: Option<String>,
}

impl PathSettings {
    pub fn spec(&self) -> Result<Option<PathBuf>, SettingsError> {
        resolve_path(self.spec.as_deref())
    }

    pub fn actuals(&self) -> Result<Option<PathBuf>, SettingsError> {
        resolve_path(self.actuals.as_deref())
    }

    pub fn sources_out(&self) -> Result<Option<PathBuf>, SettingsError> {
        resolve_path(self.sources_out.as_deref())
    }
}

fn resolve_path(path: Option<&str>) -> Result<Option<PathBuf>, SettingsError> {
    path.map(|p| expand_env_vars(p).map(PathBuf::from)).transpose()
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `DTSPEC_CONFIG`
    /// 2. `./dtspec.toml`
    /// 3. `~/.config/dtspec/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("DTSPEC_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("dtspec.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dtspec").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if let Some(level) = &self.logging.level {
            if level.parse::<tracing::Level>().is_err() {
                return Err(SettingsError::InvalidConfig(format!(
                    "unknown log level: {}",
                    level
                )));
            }
        }
        for selector in [&self.selection.scenarios, &self.selection.cases]
            .into_iter()
            .flatten()
        {
            regex::Regex::new(selector).map_err(|e| {
                SettingsError::InvalidConfig(format!("bad selector {:?}: {}", selector, e))
            })?;
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            name
        };

        if var_name.is_empty() {
            // Lone $
            result.push('$');
            continue;
        }
        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
