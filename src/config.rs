//! Simulator configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via --config or FSMDSIM_CONFIG)
//! 3. Environment variables
//! 4. Command-line flags (applied by `main`)

use fsmdsim_core::{EndStateCheck, FiringMode, LoadOptions, SimOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Simulator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Engine behaviour.
    pub simulation: SimulationConfig,
    /// Trace rendering.
    pub output: OutputConfig,
}

impl SimConfig {
    /// Loads configuration from an optional file, then applies environment
    /// variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: SimConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Saves configuration to a YAML file.
    #[cfg(test)]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from a variable lookup.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        self.simulation.apply_overrides(&var)?;
        self.output.apply_overrides(&var)?;
        Ok(())
    }

    pub fn sim_options(&self) -> SimOptions {
        SimOptions {
            firing: self.simulation.firing,
            end_check: self.simulation.end_check,
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            strict: self.simulation.strict,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Whether every matching transition fires, or only the first.
    pub firing: FiringMode,
    /// When the end state is checked.
    pub end_check: EndStateCheck,
    /// Reject unresolved references when loading the description.
    pub strict: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            firing: FiringMode::default(),
            end_check: EndStateCheck::default(),
            strict: true,
        }
    }
}

impl SimulationConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(firing) = var("FSMDSIM_FIRING") {
            self.firing = parse_env("FSMDSIM_FIRING", &firing)?;
        }
        if let Some(check) = var("FSMDSIM_END_CHECK") {
            self.end_check = parse_env("FSMDSIM_END_CHECK", &check)?;
        }
        if let Some(strict) = var("FSMDSIM_STRICT") {
            self.strict = parse_flag("FSMDSIM_STRICT", &strict)?;
        }
        Ok(())
    }
}

/// Output format of the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable progress log.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("invalid output format '{}', expected text or json", s)),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Colorize text output.
    pub color: bool,
    /// Print the description summary before the trace.
    pub summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
            summary: true,
        }
    }
}

impl OutputConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(format) = var("FSMDSIM_FORMAT") {
            self.format = parse_env("FSMDSIM_FORMAT", &format)?;
        }
        if let Some(color) = var("FSMDSIM_COLOR") {
            self.color = parse_flag("FSMDSIM_COLOR", &color)?;
        }
        Ok(())
    }
}

fn parse_env<T: FromStr<Err = String>>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("{}: {}", key, e)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ValidationError(format!(
            "{}: expected a boolean, got '{}'",
            key, value
        ))),
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
