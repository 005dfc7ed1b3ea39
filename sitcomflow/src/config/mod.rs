//! Wizard configuration.
//!
//! Values come from defaults, a JSON file, or `SITCOMFLOW_*` environment
//! variables, in the same serde-with-defaults style for every field.

use crate::core::MAX_SCENES;
use crate::errors::{WizardError, WizardResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Configuration for an orchestrator session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Number of scenes in the episode.
    #[serde(default = "default_max_scenes")]
    pub max_scenes: u8,
    /// Optional cap on a single generation call, in seconds.
    #[serde(default)]
    pub generation_timeout_seconds: Option<f64>,
    /// Consecutive manual retries allowed per failed stage.
    #[serde(default = "default_max_manual_retries")]
    pub max_manual_retries: u32,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_max_scenes() -> u8 {
    MAX_SCENES
}

fn default_max_manual_retries() -> u32 {
    3
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            max_scenes: default_max_scenes(),
            generation_timeout_seconds: None,
            max_manual_retries: default_max_manual_retries(),
            log_format: LogFormat::default(),
        }
    }
}

impl WizardConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scene count.
    #[must_use]
    pub fn with_max_scenes(mut self, max_scenes: u8) -> Self {
        self.max_scenes = max_scenes;
        self
    }

    /// Sets the generation timeout.
    #[must_use]
    pub fn with_generation_timeout(mut self, seconds: f64) -> Self {
        self.generation_timeout_seconds = Some(seconds);
        self
    }

    /// Sets the manual retry budget.
    #[must_use]
    pub fn with_max_manual_retries(mut self, retries: u32) -> Self {
        self.max_manual_retries = retries;
        self
    }

    /// Gets the timeout as a Duration. Values [`validate`](Self::validate)
    /// would refuse give `None`.
    #[must_use]
    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_seconds
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
            .filter(|limit| !limit.is_zero())
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Config`] on malformed JSON or invalid values.
    pub fn from_json_str(json: &str) -> WizardResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| WizardError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> WizardResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WizardError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    /// Reads overrides from `SITCOMFLOW_MAX_SCENES`,
    /// `SITCOMFLOW_GENERATION_TIMEOUT`, `SITCOMFLOW_MAX_RETRIES` and
    /// `SITCOMFLOW_LOG_FORMAT` on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Config`] when a variable does not parse.
    pub fn from_env() -> WizardResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> WizardResult<Self> {
        fn parse<T: std::str::FromStr>(name: &str, raw: &str) -> WizardResult<T> {
            raw.trim()
                .parse()
                .map_err(|_| WizardError::Config(format!("{name}: cannot parse '{raw}'")))
        }

        let mut config = Self::default();
        if let Some(raw) = lookup("SITCOMFLOW_MAX_SCENES") {
            config.max_scenes = parse("SITCOMFLOW_MAX_SCENES", &raw)?;
        }
        if let Some(raw) = lookup("SITCOMFLOW_GENERATION_TIMEOUT") {
            config.generation_timeout_seconds = Some(parse("SITCOMFLOW_GENERATION_TIMEOUT", &raw)?);
        }
        if let Some(raw) = lookup("SITCOMFLOW_MAX_RETRIES") {
            config.max_manual_retries = parse("SITCOMFLOW_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = lookup("SITCOMFLOW_LOG_FORMAT") {
            config.log_format = match raw.trim().to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(WizardError::Config(format!(
                        "SITCOMFLOW_LOG_FORMAT: unknown format '{other}'"
                    )))
                }
            };
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Config`] describing the first invalid value.
    pub fn validate(&self) -> WizardResult<()> {
        if self.max_scenes == 0 || self.max_scenes > MAX_SCENES {
            return Err(WizardError::Config(format!(
                "max_scenes must be in 1..={MAX_SCENES}, got {}",
                self.max_scenes
            )));
        }
        if let Some(timeout) = self.generation_timeout_seconds {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(WizardError::Config(format!(
                    "generation_timeout_seconds must be positive, got {timeout}"
                )));
            }
            if Duration::try_from_secs_f64(timeout).is_err() {
                return Err(WizardError::Config(format!(
                    "generation_timeout_seconds is out of range, got {timeout}"
                )));
            }
        }
        Ok(())
    }
}
