//! Pipeline configuration.
//!
//! Defines the JSON schema for `systole.json`: where the raw dataset lives,
//! where build products go, how the preprocessing script is invoked, and
//! which training configuration the model stage consumes.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current pipeline config version
pub const CONFIG_VERSION: &str = "0.1";

/// Default pipeline config filename
pub const DEFAULT_CONFIG_FILE: &str = "systole.json";

/// Root pipeline configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Config version for future migrations
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable pipeline name
    #[serde(default = "default_name")]
    pub name: String,

    /// Raw CSV source the ingest stage reads
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// Directory receiving all build products
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Preprocessing stage configuration
    #[serde(default)]
    pub preprocess: PreprocessConfig,

    /// Path to the training configuration JSON consumed by the train stage
    #[serde(default = "default_training_config")]
    pub training_config: PathBuf,
}

/// Preprocessing stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Statistical script executed with Rscript
    #[serde(default = "default_script")]
    pub script: PathBuf,

    /// Random seed passed to the script
    #[serde(default)]
    pub seed: u64,

    /// Whether the stage runs at all (disable on hosts without R)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Additional arguments appended to the script invocation
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            script: default_script(),
            seed: 0,
            enabled: default_true(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: default_name(),
            source: default_source(),
            build_dir: default_build_dir(),
            preprocess: PreprocessConfig::default(),
            training_config: default_training_config(),
        }
    }
}

impl PipelineConfig {
    /// Load a pipeline config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read pipeline config: {}", path.as_ref().display())
        })?;
        Self::from_json(&content)
    }

    /// Parse a pipeline config from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse pipeline config JSON")
    }

    /// Save the pipeline config to a JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json).context("Failed to write pipeline config file")
    }

    /// Serialize the pipeline config to a JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize pipeline config")
    }

    /// Cleaned CSV produced by the ingest stage
    pub fn ingested_path(&self) -> PathBuf {
        self.build_dir.join("cleveland.csv")
    }

    /// Training dataset produced by the preprocess stage
    pub fn training_path(&self) -> PathBuf {
        self.build_dir.join("training.csv")
    }

    /// Validation dataset produced by the preprocess stage
    pub fn validation_path(&self) -> PathBuf {
        self.build_dir.join("validation.csv")
    }

    /// Model artifact produced by the train stage
    pub fn artifact_path(&self) -> PathBuf {
        self.build_dir.join("model.json")
    }

    /// Predictions CSV produced by the train stage
    pub fn predictions_path(&self) -> PathBuf {
        self.build_dir.join("predictions.csv")
    }

    /// Fingerprint state file recording the last successful run of each stage
    pub fn state_path(&self) -> PathBuf {
        self.build_dir.join(".fingerprints.json")
    }

    /// Validate static config properties, collecting every problem found
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.version != CONFIG_VERSION {
            errors.push(ValidationError::general(format!(
                "Unsupported config version '{}', expected '{}'",
                self.version, CONFIG_VERSION
            )));
        }

        if self.source.as_os_str().is_empty() {
            errors.push(ValidationError::field("source", "path must not be empty"));
        }

        if self.build_dir.as_os_str().is_empty() {
            errors.push(ValidationError::field("build_dir", "path must not be empty"));
        }

        if self.preprocess.script.as_os_str().is_empty() {
            errors.push(ValidationError::field(
                "preprocess.script",
                "path must not be empty",
            ));
        }

        if self.training_config.as_os_str().is_empty() {
            errors.push(ValidationError::field(
                "training_config",
                "path must not be empty",
            ));
        }

        for (idx, arg) in self.preprocess.extra_args.iter().enumerate() {
            if arg.trim().is_empty() {
                errors.push(ValidationError::field(
                    format!("preprocess.extra_args[{idx}]"),
                    "argument must not be blank",
                ));
            }
        }

        errors
    }
}

/// Validation error with the offending config location when known
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn field(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self {
            location: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}", location, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Render a list of validation errors as one message per line
pub fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

// Default value functions
fn default_version() -> String {
    CONFIG_VERSION.to_owned()
}

fn default_name() -> String {
    "cleveland".to_owned()
}

fn default_source() -> PathBuf {
    PathBuf::from("data/heart.csv")
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_script() -> PathBuf {
    PathBuf::from("scripts/preprocess.R")
}

fn default_training_config() -> PathBuf {
    PathBuf::from("train.json")
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::default();

        let json = config.to_json().expect("Failed to serialize");
        assert!(json.contains("\"version\": \"0.1\""));
        assert!(json.contains("\"build_dir\": \"build\""));

        let parsed = PipelineConfig::from_json(&json).expect("Failed to parse");
        assert_eq!(parsed.version, "0.1");
        assert_eq!(parsed.name, "cleveland");
        assert!(parsed.preprocess.enabled);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = PipelineConfig::from_json("{}").expect("Failed to parse");
        assert_eq!(config.source, PathBuf::from("data/heart.csv"));
        assert_eq!(config.preprocess.seed, 0);
        assert_eq!(config.training_config, PathBuf::from("train.json"));
    }

    #[test]
    fn test_build_paths() {
        let config = PipelineConfig::default();
        assert_eq!(config.ingested_path(), PathBuf::from("build/cleveland.csv"));
        assert_eq!(config.artifact_path(), PathBuf::from("build/model.json"));
        assert_eq!(
            config.state_path(),
            PathBuf::from("build/.fingerprints.json")
        );
    }

    #[test]
    fn test_validate_rejects_bad_version() {
        let mut config = PipelineConfig::default();
        config.version = "9.9".to_owned();

        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unsupported config version"));
    }

    #[test]
    fn test_validate_rejects_empty_paths() {
        let mut config = PipelineConfig::default();
        config.source = PathBuf::new();
        config.preprocess.script = PathBuf::new();

        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.to_string().contains("source")));
        assert!(
            errors
                .iter()
                .any(|e| e.to_string().contains("preprocess.script"))
        );
    }

    #[test]
    fn test_validate_accepts_default() {
        let errors = PipelineConfig::default().validate();
        assert!(errors.is_empty(), "default config should validate: {errors:?}");
    }
}
