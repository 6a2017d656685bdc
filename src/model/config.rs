//! Training configuration.
//!
//! The train stage is driven entirely by a JSON file so model experiments
//! never require a rebuild. Parameter values may be single numbers or
//! arrays of candidates; arrays turn the fit into a small grid search.

use crate::config::ValidationError;
use crate::model::preprocess::PreprocessingMethod;
use crate::model::scoring::ScoringMethod;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Supported classifier families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Logistic regression classifier
    Lrc,
    /// Decision tree classifier
    Dtc,
    /// Gaussian naive Bayes
    Gnb,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lrc => "lrc",
            Self::Dtc => "dtc",
            Self::Gnb => "gnb",
        }
    }

    /// Parameter names the fit routine understands for this algorithm
    pub fn allowed_parameters(self) -> &'static [&'static str] {
        match self {
            Self::Lrc => &["alpha", "max_iterations", "gradient_tolerance"],
            Self::Dtc => &["max_depth", "min_weight_split", "min_weight_leaf"],
            Self::Gnb => &["var_smoothing"],
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parameter value or an array of candidates to search over
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Single(f64),
    Grid(Vec<f64>),
}

impl ParameterValue {
    pub fn candidates(&self) -> Vec<f64> {
        match self {
            Self::Single(value) => vec![*value],
            Self::Grid(values) => values.clone(),
        }
    }
}

/// Settings for one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Labeled dataset the model is fitted on
    #[serde(default = "default_training_dataset")]
    pub training_dataset: PathBuf,

    /// Held-out labeled dataset the model is scored on
    #[serde(default = "default_validation_dataset")]
    pub validation_dataset: PathBuf,

    /// Seed for fold shuffling, shared by every randomized step
    #[serde(default)]
    pub random_seed: u64,

    /// Metric used for both model selection and the reported scores
    #[serde(default = "default_scoring")]
    pub scoring: ScoringMethod,

    /// Classifier family to fit
    pub algorithm: Algorithm,

    /// Hyper-parameters, scalar or candidate arrays
    #[serde(default)]
    pub algorithm_parameters: BTreeMap<String, ParameterValue>,

    /// Feature scaling applied before fitting, in order
    #[serde(default)]
    pub preprocessing_methods: Vec<PreprocessingMethod>,

    /// Fold count for the reported cross-validation scores, 0 to disable
    #[serde(default = "default_folds")]
    pub cross_validation_folds: usize,

    /// Whether to score validation rows with an isolation forest
    #[serde(default = "default_true")]
    pub outlier_scores: bool,
}

impl TrainingConfig {
    /// Load a training config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read training config: {}", path.as_ref().display())
        })?;
        Self::from_json(&content)
    }

    /// Parse a training config from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse training config JSON")
    }

    /// Save the training config to a JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json).context("Failed to write training config file")
    }

    /// Serialize the training config to a JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize training config")
    }

    /// Validate static config properties, collecting every problem found
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.training_dataset.as_os_str().is_empty() {
            errors.push(ValidationError::field(
                "training_dataset",
                "path must not be empty",
            ));
        }
        if self.validation_dataset.as_os_str().is_empty() {
            errors.push(ValidationError::field(
                "validation_dataset",
                "path must not be empty",
            ));
        }

        if self.cross_validation_folds == 1 {
            errors.push(ValidationError::field(
                "cross_validation_folds",
                "use 0 to disable cross-validation or at least 2 folds",
            ));
        }

        let allowed = self.algorithm.allowed_parameters();
        for (name, value) in &self.algorithm_parameters {
            let location = format!("algorithm_parameters.{name}");
            if !allowed.contains(&name.as_str()) {
                errors.push(ValidationError::field(
                    location.clone(),
                    format!(
                        "unknown parameter for '{}', expected one of: {}",
                        self.algorithm,
                        allowed.join(", ")
                    ),
                ));
                continue;
            }
            let candidates = value.candidates();
            if candidates.is_empty() {
                errors.push(ValidationError::field(
                    location.clone(),
                    "candidate array must not be empty",
                ));
            }
            if candidates.iter().any(|v| !v.is_finite()) {
                errors.push(ValidationError::field(location, "values must be finite"));
            }
        }

        errors
    }
}

// Default value functions
fn default_training_dataset() -> PathBuf {
    PathBuf::from("build/training.csv")
}

fn default_validation_dataset() -> PathBuf {
    PathBuf::from("build/validation.csv")
}

fn default_scoring() -> ScoringMethod {
    ScoringMethod::Accuracy
}

fn default_folds() -> usize {
    20
}

fn default_true() -> bool {
    true
}
