//! The trained model artifact and its provenance metadata.
//!
//! The artifact is a JSON document holding everything needed to judge a
//! training run later: the winning parameters, the validation scores, the
//! cross-validation summary, and where the build came from. Git details
//! are collected through [`CommandRunner`] so tests can fake them.

use super::config::Algorithm;
use super::outliers::OutlierSummary;
use super::preprocess::PreprocessingMethod;
use super::scoring::{ModelScores, ScoringMethod};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Bumped when the artifact layout changes shape
pub const ARTIFACT_VERSION: u32 = 1;

/// Per-fold scores with their robust center and spread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationSummary {
    pub folds: usize,
    pub scores: Vec<f64>,
    pub median: f64,
    pub median_abs_deviation: f64,
}

/// Where and when the artifact was produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub app_name: String,
    pub app_version: String,
    pub platform: String,
    pub created_utc: DateTime<Utc>,
    pub author: String,
    pub commit_hash: String,
    pub validated: bool,
}

/// The JSON document written at the end of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub artifact_version: u32,
    pub algorithm: Algorithm,
    pub scoring: ScoringMethod,
    /// Value of the configured scoring method on the validation set
    pub validation_score: f64,
    /// Full validation score set, binary-only metrics included when defined
    pub scores: ModelScores,
    pub random_seed: u64,
    pub selected_parameters: BTreeMap<String, f64>,
    pub preprocessing_methods: Vec<PreprocessingMethod>,
    pub classes: Vec<i64>,
    pub feature_names: Vec<String>,
    /// `None` when the config disables cross-validation
    pub cross_validation: Option<CrossValidationSummary>,
    pub outliers: Option<OutlierSummary>,
    pub metadata: ArtifactMetadata,
}

impl ModelArtifact {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model artifact from {}", path.display()))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse model artifact")
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write model artifact to {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize model artifact")
    }
}

/// Runs a program and returns its trimmed stdout, or `None` when the
/// program is missing or exits non-zero
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Option<String>;
}

/// [`CommandRunner`] backed by real processes
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let output = std::process::Command::new(program).args(args).output().ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Collect provenance for a fresh artifact.
///
/// The commit hash is only recorded when the working tree is clean, so a
/// hash in an artifact always points at the exact code that produced it.
pub fn build_metadata(runner: &dyn CommandRunner) -> ArtifactMetadata {
    let author = runner
        .run("git", &["config", "user.name"])
        .unwrap_or_default();
    let dirty = runner
        .run("git", &["status", "--porcelain"])
        .map(|out| !out.is_empty())
        .unwrap_or(true);
    let commit_hash = if dirty {
        String::new()
    } else {
        runner
            .run("git", &["rev-parse", "--verify", "HEAD"])
            .unwrap_or_default()
    };

    ArtifactMetadata {
        app_name: env!("CARGO_PKG_NAME").to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
        created_utc: Utc::now(),
        author,
        commit_hash,
        validated: false,
    }
}
