//! The full training run.
//!
//! A run walks through parameter selection, a reporting cross-validation
//! pass, a final fit on the whole training set, and validation scoring,
//! then writes the model artifact with its integrity receipt and an
//! optional per-row predictions file.

use super::artifact::{
    ARTIFACT_VERSION, CrossValidationSummary, ModelArtifact, SystemCommandRunner, build_metadata,
};
use super::config::{Algorithm, ParameterValue, TrainingConfig};
use super::cross_validate::{CvOptions, cross_validate, median, median_abs_deviation};
use super::data::{class_table, encode_labels, load_dataset};
use super::estimator::fit_estimator;
use super::outliers::{OutlierSummary, score_rows, summarize};
use super::preprocess::apply_chain;
use super::scoring::{ScoringMethod, score, score_all};
use crate::config::format_validation_errors;
use crate::integrity;
use anyhow::{Context, Result, anyhow, bail};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Folds used while comparing parameter candidates
pub const SELECTION_FOLDS: usize = 5;

/// A training config with its dataset and output paths resolved
#[derive(Debug, Clone)]
pub struct TrainRequest {
    pub config: TrainingConfig,
    pub training_dataset: PathBuf,
    pub validation_dataset: PathBuf,
    pub artifact_path: PathBuf,
    pub predictions_path: Option<PathBuf>,
}

impl TrainRequest {
    /// Build a request that reads the datasets named in the config itself
    pub fn from_config(
        config: TrainingConfig,
        artifact_path: PathBuf,
        predictions_path: Option<PathBuf>,
    ) -> Self {
        let training_dataset = config.training_dataset.clone();
        let validation_dataset = config.validation_dataset.clone();
        Self {
            config,
            training_dataset,
            validation_dataset,
            artifact_path,
            predictions_path,
        }
    }
}

/// What a finished run reports back to the caller
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub algorithm: Algorithm,
    pub scoring: ScoringMethod,
    pub validation_score: f64,
    pub cross_validation: Option<CrossValidationSummary>,
    pub selected_parameters: BTreeMap<String, f64>,
    pub outliers: Option<OutlierSummary>,
    pub artifact_path: PathBuf,
}

/// Train a model and write the artifact described by the request
pub fn train(request: &TrainRequest) -> Result<TrainOutcome> {
    let config = &request.config;
    let problems = config.validate();
    if !problems.is_empty() {
        bail!(
            "Invalid training config:\n{}",
            format_validation_errors(&problems)
        );
    }

    let training = load_dataset(&request.training_dataset)?;
    let validation = load_dataset(&request.validation_dataset)?;
    if training.feature_names != validation.feature_names {
        bail!(
            "Training and validation datasets disagree on columns: {:?} vs {:?}",
            training.feature_names,
            validation.feature_names
        );
    }

    let classes = class_table(&training.labels);
    if classes.len() < 2 {
        bail!("Training data contains a single class, nothing to learn");
    }
    let train_y = encode_labels(&training.labels, &classes)?;
    let valid_y = encode_labels(&validation.labels, &classes)
        .context("Validation labels must appear in the training data")?;

    let mut train_x = training.features.clone();
    let mut valid_x = validation.features.clone();
    apply_chain(&config.preprocessing_methods, &mut train_x, &mut valid_x);

    info!(
        "Training {} on {} rows, {} features, {} classes",
        config.algorithm,
        training.n_rows(),
        training.n_features(),
        classes.len()
    );

    let selected = select_parameters(config, &train_x, &train_y, classes.len())?;

    let cross_validation = if config.cross_validation_folds == 0 {
        info!("Cross-validation disabled in the config");
        None
    } else {
        let options = CvOptions {
            folds: config.cross_validation_folds,
            scoring: config.scoring,
            seed: config.random_seed,
        };
        let scores = cross_validate(
            config.algorithm,
            &selected,
            &train_x,
            &train_y,
            classes.len(),
            &options,
        )?;
        debug!("Cross-validation scores: {scores:?}");
        let center = median(&scores);
        let spread = median_abs_deviation(&scores);
        Some(CrossValidationSummary {
            folds: config.cross_validation_folds,
            scores,
            median: center,
            median_abs_deviation: spread,
        })
    };

    let model = fit_estimator(
        config.algorithm,
        &selected,
        train_x.clone(),
        train_y.clone(),
        classes.len(),
    )?;
    let predicted = model.predict(&valid_x);
    let validation_score = score(config.scoring, &valid_y, &predicted, classes.len())?;
    let validation_scores = score_all(&valid_y, &predicted, classes.len())?;

    let outlier_scores = if config.outlier_scores {
        Some(score_rows(&train_x, &valid_x)?)
    } else {
        None
    };
    let outliers = outlier_scores.as_deref().map(summarize);

    if let Some(path) = &request.predictions_path {
        write_predictions(
            path,
            &training.feature_names,
            &validation.features,
            &classes,
            &valid_y,
            &predicted,
            outlier_scores.as_deref(),
        )?;
        info!("Predictions written to {}", path.display());
    }

    let artifact = ModelArtifact {
        artifact_version: ARTIFACT_VERSION,
        algorithm: config.algorithm,
        scoring: config.scoring,
        validation_score,
        scores: validation_scores,
        random_seed: config.random_seed,
        selected_parameters: selected.clone(),
        preprocessing_methods: config.preprocessing_methods.clone(),
        classes,
        feature_names: training.feature_names,
        cross_validation: cross_validation.clone(),
        outliers: outliers.clone(),
        metadata: build_metadata(&SystemCommandRunner),
    };
    if let Some(parent) = request.artifact_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create artifact directory: {}", parent.display())
            })?;
        }
    }
    artifact.to_file(&request.artifact_path)?;

    let receipt = integrity::create_receipt(&request.artifact_path, "train")?;
    let receipt_path = integrity::save_receipt(&receipt, &request.artifact_path)?;
    info!(
        "Model artifact written to {} (receipt {})",
        request.artifact_path.display(),
        receipt_path.display()
    );

    Ok(TrainOutcome {
        algorithm: config.algorithm,
        scoring: config.scoring,
        validation_score,
        cross_validation,
        selected_parameters: selected,
        outliers,
        artifact_path: request.artifact_path.clone(),
    })
}

/// Expand grid parameters into every combination, in name order
fn expand_grid(parameters: &BTreeMap<String, ParameterValue>) -> Vec<BTreeMap<String, f64>> {
    let mut candidates = vec![BTreeMap::new()];
    for (name, value) in parameters {
        let values = value.candidates();
        let mut next = Vec::with_capacity(candidates.len() * values.len());
        for candidate in &candidates {
            for v in &values {
                let mut expanded = candidate.clone();
                expanded.insert(name.clone(), *v);
                next.push(expanded);
            }
        }
        candidates = next;
    }
    candidates
}

/// Pick the candidate with the best mean score over a short
/// cross-validation pass. Ties keep the earlier candidate. A single
/// candidate skips the pass entirely.
fn select_parameters(
    config: &TrainingConfig,
    features: &Array2<f64>,
    labels: &Array1<usize>,
    n_classes: usize,
) -> Result<BTreeMap<String, f64>> {
    let candidates = expand_grid(&config.algorithm_parameters);
    if candidates.len() == 1 {
        return Ok(candidates.into_iter().next().unwrap_or_default());
    }

    info!("Selecting from {} parameter candidates", candidates.len());
    let options = CvOptions {
        folds: SELECTION_FOLDS,
        scoring: config.scoring,
        seed: config.random_seed,
    };

    let mut best: Option<(BTreeMap<String, f64>, f64)> = None;
    for candidate in candidates {
        let scores = cross_validate(
            config.algorithm,
            &candidate,
            features,
            labels,
            n_classes,
            &options,
        )?;
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        debug!("Candidate {candidate:?}: mean {} = {mean:.4}", config.scoring);
        match &best {
            Some((_, best_mean)) if mean <= *best_mean => {}
            _ => best = Some((candidate, mean)),
        }
    }
    Ok(best.map(|(candidate, _)| candidate).unwrap_or_default())
}

/// One row per validation observation: the features as loaded, the actual
/// and predicted labels, and the outlier score when it was computed
fn write_predictions(
    path: &Path,
    feature_names: &[String],
    features: &Array2<f64>,
    classes: &[i64],
    truth: &Array1<usize>,
    predicted: &Array1<usize>,
    outlier_scores: Option<&[f64]>,
) -> Result<()> {
    let mut columns = Vec::with_capacity(feature_names.len() + 4);
    for (j, name) in feature_names.iter().enumerate() {
        let values = features.column(j).to_vec();
        columns.push(Series::new(name.as_str().into(), values).into_column());
    }

    let actual: Vec<i64> = truth.iter().map(|&index| classes[index]).collect();
    let predicted_labels: Vec<i64> = predicted.iter().map(|&index| classes[index]).collect();
    let correct: Vec<bool> = truth
        .iter()
        .zip(predicted.iter())
        .map(|(t, p)| t == p)
        .collect();

    columns.push(Series::new("actual".into(), actual).into_column());
    columns.push(Series::new("predicted".into(), predicted_labels).into_column());
    columns.push(Series::new("correct".into(), correct).into_column());
    if let Some(scores) = outlier_scores {
        columns.push(Series::new("outlier_score".into(), scores.to_vec()).into_column());
    }

    let mut df =
        DataFrame::new(columns).map_err(|e| anyhow!("Failed to assemble predictions: {e}"))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create predictions directory: {}", parent.display())
            })?;
        }
    }
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| anyhow!("Failed to write predictions to {}: {e}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::preprocess::PreprocessingMethod;

    fn write_dataset(path: &Path, header: &str, rows: &[(f64, f64, i64)]) {
        let mut contents = format!("{header}\n");
        for (age, chol, target) in rows {
            contents.push_str(&format!("{age},{chol},{target}\n"));
        }
        std::fs::write(path, contents).expect("Failed to write dataset");
    }

    fn training_rows() -> Vec<(f64, f64, i64)> {
        let mut rows = Vec::new();
        for i in 0..8 {
            rows.push((40.0 + i as f64, 180.0 + i as f64, 0));
            rows.push((65.0 + i as f64, 300.0 + i as f64, 1));
        }
        rows
    }

    fn validation_rows() -> Vec<(f64, f64, i64)> {
        vec![
            (42.5, 185.0, 0),
            (44.5, 188.0, 0),
            (41.0, 183.0, 0),
            (66.5, 305.0, 1),
            (68.0, 310.0, 1),
            (70.5, 307.0, 1),
        ]
    }

    fn config_for(dir: &Path) -> TrainingConfig {
        TrainingConfig {
            training_dataset: dir.join("training.csv"),
            validation_dataset: dir.join("validation.csv"),
            random_seed: 0,
            scoring: ScoringMethod::Accuracy,
            algorithm: Algorithm::Dtc,
            algorithm_parameters: BTreeMap::from([(
                "max_depth".to_string(),
                ParameterValue::Grid(vec![0.0, 3.0]),
            )]),
            preprocessing_methods: vec![PreprocessingMethod::StandardScaling],
            cross_validation_folds: 4,
            outlier_scores: true,
        }
    }

    fn write_fixtures(dir: &Path) {
        write_dataset(&dir.join("training.csv"), "age,chol,target", &training_rows());
        write_dataset(
            &dir.join("validation.csv"),
            "age,chol,target",
            &validation_rows(),
        );
    }

    #[test]
    fn test_train_writes_artifact_and_predictions() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_fixtures(dir.path());

        let request = TrainRequest::from_config(
            config_for(dir.path()),
            dir.path().join("model.json"),
            Some(dir.path().join("predictions.csv")),
        );
        let outcome = train(&request).expect("training failed");

        assert!((outcome.validation_score - 1.0).abs() < 1e-12);
        let cv = outcome.cross_validation.as_ref().expect("cv summary");
        assert!((cv.median - 1.0).abs() < 1e-12);
        assert_eq!(outcome.selected_parameters.get("max_depth"), Some(&0.0));
        assert!(outcome.outliers.is_some());

        let artifact = ModelArtifact::from_file(&request.artifact_path).expect("artifact");
        assert_eq!(artifact.classes, [0, 1]);
        assert_eq!(artifact.feature_names, ["age", "chol"]);
        assert!((artifact.scores.accuracy - 1.0).abs() < 1e-12);
        assert!(artifact.scores.precision.is_some());
        let cv = artifact.cross_validation.as_ref().expect("cv summary");
        assert_eq!(cv.folds, 4);
        assert_eq!(cv.scores.len(), 4);
        assert!(artifact.outliers.is_some());

        let predictions =
            std::fs::read_to_string(dir.path().join("predictions.csv")).expect("predictions");
        let header = predictions.lines().next().unwrap_or_default();
        assert_eq!(header, "age,chol,actual,predicted,correct,outlier_score");
        assert_eq!(predictions.lines().count(), 7);
        assert!(dir.path().join("model.json.receipt.json").exists());
    }

    #[test]
    fn test_predictions_without_outlier_scores() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_fixtures(dir.path());

        let mut config = config_for(dir.path());
        config.outlier_scores = false;
        let request = TrainRequest::from_config(
            config,
            dir.path().join("model.json"),
            Some(dir.path().join("predictions.csv")),
        );
        let outcome = train(&request).expect("training failed");
        assert!(outcome.outliers.is_none());

        let predictions =
            std::fs::read_to_string(dir.path().join("predictions.csv")).expect("predictions");
        let header = predictions.lines().next().unwrap_or_default();
        assert_eq!(header, "age,chol,actual,predicted,correct");
    }

    #[test]
    fn test_zero_folds_skips_cross_validation() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_fixtures(dir.path());

        let mut config = config_for(dir.path());
        config.cross_validation_folds = 0;
        let request = TrainRequest::from_config(config, dir.path().join("model.json"), None);
        let outcome = train(&request).expect("training failed");
        assert!(outcome.cross_validation.is_none());

        let artifact = ModelArtifact::from_file(&request.artifact_path).expect("artifact");
        assert!(artifact.cross_validation.is_none());
        assert!((artifact.scores.accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_columns_are_rejected() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_dataset(
            &dir.path().join("training.csv"),
            "age,chol,target",
            &training_rows(),
        );
        write_dataset(
            &dir.path().join("validation.csv"),
            "age,trestbps,target",
            &validation_rows(),
        );

        let request = TrainRequest::from_config(config_for(dir.path()), dir.path().join("model.json"), None);
        let err = train(&request).expect_err("training should fail");
        assert!(err.to_string().contains("disagree on columns"));
    }

    #[test]
    fn test_more_folds_than_rows_is_rejected() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_fixtures(dir.path());

        let mut config = config_for(dir.path());
        config.cross_validation_folds = 30;
        let request = TrainRequest::from_config(config, dir.path().join("model.json"), None);
        let err = train(&request).expect_err("training should fail");
        assert!(err.to_string().contains("Cannot split 16 rows"));
    }

    #[test]
    fn test_single_class_is_rejected() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let rows: Vec<(f64, f64, i64)> = (0..10).map(|i| (40.0 + i as f64, 180.0, 0)).collect();
        write_dataset(&dir.path().join("training.csv"), "age,chol,target", &rows);
        write_dataset(&dir.path().join("validation.csv"), "age,chol,target", &rows);

        let request = TrainRequest::from_config(config_for(dir.path()), dir.path().join("model.json"), None);
        let err = train(&request).expect_err("training should fail");
        assert!(err.to_string().contains("single class"));
    }
}
