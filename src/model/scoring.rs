//! Scoring metrics.
//!
//! All metrics are computed from one confusion matrix pass. Class indices
//! come from the sorted class table, so for binary labels index 1 is the
//! positive class. Precision, sensitivity, and specificity are defined for
//! binary labels only; the averaged metrics handle any class count.

use anyhow::{Result, bail};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Supported scoring methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    Accuracy,
    Precision,
    Sensitivity,
    Specificity,
    /// Mean per-class recall rescaled to [-1, 1]
    Informedness,
    /// Harmonic mean of per-class recalls
    HmeanRecall,
    /// Harmonic mean of per-class precisions
    HmeanPrecision,
}

impl ScoringMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Precision => "precision",
            Self::Sensitivity => "sensitivity",
            Self::Specificity => "specificity",
            Self::Informedness => "informedness",
            Self::HmeanRecall => "hmean_recall",
            Self::HmeanPrecision => "hmean_precision",
        }
    }

    pub fn requires_binary(self) -> bool {
        matches!(self, Self::Precision | Self::Sensitivity | Self::Specificity)
    }
}

impl std::fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every metric from one confusion matrix pass. The binary-only metrics
/// are `None` when the label has more than two classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelScores {
    pub accuracy: f64,
    pub precision: Option<f64>,
    pub sensitivity: Option<f64>,
    pub specificity: Option<f64>,
    pub informedness: f64,
    pub hmean_recall: f64,
    pub hmean_precision: f64,
}

/// Score predictions against ground truth
pub fn score(
    method: ScoringMethod,
    truth: &Array1<usize>,
    predicted: &Array1<usize>,
    n_classes: usize,
) -> Result<f64> {
    if method.requires_binary() && n_classes != 2 {
        bail!(
            "Scoring method '{method}' requires a binary label, dataset has {n_classes} classes"
        );
    }

    let cm = ConfusionCounts::build(truth, predicted, n_classes)?;
    let value = match method {
        ScoringMethod::Accuracy => cm.accuracy(),
        ScoringMethod::Precision => ratio(cm.hits(1), cm.predicted(1)),
        ScoringMethod::Sensitivity => ratio(cm.hits(1), cm.support(1)),
        ScoringMethod::Specificity => ratio(cm.hits(0), cm.support(0)),
        ScoringMethod::Informedness => informedness_from_recalls(&cm.recalls()),
        ScoringMethod::HmeanRecall => harmonic_mean(&cm.recalls()),
        ScoringMethod::HmeanPrecision => harmonic_mean(&cm.precisions()),
    };
    Ok(value)
}

/// Compute the full score set for a set of predictions
pub fn score_all(
    truth: &Array1<usize>,
    predicted: &Array1<usize>,
    n_classes: usize,
) -> Result<ModelScores> {
    let cm = ConfusionCounts::build(truth, predicted, n_classes)?;
    let binary = n_classes == 2;
    Ok(ModelScores {
        accuracy: cm.accuracy(),
        precision: binary.then(|| ratio(cm.hits(1), cm.predicted(1))),
        sensitivity: binary.then(|| ratio(cm.hits(1), cm.support(1))),
        specificity: binary.then(|| ratio(cm.hits(0), cm.support(0))),
        informedness: informedness_from_recalls(&cm.recalls()),
        hmean_recall: harmonic_mean(&cm.recalls()),
        hmean_precision: harmonic_mean(&cm.precisions()),
    })
}

/// Confusion counts indexed `counts[truth][predicted]`
struct ConfusionCounts {
    counts: Vec<Vec<usize>>,
    total: usize,
}

impl ConfusionCounts {
    fn build(truth: &Array1<usize>, predicted: &Array1<usize>, n_classes: usize) -> Result<Self> {
        if truth.len() != predicted.len() {
            bail!(
                "Cannot score {} predictions against {} labels",
                predicted.len(),
                truth.len()
            );
        }
        if truth.is_empty() {
            bail!("No samples to score");
        }

        let mut counts = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            if t >= n_classes || p >= n_classes {
                bail!("Class index out of range: truth {t}, predicted {p}, classes {n_classes}");
            }
            counts[t][p] += 1;
        }
        Ok(Self {
            counts,
            total: truth.len(),
        })
    }

    fn hits(&self, class: usize) -> usize {
        self.counts[class][class]
    }

    fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    fn predicted(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum()
    }

    fn accuracy(&self) -> f64 {
        let hits: usize = (0..self.counts.len()).map(|c| self.hits(c)).sum();
        hits as f64 / self.total as f64
    }

    /// Per-class recall, restricted to classes that appear in the truth
    fn recalls(&self) -> Vec<f64> {
        (0..self.counts.len())
            .filter(|&c| self.support(c) > 0)
            .map(|c| ratio(self.hits(c), self.support(c)))
            .collect()
    }

    /// Per-class precision for classes that appear in the truth; a class
    /// never predicted scores zero
    fn precisions(&self) -> Vec<f64> {
        (0..self.counts.len())
            .filter(|&c| self.support(c) > 0)
            .map(|c| ratio(self.hits(c), self.predicted(c)))
            .collect()
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Rescale the mean recall so chance-level prediction scores zero
fn informedness_from_recalls(recalls: &[f64]) -> f64 {
    if recalls.is_empty() {
        return 0.0;
    }
    let mean = recalls.iter().sum::<f64>() / recalls.len() as f64;
    2.0 * mean - 1.0
}

/// Harmonic mean with a zero guard: any value at or below zero collapses
/// the whole mean to zero
fn harmonic_mean(values: &[f64]) -> f64 {
    if values.is_empty() || values.iter().any(|v| *v <= 0.0) {
        return 0.0;
    }
    values.len() as f64 / values.iter().map(|v| 1.0 / v).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_accuracy() {
        let truth = arr1(&[1, 1, 1, 0, 0]);
        let predicted = arr1(&[1, 0, 1, 0, 1]);
        let value = score(ScoringMethod::Accuracy, &truth, &predicted, 2).expect("score failed");
        assert!((value - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_binary_metrics() {
        let truth = arr1(&[1, 1, 1, 0, 0]);
        let predicted = arr1(&[1, 0, 1, 0, 1]);

        let precision =
            score(ScoringMethod::Precision, &truth, &predicted, 2).expect("score failed");
        let sensitivity =
            score(ScoringMethod::Sensitivity, &truth, &predicted, 2).expect("score failed");
        let specificity =
            score(ScoringMethod::Specificity, &truth, &predicted, 2).expect("score failed");

        assert!((precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((sensitivity - 2.0 / 3.0).abs() < 1e-12);
        assert!((specificity - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_binary_metrics_reject_multiclass() {
        let truth = arr1(&[0, 1, 2]);
        let predicted = arr1(&[0, 1, 2]);
        let err = score(ScoringMethod::Precision, &truth, &predicted, 3)
            .expect_err("score should fail");
        assert!(err.to_string().contains("requires a binary label"));
    }

    #[test]
    fn test_score_all_binary() {
        let truth = arr1(&[1, 1, 1, 0, 0]);
        let predicted = arr1(&[1, 0, 1, 0, 1]);

        let scores = score_all(&truth, &predicted, 2).expect("score failed");
        assert!((scores.accuracy - 0.6).abs() < 1e-12);
        assert!((scores.precision.unwrap_or_default() - 2.0 / 3.0).abs() < 1e-12);
        assert!((scores.sensitivity.unwrap_or_default() - 2.0 / 3.0).abs() < 1e-12);
        assert!((scores.specificity.unwrap_or_default() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_score_all_multiclass_drops_binary_metrics() {
        let truth = arr1(&[0, 1, 2, 2]);
        let predicted = arr1(&[0, 1, 2, 1]);

        let scores = score_all(&truth, &predicted, 3).expect("score failed");
        assert!(scores.precision.is_none());
        assert!(scores.sensitivity.is_none());
        assert!(scores.specificity.is_none());
        assert!((scores.accuracy - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_informedness_binary() {
        // Recalls 0.5 and 1.0, so informedness is their sum minus one
        let truth = arr1(&[0, 0, 1, 1]);
        let predicted = arr1(&[0, 1, 1, 1]);
        let value =
            score(ScoringMethod::Informedness, &truth, &predicted, 2).expect("score failed");
        assert!((value - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_informedness_reference_values() {
        let binary = informedness_from_recalls(&[0.7572, 0.4744]);
        assert!((binary - 0.2316).abs() < 1e-6);

        let three_class = informedness_from_recalls(&[0.1859, 0.8663, 0.2619]);
        assert!((three_class - (-0.123_933_3)).abs() < 1e-6);
    }

    #[test]
    fn test_harmonic_mean_reference_value() {
        let value = harmonic_mean(&[0.0161, 0.8070, 0.1344, 0.0156, 0.6629]);
        assert!((value - 0.036_656_2).abs() < 1e-6);
    }

    #[test]
    fn test_harmonic_mean_zero_guard() {
        assert_eq!(harmonic_mean(&[0.5, 0.0, 0.9]), 0.0);
        assert_eq!(harmonic_mean(&[]), 0.0);
    }

    #[test]
    fn test_hmean_recall() {
        // Recalls 1.0 and 0.5
        let truth = arr1(&[0, 0, 1, 1]);
        let predicted = arr1(&[0, 0, 0, 1]);
        let value = score(ScoringMethod::HmeanRecall, &truth, &predicted, 2).expect("score failed");
        assert!((value - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let truth = arr1(&[0, 1]);
        let predicted = arr1(&[0]);
        let err =
            score(ScoringMethod::Accuracy, &truth, &predicted, 2).expect_err("score should fail");
        assert!(err.to_string().contains("Cannot score"));
    }
}
