//! K-fold cross-validation.
//!
//! Folds are built from a seeded shuffle so every run of the same config
//! sees the same splits. Each fold is scored with the configured metric;
//! the caller summarizes the per-fold scores with the median and its
//! absolute deviation, which hold up better than the mean on the small
//! fold sizes this dataset produces.

use super::config::Algorithm;
use super::estimator::fit_estimator;
use super::scoring::{ScoringMethod, score};
use anyhow::{Result, bail};
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use tracing::debug;

/// Settings for one cross-validation pass
#[derive(Debug, Clone, Copy)]
pub struct CvOptions {
    pub folds: usize,
    pub scoring: ScoringMethod,
    pub seed: u64,
}

/// Shuffle row indices with a seeded generator and cut them into `folds`
/// near-equal chunks
pub fn fold_indices(n_rows: usize, folds: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n_rows / folds;
    let extra = n_rows % folds;
    let mut result = Vec::with_capacity(folds);
    let mut start = 0;
    for fold in 0..folds {
        let len = base + usize::from(fold < extra);
        result.push(indices[start..start + len].to_vec());
        start += len;
    }
    result
}

/// Fit and score the estimator once per fold, returning one score per fold
pub fn cross_validate(
    algorithm: Algorithm,
    parameters: &BTreeMap<String, f64>,
    features: &Array2<f64>,
    labels: &Array1<usize>,
    n_classes: usize,
    options: &CvOptions,
) -> Result<Vec<f64>> {
    let n_rows = features.nrows();
    if options.folds < 2 {
        bail!(
            "Cross-validation needs at least 2 folds, got {}",
            options.folds
        );
    }
    if options.folds > n_rows {
        bail!("Cannot split {n_rows} rows into {} folds", options.folds);
    }

    let mut scores = Vec::with_capacity(options.folds);
    for (fold, test_indices) in fold_indices(n_rows, options.folds, options.seed)
        .iter()
        .enumerate()
    {
        let mut in_test = vec![false; n_rows];
        for &index in test_indices {
            in_test[index] = true;
        }
        let train_indices: Vec<usize> = (0..n_rows).filter(|&i| !in_test[i]).collect();

        let train_x = features.select(Axis(0), &train_indices);
        let train_y = labels.select(Axis(0), &train_indices);
        let test_x = features.select(Axis(0), test_indices);
        let test_y = labels.select(Axis(0), test_indices);

        let model = fit_estimator(algorithm, parameters, train_x, train_y, n_classes)?;
        let predicted = model.predict(&test_x);
        let fold_score = score(options.scoring, &test_y, &predicted, n_classes)?;
        debug!("Fold {fold}: {} = {fold_score:.4}", options.scoring);
        scores.push(fold_score);
    }
    Ok(scores)
}

/// Median of a slice; an empty slice scores zero
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median of absolute deviations from the median
pub fn median_abs_deviation(values: &[f64]) -> f64 {
    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_fold_indices_partition_all_rows() {
        let folds = fold_indices(10, 3, 0);
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].len(), 4);
        assert_eq!(folds[1].len(), 3);
        assert_eq!(folds[2].len(), 3);

        let mut all: Vec<usize> = folds.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_fold_indices_deterministic_per_seed() {
        assert_eq!(fold_indices(50, 5, 42), fold_indices(50, 5, 42));
        assert_ne!(fold_indices(50, 5, 42), fold_indices(50, 5, 43));
    }

    fn separable(n_per_class: usize) -> (Array2<f64>, Array1<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            rows.push([i as f64, i as f64 + 1.0]);
            labels.push(0);
        }
        for i in 0..n_per_class {
            rows.push([100.0 + i as f64, 101.0 + i as f64]);
            labels.push(1);
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let features = Array2::from_shape_vec((n_per_class * 2, 2), flat)
            .expect("Failed to build feature matrix");
        (features, Array1::from(labels))
    }

    #[test]
    fn test_cross_validate_separable_scores_one() {
        let (features, labels) = separable(6);
        let options = CvOptions {
            folds: 3,
            scoring: ScoringMethod::Accuracy,
            seed: 0,
        };

        let scores = cross_validate(
            Algorithm::Dtc,
            &BTreeMap::new(),
            &features,
            &labels,
            2,
            &options,
        )
        .expect("cross-validation failed");

        assert_eq!(scores.len(), 3);
        assert!(scores.iter().all(|s| (*s - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_too_many_folds_is_rejected() {
        let (features, labels) = separable(2);
        let options = CvOptions {
            folds: 10,
            scoring: ScoringMethod::Accuracy,
            seed: 0,
        };

        let err = cross_validate(
            Algorithm::Dtc,
            &BTreeMap::new(),
            &features,
            &labels,
            2,
            &options,
        )
        .expect_err("cross-validation should fail");
        assert!(err.to_string().contains("Cannot split 4 rows"));
    }

    #[test]
    fn test_median_odd_and_even() {
        assert!((median(&[3.0, 1.0, 2.0]) - 2.0).abs() < 1e-12);
        assert!((median(&[4.0, 1.0, 3.0, 2.0]) - 2.5).abs() < 1e-12);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_median_abs_deviation() {
        let values = [1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0];
        assert!((median_abs_deviation(&values) - 1.0).abs() < 1e-12);
        assert_eq!(median_abs_deviation(&[5.0, 5.0, 5.0]), 0.0);
    }
}
