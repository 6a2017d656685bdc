//! Outlier scoring with an extended isolation forest.
//!
//! The forest is fitted on the training matrix and scores the rows that
//! are written alongside the predictions. Scores fall in `[0, 1]`; rows
//! above [`OUTLIER_THRESHOLD`] isolate quickly and are worth a second
//! look before trusting the model's output for them.

use anyhow::{Result, anyhow, bail};
use extended_isolation_forest::{Forest, ForestOptions};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Scores above this are counted as likely outliers
pub const OUTLIER_THRESHOLD: f64 = 0.5;

/// Aggregate view of the per-row outlier scores stored in the artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub rows_scored: usize,
    pub mean_score: f64,
    pub max_score: f64,
    pub over_threshold: usize,
}

/// Fit a forest on `train` and score every row of `eval`.
///
/// The forest type is const-generic over the column count, so the width
/// is dispatched here. Widths up to 16 cover this pipeline's datasets.
pub fn score_rows(train: &Array2<f64>, eval: &Array2<f64>) -> Result<Vec<f64>> {
    if train.ncols() != eval.ncols() {
        bail!(
            "Outlier scoring needs matching widths, got {} training and {} evaluation columns",
            train.ncols(),
            eval.ncols()
        );
    }
    if train.nrows() == 0 {
        bail!("Cannot fit an outlier forest on an empty training set");
    }

    match train.ncols() {
        1 => score_impl::<1>(train, eval),
        2 => score_impl::<2>(train, eval),
        3 => score_impl::<3>(train, eval),
        4 => score_impl::<4>(train, eval),
        5 => score_impl::<5>(train, eval),
        6 => score_impl::<6>(train, eval),
        7 => score_impl::<7>(train, eval),
        8 => score_impl::<8>(train, eval),
        9 => score_impl::<9>(train, eval),
        10 => score_impl::<10>(train, eval),
        11 => score_impl::<11>(train, eval),
        12 => score_impl::<12>(train, eval),
        13 => score_impl::<13>(train, eval),
        14 => score_impl::<14>(train, eval),
        15 => score_impl::<15>(train, eval),
        16 => score_impl::<16>(train, eval),
        other => bail!("Outlier scoring supports 1 to 16 feature columns, got {other}"),
    }
}

fn score_impl<const N: usize>(train: &Array2<f64>, eval: &Array2<f64>) -> Result<Vec<f64>> {
    let train_rows = to_rows::<N>(train);
    let options = ForestOptions {
        n_trees: 100,
        sample_size: train_rows.len().min(256),
        max_tree_depth: None,
        extension_level: if N > 1 { 1 } else { 0 },
    };
    let forest = Forest::<f64, N>::from_slice(&train_rows, &options)
        .map_err(|e| anyhow!("Failed to fit outlier forest: {e:?}"))?;

    Ok(to_rows::<N>(eval)
        .iter()
        .map(|row| forest.score(row))
        .collect())
}

fn to_rows<const N: usize>(matrix: &Array2<f64>) -> Vec<[f64; N]> {
    matrix
        .rows()
        .into_iter()
        .map(|row| {
            let mut values = [0.0; N];
            for (slot, value) in values.iter_mut().zip(row.iter()) {
                *slot = *value;
            }
            values
        })
        .collect()
}

/// Reduce per-row scores to the summary stored in the artifact
pub fn summarize(scores: &[f64]) -> OutlierSummary {
    let mean_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    OutlierSummary {
        rows_scored: scores.len(),
        mean_score,
        max_score: scores.iter().copied().fold(0.0, f64::max),
        over_threshold: scores.iter().filter(|s| **s > OUTLIER_THRESHOLD).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Array2<f64> {
        let mut values = Vec::new();
        for i in 0..8 {
            for j in 0..8 {
                values.push(i as f64 * 0.1);
                values.push(j as f64 * 0.1);
            }
        }
        Array2::from_shape_vec((64, 2), values).expect("Failed to build cluster")
    }

    #[test]
    fn test_far_point_scores_higher() {
        let train = cluster();
        let eval =
            Array2::from_shape_vec((2, 2), vec![0.35, 0.35, 100.0, 100.0]).expect("eval matrix");

        let scores = score_rows(&train, &eval).expect("scoring failed");
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        assert!(scores[1] > scores[0]);
    }

    #[test]
    fn test_summarize_counts_threshold() {
        let summary = summarize(&[0.2, 0.6, 0.4]);
        assert_eq!(summary.rows_scored, 3);
        assert!((summary.mean_score - 0.4).abs() < 1e-12);
        assert!((summary.max_score - 0.6).abs() < 1e-12);
        assert_eq!(summary.over_threshold, 1);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);
        assert_eq!(summary.rows_scored, 0);
        assert_eq!(summary.mean_score, 0.0);
        assert_eq!(summary.max_score, 0.0);
        assert_eq!(summary.over_threshold, 0);
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let train = Array2::zeros((4, 2));
        let eval = Array2::zeros((1, 3));
        let err = score_rows(&train, &eval).expect_err("should reject mismatch");
        assert!(err.to_string().contains("matching widths"));
    }

    #[test]
    fn test_unsupported_width_is_rejected() {
        let train = Array2::zeros((4, 17));
        let eval = Array2::zeros((1, 17));
        let err = score_rows(&train, &eval).expect_err("should reject width");
        assert!(err.to_string().contains("1 to 16"));
    }
}
