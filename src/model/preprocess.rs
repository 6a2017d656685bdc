//! Feature scaling.
//!
//! Scalers are fitted on the training matrix only and then applied to both
//! splits, so validation rows never leak into the fitted statistics. Methods
//! chain in config order, each fitting on the output of the previous one.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Supported scaling methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessingMethod {
    /// Zero mean, unit standard deviation per column
    StandardScaling,
    /// Median centering, interquartile-range spread per column
    RobustScaling,
    /// Rescale each column to the unit interval
    MinMaxScaling,
    /// Rescale each row to unit Euclidean norm
    Normalize,
}

impl PreprocessingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StandardScaling => "standard_scaling",
            Self::RobustScaling => "robust_scaling",
            Self::MinMaxScaling => "min_max_scaling",
            Self::Normalize => "normalize",
        }
    }
}

impl std::fmt::Display for PreprocessingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-column statistics fitted on the training split.
///
/// The `(center, spread)` pair means mean and standard deviation, median and
/// interquartile range, or minimum and range depending on the method. Row
/// normalization is stateless and keeps no columns.
#[derive(Debug, Clone)]
pub struct FittedScaler {
    method: PreprocessingMethod,
    columns: Vec<(f64, f64)>,
}

impl FittedScaler {
    pub fn fit(method: PreprocessingMethod, features: &Array2<f64>) -> Self {
        let columns = match method {
            PreprocessingMethod::StandardScaling => features
                .columns()
                .into_iter()
                .map(|col| {
                    let mean = col.mean().unwrap_or(0.0);
                    let std = col.std(0.0);
                    (mean, guard_spread(std))
                })
                .collect(),
            PreprocessingMethod::RobustScaling => features
                .columns()
                .into_iter()
                .map(|col| {
                    let mut sorted: Vec<f64> = col.iter().copied().collect();
                    sorted.sort_by(f64::total_cmp);
                    let median = quantile(&sorted, 0.5);
                    let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
                    (median, guard_spread(iqr))
                })
                .collect(),
            PreprocessingMethod::MinMaxScaling => features
                .columns()
                .into_iter()
                .map(|col| {
                    let min = col.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    (min, guard_spread(max - min))
                })
                .collect(),
            PreprocessingMethod::Normalize => Vec::new(),
        };
        Self { method, columns }
    }

    pub fn transform(&self, features: &mut Array2<f64>) {
        match self.method {
            PreprocessingMethod::Normalize => {
                for mut row in features.rows_mut() {
                    let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
                    if norm > f64::EPSILON {
                        row.mapv_inplace(|v| v / norm);
                    }
                }
            }
            PreprocessingMethod::StandardScaling
            | PreprocessingMethod::RobustScaling
            | PreprocessingMethod::MinMaxScaling => {
                for (j, &(center, spread)) in self.columns.iter().enumerate() {
                    let mut column = features.column_mut(j);
                    column.mapv_inplace(|v| (v - center) / spread);
                }
            }
        }
    }
}

/// Fit each method on the training matrix in order and apply it to both splits
pub fn apply_chain(
    methods: &[PreprocessingMethod],
    training: &mut Array2<f64>,
    validation: &mut Array2<f64>,
) {
    for method in methods {
        let scaler = FittedScaler::fit(*method, training);
        scaler.transform(training);
        scaler.transform(validation);
    }
}

// Constant columns would otherwise divide by zero
fn guard_spread(spread: f64) -> f64 {
    if spread.abs() < f64::EPSILON {
        1.0
    } else {
        spread
    }
}

/// Linear-interpolation quantile over a pre-sorted slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = position - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_standard_scaling_zero_mean_unit_std() {
        let mut features = arr2(&[[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]]);
        let scaler = FittedScaler::fit(PreprocessingMethod::StandardScaling, &features);
        scaler.transform(&mut features);

        for j in 0..2 {
            let col = features.column(j);
            assert!(col.mean().unwrap_or(f64::NAN).abs() < 1e-10);
            assert!((col.std(0.0) - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_min_max_scaling_uses_training_bounds() {
        let training = arr2(&[[0.0], [5.0], [10.0]]);
        let mut train = training.clone();
        let mut validation = arr2(&[[2.5], [20.0]]);

        apply_chain(&[PreprocessingMethod::MinMaxScaling], &mut train, &mut validation);

        assert!((train[[0, 0]] - 0.0).abs() < 1e-10);
        assert!((train[[1, 0]] - 0.5).abs() < 1e-10);
        assert!((train[[2, 0]] - 1.0).abs() < 1e-10);
        // Validation rows scale with training min and range, even past 1.0
        assert!((validation[[0, 0]] - 0.25).abs() < 1e-10);
        assert!((validation[[1, 0]] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_constant_column_does_not_divide_by_zero() {
        let mut training = arr2(&[[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]]);
        let mut validation = arr2(&[[8.0, 2.0]]);

        apply_chain(
            &[PreprocessingMethod::StandardScaling],
            &mut training,
            &mut validation,
        );

        assert_eq!(training[[0, 0]], 0.0);
        assert_eq!(training[[2, 0]], 0.0);
        // Constant spread falls back to 1.0, so the offset survives
        assert!((validation[[0, 0]] - 3.0).abs() < 1e-10);
        assert!(validation.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_robust_scaling_shrugs_off_outliers() {
        let mut features = arr2(&[[1.0], [2.0], [3.0], [4.0], [100.0]]);
        let scaler = FittedScaler::fit(PreprocessingMethod::RobustScaling, &features);
        scaler.transform(&mut features);

        // median 3, iqr 2: the outlier lands at (100 - 3) / 2
        assert!((features[[2, 0]] - 0.0).abs() < 1e-10);
        assert!((features[[4, 0]] - 48.5).abs() < 1e-10);
    }

    #[test]
    fn test_normalize_rows() {
        let mut features = arr2(&[[3.0, 4.0], [0.0, 0.0]]);
        let scaler = FittedScaler::fit(PreprocessingMethod::Normalize, &features);
        scaler.transform(&mut features);

        assert!((features[[0, 0]] - 0.6).abs() < 1e-10);
        assert!((features[[0, 1]] - 0.8).abs() < 1e-10);
        // Zero rows stay untouched
        assert_eq!(features[[1, 0]], 0.0);
        assert_eq!(features[[1, 1]], 0.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&sorted, 0.5) - 2.5).abs() < 1e-10);
        assert!((quantile(&sorted, 0.0) - 1.0).abs() < 1e-10);
        assert!((quantile(&sorted, 1.0) - 4.0).abs() < 1e-10);
    }
}
