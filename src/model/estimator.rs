//! Classifier fitting and prediction.
//!
//! One fit function covers every supported algorithm; hyper-parameters
//! arrive as resolved scalars and fall back to library defaults when a name
//! is absent. Binary logistic regression and the multinomial variant are
//! picked automatically from the class count.

use super::config::Algorithm;
use anyhow::{Result, anyhow, bail};
use linfa::prelude::*;
use linfa_bayes::GaussianNb;
use linfa_logistic::{
    FittedLogisticRegression, LogisticRegression, MultiFittedLogisticRegression,
    MultiLogisticRegression,
};
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// A fitted classifier ready to predict class indices
pub enum TrainedModel {
    Logistic(FittedLogisticRegression<f64, usize>),
    MultiLogistic(MultiFittedLogisticRegression<f64, usize>),
    Tree(DecisionTree<f64, usize>),
    Bayes(GaussianNb<f64, usize>),
}

impl TrainedModel {
    pub fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        match self {
            Self::Logistic(model) => model.predict(features),
            Self::MultiLogistic(model) => model.predict(features),
            Self::Tree(model) => model.predict(features),
            Self::Bayes(model) => model.predict(features),
        }
    }
}

/// Fit one classifier with resolved scalar parameters
pub fn fit_estimator(
    algorithm: Algorithm,
    parameters: &BTreeMap<String, f64>,
    features: Array2<f64>,
    labels: Array1<usize>,
    n_classes: usize,
) -> Result<TrainedModel> {
    if n_classes < 2 {
        bail!("Training data must contain at least two classes, found {n_classes}");
    }

    let dataset = Dataset::new(features, labels);
    match algorithm {
        Algorithm::Lrc => {
            let alpha = get(parameters, "alpha", 1.0);
            let max_iterations = get(parameters, "max_iterations", 100.0) as u64;
            let gradient_tolerance = get(parameters, "gradient_tolerance", 1e-4);
            if n_classes == 2 {
                let model = LogisticRegression::default()
                    .alpha(alpha)
                    .max_iterations(max_iterations)
                    .gradient_tolerance(gradient_tolerance)
                    .fit(&dataset)
                    .map_err(|e| anyhow!("Logistic regression training failed: {e}"))?;
                Ok(TrainedModel::Logistic(model))
            } else {
                let model = MultiLogisticRegression::default()
                    .alpha(alpha)
                    .max_iterations(max_iterations)
                    .gradient_tolerance(gradient_tolerance)
                    .fit(&dataset)
                    .map_err(|e| anyhow!("Logistic regression training failed: {e}"))?;
                Ok(TrainedModel::MultiLogistic(model))
            }
        }
        Algorithm::Dtc => {
            let max_depth = parameters
                .get("max_depth")
                .copied()
                .filter(|v| *v > 0.0)
                .map(|v| v as usize);
            let min_weight_split = get(parameters, "min_weight_split", 2.0) as f32;
            let min_weight_leaf = get(parameters, "min_weight_leaf", 1.0) as f32;
            let model = DecisionTree::params()
                .max_depth(max_depth)
                .min_weight_split(min_weight_split)
                .min_weight_leaf(min_weight_leaf)
                .fit(&dataset)
                .map_err(|e| anyhow!("Decision tree training failed: {e}"))?;
            Ok(TrainedModel::Tree(model))
        }
        Algorithm::Gnb => {
            let var_smoothing = get(parameters, "var_smoothing", 1e-9);
            let model = GaussianNb::params()
                .var_smoothing(var_smoothing)
                .fit(&dataset)
                .map_err(|e| anyhow!("Gaussian naive Bayes training failed: {e}"))?;
            Ok(TrainedModel::Bayes(model))
        }
    }
}

fn get(parameters: &BTreeMap<String, f64>, name: &str, default: f64) -> f64 {
    parameters.get(name).copied().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    fn separable_binary() -> (Array2<f64>, Array1<usize>) {
        let x = arr2(&[
            [0.0, 1.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.5, 0.5],
            [10.0, 11.0],
            [11.0, 10.0],
            [10.5, 10.5],
            [11.0, 11.0],
        ]);
        let y = arr1(&[0, 0, 0, 0, 1, 1, 1, 1]);
        (x, y)
    }

    #[test]
    fn test_decision_tree_fits_separable_data() {
        let (x, y) = separable_binary();
        let model = fit_estimator(Algorithm::Dtc, &BTreeMap::new(), x.clone(), y.clone(), 2)
            .expect("fit failed");
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn test_logistic_fits_separable_data() {
        let (x, y) = separable_binary();
        let mut parameters = BTreeMap::new();
        parameters.insert("max_iterations".to_owned(), 200.0);

        let model =
            fit_estimator(Algorithm::Lrc, &parameters, x.clone(), y.clone(), 2).expect("fit failed");
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn test_gaussian_nb_fits_separable_data() {
        let (x, y) = separable_binary();
        let model = fit_estimator(Algorithm::Gnb, &BTreeMap::new(), x.clone(), y.clone(), 2)
            .expect("fit failed");
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn test_multiclass_uses_multinomial_logistic() {
        let x = arr2(&[
            [0.0, 0.0],
            [1.0, 1.0],
            [20.0, 20.0],
            [21.0, 21.0],
            [40.0, 40.0],
            [41.0, 41.0],
        ]);
        let y = arr1(&[0, 0, 1, 1, 2, 2]);

        let model = fit_estimator(Algorithm::Lrc, &BTreeMap::new(), x.clone(), y.clone(), 3)
            .expect("fit failed");
        assert!(matches!(model, TrainedModel::MultiLogistic(_)));
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn test_single_class_is_rejected() {
        let x = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let y = arr1(&[0, 0]);
        let err = fit_estimator(Algorithm::Dtc, &BTreeMap::new(), x, y, 1)
            .expect_err("fit should fail");
        assert!(err.to_string().contains("at least two classes"));
    }

    #[test]
    fn test_zero_max_depth_means_unbounded() {
        let (x, y) = separable_binary();
        let mut parameters = BTreeMap::new();
        parameters.insert("max_depth".to_owned(), 0.0);

        let model =
            fit_estimator(Algorithm::Dtc, &parameters, x.clone(), y, 2).expect("fit failed");
        assert_eq!(model.predict(&x).len(), x.nrows());
    }
}
