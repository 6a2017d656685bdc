//! Model generation for the ingested heart-disease data.
//!
//! A training run is driven by a [`TrainingConfig`] and goes through
//! four steps: parameter selection over any grid values, a reporting
//! cross-validation pass, a final fit on the full training split, and
//! scoring against the held-out validation split. The run ends with a
//! JSON [`ModelArtifact`] plus an integrity receipt, and optionally a
//! per-row predictions file with outlier scores.
//!
//! ```no_run
//! use systole::model::{TrainRequest, TrainingConfig, train};
//! use std::path::Path;
//!
//! let config = TrainingConfig::from_file(Path::new("train.json"))?;
//! let request = TrainRequest::from_config(config, "build/model.json".into(), None);
//! let outcome = train(&request)?;
//! println!("{} = {:.4}", outcome.scoring, outcome.validation_score);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod artifact;
pub mod config;
pub mod cross_validate;
pub mod data;
pub mod estimator;
pub mod outliers;
pub mod preprocess;
pub mod scoring;
pub mod train;

pub use artifact::{ArtifactMetadata, CrossValidationSummary, ModelArtifact};
pub use config::{Algorithm, ParameterValue, TrainingConfig};
pub use outliers::OutlierSummary;
pub use preprocess::PreprocessingMethod;
pub use scoring::{ModelScores, ScoringMethod};
pub use train::{TrainOutcome, TrainRequest, train};
