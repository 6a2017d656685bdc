//! Build pipeline for the Cleveland heart-disease model.
//!
//! The pipeline is a short linear chain of stages, each with declared
//! inputs and outputs:
//!
//! 1. **ingest**: subset the raw CSV export to the fixed column set
//! 2. **preprocess**: hand the cleaned CSV to the R script that produces
//!    the training and validation splits
//! 3. **train**: fit, cross-validate, and score the model, then write the
//!    artifact and validation predictions
//!
//! Freshness is content-based: a stage re-runs only when an input or output
//! hash no longer matches what was recorded after its last successful run.
//! Deleting the build directory resets everything.
//!
//! # Example: Headless Run
//!
//! ```no_run
//! use systole::config::PipelineConfig;
//! use systole::pipeline::{run_pipeline, RunOptions};
//!
//! let config = PipelineConfig::from_file("systole.json")?;
//! let report = tokio::runtime::Runtime::new()?
//!     .block_on(run_pipeline(&config, &RunOptions::default()))?;
//! println!("{}", report.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod freshness;
pub mod rscript;
pub mod runner;
pub mod stage;

pub use freshness::{FreshnessState, Staleness, check};
pub use runner::{RunOptions, RunReport, run_pipeline, status};
pub use stage::{Stage, StageName, plan};
