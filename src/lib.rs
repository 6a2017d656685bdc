//! # Systole - Heart-Disease Model Build Pipeline
//!
//! Systole turns the raw Cleveland heart-disease export into a trained
//! classification model through three ordered stages: ingestion, an R
//! preprocessing script, and model generation. Stages only re-run when
//! the content of their inputs or outputs has changed, so repeated runs
//! after small edits stay fast.
//!
//! ## Quick Start
//!
//! ```no_run
//! use systole::config::PipelineConfig;
//! use systole::pipeline::{RunOptions, run_pipeline};
//! use std::path::Path;
//!
//! let config = PipelineConfig::from_file(Path::new("systole.json"))?;
//! let options = RunOptions { force: false, only: None };
//!
//! let report = tokio::runtime::Runtime::new()?
//!     .block_on(run_pipeline(&config, &options))?;
//! println!("{}", report.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`config`]: The `systole.json` pipeline config and its validation
//! - [`ingest`]: Raw CSV reading and the fixed modelling-column subset
//! - [`pipeline`]: Stage planning, freshness checks, and the runner
//! - [`model`]: Training configs, cross-validation, and the model artifact
//! - [`integrity`]: SHA-256 hashing and artifact receipts
//! - [`error`]: Error types shared across the crate
//! - [`logging`]: Console and rolling-file log setup
//!
//! ## Content-Based Freshness
//!
//! The runner fingerprints every stage input and output with SHA-256 and
//! stores them in `build/.fingerprints.json`. A stage re-runs only when a
//! fingerprint no longer matches, so rewriting a file with identical
//! content does not cascade into downstream work:
//!
//! ```no_run
//! use systole::config::PipelineConfig;
//! use systole::pipeline::status;
//!
//! let config = PipelineConfig::default();
//! for (stage, staleness) in status(&config) {
//!     println!("{}: {staleness}", stage.name);
//! }
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod integrity;
pub mod logging;
pub mod model;
pub mod pipeline;
