//! Pipeline runner.
//!
//! Walks the stage plan in order, consults the freshness state to decide
//! what actually needs to run, executes stale stages, and records new
//! fingerprints after each success so a crash part-way through keeps the
//! completed work.

use super::freshness::{check, FreshnessState, Staleness};
use super::rscript;
use super::stage::{plan, Stage, StageName};
use crate::config::{format_validation_errors, PipelineConfig};
use crate::error::{Result, ResultExt as _, SystoleError};
use crate::ingest;
use crate::model::{self, TrainRequest, TrainingConfig};
use std::time::Instant;
use tracing::{debug, info};

/// Options for one pipeline run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Re-run every stage regardless of freshness
    pub force: bool,
    /// Restrict the run to a single stage
    pub only: Option<StageName>,
}

/// Report of what a pipeline run did
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stages_run: Vec<String>,
    pub stages_skipped: Vec<String>,
    pub warnings: Vec<String>,
    pub duration_secs: f64,
}

impl RunReport {
    /// Human-readable multi-line summary for CLI output
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Pipeline finished in {:.2}s: {} stage(s) run, {} skipped",
            self.duration_secs,
            self.stages_run.len(),
            self.stages_skipped.len()
        )];
        if !self.stages_run.is_empty() {
            lines.push(format!("  ran: {}", self.stages_run.join(", ")));
        }
        if !self.stages_skipped.is_empty() {
            lines.push(format!("  skipped: {}", self.stages_skipped.join(", ")));
        }
        for warning in &self.warnings {
            lines.push(format!("  warning: {warning}"));
        }
        lines.join("\n")
    }
}

/// Run the pipeline described by `config`, executing only stale stages
pub async fn run_pipeline(config: &PipelineConfig, options: &RunOptions) -> Result<RunReport> {
    let started = Instant::now();

    let problems = config.validate();
    if !problems.is_empty() {
        return Err(SystoleError::Config(format_validation_errors(&problems)));
    }

    let stages = plan(config);
    if !config.preprocess.enabled {
        info!("Preprocess stage is disabled in the config");
    }
    if let Some(only) = options.only {
        if !stages.iter().any(|stage| stage.name == only) {
            return Err(SystoleError::Config(format!(
                "Stage '{only}' is not part of this pipeline"
            )));
        }
    }

    std::fs::create_dir_all(&config.build_dir).with_context(|| {
        format!(
            "Failed to create build directory: {}",
            config.build_dir.display()
        )
    })?;

    let state_path = config.state_path();
    let mut state = FreshnessState::load(&state_path);
    let mut report = RunReport::default();

    for stage in &stages {
        if let Some(only) = options.only {
            if stage.name != only {
                continue;
            }
        }

        let staleness = check(&state, stage);
        if let Staleness::InputMissing(path) = &staleness {
            return Err(SystoleError::Data(format!(
                "Stage '{}' cannot run, input missing: {}",
                stage.name,
                path.display()
            )));
        }

        let reason = if options.force {
            "forced".to_owned()
        } else if staleness.is_stale() {
            staleness.to_string()
        } else {
            info!("Stage {} is up to date", stage.name);
            report.stages_skipped.push(stage.name.to_string());
            continue;
        };

        info!("Running stage {} ({reason})", stage.name);
        execute_stage(config, stage, &mut report).await?;

        for output in &stage.outputs {
            if !output.exists() {
                return Err(SystoleError::Data(format!(
                    "Stage '{}' did not produce {}",
                    stage.name,
                    output.display()
                )));
            }
        }

        state.record(stage)?;
        state.save(&state_path)?;
        report.stages_run.push(stage.name.to_string());
    }

    report.duration_secs = started.elapsed().as_secs_f64();
    Ok(report)
}

/// Report the plan with the staleness of every stage, without running any
pub fn status(config: &PipelineConfig) -> Vec<(Stage, Staleness)> {
    let state = FreshnessState::load(&config.state_path());
    plan(config)
        .into_iter()
        .map(|stage| {
            let staleness = check(&state, &stage);
            (stage, staleness)
        })
        .collect()
}

async fn execute_stage(
    config: &PipelineConfig,
    stage: &Stage,
    report: &mut RunReport,
) -> Result<()> {
    match stage.name {
        StageName::Ingest => {
            let summary = ingest::ingest(&config.source, &config.ingested_path())?;
            if summary.rows_dropped > 0 {
                report.warnings.push(format!(
                    "ingest dropped {} of {} rows with missing values",
                    summary.rows_dropped, summary.rows_read
                ));
            }
            Ok(())
        }
        StageName::Preprocess => {
            let args = rscript::build_args(
                &config.preprocess.script,
                &config.ingested_path(),
                &config.build_dir,
                config.preprocess.seed,
                &ingest::SUBSET_COLUMNS,
                &config.preprocess.extra_args,
            );
            let output = rscript::run_rscript(&args).await?;
            if !output.trim().is_empty() {
                debug!("Rscript output:\n{}", output.trim());
            }
            Ok(())
        }
        StageName::Train => {
            let training_config = TrainingConfig::from_file(&config.training_config)?;
            let request = TrainRequest {
                config: training_config,
                training_dataset: config.training_path(),
                validation_dataset: config.validation_path(),
                artifact_path: config.artifact_path(),
                predictions_path: Some(config.predictions_path()),
            };
            let outcome = model::train(&request)?;
            match &outcome.cross_validation {
                Some(cv) => info!(
                    "Validation {} = {:.4} (cv median {:.4}, mad {:.4})",
                    outcome.scoring, outcome.validation_score, cv.median, cv.median_abs_deviation
                ),
                None => info!(
                    "Validation {} = {:.4}",
                    outcome.scoring, outcome.validation_score
                ),
            }
            Ok(())
        }
    }
}
