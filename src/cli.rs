use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use systole::config::{DEFAULT_CONFIG_FILE, PipelineConfig};
use systole::ingest;
use systole::model::{TrainRequest, TrainingConfig, train};
use systole::pipeline::{RunOptions, StageName, run_pipeline, status};

#[derive(Parser)]
#[command(name = "systole", about = "Heart-disease model build pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline, skipping stages whose inputs have not changed
    Run {
        /// Path to the pipeline config
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Re-run every stage even when it is up to date
        #[arg(long)]
        force: bool,

        /// Run a single stage: ingest, preprocess, or train
        #[arg(long)]
        stage: Option<String>,
    },
    /// Subset a raw CSV to the modelling columns
    Ingest {
        /// Raw dataset to read
        #[arg(short, long)]
        source: PathBuf,

        /// Where to write the subset CSV
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Train a model straight from a training config
    Train {
        /// Path to the training config
        #[arg(short, long, default_value = "train.json")]
        config: PathBuf,

        /// Where to write the model artifact
        #[arg(short, long, default_value = "build/model.json")]
        artifact: PathBuf,
    },
    /// Show each stage and whether the next run would execute it
    Status {
        /// Path to the pipeline config
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

/// The command used when none is given on the command line
pub fn default_command() -> Commands {
    Commands::Run {
        config: PathBuf::from(DEFAULT_CONFIG_FILE),
        force: false,
        stage: None,
    }
}

pub async fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            config,
            force,
            stage,
        } => handle_run(config, force, stage).await,
        Commands::Ingest { source, output } => handle_ingest(&source, &output),
        Commands::Train { config, artifact } => handle_train(&config, artifact),
        Commands::Status { config } => handle_status(&config),
    }
}

async fn handle_run(config_path: PathBuf, force: bool, stage: Option<String>) -> Result<()> {
    let config = PipelineConfig::from_file(&config_path)?;
    let only = match stage {
        Some(name) => Some(StageName::parse(&name).ok_or_else(|| {
            anyhow!("Unknown stage '{name}'. Valid stages: ingest, preprocess, train")
        })?),
        None => None,
    };

    let report = run_pipeline(&config, &RunOptions { force, only }).await?;
    println!("{}", report.summary());
    Ok(())
}

fn handle_ingest(source: &Path, output: &Path) -> Result<()> {
    println!("Ingesting {}...", source.display());
    let summary = ingest::ingest(source, output)?;
    println!(
        "Wrote {} of {} rows to {} ({} dropped for missing values)",
        summary.rows_written,
        summary.rows_read,
        output.display(),
        summary.rows_dropped
    );
    Ok(())
}

fn handle_train(config_path: &Path, artifact: PathBuf) -> Result<()> {
    let config = TrainingConfig::from_file(config_path)?;
    println!(
        "Training {} on {}...",
        config.algorithm,
        config.training_dataset.display()
    );

    let predictions = artifact.with_file_name("predictions.csv");
    let request = TrainRequest::from_config(config, artifact, Some(predictions));
    let outcome = train(&request)?;

    match &outcome.cross_validation {
        Some(cv) => println!(
            "Validation {} = {:.4} (cv median {:.4}, mad {:.4})",
            outcome.scoring, outcome.validation_score, cv.median, cv.median_abs_deviation
        ),
        None => println!(
            "Validation {} = {:.4}",
            outcome.scoring, outcome.validation_score
        ),
    }
    println!("Artifact written to {}", outcome.artifact_path.display());
    Ok(())
}

fn handle_status(config_path: &Path) -> Result<()> {
    let config = PipelineConfig::from_file(config_path)?;
    for (stage, staleness) in status(&config) {
        let action = if staleness.is_stale() { "will run" } else { "skip" };
        println!("{:<12} {action:<9} {staleness}", stage.name.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_runs_pipeline() {
        match default_command() {
            Commands::Run {
                config,
                force,
                stage,
            } => {
                assert_eq!(config, PathBuf::from(DEFAULT_CONFIG_FILE));
                assert!(!force);
                assert!(stage.is_none());
            }
            _ => panic!("default command should be a pipeline run"),
        }
    }
}
