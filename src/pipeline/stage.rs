//! Stage descriptors and the pipeline plan.
//!
//! A [`Stage`] declares what it reads and what it promises to write. The
//! freshness checker and runner work off those declarations rather than
//! hard-coded paths.

use crate::config::PipelineConfig;
use std::path::PathBuf;

/// Named pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    Ingest,
    Preprocess,
    Train,
}

impl StageName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Preprocess => "preprocess",
            Self::Train => "train",
        }
    }

    /// Parse a stage name as given on the command line
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ingest" => Some(Self::Ingest),
            "preprocess" => Some(Self::Preprocess),
            "train" => Some(Self::Train),
            _ => None,
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of pipeline work with declared inputs and outputs
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: StageName,
    /// Files whose content decides whether the stage is stale
    pub inputs: Vec<PathBuf>,
    /// Files the stage must produce on success
    pub outputs: Vec<PathBuf>,
}

/// Build the stage plan for a pipeline config.
///
/// The plan is linear: ingest feeds preprocess feeds train. When the
/// preprocess stage is disabled the training and validation datasets must
/// already be present in the build directory, supplied by some external
/// process.
pub fn plan(config: &PipelineConfig) -> Vec<Stage> {
    let mut stages = vec![Stage {
        name: StageName::Ingest,
        inputs: vec![config.source.clone()],
        outputs: vec![config.ingested_path()],
    }];

    if config.preprocess.enabled {
        stages.push(Stage {
            name: StageName::Preprocess,
            inputs: vec![config.ingested_path(), config.preprocess.script.clone()],
            outputs: vec![config.training_path(), config.validation_path()],
        });
    }

    stages.push(Stage {
        name: StageName::Train,
        inputs: vec![
            config.training_config.clone(),
            config.training_path(),
            config.validation_path(),
        ],
        outputs: vec![config.artifact_path(), config.predictions_path()],
    });

    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_is_linear() {
        let config = PipelineConfig::default();
        let stages = plan(&config);

        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ingest", "preprocess", "train"]);

        // Each stage's first input is produced by the stage before it
        assert_eq!(stages[1].inputs[0], stages[0].outputs[0]);
        assert_eq!(stages[2].inputs[1], stages[1].outputs[0]);
    }

    #[test]
    fn test_plan_skips_disabled_preprocess() {
        let mut config = PipelineConfig::default();
        config.preprocess.enabled = false;

        let stages = plan(&config);
        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ingest", "train"]);
    }

    #[test]
    fn test_preprocess_depends_on_script() {
        let config = PipelineConfig::default();
        let stages = plan(&config);
        assert!(stages[1].inputs.contains(&config.preprocess.script));
    }

    #[test]
    fn test_stage_name_parse() {
        assert_eq!(StageName::parse("train"), Some(StageName::Train));
        assert_eq!(StageName::parse(" Ingest "), Some(StageName::Ingest));
        assert_eq!(StageName::parse("deploy"), None);
    }
}
