//! Content-based freshness tracking.
//!
//! After each successful stage the runner records SHA-256 hashes of the
//! stage's inputs and outputs. A stage is considered fresh only when every
//! recorded hash still matches the file on disk, so both upstream edits and
//! hand-modified build products trigger a re-run. Timestamps are never
//! consulted.

use super::stage::Stage;
use crate::error::{Result, ResultExt as _};
use crate::integrity::compute_file_hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Version marker for the on-disk fingerprint state
pub const STATE_VERSION: u32 = 1;

/// Recorded hashes from the last successful run of one stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageFingerprint {
    /// Content hash per input path
    pub inputs: BTreeMap<String, String>,
    /// Content hash per output path
    pub outputs: BTreeMap<String, String>,
}

/// On-disk freshness state for the whole pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessState {
    #[serde(default = "default_state_version")]
    pub version: u32,
    #[serde(default)]
    pub stages: BTreeMap<String, StageFingerprint>,
}

impl Default for FreshnessState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            stages: BTreeMap::new(),
        }
    }
}

impl FreshnessState {
    /// Load the state file, treating a missing or unreadable file as a clean
    /// slate. A corrupt or incompatible file makes every stage stale, which
    /// is the safe direction.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read fingerprint state {}: {e}", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(state) if state.version == STATE_VERSION => state,
            Ok(state) => {
                warn!(
                    "Ignoring fingerprint state {} with version {}",
                    path.display(),
                    state.version
                );
                Self::default()
            }
            Err(e) => {
                warn!("Ignoring corrupt fingerprint state {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Persist the state file, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory: {}", parent.display())
                })?;
            }
        }
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize fingerprint state")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write fingerprint state: {}", path.display()))
    }

    /// Record the current input and output hashes for a stage that just ran
    pub fn record(&mut self, stage: &Stage) -> Result<()> {
        let mut fingerprint = StageFingerprint::default();
        for input in &stage.inputs {
            fingerprint
                .inputs
                .insert(path_key(input), compute_file_hash(input)?);
        }
        for output in &stage.outputs {
            fingerprint
                .outputs
                .insert(path_key(output), compute_file_hash(output)?);
        }
        self.stages
            .insert(stage.name.as_str().to_owned(), fingerprint);
        Ok(())
    }
}

/// Why a stage does or does not need to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    NeverRan,
    InputMissing(PathBuf),
    InputChanged(PathBuf),
    OutputMissing(PathBuf),
    OutputChanged(PathBuf),
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

impl std::fmt::Display for Staleness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "up to date"),
            Self::NeverRan => write!(f, "no recorded run"),
            Self::InputMissing(path) => write!(f, "input missing: {}", path.display()),
            Self::InputChanged(path) => write!(f, "input changed: {}", path.display()),
            Self::OutputMissing(path) => write!(f, "output missing: {}", path.display()),
            Self::OutputChanged(path) => write!(f, "output modified: {}", path.display()),
        }
    }
}

/// Decide whether a stage needs to run.
///
/// Checks run in order of usefulness to the operator: missing inputs first,
/// then whether the stage ever ran, then input content, then output
/// presence and content. An unreadable file counts as changed.
pub fn check(state: &FreshnessState, stage: &Stage) -> Staleness {
    for input in &stage.inputs {
        if !input.exists() {
            return Staleness::InputMissing(input.clone());
        }
    }

    let Some(recorded) = state.stages.get(stage.name.as_str()) else {
        return Staleness::NeverRan;
    };

    for input in &stage.inputs {
        match recorded.inputs.get(&path_key(input)) {
            None => return Staleness::InputChanged(input.clone()),
            Some(old_hash) => {
                let current = match compute_file_hash(input) {
                    Ok(hash) => hash,
                    Err(_) => return Staleness::InputChanged(input.clone()),
                };
                if &current != old_hash {
                    return Staleness::InputChanged(input.clone());
                }
            }
        }
    }

    for output in &stage.outputs {
        if !output.exists() {
            return Staleness::OutputMissing(output.clone());
        }
        match recorded.outputs.get(&path_key(output)) {
            None => return Staleness::OutputMissing(output.clone()),
            Some(old_hash) => {
                let current = match compute_file_hash(output) {
                    Ok(hash) => hash,
                    Err(_) => return Staleness::OutputChanged(output.clone()),
                };
                if &current != old_hash {
                    return Staleness::OutputChanged(output.clone());
                }
            }
        }
    }

    Staleness::Fresh
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn default_state_version() -> u32 {
    STATE_VERSION
}
