//! Rscript execution for the preprocess stage.
//!
//! The statistical split lives in an R script; this module owns the process
//! contract: argument order, timeout, and error surfacing. Script internals
//! are opaque to the pipeline.

use crate::error::{Result, ResultExt as _, SystoleError};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Default wall-clock limit for one script invocation
pub const DEFAULT_RSCRIPT_TIMEOUT_SECS: u64 = 600;

/// Environment variable overriding the script timeout, in seconds
pub const RSCRIPT_TIMEOUT_ENV: &str = "SYSTOLE_RSCRIPT_TIMEOUT_SECS";

fn rscript_timeout() -> Duration {
    timeout_from(std::env::var(RSCRIPT_TIMEOUT_ENV).ok().as_deref())
}

fn timeout_from(raw: Option<&str>) -> Duration {
    let secs = raw
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_RSCRIPT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Build the argument list for one preprocessing invocation.
///
/// The contract with the script is positional input file and output
/// directory, then `--seed` and `--columns` flags. Extra arguments from the
/// config are appended verbatim.
pub fn build_args(
    script: &Path,
    input: &Path,
    output_dir: &Path,
    seed: u64,
    columns: &[&str],
    extra_args: &[String],
) -> Vec<String> {
    let mut args = vec![
        script.display().to_string(),
        input.display().to_string(),
        output_dir.display().to_string(),
        "--seed".to_owned(),
        seed.to_string(),
        "--columns".to_owned(),
        columns.join(","),
    ];
    args.extend(extra_args.iter().cloned());
    args
}

/// Run the preprocessing script through `Rscript`, returning its stdout.
pub async fn run_rscript(args: &[String]) -> Result<String> {
    info!(
        "Spawning Rscript {}",
        args.first().map(String::as_str).unwrap_or("")
    );

    let mut child = Command::new("Rscript")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            SystoleError::Script(format!("Failed to spawn Rscript (is R installed?): {e}"))
        })?;

    let timeout_duration = rscript_timeout();
    let out = match timeout(timeout_duration, child.wait_with_output()).await {
        Ok(result) => result.context("Failed to wait for Rscript process")?,
        Err(_) => {
            return Err(SystoleError::Script(format!(
                "Rscript timed out after {} seconds",
                timeout_duration.as_secs()
            )));
        }
    };

    debug!("Rscript completed with exit code: {:?}", out.status.code());

    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();

    if out.status.success() {
        Ok(stdout)
    } else {
        Err(SystoleError::Script(format!(
            "Rscript failed with exit code {:?}\n{stdout}\n{stderr}",
            out.status.code()
        )))
    }
}
