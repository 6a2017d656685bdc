//! Ingestion stage.
//!
//! Reads the raw Cleveland CSV export, narrows it to the fixed column
//! subset the rest of the pipeline understands, and writes the cleaned
//! dataset into the build directory.

use crate::error::{Result, ResultExt as _, SystoleError};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Column subset kept from the raw export, in output order.
///
/// The final column is the label; everything before it is a feature.
pub const SUBSET_COLUMNS: [&str; 12] = [
    "age", "sex", "cp", "trestbps", "fbs", "chol", "restecg", "thalach", "exang", "oldpeak",
    "slope", "target",
];

/// Marker the raw export uses for missing values
const MISSING_MARKER: &str = "?";

/// Outcome of an ingest run
#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_dropped: usize,
}

/// Read the raw CSV at `source`, subset it to [`SUBSET_COLUMNS`], and write
/// the result to `output`.
///
/// Rows with a missing value in any kept column are dropped. Missing values
/// in columns outside the subset (`ca` and `thal` in the raw export) do not
/// cost a row.
pub fn ingest(source: &Path, output: &Path) -> Result<IngestSummary> {
    info!("Ingesting {}", source.display());

    if !source.exists() {
        return Err(SystoleError::InvalidPath(format!(
            "Source dataset not found: {}",
            source.display()
        )));
    }

    let df = read_raw(source)?;
    let rows_read = df.height();
    if rows_read == 0 {
        return Err(SystoleError::Data(format!(
            "Source dataset contains no data rows: {}",
            source.display()
        )));
    }

    let missing = missing_columns(&df);
    if !missing.is_empty() {
        return Err(SystoleError::Data(format!(
            "Source dataset is missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut subset = df
        .lazy()
        .select(
            SUBSET_COLUMNS
                .iter()
                .map(|name| col(*name))
                .collect::<Vec<_>>(),
        )
        .drop_nulls(None)
        .collect()
        .context("Failed to subset source dataset")?;

    let rows_written = subset.height();
    let rows_dropped = rows_read - rows_written;
    if rows_dropped > 0 {
        warn!("Dropped {rows_dropped} rows with missing values in kept columns");
    }
    if rows_written == 0 {
        return Err(SystoleError::Data(
            "Every source row has a missing value in a kept column".to_owned(),
        ));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create build directory: {}", parent.display())
            })?;
        }
    }
    write_csv(&mut subset, output)?;

    debug!(
        "Wrote {} of {} rows to {}",
        rows_written,
        rows_read,
        output.display()
    );

    Ok(IngestSummary {
        rows_read,
        rows_written,
        rows_dropped,
    })
}

fn read_raw(path: &Path) -> Result<DataFrame> {
    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .with_null_values(Some(NullValues::AllColumnsSingle(MISSING_MARKER.into())))
        .finish()
        .with_context(|| format!("Failed to open CSV: {}", path.display()))?
        .collect()
        .with_context(|| format!("Failed to read CSV: {}", path.display()))
}

fn missing_columns(df: &DataFrame) -> Vec<&'static str> {
    let present = df.get_column_names_str();
    SUBSET_COLUMNS
        .iter()
        .copied()
        .filter(|name| !present.contains(name))
        .collect()
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("Failed to write CSV: {}", path.display()))?;
    Ok(())
}
