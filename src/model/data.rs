//! Dataset loading for the train stage.
//!
//! Training and validation files are plain CSVs with a header row. The
//! label is positional: the last column, whatever it is named. Everything
//! else is a feature and must cast cleanly to `f64`. Labels must be whole
//! numbers; a fractional target is an error, not a truncation.

use anyhow::{Context as _, Result, anyhow, bail};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::path::Path;

/// A labeled dataset in model-ready form
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    pub labels: Vec<i64>,
}

impl RawDataset {
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }
}

/// Read a labeled CSV into a feature matrix and integer labels
pub fn load_dataset(path: &Path) -> Result<RawDataset> {
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .finish()
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?
        .collect()
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

    if df.height() == 0 {
        bail!("Dataset {} contains no rows", path.display());
    }
    if df.width() < 2 {
        bail!(
            "Dataset {} needs at least one feature column and a label column",
            path.display()
        );
    }

    let names: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|s| (*s).to_owned())
        .collect();
    let (feature_names, label_name) = names.split_at(names.len() - 1);
    let label_name = &label_name[0];

    let n_rows = df.height();
    let mut features = Array2::zeros((n_rows, feature_names.len()));
    for (j, name) in feature_names.iter().enumerate() {
        let series = df
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|e| anyhow!("Failed to cast column '{name}' to f64: {e}"))?;
        for (i, value) in series.f64()?.into_iter().enumerate() {
            features[[i, j]] =
                value.ok_or_else(|| anyhow!("Missing value in column '{name}' at row {i}"))?;
        }
    }

    let label_series = df
        .column(label_name)?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| anyhow!("Failed to cast label column '{label_name}' to numbers: {e}"))?;
    let mut labels = Vec::with_capacity(n_rows);
    for (i, value) in label_series.f64()?.into_iter().enumerate() {
        let value =
            value.ok_or_else(|| anyhow!("Missing label in column '{label_name}' at row {i}"))?;
        if value.fract() != 0.0 {
            bail!("Label {value} in column '{label_name}' at row {i} is not an integer");
        }
        labels.push(value as i64);
    }

    Ok(RawDataset {
        feature_names: feature_names.to_vec(),
        features,
        labels,
    })
}

/// Distinct label values sorted ascending.
///
/// Class indices everywhere else in the crate are positions in this table,
/// so for a binary label the positive class is always index 1.
pub fn class_table(labels: &[i64]) -> Vec<i64> {
    let mut classes = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// Map raw label values onto class indices
pub fn encode_labels(labels: &[i64], classes: &[i64]) -> Result<Array1<usize>> {
    let mut encoded = Vec::with_capacity(labels.len());
    for value in labels {
        let index = classes
            .binary_search(value)
            .map_err(|_| anyhow!("Label {value} does not appear in the training data"))?;
        encoded.push(index);
    }
    Ok(Array1::from(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_csv(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("dataset.csv");
        fs::write(&path, content).expect("Failed to write fixture");
        path
    }

    #[test]
    fn test_load_dataset_basic() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_csv(dir.path(), "a,b,target\n1,2.5,0\n3,4.5,1\n5,6.5,1\n");

        let dataset = load_dataset(&path).expect("Failed to load");
        assert_eq!(dataset.feature_names, vec!["a", "b"]);
        assert_eq!(dataset.n_rows(), 3);
        assert_eq!(dataset.n_features(), 2);
        assert_eq!(dataset.labels, vec![0, 1, 1]);
        assert!((dataset.features[[1, 1]] - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_label_is_positional_not_named() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_csv(dir.path(), "x,outcome\n1,2\n3,4\n");

        let dataset = load_dataset(&path).expect("Failed to load");
        assert_eq!(dataset.feature_names, vec!["x"]);
        assert_eq!(dataset.labels, vec![2, 4]);
    }

    #[test]
    fn test_missing_feature_value_names_column() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_csv(dir.path(), "a,b,target\n1,,0\n3,4,1\n");

        let err = load_dataset(&path).expect_err("load should fail");
        assert!(err.to_string().contains("'b'"), "got: {err}");
    }

    #[test]
    fn test_fractional_label_is_rejected() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_csv(dir.path(), "a,b,target\n1,2,0\n3,4,1.5\n");

        let err = load_dataset(&path).expect_err("load should fail");
        assert!(err.to_string().contains("not an integer"), "got: {err}");
    }

    #[test]
    fn test_single_column_is_rejected() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_csv(dir.path(), "target\n0\n1\n");

        let err = load_dataset(&path).expect_err("load should fail");
        assert!(err.to_string().contains("at least one feature column"));
    }

    #[test]
    fn test_class_table_and_encoding() {
        let labels = vec![2, 0, 1, 2, 0];
        let classes = class_table(&labels);
        assert_eq!(classes, vec![0, 1, 2]);

        let encoded = encode_labels(&labels, &classes).expect("Failed to encode");
        assert_eq!(encoded.to_vec(), vec![2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_encode_rejects_unseen_label() {
        let classes = vec![0, 1];
        let err = encode_labels(&[0, 3], &classes).expect_err("encode should fail");
        assert!(err.to_string().contains("Label 3"));
    }
}
