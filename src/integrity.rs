//! Content hashing and artifact receipts.
//!
//! Two concerns live here: streaming SHA-256 hashes of build files (used both
//! for stage freshness fingerprints and for receipts), and the
//! `.receipt.json` written next to the model artifact so a consumer can
//! verify the file it received is the file the pipeline produced.

use crate::error::{Result, ResultExt as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read as _};
use std::path::{Path, PathBuf};

/// Buffer size for streaming file reads (8 KB).
///
/// Works well across spinning disks, SSDs, and network filesystems; the
/// build files here are small anyway.
const BUFFER_SIZE: usize = 8192;

/// Hash algorithm identifier used in receipts and fingerprints.
pub const HASH_ALGORITHM: &str = "SHA-256";

/// Current receipt schema version.
pub const RECEIPT_VERSION: u32 = 1;

/// Compute the SHA-256 hash of a file using streaming I/O.
///
/// Reads the file in chunks and updates the hash incrementally, so memory
/// stays O(1) regardless of file size.
///
/// # Errors
///
/// Returns error if the file cannot be opened or read.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    let hash = hasher.finalize();
    Ok(format!("{hash:x}"))
}

/// Receipt written alongside a produced artifact.
///
/// Captures what was produced, by which application version, and the
/// cryptographic hash needed to verify it later. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactReceipt {
    /// Schema version for forward compatibility
    pub receipt_version: u32,

    /// UTC timestamp when the receipt was created
    pub created_utc: DateTime<Utc>,

    /// Information about the application that produced the artifact
    pub producer: ProducerInfo,

    /// Metadata about the artifact file
    pub artifact: ArtifactInfo,

    /// Cryptographic integrity data
    pub integrity: IntegrityInfo,
}

/// Information about the application that produced the artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerInfo {
    /// Application name (e.g. "systole")
    pub app_name: String,

    /// Application version (e.g. "0.1.0")
    pub app_version: String,

    /// Platform identifier (e.g. "windows", "linux", "macos")
    pub platform: String,
}

/// Metadata about the artifact file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Filename (relative, for portability)
    pub filename: String,

    /// File format from the extension (e.g. "json", "csv")
    pub format: String,

    /// File size in bytes
    pub file_size_bytes: u64,

    /// Pipeline stage that produced the file
    pub stage: String,
}

/// Cryptographic integrity information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityInfo {
    /// Hash algorithm used (currently only "SHA-256")
    pub hash_algorithm: String,

    /// Cryptographic hash as lowercase hexadecimal string
    pub hash: String,
}

/// Create an integrity receipt for a produced file.
///
/// # Errors
///
/// Returns error if the file does not exist, cannot be read, or its
/// metadata is inaccessible.
pub fn create_receipt(file_path: &Path, stage: &str) -> Result<ArtifactReceipt> {
    let hash = compute_file_hash(file_path)
        .with_context(|| format!("Failed to compute hash for {}", file_path.display()))?;

    let metadata = fs::metadata(file_path)
        .with_context(|| format!("Failed to read file metadata: {}", file_path.display()))?;

    let filename = file_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_owned();

    let format = file_path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_lowercase();

    let producer = ProducerInfo {
        app_name: env!("CARGO_PKG_NAME").to_owned(),
        app_version: env!("CARGO_PKG_VERSION").to_owned(),
        platform: std::env::consts::OS.to_owned(),
    };

    let artifact = ArtifactInfo {
        filename,
        format,
        file_size_bytes: metadata.len(),
        stage: stage.to_owned(),
    };

    let integrity = IntegrityInfo {
        hash_algorithm: HASH_ALGORITHM.to_owned(),
        hash,
    };

    Ok(ArtifactReceipt {
        receipt_version: RECEIPT_VERSION,
        created_utc: Utc::now(),
        producer,
        artifact,
        integrity,
    })
}

/// Save a receipt as `<file>.receipt.json` next to the artifact.
///
/// Returns the path to the saved receipt file.
///
/// # Errors
///
/// Returns error if JSON serialization or the write fails.
pub fn save_receipt(receipt: &ArtifactReceipt, artifact_path: &Path) -> Result<PathBuf> {
    let mut file_name = artifact_path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    file_name.push(".receipt.json");
    let receipt_path = artifact_path.with_file_name(file_name);

    let json = serde_json::to_string_pretty(receipt).context("Failed to serialize receipt")?;

    fs::write(&receipt_path, json)
        .with_context(|| format!("Failed to write receipt to {}", receipt_path.display()))?;

    Ok(receipt_path)
}
