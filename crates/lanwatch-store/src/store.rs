//! Scan storage: trait plus file-backed implementation.
//!
//! Scans are stored as one directory per scan run:
//! ```text
//! {root}/
//!   {scan_id}/
//!     scan.json
//!     batch-000000.json
//!     batch-000001.json
//! ```
//!
//! Every file is written to a `.tmp` sibling first and renamed into
//! place, so readers only ever see complete files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lanwatch_core::{DeviceRecord, ScanId, ScanRecord, Starter};
use serde::{Deserialize, Serialize};

/// Page size used when a listing does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

const SCAN_FILE: &str = "scan.json";
const BATCH_PREFIX: &str = "batch-";

/// Errors that can occur during scan storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Scan not found: {0}")]
    NotFound(ScanId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pagination and filter parameters for listing scans.
#[derive(Debug, Clone)]
pub struct ScanQuery {
    /// Number of scans to skip (newest first).
    pub offset: usize,
    /// Maximum number of scans to return.
    pub limit: usize,
    /// Only include scans with this starter.
    pub starter: Option<Starter>,
}

impl Default for ScanQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
            starter: None,
        }
    }
}

/// Trait for scan persistence backends.
///
/// Each call is one unit of work: an insert either lands completely or
/// not at all.
pub trait ScanStore: Send + Sync {
    /// Create a new scan record stamped with its start time and starter.
    fn create_scan(&self, starter: Starter, start: DateTime<Utc>)
        -> Result<ScanRecord, StoreError>;

    /// Bulk-insert one batch of devices for a scan.
    fn insert_devices(&self, scan_id: ScanId, devices: &[DeviceRecord]) -> Result<(), StoreError>;

    /// Stamp the scan's finish time.
    fn finish_scan(&self, scan_id: ScanId, finish: DateTime<Utc>)
        -> Result<ScanRecord, StoreError>;

    /// Retrieve a scan record by ID.
    fn get_scan(&self, scan_id: ScanId) -> Result<ScanRecord, StoreError>;

    /// List scans matching the query, ordered by start time descending.
    /// Scans whose record cannot be read are skipped.
    fn list_scans(&self, query: &ScanQuery) -> Result<Vec<ScanRecord>, StoreError>;

    /// All devices stored for a scan, in insertion order.
    fn devices(&self, scan_id: ScanId) -> Result<Vec<DeviceRecord>, StoreError>;
}

/// On-disk shape of one inserted batch.
#[derive(Debug, Serialize, Deserialize)]
struct StoredBatch {
    scan_id: ScanId,
    inserted_at: DateTime<Utc>,
    devices: Vec<DeviceRecord>,
}

/// File-system backed scan store.
pub struct FileScanStore {
    root: PathBuf,
}

impl FileScanStore {
    /// Create a new store rooted at the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan_dir(&self, scan_id: ScanId) -> PathBuf {
        self.root.join(scan_id.0.to_string())
    }

    fn existing_scan_dir(&self, scan_id: ScanId) -> Result<PathBuf, StoreError> {
        let dir = self.scan_dir(scan_id);
        if dir.join(SCAN_FILE).is_file() {
            Ok(dir)
        } else {
            Err(StoreError::NotFound(scan_id))
        }
    }

    fn read_scan(dir: &Path) -> Result<ScanRecord, StoreError> {
        let json = fs::read_to_string(dir.join(SCAN_FILE))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write_scan(dir: &Path, scan: &ScanRecord) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(scan)?;
        write_atomic(&dir.join(SCAN_FILE), &json)
    }
}

impl ScanStore for FileScanStore {
    fn create_scan(
        &self,
        starter: Starter,
        start: DateTime<Utc>,
    ) -> Result<ScanRecord, StoreError> {
        let scan = ScanRecord::new(starter, start);
        let dir = self.scan_dir(scan.id);
        fs::create_dir_all(&dir)?;
        Self::write_scan(&dir, &scan)?;

        tracing::debug!(
            scan_id = %scan.id,
            starter = %scan.starter,
            path = %dir.display(),
            "Scan record created"
        );

        Ok(scan)
    }

    fn insert_devices(&self, scan_id: ScanId, devices: &[DeviceRecord]) -> Result<(), StoreError> {
        let dir = self.existing_scan_dir(scan_id)?;
        let index = batch_files(&dir)?.len();
        let path = dir.join(format!("{BATCH_PREFIX}{index:06}.json"));

        let batch = StoredBatch {
            scan_id,
            inserted_at: Utc::now(),
            devices: devices.to_vec(),
        };
        let json = serde_json::to_vec(&batch)?;
        write_atomic(&path, &json)?;

        tracing::debug!(
            scan_id = %scan_id,
            batch = index,
            devices = devices.len(),
            "Device batch stored"
        );

        Ok(())
    }

    fn finish_scan(
        &self,
        scan_id: ScanId,
        finish: DateTime<Utc>,
    ) -> Result<ScanRecord, StoreError> {
        let dir = self.existing_scan_dir(scan_id)?;
        let mut scan = Self::read_scan(&dir)?;
        scan.finish = Some(finish);
        Self::write_scan(&dir, &scan)?;
        Ok(scan)
    }

    fn get_scan(&self, scan_id: ScanId) -> Result<ScanRecord, StoreError> {
        let dir = self.existing_scan_dir(scan_id)?;
        Self::read_scan(&dir)
    }

    fn list_scans(&self, query: &ScanQuery) -> Result<Vec<ScanRecord>, StoreError> {
        let mut results = Vec::new();

        for entry in fs::read_dir(&self.root)?.flatten() {
            let dir = entry.path();
            if !dir.join(SCAN_FILE).is_file() {
                continue;
            }
            let scan = match Self::read_scan(&dir) {
                Ok(scan) => scan,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "Skipping unreadable scan");
                    continue;
                }
            };
            if query.starter.map_or(true, |s| s == scan.starter) {
                results.push(scan);
            }
        }

        results.sort_by(|a, b| b.start.cmp(&a.start));

        Ok(results
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    fn devices(&self, scan_id: ScanId) -> Result<Vec<DeviceRecord>, StoreError> {
        let dir = self.existing_scan_dir(scan_id)?;
        let mut devices = Vec::new();
        for path in batch_files(&dir)? {
            let json = fs::read_to_string(&path)?;
            let batch: StoredBatch = serde_json::from_str(&json)?;
            devices.extend(batch.devices);
        }
        Ok(devices)
    }
}

/// Batch files of a scan directory, sorted by batch index.
fn batch_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension().and_then(|e| e.to_str()) == Some("json")
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(BATCH_PREFIX))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Write `contents` to a temp file and rename it over `path`.
/// On failure the temp file is removed and nothing is left at `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    let written = fs::write(&tmp, contents).and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
