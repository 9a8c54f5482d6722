//! CSV report downloads.
//!
//! At most one download per report kind is in flight; different kinds run
//! independently. Bytes land in a temp file next to the destination and are
//! only renamed into place once fully written.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::api::types::ReportKind;
use crate::error::AppError;

#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn fetch_report(&self, kind: ReportKind) -> Result<Vec<u8>, AppError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Saved { path: String, bytes: usize },
    AlreadyInFlight,
}

/// `report-<kind>-<unix-millis>.csv`
pub fn report_file_name(kind: ReportKind, unix_millis: i64) -> String {
    format!("report-{}-{}.csv", kind, unix_millis)
}

/// Write `bytes` to `dir/file_name` via a temp file in the same directory.
/// The temp file is removed if anything fails before the rename.
pub fn save_report(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::Io(format!("Failed to create {}: {}", dir.display(), e)))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| AppError::Io(format!("Failed to create temp file in {}: {}", dir.display(), e)))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| AppError::Io(format!("Failed to write report: {}", e)))?;

    let target = dir.join(file_name);
    tmp.persist(&target)
        .map_err(|e| AppError::Io(format!("Failed to save {}: {}", target.display(), e.error)))?;
    Ok(target)
}

fn lock(set: &Mutex<HashSet<ReportKind>>) -> MutexGuard<'_, HashSet<ReportKind>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds a kind's in-flight slot; frees it on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<ReportKind>>,
    kind: ReportKind,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<ReportKind>>, kind: ReportKind) -> Option<Self> {
        lock(set).insert(kind).then_some(Self { set, kind })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.kind);
    }
}

pub struct ReportDownloader<S> {
    source: S,
    in_flight: Mutex<HashSet<ReportKind>>,
}

impl<S: ReportSource> ReportDownloader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_in_flight(&self, kind: ReportKind) -> bool {
        lock(&self.in_flight).contains(&kind)
    }

    pub async fn download(&self, kind: ReportKind, dir: &Path) -> Result<DownloadOutcome, AppError> {
        let Some(_slot) = InFlight::acquire(&self.in_flight, kind) else {
            info!("Report '{}' already downloading, ignoring", kind);
            return Ok(DownloadOutcome::AlreadyInFlight);
        };

        info!("Downloading report '{}'", kind);
        let bytes = self.source.fetch_report(kind).await.map_err(|e| {
            warn!("Report '{}' failed: {}", kind, e);
            e
        })?;

        let name = report_file_name(kind, Utc::now().timestamp_millis());
        let path = save_report(dir, &name, &bytes)?;
        info!("Saved report '{}' ({} bytes) to {}", kind, bytes.len(), path.display());
        Ok(DownloadOutcome::Saved {
            path: path.to_string_lossy().to_string(),
            bytes: bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name(ReportKind::Usage, 1_700_000_000_123),
            "report-usage-1700000000123.csv"
        );
    }

    #[test]
    fn test_save_report_leaves_only_target() {
        let dir = TempDir::new().unwrap();
        let path = save_report(dir.path(), "report-users-1.csv", b"id,email\n1,a@x\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,email\n1,a@x\n");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_save_report_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("reports").join("2025");
        let path = save_report(&nested, "r.csv", b"x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_in_flight_slot_released_on_drop() {
        let set = Mutex::new(HashSet::new());
        let slot = InFlight::acquire(&set, ReportKind::Usage).unwrap();
        assert!(InFlight::acquire(&set, ReportKind::Usage).is_none());
        assert!(InFlight::acquire(&set, ReportKind::Recipes).is_some());
        drop(slot);
        assert!(InFlight::acquire(&set, ReportKind::Usage).is_some());
    }
}
