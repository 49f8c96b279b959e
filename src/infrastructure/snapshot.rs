//! Snapshot store implementations

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::Snapshot;
use crate::infrastructure::traits::{FileSystem, SnapshotStore};

/// Snapshot kept as a single JSON document on disk.
///
/// ```json
/// { "distributors": [...], "customers": [...], "purchases": [...] }
/// ```
pub struct JsonSnapshotStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> ApplicationResult<Snapshot> {
        if !self.fs.exists(&self.path) {
            return Err(ApplicationError::SnapshotNotFound(self.path.clone()));
        }
        let content = self
            .fs
            .read_to_string(&self.path)
            .with_path_context("read snapshot", &self.path)?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|e| ApplicationError::InvalidSnapshot {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        debug!(
            "loaded snapshot {}: {} distributors, {} customers, {} purchases",
            self.path.display(),
            snapshot.distributors.len(),
            snapshot.customers.len(),
            snapshot.purchases.len()
        );
        Ok(snapshot)
    }

    /// Writes to a sibling temp file first so readers never see a torn document.
    fn save(&self, snapshot: &Snapshot) -> ApplicationResult<()> {
        let content = serde_json::to_string_pretty(snapshot).map_err(|e| {
            ApplicationError::OperationFailed {
                context: format!("serialize snapshot {}", self.path.display()),
                source: Box::new(e),
            }
        })?;
        self.fs
            .ensure_parent(&self.path)
            .with_path_context("create snapshot directory", &self.path)?;
        let tmp = self.path.with_extension("json.tmp");
        self.fs
            .write(&tmp, &content)
            .with_path_context("write snapshot", &tmp)?;
        self.fs
            .rename(&tmp, &self.path)
            .with_path_context("replace snapshot", &self.path)?;
        debug!("saved snapshot {}", self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Snapshot held in memory, for hosts that push snapshots and for tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Snapshot>,
}

impl MemorySnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    /// Copy of the currently stored snapshot.
    pub fn current(&self) -> Snapshot {
        self.snapshot
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> ApplicationResult<Snapshot> {
        Ok(self.current())
    }

    fn save(&self, snapshot: &Snapshot) -> ApplicationResult<()> {
        let mut guard = self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = snapshot.clone();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
