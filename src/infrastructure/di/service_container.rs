//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::GenealogyService;
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::infrastructure::snapshot::JsonSnapshotStore;
use crate::infrastructure::traits::{
    Editor, EnvironmentEditor, FileSystem, RealFileSystem, SnapshotStore,
};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Snapshot source the genealogy is built from
    pub store: Arc<dyn SnapshotStore>,

    /// Editor for config files
    pub editor: Arc<dyn Editor>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    ///
    /// Snapshots are read from `settings.snapshot_path`.
    pub fn new(settings: Settings) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let store = Arc::new(JsonSnapshotStore::new(
            fs.clone(),
            settings.snapshot_path.clone(),
        ));
        Self::with_deps(settings, fs, store, Arc::new(EnvironmentEditor))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        store: Arc<dyn SnapshotStore>,
        editor: Arc<dyn Editor>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            fs,
            store,
            editor,
        }
    }

    /// Genealogy service configured from settings, not yet loaded.
    pub fn genealogy_service(&self) -> ApplicationResult<GenealogyService> {
        let ladder = self.settings.rank_ladder()?;
        Ok(GenealogyService::new(
            self.store.clone(),
            ladder,
            self.settings.tree_options(),
        ))
    }
}
