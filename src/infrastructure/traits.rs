//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with in-memory implementations.

use std::io;
use std::path::Path;

use crate::application::ApplicationResult;
use crate::domain::Snapshot;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Rename/move a file.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// Document store holding the distributor, customer and purchase collections.
///
/// `load` always returns a complete point-in-time snapshot; there is no
/// partial or incremental read.
pub trait SnapshotStore: Send + Sync {
    /// Read the full current snapshot.
    fn load(&self) -> ApplicationResult<Snapshot>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &Snapshot) -> ApplicationResult<()>;

    /// Human-readable location for messages.
    fn location(&self) -> String;
}

/// Editor abstraction for opening files.
pub trait Editor: Send + Sync {
    /// Open a file in the editor.
    /// Blocks until editor exits.
    fn open(&self, path: &Path) -> io::Result<()>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Real editor implementation using $EDITOR, $VISUAL, or vim.
#[derive(Debug, Default)]
pub struct EnvironmentEditor;

impl Editor for EnvironmentEditor {
    fn open(&self, path: &Path) -> io::Result<()> {
        use std::process::Command;

        // Determine editor: $VISUAL > $EDITOR > vim
        let editor = std::env::var("VISUAL")
            .or_else(|_| std::env::var("EDITOR"))
            .unwrap_or_else(|_| "vim".to_string());

        let status = Command::new(&editor).arg(path).status()?;

        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("editor exited with status: {}", status),
            ))
        }
    }
}
