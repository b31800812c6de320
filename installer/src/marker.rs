//! Completion marker gating repeated runs.
//!
//! The marker is written only once every component has been installed, so
//! its presence means the module directory is complete. Its absence after a
//! failed run makes the next run start over from the first component.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;

/// Default marker filename inside the module directory.
pub const MARKER_FILE: &str = "cudadeps.done";

const MARKER_CONTENT: &str = "done";

/// The sentinel file recording a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMarker {
    path: Utf8PathBuf,
}

impl CompletionMarker {
    /// The marker named `file_name` inside `dir`.
    #[must_use]
    pub fn at(dir: &Utf8Path, file_name: &str) -> Self {
        Self {
            path: dir.join(file_name),
        }
    }

    /// Path of the marker file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Return true when a previous run completed.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.path.exists()
    }

    /// Record a completed run.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self) -> io::Result<()> {
        fs::write(&self.path, MARKER_CONTENT)
    }

    /// Remove the marker so the next run provisions again. A missing marker
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing marker cannot be removed.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}
