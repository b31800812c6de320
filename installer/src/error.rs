//! Error types for the provisioning run.
//!
//! Every variant here is fatal: the run stops, the completion marker is not
//! written, and the next invocation starts again from the first component.
//! Formats that the unpack pipelines do not recognise are deliberately absent
//! from this list; they yield zero entries instead of failing.

use crate::artefact::download::DownloadError;
use crate::component::ComponentId;
use crate::install::InstallError;
use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

/// Which half of the platform descriptor failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformField {
    /// The processor architecture identifier.
    Architecture,
    /// The operating system identifier.
    OperatingSystem,
}

impl fmt::Display for PlatformField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Architecture => f.write_str("architecture"),
            Self::OperatingSystem => f.write_str("platform"),
        }
    }
}

/// Errors that abort a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The host architecture or operating system has no vendor mapping.
    #[error("unsupported {field} \"{value}\"; expected one of: {expected}")]
    UnsupportedPlatform {
        /// Which identifier was rejected.
        field: PlatformField,
        /// The rejected identifier.
        value: String,
        /// Comma-separated list of accepted identifiers.
        expected: String,
    },

    /// The version manifest exists but could not be parsed.
    #[error("invalid version manifest at {path}: {source}")]
    ManifestParse {
        /// Path to the manifest file.
        path: Utf8PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A required component has no entry in the version manifest.
    #[error("component {component} is missing from version manifest {path}")]
    ManifestEntryMissing {
        /// The component that was looked up.
        component: ComponentId,
        /// Path to the manifest file.
        path: Utf8PathBuf,
    },

    /// A component archive could not be fetched.
    #[error(transparent)]
    DownloadFailed(#[from] DownloadError),

    /// The fetched archive does not match the digest recorded in the manifest.
    #[error("checksum mismatch for {url}: manifest={expected}, actual={actual}")]
    ChecksumMismatch {
        /// The archive URL.
        url: String,
        /// Digest recorded in the manifest.
        expected: String,
        /// Digest of the bytes actually received.
        actual: String,
    },

    /// Unpacking or writing the libraries of a component failed.
    #[error("failed to install {component}: {source}")]
    Install {
        /// The component being installed.
        component: ComponentId,
        /// The underlying failure.
        #[source]
        source: InstallError,
    },

    /// The native module directory could not be located.
    #[error("native module not found under {project_dir}: {reason}")]
    ModuleNotFound {
        /// The project directory that was searched.
        project_dir: Utf8PathBuf,
        /// Description of what was missing.
        reason: String,
    },

    /// An I/O operation outside archive extraction failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`ProvisionError`].
pub type Result<T> = std::result::Result<T, ProvisionError>;
