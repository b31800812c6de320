//! Version manifest shipped next to the native module.
//!
//! The build that produced the native module records the vendor release of
//! every runtime component it links against in `cuda_version.json`:
//!
//! ```json
//! {
//!   "libcublas": { "version": "12.4.5.8" },
//!   "cuda_cudart": {
//!     "version": "12.4.127",
//!     "linux-x86_64": { "sha256": "..." }
//!   }
//! }
//! ```
//!
//! Only `version` is required. Entries may carry further fields in the shape
//! of the vendor's redistrib manifests; a per-platform `sha256` is used to
//! verify the downloaded archive.

use crate::artefact::sha256_digest::Sha256Digest;
use crate::component::ComponentId;
use crate::error::{ProvisionError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::warn;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;

/// Default manifest filename inside the module directory.
pub const MANIFEST_FILE: &str = "cuda_version.json";

/// One component entry of the manifest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentRelease {
    version: String,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl ComponentRelease {
    /// The vendor release string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Fields other than `version`, as recorded.
    #[must_use]
    pub fn extra(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extra
    }
}

/// The parsed version manifest.
///
/// # Examples
///
/// ```
/// use cudadeps::component::ComponentId;
/// use cudadeps::manifest::VersionManifest;
///
/// let manifest = VersionManifest::from_json(
///     r#"{"libfoo": {"version": "1.2.3"}}"#,
///     "cuda_version.json".into(),
/// )
/// .expect("valid manifest");
/// let version = manifest.version(&ComponentId::from("libfoo")).expect("entry");
/// assert_eq!(version, "1.2.3");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VersionManifest {
    path: Utf8PathBuf,
    components: BTreeMap<String, ComponentRelease>,
}

impl VersionManifest {
    /// Read the manifest at `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist, which means the
    /// module needs no provisioning.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Io`] when the file exists but cannot be
    /// read, and [`ProvisionError::ManifestParse`] when it is not valid.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json, path.to_owned()).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Parse manifest JSON; `path` is kept for error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ManifestParse`] on malformed JSON or an
    /// entry without a string `version`.
    pub fn from_json(json: &str, path: Utf8PathBuf) -> Result<Self> {
        match serde_json::from_str(json) {
            Ok(components) => Ok(Self { path, components }),
            Err(source) => Err(ProvisionError::ManifestParse { path, source }),
        }
    }

    /// Path the manifest was read from.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Look up the entry for `component`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ManifestEntryMissing`] when the manifest has
    /// no entry for the component.
    pub fn release(&self, component: &ComponentId) -> Result<&ComponentRelease> {
        self.components
            .get(component.as_str())
            .ok_or_else(|| ProvisionError::ManifestEntryMissing {
                component: component.clone(),
                path: self.path.clone(),
            })
    }

    /// Look up the version recorded for `component`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ManifestEntryMissing`] when the manifest has
    /// no entry for the component.
    pub fn version(&self, component: &ComponentId) -> Result<&str> {
        self.release(component).map(ComponentRelease::version)
    }

    /// The archive digest recorded for `component` on `subfolder`
    /// (`linux-x86_64` and so on), if any.
    ///
    /// A digest that is present but malformed is ignored with a warning.
    #[must_use]
    pub fn archive_digest(
        &self,
        component: &ComponentId,
        subfolder: &str,
    ) -> Option<Sha256Digest> {
        let raw = self
            .components
            .get(component.as_str())?
            .extra
            .get(subfolder)?
            .get("sha256")?
            .as_str()?;
        match Sha256Digest::try_from(raw) {
            Ok(digest) => Some(digest),
            Err(err) => {
                warn!("ignoring digest for {component} on {subfolder}: {err}");
                None
            }
        }
    }
}
