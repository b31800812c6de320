//! Provisioning configuration.
//!
//! Every constant the run depends on lives in [`ProvisionConfig`], which is
//! built once (from the command line in the binary) and passed down by
//! reference.

use crate::artefact::download::DEFAULT_FETCH_TIMEOUT;
use crate::artefact::naming::DEFAULT_REPO_URL;
use crate::component::ComponentId;
use crate::manifest::MANIFEST_FILE;
use crate::marker::MARKER_FILE;
use std::time::Duration;

/// Settings for one provisioning run.
///
/// # Examples
///
/// ```
/// use cudadeps::config::ProvisionConfig;
///
/// let config = ProvisionConfig::default();
/// assert_eq!(config.manifest_file, "cuda_version.json");
/// assert_eq!(config.marker_file, "cudadeps.done");
/// assert!(config.exclude_stubs);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// Base URL of the redistribution repository.
    pub repo_url: String,
    /// Components to provision, in order.
    pub components: Vec<ComponentId>,
    /// Manifest filename inside the module directory.
    pub manifest_file: String,
    /// Marker filename inside the module directory.
    pub marker_file: String,
    /// Skip libraries under `stubs` directories.
    pub exclude_stubs: bool,
    /// Overall deadline for each archive download.
    pub fetch_timeout: Duration,
    /// Suppress progress output.
    pub quiet: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            repo_url: DEFAULT_REPO_URL.to_owned(),
            components: ComponentId::defaults(),
            manifest_file: MANIFEST_FILE.to_owned(),
            marker_file: MARKER_FILE.to_owned(),
            exclude_stubs: true,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            quiet: false,
        }
    }
}
