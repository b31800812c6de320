//! Provisioning orchestrator.
//!
//! One run resolves every component archive from the version manifest,
//! streams it through the unpack pipeline into the module directory, and
//! records completion with the marker file:
//!
//! 1. No manifest next to the module: nothing to do.
//! 2. Marker present: nothing to do (unless forced).
//! 3. For each component in order: look up the version, fetch the archive,
//!    verify it when the manifest records a digest, then unpack and install
//!    its runtime libraries.
//! 4. Write the marker.
//!
//! Any failure aborts the run before the marker is written, so the next run
//! retries every component.

use crate::artefact::download::{ArchiveFetcher, ArchiveStream, HttpFetcher, ensure_non_empty};
use crate::artefact::extraction::{ExtractionError, unpack};
use crate::artefact::naming::ArchiveLocation;
use crate::artefact::sha256_digest::{HashingReader, Sha256Digest};
use crate::component::ComponentId;
use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::install::{EntryFilter, InstallError, InstallSummary, LibraryInstaller};
use crate::manifest::VersionManifest;
use crate::marker::CompletionMarker;
use crate::output::{component_summary, write_stderr_line};
use crate::platform::Platform;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, BufReader, Seek, Write};

/// Inputs of one provisioning run.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionRequest<'a> {
    /// Directory holding the native module, the manifest and the marker.
    pub module_dir: &'a Utf8Path,
    /// The resolved target platform.
    pub platform: Platform,
    /// Run settings.
    pub config: &'a ProvisionConfig,
    /// Provision again even when the marker is present.
    pub force: bool,
}

impl ProvisionRequest<'_> {
    fn manifest_path(&self) -> Utf8PathBuf {
        self.module_dir.join(&self.config.manifest_file)
    }

    fn marker(&self) -> CompletionMarker {
        CompletionMarker::at(self.module_dir, &self.config.marker_file)
    }
}

/// What one component contributed to the module directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentReport {
    /// The component.
    pub component: ComponentId,
    /// The archive it was installed from.
    pub url: String,
    /// Files and links installed.
    pub summary: InstallSummary,
}

/// The outcome of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The module ships no version manifest; nothing was done.
    NotApplicable {
        /// Where the manifest was looked for.
        manifest: Utf8PathBuf,
    },
    /// A previous run completed; nothing was done.
    AlreadyProvisioned {
        /// The marker that short-circuited the run.
        marker: Utf8PathBuf,
    },
    /// Every component was installed and the marker written.
    Provisioned {
        /// Per-component reports, in install order.
        components: Vec<ComponentReport>,
    },
}

/// One archive a run would fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedArchive {
    /// Where the archive lives.
    pub location: ArchiveLocation,
    /// Digest recorded in the manifest, if any.
    pub digest: Option<Sha256Digest>,
}

/// Everything a run would do, resolved without network or disk writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionPlan {
    /// Directory the libraries would be installed into.
    pub module_dir: Utf8PathBuf,
    /// The target platform.
    pub platform: Platform,
    /// Whether the marker would short-circuit the run.
    pub marker_present: bool,
    /// Archives in install order.
    pub archives: Vec<PlannedArchive>,
}

/// Resolve the archives a run would fetch.
///
/// Returns `Ok(None)` when the module ships no version manifest. A present
/// marker yields a plan with no archives, as the run itself would fetch none.
///
/// # Errors
///
/// Returns an error when the manifest is malformed or lacks an entry for a
/// configured component.
pub fn plan(request: &ProvisionRequest<'_>) -> Result<Option<ProvisionPlan>> {
    let Some(manifest) = VersionManifest::load(&request.manifest_path())? else {
        return Ok(None);
    };
    let marker_present = request.marker().is_present() && !request.force;
    let archives = if marker_present {
        Vec::new()
    } else {
        request
            .config
            .components
            .iter()
            .map(|component| planned_archive(request, &manifest, component))
            .collect::<Result<Vec<_>>>()?
    };
    Ok(Some(ProvisionPlan {
        module_dir: request.module_dir.to_owned(),
        platform: request.platform,
        marker_present,
        archives,
    }))
}

/// Provision the module directory using the production HTTP fetcher.
///
/// # Errors
///
/// Returns the first fatal error; the marker is not written in that case.
pub fn provision(
    request: &ProvisionRequest<'_>,
    stderr: &mut dyn Write,
) -> Result<ProvisionOutcome> {
    let fetcher = HttpFetcher::new(request.config.fetch_timeout);
    provision_with(request, &fetcher, stderr)
}

/// Testable inner function with an injected fetcher.
///
/// # Errors
///
/// Returns the first fatal error; the marker is not written in that case.
pub fn provision_with(
    request: &ProvisionRequest<'_>,
    fetcher: &dyn ArchiveFetcher,
    stderr: &mut dyn Write,
) -> Result<ProvisionOutcome> {
    let manifest_path = request.manifest_path();
    if !manifest_path.exists() {
        info!("no version manifest at {manifest_path}; nothing to provision");
        return Ok(ProvisionOutcome::NotApplicable {
            manifest: manifest_path,
        });
    }

    let marker = request.marker();
    if request.force {
        marker.clear()?;
    } else if marker.is_present() {
        info!("{} exists; libraries already provisioned", marker.path());
        return Ok(ProvisionOutcome::AlreadyProvisioned {
            marker: marker.path().to_owned(),
        });
    }

    let Some(manifest) = VersionManifest::load(&manifest_path)? else {
        return Ok(ProvisionOutcome::NotApplicable {
            manifest: manifest_path,
        });
    };

    let quiet = request.config.quiet;
    let naming = request.platform.naming();
    if !quiet {
        let ids: Vec<&str> = request
            .config
            .components
            .iter()
            .map(ComponentId::as_str)
            .collect();
        write_stderr_line(
            stderr,
            format!(
                "Downloading components {} for {} - {}",
                ids.join(", "),
                naming.vendor_arch(),
                naming.vendor_os()
            ),
        );
    }

    let mut components = Vec::with_capacity(request.config.components.len());
    for component in &request.config.components {
        let archive = planned_archive(request, &manifest, component)?;
        let report = install_component(request, &archive, fetcher, stderr)?;
        if !quiet {
            write_stderr_line(stderr, component_summary(&report));
        }
        components.push(report);
    }

    marker.write()?;
    debug!("wrote {}", marker.path());
    if !quiet {
        write_stderr_line(stderr, "Done");
    }
    Ok(ProvisionOutcome::Provisioned { components })
}

fn planned_archive(
    request: &ProvisionRequest<'_>,
    manifest: &VersionManifest,
    component: &ComponentId,
) -> Result<PlannedArchive> {
    let naming = request.platform.naming();
    let version = manifest.version(component)?;
    Ok(PlannedArchive {
        location: ArchiveLocation::new(&request.config.repo_url, component, naming, version),
        digest: manifest.archive_digest(component, &naming.subfolder()),
    })
}

fn install_component(
    request: &ProvisionRequest<'_>,
    archive: &PlannedArchive,
    fetcher: &dyn ArchiveFetcher,
    stderr: &mut dyn Write,
) -> Result<ComponentReport> {
    let quiet = request.config.quiet;
    let url = archive.location.url();
    let component = archive.location.component();

    if !quiet {
        write_stderr_line(stderr, format!("Downloading {url}..."));
    }
    let stream = ensure_non_empty(&url, fetcher.fetch(&url)?)?;
    let stream: ArchiveStream = match &archive.digest {
        Some(expected) => Box::new(BufReader::new(verified_spool(
            component, &url, expected, stream,
        )?)),
        None => stream,
    };
    if !quiet {
        write_stderr_line(stderr, "Extracting...");
    }

    let filter = EntryFilter::new(
        request.platform.naming().library_ext(),
        request.config.exclude_stubs,
    );
    let mut installer = LibraryInstaller::new(request.module_dir, filter, quiet, stderr);
    let install_err = |source: InstallError| ProvisionError::Install {
        component: component.clone(),
        source,
    };

    let entries = unpack(stream, &mut installer).map_err(install_err)?;
    if entries == 0 {
        warn!("{url} contained no recognisable archive entries");
    }

    let summary = installer.finish().map_err(install_err)?;
    Ok(ComponentReport {
        component: component.clone(),
        url,
        summary,
    })
}

/// Spool the whole archive to an anonymous file while hashing it, and hand
/// the file back only when the digest matches. Nothing reaches the module
/// directory before verification.
fn verified_spool(
    component: &ComponentId,
    url: &str,
    expected: &Sha256Digest,
    stream: ArchiveStream,
) -> Result<File> {
    let io_err = |err: io::Error| ProvisionError::Install {
        component: component.clone(),
        source: ExtractionError::Io(err).into(),
    };

    let mut spool = tempfile::tempfile().map_err(io_err)?;
    let mut hashing = HashingReader::new(stream);
    io::copy(&mut hashing, &mut spool).map_err(io_err)?;
    let actual = hashing.finish().map_err(io_err)?;
    if actual != *expected {
        return Err(ProvisionError::ChecksumMismatch {
            url: url.to_owned(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    debug!("{url} matches sha256 {actual}");

    spool.rewind().map_err(io_err)?;
    Ok(spool)
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
