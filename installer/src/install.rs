//! Entry filtering and flat installation of runtime libraries.
//!
//! Component archives carry headers, static libraries, documentation and
//! link-time stubs next to the shared objects the native module loads. The
//! [`EntryFilter`] keeps only the latter, and the [`LibraryInstaller`] writes
//! them into the target directory under their basename.
//!
//! Files are streamed to disk as the archive is read. Link entries are held
//! back until the archive is exhausted, then hard links are created before
//! symbolic links, so every link is made after the file it refers to.

use crate::artefact::extraction::{ArchiveEntry, EntryKind, EntrySink, ExtractionError};
use crate::output::write_stderr_line;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace, warn};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read, Write};

/// Directory name holding link-time stub libraries.
const STUBS_DIR: &str = "stubs";

/// Errors raised while installing the libraries of one archive.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The archive could not be read.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Writing a file or creating a link failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The destination path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A hard link refers to a file that was not installed.
    #[error("hard link {link} refers to {target}, which was not installed")]
    LinkTargetMissing {
        /// Basename of the link.
        link: String,
        /// Link target as recorded in the archive.
        target: String,
    },
}

/// Decides which archive entries are runtime libraries.
///
/// An entry is kept when its basename ends with the library extension, or
/// carries the extension followed by a purely numeric version suffix
/// (`libcudart.so.12.4.127`). Matching is case-insensitive. Entries under a
/// `stubs` directory are rejected unless stub exclusion is switched off.
///
/// # Examples
///
/// ```
/// use cudadeps::artefact::extraction::EntryKind;
/// use cudadeps::install::EntryFilter;
///
/// let filter = EntryFilter::new(".so", true);
/// assert!(filter.accepts("lib/libcublas.so.12", EntryKind::File));
/// assert!(!filter.accepts("lib/stubs/libcuda.so", EntryKind::File));
/// assert!(!filter.accepts("lib/libcublas.so.txt", EntryKind::File));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    library_ext: String,
    exclude_stubs: bool,
}

impl EntryFilter {
    /// Create a filter for `library_ext` (for example `.so` or `.dll`).
    #[must_use]
    pub fn new(library_ext: &str, exclude_stubs: bool) -> Self {
        Self {
            library_ext: library_ext.to_ascii_lowercase(),
            exclude_stubs,
        }
    }

    /// Return true when an entry of `kind` at `path` should be installed.
    #[must_use]
    pub fn accepts(&self, path: &str, kind: EntryKind) -> bool {
        if !matches!(
            kind,
            EntryKind::File | EntryKind::Symlink | EntryKind::HardLink
        ) {
            return false;
        }
        let Some(name) = basename(path) else {
            return false;
        };
        if self.exclude_stubs && in_stubs_dir(path) {
            return false;
        }
        has_library_ext(&name.to_ascii_lowercase(), &self.library_ext)
    }
}

/// Return the last path segment, treating `/` and `\` alike.
///
/// Empty, `.` and `..` basenames yield `None`.
#[must_use]
pub fn basename(path: &str) -> Option<&str> {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|name| !matches!(*name, "" | "." | ".."))
}

fn in_stubs_dir(path: &str) -> bool {
    let mut segments: Vec<&str> = path.split(['/', '\\']).collect();
    segments.pop();
    segments
        .iter()
        .any(|segment| segment.eq_ignore_ascii_case(STUBS_DIR))
}

fn has_library_ext(name: &str, ext: &str) -> bool {
    name.match_indices(ext).any(|(index, matched)| {
        name.get(index + matched.len()..)
            .is_some_and(|rest| rest.is_empty() || is_numeric_version_suffix(rest))
    })
}

/// `.12`, `.12.4.127` and so on.
fn is_numeric_version_suffix(rest: &str) -> bool {
    rest.strip_prefix('.').is_some_and(|version| {
        version
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// Counts reported once an archive has been installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallSummary {
    /// Regular files written.
    pub files: usize,
    /// Hard and symbolic links created.
    pub links: usize,
}

#[derive(Debug)]
struct DeferredLink {
    kind: EntryKind,
    name: String,
    target: String,
}

/// An [`EntrySink`] that installs accepted entries flat into a directory.
///
/// Call [`LibraryInstaller::finish`] after the archive has been unpacked to
/// create the deferred links.
pub struct LibraryInstaller<'a> {
    target_dir: Utf8PathBuf,
    filter: EntryFilter,
    quiet: bool,
    stderr: &'a mut dyn Write,
    installed: BTreeSet<String>,
    deferred: Vec<DeferredLink>,
    files: usize,
}

impl<'a> LibraryInstaller<'a> {
    /// Create an installer writing into `target_dir`.
    ///
    /// Progress lines go to `stderr` unless `quiet` is set.
    #[must_use]
    pub fn new(
        target_dir: &Utf8Path,
        filter: EntryFilter,
        quiet: bool,
        stderr: &'a mut dyn Write,
    ) -> Self {
        Self {
            target_dir: target_dir.to_owned(),
            filter,
            quiet,
            stderr,
            installed: BTreeSet::new(),
            deferred: Vec::new(),
            files: 0,
        }
    }

    /// Create the deferred links and report what was installed.
    ///
    /// # Errors
    ///
    /// Returns an error when a hard link refers to a file that was not
    /// installed, or when creating a link fails.
    pub fn finish(mut self) -> Result<InstallSummary, InstallError> {
        let deferred = std::mem::take(&mut self.deferred);
        let (hard, soft): (Vec<_>, Vec<_>) = deferred
            .into_iter()
            .partition(|link| link.kind == EntryKind::HardLink);

        let mut links = 0;
        for link in &hard {
            if self.create_hard_link(link)? {
                links += 1;
            }
        }
        for link in &soft {
            self.create_symlink(link)?;
            links += 1;
        }

        Ok(InstallSummary {
            files: self.files,
            links,
        })
    }

    fn write_file(
        &mut self,
        name: &str,
        mode: u32,
        data: &mut dyn Read,
    ) -> Result<(), InstallError> {
        let dest = self.target_dir.join(name);
        self.progress(&dest);
        write_streamed(&dest, mode, data).map_err(|source| InstallError::Write {
            path: dest.clone(),
            source,
        })?;
        self.installed.insert(name.to_owned());
        self.files += 1;
        Ok(())
    }

    /// Returns false when the link would replace its own target.
    fn create_hard_link(&mut self, link: &DeferredLink) -> Result<bool, InstallError> {
        let target_name = basename(&link.target)
            .filter(|name| self.installed.contains(*name))
            .ok_or_else(|| InstallError::LinkTargetMissing {
                link: link.name.clone(),
                target: link.target.clone(),
            })?;
        if target_name == link.name {
            debug!("hard link {} flattens onto its own target", link.name);
            return Ok(false);
        }

        let source = self.target_dir.join(target_name);
        let dest = self.target_dir.join(&link.name);
        self.progress(&dest);
        remove_existing(&dest)
            .and_then(|()| fs::hard_link(&source, &dest))
            .map_err(|source| InstallError::Write {
                path: dest.clone(),
                source,
            })?;
        self.installed.insert(link.name.clone());
        Ok(true)
    }

    fn create_symlink(&mut self, link: &DeferredLink) -> Result<(), InstallError> {
        let dest = self.target_dir.join(&link.name);
        self.progress(&dest);
        remove_existing(&dest)
            .and_then(|()| symlink(&link.target, &dest))
            .map_err(|source| InstallError::Write {
                path: dest.clone(),
                source,
            })?;
        self.installed.insert(link.name.clone());
        Ok(())
    }

    fn progress(&mut self, dest: &Utf8Path) {
        if !self.quiet {
            write_stderr_line(self.stderr, format!("Writing {dest}"));
        }
    }
}

impl EntrySink for LibraryInstaller<'_> {
    type Error = InstallError;

    fn accept(&mut self, mut entry: ArchiveEntry<'_>) -> Result<(), Self::Error> {
        if !self.filter.accepts(entry.path(), entry.kind()) {
            trace!("skipping {} ({})", entry.path(), entry.kind());
            return Ok(());
        }
        let Some(name) = basename(entry.path()).map(str::to_owned) else {
            return Ok(());
        };

        let kind = entry.kind();
        if kind == EntryKind::File {
            let mode = entry.mode();
            return self.write_file(&name, mode, entry.data());
        }
        match entry.link_target() {
            Some(target) => {
                debug!("deferring {kind} {name} -> {target}");
                self.deferred.push(DeferredLink {
                    kind,
                    name,
                    target: target.to_owned(),
                });
            }
            None => warn!("{kind} entry {} has no link target; skipped", entry.path()),
        }
        Ok(())
    }
}

/// Replace whatever sits at `dest` rather than writing through it.
fn remove_existing(dest: &Utf8Path) -> io::Result<()> {
    match fs::symlink_metadata(dest) {
        Ok(_) => fs::remove_file(dest),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn write_streamed(dest: &Utf8Path, mode: u32, data: &mut dyn Read) -> io::Result<()> {
    remove_existing(dest)?;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)?;
    io::copy(data, &mut file)?;
    file.flush()?;
    apply_mode(dest, mode)
}

#[cfg(unix)]
fn apply_mode(dest: &Utf8Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if mode == 0 {
        return Ok(());
    }
    fs::set_permissions(dest, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_mode(_dest: &Utf8Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &str, dest: &Utf8Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(windows)]
fn symlink(target: &str, dest: &Utf8Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, dest)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &str, _dest: &Utf8Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
