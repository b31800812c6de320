//! Shared test utilities for the provisioner crate.
//!
//! Archive builders produce in-memory fixtures for every format the unpack
//! pipelines understand. [`StubFetcher`] serves those fixtures by URL and
//! records each request so tests can count network calls.
//!
//! Builders panic on failure; they only ever run inside tests.

#![allow(clippy::expect_used, reason = "fixture builders fail the test on error")]

use crate::artefact::download::{ArchiveFetcher, ArchiveStream, DownloadError};
use crate::artefact::extraction::{ArchiveEntry, EntryKind, EntrySink, ExtractionError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

/// One entry of a fixture archive.
#[derive(Debug, Clone)]
pub enum FixtureEntry {
    /// A regular file.
    File {
        /// Path inside the archive.
        path: String,
        /// File contents.
        data: Vec<u8>,
        /// Permission bits.
        mode: u32,
    },
    /// A symbolic link.
    Symlink {
        /// Path inside the archive.
        path: String,
        /// Link target, stored verbatim.
        target: String,
    },
    /// A hard link (tar only; zip has no hard links).
    HardLink {
        /// Path inside the archive.
        path: String,
        /// Archive path of the linked entry.
        target: String,
    },
    /// A directory.
    Dir {
        /// Path inside the archive.
        path: String,
    },
}

impl FixtureEntry {
    /// A regular file entry.
    #[must_use]
    pub fn file(path: &str, data: &[u8], mode: u32) -> Self {
        Self::File {
            path: path.to_owned(),
            data: data.to_vec(),
            mode,
        }
    }

    /// A symbolic link entry.
    #[must_use]
    pub fn symlink(path: &str, target: &str) -> Self {
        Self::Symlink {
            path: path.to_owned(),
            target: target.to_owned(),
        }
    }

    /// A hard link entry.
    #[must_use]
    pub fn hard_link(path: &str, target: &str) -> Self {
        Self::HardLink {
            path: path.to_owned(),
            target: target.to_owned(),
        }
    }

    /// A directory entry.
    #[must_use]
    pub fn dir(path: &str) -> Self {
        Self::Dir {
            path: path.to_owned(),
        }
    }
}

/// Build an uncompressed tar stream.
#[must_use]
pub fn tar_archive(entries: &[FixtureEntry]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        match entry {
            FixtureEntry::File { path, data, mode } => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(data.len() as u64);
                header.set_mode(*mode);
                builder
                    .append_data(&mut header, path, data.as_slice())
                    .expect("append file");
            }
            FixtureEntry::Symlink { path, target } => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_size(0);
                header.set_mode(0o777);
                builder
                    .append_link(&mut header, path, target)
                    .expect("append symlink");
            }
            FixtureEntry::HardLink { path, target } => {
                header.set_entry_type(tar::EntryType::Link);
                header.set_size(0);
                header.set_mode(0o644);
                builder
                    .append_link(&mut header, path, target)
                    .expect("append hard link");
            }
            FixtureEntry::Dir { path } => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                builder
                    .append_data(&mut header, path, std::io::empty())
                    .expect("append directory");
            }
        }
    }
    builder.into_inner().expect("finish tar")
}

/// Build a `.tar.xz` archive, the vendor's Linux format.
#[must_use]
pub fn tar_xz_archive(entries: &[FixtureEntry]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder
        .write_all(&tar_archive(entries))
        .expect("xz compress");
    encoder.finish().expect("finish xz")
}

/// Build a `.tar.gz` archive.
#[must_use]
pub fn tar_gz_archive(entries: &[FixtureEntry]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(&tar_archive(entries))
        .expect("gzip compress");
    encoder.finish().expect("finish gzip")
}

/// Build a `.tar.zst` archive.
#[must_use]
pub fn tar_zst_archive(entries: &[FixtureEntry]) -> Vec<u8> {
    zstd::encode_all(tar_archive(entries).as_slice(), 0).expect("zstd compress")
}

/// Pseudo-random bytes that no codec shrinks, for archives large enough to
/// truncate mid-entry.
#[must_use]
pub fn incompressible(len: u32) -> Vec<u8> {
    (0..len)
        .map(|i| {
            let [byte, ..] = (i.wrapping_mul(2_654_435_761) >> 13).to_le_bytes();
            byte
        })
        .collect()
}

/// Build a zip archive, the vendor's Windows format.
///
/// # Panics
///
/// Panics on hard-link entries, which zip cannot represent.
#[must_use]
pub fn zip_archive(entries: &[FixtureEntry]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        match entry {
            FixtureEntry::File { path, data, mode } => {
                let options = zip::write::SimpleFileOptions::default().unix_permissions(*mode);
                writer.start_file(path.as_str(), options).expect("start file");
                writer.write_all(data).expect("write file");
            }
            FixtureEntry::Symlink { path, target } => {
                writer
                    .add_symlink(
                        path.as_str(),
                        target.as_str(),
                        zip::write::SimpleFileOptions::default(),
                    )
                    .expect("add symlink");
            }
            FixtureEntry::Dir { path } => {
                writer
                    .add_directory(path.as_str(), zip::write::SimpleFileOptions::default())
                    .expect("add directory");
            }
            FixtureEntry::HardLink { .. } => panic!("zip archives cannot hold hard links"),
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

/// An entry captured by [`CollectingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedEntry {
    /// Path as reported by the pipeline.
    pub path: String,
    /// Entry type.
    pub kind: EntryKind,
    /// Permission bits.
    pub mode: u32,
    /// Link target, if any.
    pub link_target: Option<String>,
    /// Entry body.
    pub data: Vec<u8>,
}

/// A sink that reads and records every entry it is offered.
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// Entries in the order they arrived.
    pub entries: Vec<CollectedEntry>,
}

impl EntrySink for CollectingSink {
    type Error = ExtractionError;

    fn accept(&mut self, mut entry: ArchiveEntry<'_>) -> Result<(), Self::Error> {
        let mut data = Vec::new();
        entry.data().read_to_end(&mut data)?;
        self.entries.push(CollectedEntry {
            path: entry.path().to_owned(),
            kind: entry.kind(),
            mode: entry.mode(),
            link_target: entry.link_target().map(str::to_owned),
            data,
        });
        Ok(())
    }
}

/// How [`StubFetcher`] answers one URL.
#[derive(Debug, Clone)]
pub enum StubResponse {
    /// Serve these bytes as the body.
    Body(Vec<u8>),
    /// Fail as a 404.
    NotFound,
    /// Fail with a transport error.
    Failure(String),
}

/// An [`ArchiveFetcher`] that serves canned responses by URL.
///
/// URLs without a registered response fail as not found.
#[derive(Debug, Default)]
pub struct StubFetcher {
    responses: HashMap<String, StubResponse>,
    requests: RefCell<Vec<String>>,
}

impl StubFetcher {
    /// Create a fetcher with no registered responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` as the response for `url`.
    #[must_use]
    pub fn with_archive(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.responses.insert(url.into(), StubResponse::Body(body));
        self
    }

    /// Register a response for `url`.
    #[must_use]
    pub fn with_response(mut self, url: impl Into<String>, response: StubResponse) -> Self {
        self.responses.insert(url.into(), response);
        self
    }

    /// Every URL requested so far, in order.
    #[must_use]
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Forget recorded requests, keeping registered responses.
    pub fn reset_requests(&self) {
        self.requests.borrow_mut().clear();
    }
}

impl ArchiveFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<ArchiveStream, DownloadError> {
        self.requests.borrow_mut().push(url.to_owned());
        match self.responses.get(url) {
            Some(StubResponse::Body(body)) => Ok(Box::new(Cursor::new(body.clone()))),
            Some(StubResponse::Failure(reason)) => Err(DownloadError::HttpError {
                url: url.to_owned(),
                reason: reason.clone(),
            }),
            Some(StubResponse::NotFound) | None => Err(DownloadError::NotFound {
                url: url.to_owned(),
            }),
        }
    }
}
