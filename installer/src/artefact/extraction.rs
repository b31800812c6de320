//! Streaming archive unpacking.
//!
//! Archives are never extracted wholesale. Each pipeline walks its container
//! entry by entry and hands every entry to an [`EntrySink`], which decides
//! what to keep. The compressed-tar pipeline decompresses while reading, so
//! the uncompressed tarball is never materialised. The zip pipeline spools
//! the stream to an anonymous temporary file first, because the zip central
//! directory sits at the end of the archive.
//!
//! Both pipelines start by sniffing the signature. A stream that does not
//! belong to a pipeline yields zero entries rather than an error, which lets
//! [`unpack`] route any body through the same dispatcher.

use super::format::{ArchiveFormat, Compression, sniff};
use log::{debug, trace};
use std::fmt;
use std::io::{self, BufReader, Read, Seek};

/// File-type bits of a unix mode.
const S_IFMT: u32 = 0o170_000;
/// Symbolic-link file type.
const S_IFLNK: u32 = 0o120_000;
/// Permission bits applied to zip entries that carry no unix mode.
const DEFAULT_FILE_MODE: u32 = 0o644;

/// The type of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file with data.
    File,
    /// A symbolic link; the target is in [`ArchiveEntry::link_target`].
    Symlink,
    /// A hard link to another entry of the same archive.
    HardLink,
    /// A directory.
    Directory,
    /// Devices, FIFOs, sparse files and other special entries.
    Other,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Symlink => "symlink",
            Self::HardLink => "hardlink",
            Self::Directory => "directory",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// One entry of an archive, valid only while the sink is handling it.
///
/// File data is exposed as a reader positioned at the start of the entry
/// body; it is never buffered by the pipeline.
pub struct ArchiveEntry<'a> {
    path: String,
    kind: EntryKind,
    mode: u32,
    link_target: Option<String>,
    data: &'a mut dyn Read,
}

impl<'a> ArchiveEntry<'a> {
    /// Assemble an entry. Pipelines and test sinks use this directly.
    pub fn new(
        path: String,
        kind: EntryKind,
        mode: u32,
        link_target: Option<String>,
        data: &'a mut dyn Read,
    ) -> Self {
        Self {
            path,
            kind,
            mode,
            link_target,
            data,
        }
    }

    /// The entry path as recorded in the archive.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The entry type.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// POSIX permission bits (file-type bits stripped).
    #[must_use]
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// The link target for symlinks and hard links.
    #[must_use]
    pub fn link_target(&self) -> Option<&str> {
        self.link_target.as_deref()
    }

    /// The entry body. Empty for anything but files.
    pub fn data(&mut self) -> &mut dyn Read {
        self.data
    }
}

impl fmt::Debug for ArchiveEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("mode", &format_args!("{:o}", self.mode))
            .field("link_target", &self.link_target)
            .finish_non_exhaustive()
    }
}

/// Receiver for the entries produced by an unpack pipeline.
pub trait EntrySink {
    /// Error type of the sink; pipeline failures convert into it.
    type Error: From<ExtractionError>;

    /// Handle one entry, in archive order.
    ///
    /// # Errors
    ///
    /// Any error aborts the pipeline and is returned to the caller.
    fn accept(&mut self, entry: ArchiveEntry<'_>) -> Result<(), Self::Error>;
}

/// Errors raised by the unpack pipelines themselves.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Reading, decompressing or spooling the stream failed.
    #[error("archive I/O error: {0}")]
    Io(#[from] io::Error),

    /// The zip container is malformed.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Sniff `reader` and route it to the matching pipeline.
///
/// Returns the number of entries handed to `sink`; an unrecognised format
/// yields zero.
///
/// # Errors
///
/// Returns an error when the archive is corrupt or the sink fails.
pub fn unpack<R: Read, S: EntrySink>(reader: R, sink: &mut S) -> Result<usize, S::Error> {
    let (format, stream) = sniff(reader).map_err(ExtractionError::from)?;
    debug!("archive format: {format:?}");
    match format {
        ArchiveFormat::CompressedTar(compression) => read_compressed_tar(compression, stream, sink),
        ArchiveFormat::Zip => read_zip(stream, sink),
        ArchiveFormat::Unknown => Ok(0),
    }
}

/// Unpack a compressed tar stream.
///
/// A stream without a supported compression signature (including a zip
/// archive) yields zero entries.
///
/// # Errors
///
/// Returns an error when decompression or tar parsing fails, or the sink
/// fails.
pub fn unpack_compressed_tar<R: Read, S: EntrySink>(
    reader: R,
    sink: &mut S,
) -> Result<usize, S::Error> {
    match sniff(reader).map_err(ExtractionError::from)? {
        (ArchiveFormat::CompressedTar(compression), stream) => {
            read_compressed_tar(compression, stream, sink)
        }
        (other, _) => {
            debug!("not a compressed tar stream ({other:?}); no entries");
            Ok(0)
        }
    }
}

/// Unpack a zip stream.
///
/// A stream without a zip signature yields zero entries.
///
/// # Errors
///
/// Returns an error when spooling or zip parsing fails, or the sink fails.
pub fn unpack_zip<R: Read, S: EntrySink>(reader: R, sink: &mut S) -> Result<usize, S::Error> {
    match sniff(reader).map_err(ExtractionError::from)? {
        (ArchiveFormat::Zip, stream) => read_zip(stream, sink),
        (other, _) => {
            debug!("not a zip stream ({other:?}); no entries");
            Ok(0)
        }
    }
}

fn read_compressed_tar<R: Read, S: EntrySink>(
    compression: Compression,
    reader: R,
    sink: &mut S,
) -> Result<usize, S::Error> {
    match compression {
        Compression::Xz => read_tar(xz2::read::XzDecoder::new_multi_decoder(reader), sink),
        Compression::Gzip => read_tar(flate2::read::MultiGzDecoder::new(reader), sink),
        Compression::Zstd => {
            let decoder = zstd::Decoder::new(reader).map_err(ExtractionError::from)?;
            read_tar(decoder, sink)
        }
    }
}

fn read_tar<R: Read, S: EntrySink>(reader: R, sink: &mut S) -> Result<usize, S::Error> {
    let mut archive = tar::Archive::new(reader);
    let mut count = 0;
    for entry in archive.entries().map_err(ExtractionError::from)? {
        let mut entry = entry.map_err(ExtractionError::from)?;
        let path = entry
            .path()
            .map_err(ExtractionError::from)?
            .to_string_lossy()
            .into_owned();
        let entry_type = entry.header().entry_type();
        let kind = tar_entry_kind(entry_type);
        let mode = entry.header().mode().map_err(ExtractionError::from)? & !S_IFMT;
        let link_target = entry
            .link_name()
            .map_err(ExtractionError::from)?
            .map(|target| target.to_string_lossy().into_owned());
        trace!("tar entry {path} ({kind})");

        sink.accept(ArchiveEntry::new(path, kind, mode, link_target, &mut entry))?;
        count += 1;
    }
    Ok(count)
}

fn tar_entry_kind(entry_type: tar::EntryType) -> EntryKind {
    match entry_type {
        tar::EntryType::Regular | tar::EntryType::Continuous => EntryKind::File,
        tar::EntryType::Symlink => EntryKind::Symlink,
        tar::EntryType::Link => EntryKind::HardLink,
        tar::EntryType::Directory => EntryKind::Directory,
        _ => EntryKind::Other,
    }
}

fn read_zip<R: Read, S: EntrySink>(mut reader: R, sink: &mut S) -> Result<usize, S::Error> {
    let mut spool = tempfile::tempfile().map_err(ExtractionError::from)?;
    io::copy(&mut reader, &mut spool).map_err(ExtractionError::from)?;
    spool.rewind().map_err(ExtractionError::from)?;

    let mut archive =
        zip::ZipArchive::new(BufReader::new(spool)).map_err(ExtractionError::from)?;
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(ExtractionError::from)?;
        let path = file.name().to_owned();
        let unix_mode = file.unix_mode();
        let kind = if file.is_dir() {
            EntryKind::Directory
        } else if unix_mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            EntryKind::Symlink
        } else {
            EntryKind::File
        };
        let mode = unix_mode.map_or(DEFAULT_FILE_MODE, |mode| mode & !S_IFMT);
        trace!("zip entry {path} ({kind})");

        if kind == EntryKind::Symlink {
            // Zip stores the link target as the entry body.
            let mut target = String::new();
            file.read_to_string(&mut target)
                .map_err(ExtractionError::from)?;
            let mut empty = io::empty();
            sink.accept(ArchiveEntry::new(path, kind, mode, Some(target), &mut empty))?;
        } else {
            sink.accept(ArchiveEntry::new(path, kind, mode, None, &mut file))?;
        }
    }
    Ok(archive.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        CollectingSink, FixtureEntry, incompressible, tar_gz_archive, tar_xz_archive,
        tar_zst_archive, zip_archive,
    };
    use rstest::{fixture, rstest};

    type Summary = (String, EntryKind, Option<String>, Vec<u8>);

    #[fixture]
    fn entries() -> Vec<FixtureEntry> {
        vec![
            FixtureEntry::dir("cuda/lib"),
            FixtureEntry::file("cuda/lib/libfoo.so.1.2", b"ELF payload", 0o755),
            FixtureEntry::symlink("cuda/lib/libfoo.so.1", "libfoo.so.1.2"),
            FixtureEntry::file("cuda/LICENSE", b"license", 0o644),
        ]
    }

    fn expected_entries() -> Vec<Summary> {
        vec![
            ("cuda/lib".to_owned(), EntryKind::Directory, None, Vec::new()),
            (
                "cuda/lib/libfoo.so.1.2".to_owned(),
                EntryKind::File,
                None,
                b"ELF payload".to_vec(),
            ),
            (
                "cuda/lib/libfoo.so.1".to_owned(),
                EntryKind::Symlink,
                Some("libfoo.so.1.2".to_owned()),
                Vec::new(),
            ),
            ("cuda/LICENSE".to_owned(), EntryKind::File, None, b"license".to_vec()),
        ]
    }

    /// Directory paths differ in their trailing slash between formats.
    fn summarise(sink: &CollectingSink) -> Vec<Summary> {
        sink.entries
            .iter()
            .map(|entry| {
                (
                    entry.path.trim_end_matches('/').to_owned(),
                    entry.kind,
                    entry.link_target.clone(),
                    entry.data.clone(),
                )
            })
            .collect()
    }

    #[rstest]
    #[case::xz(tar_xz_archive)]
    #[case::gzip(tar_gz_archive)]
    #[case::zstd(tar_zst_archive)]
    fn tar_pipeline_yields_entries_in_archive_order(
        entries: Vec<FixtureEntry>,
        #[case] build: fn(&[FixtureEntry]) -> Vec<u8>,
    ) {
        let archive = build(&entries);
        let mut sink = CollectingSink::default();
        let count = unpack_compressed_tar(archive.as_slice(), &mut sink).expect("unpack");
        assert_eq!(count, 4);
        assert_eq!(summarise(&sink), expected_entries());
    }

    #[rstest]
    fn tar_pipeline_preserves_permission_bits(entries: Vec<FixtureEntry>) {
        let archive = tar_xz_archive(&entries);
        let mut sink = CollectingSink::default();
        unpack(archive.as_slice(), &mut sink).expect("unpack");
        let library = sink
            .entries
            .iter()
            .find(|entry| entry.path == "cuda/lib/libfoo.so.1.2")
            .expect("library entry");
        assert_eq!(library.mode, 0o755);
    }

    #[test]
    fn tar_pipeline_reports_hard_links() {
        let archive = tar_xz_archive(&[
            FixtureEntry::file("lib/libbar.so.2", b"bar", 0o755),
            FixtureEntry::hard_link("lib/libbar.so", "lib/libbar.so.2"),
        ]);
        let mut sink = CollectingSink::default();
        unpack(archive.as_slice(), &mut sink).expect("unpack");
        let link = sink.entries.get(1).expect("second entry");
        assert_eq!(link.kind, EntryKind::HardLink);
        assert_eq!(link.link_target.as_deref(), Some("lib/libbar.so.2"));
    }

    #[rstest]
    fn zip_pipeline_yields_entries_in_archive_order(entries: Vec<FixtureEntry>) {
        let archive = zip_archive(&entries);
        let mut sink = CollectingSink::default();
        let count = unpack_zip(archive.as_slice(), &mut sink).expect("unpack");
        assert_eq!(count, 4);
        assert_eq!(summarise(&sink), expected_entries());
    }

    #[rstest]
    fn zip_bytes_through_tar_pipeline_yield_nothing(entries: Vec<FixtureEntry>) {
        let archive = zip_archive(&entries);
        let mut sink = CollectingSink::default();
        let count = unpack_compressed_tar(archive.as_slice(), &mut sink).expect("no error");
        assert_eq!(count, 0);
        assert!(sink.entries.is_empty());
    }

    #[rstest]
    fn tar_bytes_through_zip_pipeline_yield_nothing(entries: Vec<FixtureEntry>) {
        let archive = tar_xz_archive(&entries);
        let mut sink = CollectingSink::default();
        let count = unpack_zip(archive.as_slice(), &mut sink).expect("no error");
        assert_eq!(count, 0);
    }

    #[rstest]
    #[case::html_error_page(b"<html>404</html>".to_vec())]
    #[case::empty(Vec::new())]
    fn unknown_formats_yield_nothing(#[case] body: Vec<u8>) {
        let mut sink = CollectingSink::default();
        let count = unpack(body.as_slice(), &mut sink).expect("no error");
        assert_eq!(count, 0);
    }

    #[rstest]
    fn dispatcher_routes_both_formats(entries: Vec<FixtureEntry>) {
        for archive in [tar_xz_archive(&entries), zip_archive(&entries)] {
            let mut sink = CollectingSink::default();
            assert_eq!(unpack(archive.as_slice(), &mut sink).expect("unpack"), 4);
        }
    }

    #[test]
    fn truncated_xz_stream_is_an_error() {
        let payload = incompressible(64 * 1024);
        let mut archive = tar_xz_archive(&[FixtureEntry::file("lib/libfoo.so", &payload, 0o644)]);
        archive.truncate(archive.len() / 2);
        let mut sink = CollectingSink::default();
        assert!(unpack(archive.as_slice(), &mut sink).is_err());
    }
}
