//! Archive format detection by signature.
//!
//! The archive extension only decides which file is requested; the bytes
//! that come back are classified by their leading magic number. Sniffing
//! consumes a few bytes from the stream and hands them back in front of the
//! remainder, so nothing has to be buffered beyond the signature itself.

use std::io::{self, Cursor, Read};

/// Bytes needed to recognise every supported signature.
const SNIFF_LEN: usize = 6;

const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
const ZIP_MAGICS: &[&[u8]] = &[b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];

/// Compression layer wrapped around a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// LZMA2 in an xz container (the vendor's Linux format).
    Xz,
    /// gzip.
    Gzip,
    /// Zstandard.
    Zstd,
}

/// The unpack pipeline an archive is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// A tar stream under a supported compression layer.
    CompressedTar(Compression),
    /// A zip archive.
    Zip,
    /// Anything else. Routed nowhere; the archive yields zero entries.
    Unknown,
}

impl ArchiveFormat {
    /// Classify a byte prefix.
    ///
    /// # Examples
    ///
    /// ```
    /// use cudadeps::artefact::format::{ArchiveFormat, Compression};
    ///
    /// assert_eq!(
    ///     ArchiveFormat::detect(&[0xFD, b'7', b'z', b'X', b'Z', 0x00]),
    ///     ArchiveFormat::CompressedTar(Compression::Xz)
    /// );
    /// assert_eq!(ArchiveFormat::detect(b"PK\x03\x04"), ArchiveFormat::Zip);
    /// assert_eq!(ArchiveFormat::detect(b"<html>"), ArchiveFormat::Unknown);
    /// ```
    #[must_use]
    pub fn detect(prefix: &[u8]) -> Self {
        if prefix.starts_with(XZ_MAGIC) {
            Self::CompressedTar(Compression::Xz)
        } else if prefix.starts_with(GZIP_MAGIC) {
            Self::CompressedTar(Compression::Gzip)
        } else if prefix.starts_with(ZSTD_MAGIC) {
            Self::CompressedTar(Compression::Zstd)
        } else if ZIP_MAGICS.iter().any(|magic| prefix.starts_with(magic)) {
            Self::Zip
        } else {
            Self::Unknown
        }
    }
}

/// A stream whose signature bytes have been read and replayed in front of
/// the rest.
pub type SniffedStream<R> = io::Chain<Cursor<Vec<u8>>, R>;

/// Read the signature of `reader` and return its format together with a
/// stream that still yields every original byte.
///
/// # Errors
///
/// Returns an error if reading the signature fails.
pub fn sniff<R: Read>(mut reader: R) -> io::Result<(ArchiveFormat, SniffedStream<R>)> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    // `take` on a by-ref reader keeps reading until SNIFF_LEN bytes or EOF,
    // so short first reads from the network cannot truncate the signature.
    Read::by_ref(&mut reader)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    let format = ArchiveFormat::detect(&head);
    Ok((format, Cursor::new(head).chain(reader)))
}
