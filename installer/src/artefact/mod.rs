//! Redistributable archive handling.
//!
//! Everything between a component version and a stream of archive entries
//! lives here:
//!
//! - [`naming`] - Archive URL layout of the redistribution repository.
//! - [`download`] - Archive fetch trait and blocking HTTP implementation.
//! - [`format`] - Container sniffing from leading magic bytes.
//! - [`extraction`] - Streaming unpack pipelines feeding an entry sink.
//! - [`sha256_digest`] - SHA-256 digest newtype and hashing reader.

pub mod download;
pub mod extraction;
pub mod format;
pub mod naming;
pub mod sha256_digest;
