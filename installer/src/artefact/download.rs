//! Archive download for component redistributables.
//!
//! Provides a trait-based abstraction over the HTTP GET that retrieves each
//! component archive, enabling dependency injection for testing. The body is
//! handed back as a reader so the unpack pipeline can decompress while bytes
//! are still arriving.

use std::io::{self, Cursor, Read};
use std::time::Duration;

/// Connect timeout for the redistribution repository.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default overall deadline for one archive download. Component archives run
/// to several hundred megabytes.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// A streaming archive body.
pub type ArchiveStream = Box<dyn Read>;

/// Trait for fetching archive bodies by URL.
///
/// # Examples
///
/// ```
/// use cudadeps::artefact::download::{DEFAULT_FETCH_TIMEOUT, HttpFetcher};
///
/// let fetcher = HttpFetcher::new(DEFAULT_FETCH_TIMEOUT);
/// // Use fetcher.fetch(url) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveFetcher {
    /// Issue a GET for `url` and return the response body as a stream.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or an
    /// empty body.
    fn fetch(&self, url: &str) -> Result<ArchiveStream, DownloadError>;
}

/// Errors arising from archive downloads.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The request failed or returned a non-success status.
    #[error("downloading {url} failed: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested archive was not found (HTTP 404).
    #[error("downloading {url} failed: archive not found")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The response carried no body.
    #[error("downloading {url} failed: empty response body")]
    EmptyBody {
        /// The URL that returned an empty body.
        url: String,
    },
}

impl DownloadError {
    /// The URL of the failed request.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::HttpError { url, .. } | Self::NotFound { url } | Self::EmptyBody { url } => url,
        }
    }
}

/// HTTP-based fetcher using `ureq`.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout` in total.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl ArchiveFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<ArchiveStream, DownloadError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let body = response.into_body();
        if body.content_length() == Some(0) {
            return Err(DownloadError::EmptyBody {
                url: url.to_owned(),
            });
        }
        Ok(Box::new(body.into_reader()))
    }
}

/// Reject a body that ends before its first byte.
///
/// Chunked responses carry no length, so an empty body only shows up on the
/// first read. The byte read here is replayed in front of the returned
/// stream.
///
/// # Errors
///
/// Returns [`DownloadError::EmptyBody`] for a zero-byte body and
/// [`DownloadError::HttpError`] if the first read fails.
pub fn ensure_non_empty(
    url: &str,
    mut stream: ArchiveStream,
) -> Result<ArchiveStream, DownloadError> {
    let mut first = [0_u8; 1];
    let read = loop {
        match stream.read(&mut first) {
            Ok(read) => break read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                return Err(DownloadError::HttpError {
                    url: url.to_owned(),
                    reason: err.to_string(),
                });
            }
        }
    };
    if read == 0 {
        return Err(DownloadError::EmptyBody {
            url: url.to_owned(),
        });
    }
    Ok(Box::new(Cursor::new(first).chain(stream)))
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
