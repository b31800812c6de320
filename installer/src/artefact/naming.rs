//! Archive location policy for the redistribution repository.
//!
//! Every component archive lives at
//! `{repo}/{id}/{os}-{arch}/{id}-{os}-{arch}-{version}-archive.{ext}`.

use crate::component::ComponentId;
use crate::platform::VendorNaming;
use std::fmt;

/// Default base URL of the vendor's redistribution repository.
pub const DEFAULT_REPO_URL: &str = "https://developer.download.nvidia.com/compute/cuda/redist";

/// The fully-qualified location of one component archive.
///
/// # Examples
///
/// ```
/// use cudadeps::artefact::naming::ArchiveLocation;
/// use cudadeps::component::ComponentId;
/// use cudadeps::platform::Platform;
///
/// let naming = Platform::resolve(Some("x64"), Some("linux"))
///     .expect("supported")
///     .naming();
/// let location = ArchiveLocation::new(
///     "https://redist.example",
///     &ComponentId::from("libfoo"),
///     naming,
///     "1.2.3",
/// );
/// assert_eq!(
///     location.url(),
///     "https://redist.example/libfoo/linux-x86_64/libfoo-linux-x86_64-1.2.3-archive.tar.xz"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocation {
    repo_url: String,
    component: ComponentId,
    naming: VendorNaming,
    version: String,
}

impl ArchiveLocation {
    /// Create a location from its parts. A trailing `/` on `repo_url` is
    /// ignored.
    #[must_use]
    pub fn new(
        repo_url: &str,
        component: &ComponentId,
        naming: VendorNaming,
        version: &str,
    ) -> Self {
        Self {
            repo_url: repo_url.trim_end_matches('/').to_owned(),
            component: component.clone(),
            naming,
            version: version.to_owned(),
        }
    }

    /// The archive filename, without the repository path.
    #[must_use]
    pub fn filename(&self) -> String {
        format!(
            "{}-{}-{}-archive.{}",
            self.component,
            self.naming.subfolder(),
            self.version,
            self.naming.archive_ext()
        )
    }

    /// The full archive URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.to_string()
    }

    /// The component this archive belongs to.
    #[must_use]
    pub fn component(&self) -> &ComponentId {
        &self.component
    }

    /// The version requested.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.repo_url,
            self.component,
            self.naming.subfolder(),
            self.filename()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use rstest::rstest;

    #[rstest]
    #[case::linux(
        "x64",
        "linux",
        "https://r.test/libcublas/linux-x86_64/libcublas-linux-x86_64-12.4.5.8-archive.tar.xz"
    )]
    #[case::windows(
        "x64",
        "win32",
        "https://r.test/libcublas/windows-x86_64/libcublas-windows-x86_64-12.4.5.8-archive.zip"
    )]
    #[case::sbsa(
        "arm64",
        "linux",
        "https://r.test/libcublas/linux-aarch64/libcublas-linux-aarch64-12.4.5.8-archive.tar.xz"
    )]
    fn url_follows_repository_layout(#[case] arch: &str, #[case] os: &str, #[case] expected: &str) {
        let naming = Platform::resolve(Some(arch), Some(os))
            .expect("supported")
            .naming();
        let location =
            ArchiveLocation::new("https://r.test/", &ComponentId::from("libcublas"), naming, "12.4.5.8");
        assert_eq!(location.url(), expected);
    }

    #[test]
    fn default_repo_points_at_vendor_redist() {
        assert!(DEFAULT_REPO_URL.ends_with("/compute/cuda/redist"));
    }
}
