//! Host platform resolution and vendor naming.
//!
//! Host identifiers use the Node.js vocabulary (`x64`, `arm64`, `win32`)
//! because the cross-compilation overrides arrive through
//! `npm_config_arch` / `npm_config_platform`. The redistribution repository
//! uses its own names (`x86_64`, `aarch64`, `windows`), and the archive
//! format and library extension follow from the vendor operating system
//! alone.

use crate::error::{PlatformField, ProvisionError, Result};
use std::fmt;

/// Supported host architectures, in the host vocabulary.
const SUPPORTED_ARCHES: &[&str] = &["arm64", "ppc64", "x64"];

/// Supported host operating systems, in the host vocabulary.
const SUPPORTED_OSES: &[&str] = &["linux", "win32"];

/// A host processor architecture with a vendor mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostArch {
    /// 64-bit ARM.
    Arm64,
    /// 64-bit little-endian POWER.
    Ppc64,
    /// 64-bit x86.
    X64,
}

impl HostArch {
    /// Return the host identifier for this architecture.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::Ppc64 => "ppc64",
            Self::X64 => "x64",
        }
    }

    /// Return the vendor repository name for this architecture.
    #[must_use]
    pub const fn vendor_name(self) -> &'static str {
        match self {
            Self::Arm64 => "aarch64",
            Self::Ppc64 => "ppc64le",
            Self::X64 => "x86_64",
        }
    }
}

impl TryFrom<&str> for HostArch {
    type Error = ProvisionError;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "arm64" => Ok(Self::Arm64),
            "ppc64" => Ok(Self::Ppc64),
            "x64" => Ok(Self::X64),
            other => Err(ProvisionError::UnsupportedPlatform {
                field: PlatformField::Architecture,
                value: other.to_owned(),
                expected: SUPPORTED_ARCHES.join(", "),
            }),
        }
    }
}

impl fmt::Display for HostArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A host operating system with a vendor mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    /// Linux.
    Linux,
    /// Windows.
    Windows,
}

impl HostOs {
    /// Return the host identifier for this operating system.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "win32",
        }
    }

    /// Return the vendor repository name for this operating system.
    #[must_use]
    pub const fn vendor_name(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }
}

impl TryFrom<&str> for HostOs {
    type Error = ProvisionError;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "linux" => Ok(Self::Linux),
            "win32" => Ok(Self::Windows),
            other => Err(ProvisionError::UnsupportedPlatform {
                field: PlatformField::OperatingSystem,
                value: other.to_owned(),
                expected: SUPPORTED_OSES.join(", "),
            }),
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host identifiers as requested, before any vendor mapping is checked.
///
/// The module locator only needs the raw names, and a build without a
/// version manifest must not fail on a host the repository does not serve.
///
/// # Examples
///
/// ```
/// use cudadeps::platform::HostTarget;
///
/// let host = HostTarget::detect(Some("x64"), Some("darwin"));
/// assert_eq!(host.to_string(), "darwin-x64");
/// assert!(host.resolve().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTarget {
    arch: String,
    os: String,
}

impl HostTarget {
    /// Take the overrides where given, else the identifiers of the running
    /// host.
    #[must_use]
    pub fn detect(arch: Option<&str>, os: Option<&str>) -> Self {
        Self {
            arch: arch
                .unwrap_or_else(|| host_arch_identifier(std::env::consts::ARCH))
                .to_owned(),
            os: os
                .unwrap_or_else(|| host_os_identifier(std::env::consts::OS))
                .to_owned(),
        }
    }

    /// The architecture identifier.
    #[must_use]
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// The operating system identifier.
    #[must_use]
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Map both identifiers onto a supported [`Platform`].
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::UnsupportedPlatform`] when either
    /// identifier has no vendor mapping. No default is substituted.
    pub fn resolve(&self) -> Result<Platform> {
        Ok(Platform {
            arch: HostArch::try_from(self.arch.as_str())?,
            os: HostOs::try_from(self.os.as_str())?,
        })
    }
}

impl fmt::Display for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// The resolved platform descriptor for this run.
///
/// # Examples
///
/// ```
/// use cudadeps::platform::Platform;
///
/// let platform = Platform::resolve(Some("x64"), Some("linux")).expect("supported");
/// let naming = platform.naming();
/// assert_eq!(naming.subfolder(), "linux-x86_64");
/// assert_eq!(naming.archive_ext(), "tar.xz");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    arch: HostArch,
    os: HostOs,
}

impl Platform {
    /// Build a descriptor from already-validated halves.
    #[must_use]
    pub const fn new(arch: HostArch, os: HostOs) -> Self {
        Self { arch, os }
    }

    /// Resolve the platform from optional overrides, falling back to the
    /// identifiers of the running host.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::UnsupportedPlatform`] when either
    /// identifier has no vendor mapping. No default is substituted.
    pub fn resolve(arch: Option<&str>, os: Option<&str>) -> Result<Self> {
        HostTarget::detect(arch, os).resolve()
    }

    /// Return the architecture half.
    #[must_use]
    pub const fn arch(&self) -> HostArch {
        self.arch
    }

    /// Return the operating system half.
    #[must_use]
    pub const fn os(&self) -> HostOs {
        self.os
    }

    /// Derive the vendor naming bundle for this platform.
    #[must_use]
    pub const fn naming(&self) -> VendorNaming {
        VendorNaming {
            vendor_arch: self.arch.vendor_name(),
            vendor_os: self.os.vendor_name(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Vendor-side names derived from a [`Platform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VendorNaming {
    vendor_arch: &'static str,
    vendor_os: &'static str,
}

impl VendorNaming {
    /// Vendor architecture name (for example `x86_64`).
    #[must_use]
    pub const fn vendor_arch(&self) -> &'static str {
        self.vendor_arch
    }

    /// Vendor operating system name (for example `linux`).
    #[must_use]
    pub const fn vendor_os(&self) -> &'static str {
        self.vendor_os
    }

    /// The `{os}-{arch}` folder used by the redistribution repository.
    #[must_use]
    pub fn subfolder(&self) -> String {
        format!("{}-{}", self.vendor_os, self.vendor_arch)
    }

    /// Archive extension requested from the repository.
    #[must_use]
    pub fn archive_ext(&self) -> &'static str {
        if self.is_windows() { "zip" } else { "tar.xz" }
    }

    /// Extension of runtime-loadable shared libraries.
    #[must_use]
    pub fn library_ext(&self) -> &'static str {
        if self.is_windows() { ".dll" } else { ".so" }
    }

    fn is_windows(&self) -> bool {
        self.vendor_os == "windows"
    }
}

/// Translate a Rust `target_arch` name into the host vocabulary.
///
/// Unknown names pass through so that resolution reports them verbatim.
fn host_arch_identifier(rust_arch: &str) -> &str {
    match rust_arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// Translate a Rust `target_os` name into the host vocabulary.
fn host_os_identifier(rust_os: &str) -> &str {
    match rust_os {
        "windows" => "win32",
        other => other,
    }
}
