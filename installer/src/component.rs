//! Semantic wrapper for redistributable component identifiers.
//!
//! This module provides the [`ComponentId`] newtype used as the key into the
//! version manifest and as the first path segment of every archive URL.

use std::fmt;

/// Components provisioned when no explicit list is configured, in install
/// order.
pub const DEFAULT_COMPONENTS: &[&str] = &["libcublas", "cuda_cudart"];

/// Identifier of one native redistributable (for example `libcublas`).
///
/// The identifier is not validated; an unknown component surfaces as a
/// missing manifest entry or a failed download.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentId(String);

impl ComponentId {
    /// Create a new component identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the built-in component list.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        DEFAULT_COMPONENTS.iter().copied().map(Self::from).collect()
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
