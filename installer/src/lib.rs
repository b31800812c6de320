//! CUDA runtime provisioner library.
//!
//! This crate downloads the CUDA runtime redistributables a native extension
//! module was built against and installs their shared libraries next to the
//! module. It is used by the `cudadeps` CLI binary and can be consumed
//! programmatically from build scripts or test suites.
//!
//! # Modules
//!
//! - [`artefact`] - Archive naming, download, sniffing, and unpacking
//! - [`cli`] - Command-line argument definitions
//! - [`component`] - Semantic wrapper for redistributable component names
//! - [`config`] - Run settings shared by every stage
//! - [`error`] - Semantic error types for a provisioning run
//! - [`install`] - Entry filtering and flat library installation
//! - [`locator`] - Native module discovery inside a project
//! - [`manifest`] - Version manifest (`cuda_version.json`) parsing
//! - [`marker`] - Completion marker handling
//! - [`output`] - Progress lines and dry-run rendering
//! - [`platform`] - Host platform resolution and vendor naming
//! - [`provision`] - The provisioning orchestrator

pub mod artefact;
pub mod cli;
pub mod component;
pub mod config;
pub mod error;
pub mod install;
pub mod locator;
pub mod manifest;
pub mod marker;
pub mod output;
pub mod platform;
pub mod provision;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
