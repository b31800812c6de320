//! CLI argument definitions for the provisioner.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the entrypoint to keep the binary small and focused on orchestration.

use crate::component::ComponentId;
use crate::config::ProvisionConfig;
use camino::Utf8PathBuf;
use clap::Parser;
use std::time::Duration;

/// Provision the runtime libraries a native module needs.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "cudadeps")]
#[command(version, about)]
#[command(long_about = concat!(
    "Provision the runtime libraries a native module needs.\n\n",
    "Reads cuda_version.json next to the native module, downloads each ",
    "component archive from the redistribution repository, and installs the ",
    "shared libraries it contains next to the module. A cudadeps.done marker ",
    "records a completed run; later runs do nothing until it is removed.\n\n",
    "Modules without cuda_version.json need no libraries and are left alone.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Provision the module built in the current project:\n",
    "    $ cudadeps\n\n",
    "  Provision for a cross-compiled Windows build:\n",
    "    $ npm_config_platform=win32 cudadeps\n\n",
    "  Preview the archives without downloading:\n",
    "    $ cudadeps --dry-run\n\n",
    "  Provision again after a partial manual cleanup:\n",
    "    $ cudadeps --force",
))]
pub struct Cli {
    /// Project directory holding binding-options.json [default: current directory].
    #[arg(short, long, value_name = "DIR")]
    pub project_dir: Option<Utf8PathBuf>,

    /// Native module directory; skips locating the module from the project.
    #[arg(short, long, value_name = "DIR")]
    pub module_dir: Option<Utf8PathBuf>,

    /// Target architecture (arm64, ppc64, x64) [default: host].
    #[arg(long, value_name = "ARCH", env = "npm_config_arch")]
    pub arch: Option<String>,

    /// Target platform (linux, win32) [default: host].
    #[arg(long, value_name = "PLATFORM", env = "npm_config_platform")]
    pub platform: Option<String>,

    /// Base URL of the redistribution repository.
    #[arg(long, value_name = "URL")]
    pub repo_url: Option<String>,

    /// Provision a specific component (can be repeated) [default: libcublas, cuda_cudart].
    #[arg(short, long = "component", value_name = "ID")]
    pub components: Vec<String>,

    /// Also install libraries found under stubs directories.
    #[arg(long)]
    pub keep_stubs: bool,

    /// Overall deadline for each archive download, in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Provision even when a completion marker exists.
    #[arg(long)]
    pub force: bool,

    /// Show the archives that would be fetched and exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Cli {
    /// Build the run configuration from the parsed flags.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use cudadeps::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["cudadeps", "--keep-stubs", "-c", "libnvjitlink"]);
    /// let config = cli.provision_config();
    /// assert!(!config.exclude_stubs);
    /// assert_eq!(config.components.len(), 1);
    /// ```
    #[must_use]
    pub fn provision_config(&self) -> ProvisionConfig {
        let defaults = ProvisionConfig::default();
        let components = if self.components.is_empty() {
            defaults.components
        } else {
            self.components
                .iter()
                .map(|id| ComponentId::from(id.as_str()))
                .collect()
        };
        ProvisionConfig {
            repo_url: self.repo_url.clone().unwrap_or(defaults.repo_url),
            components,
            exclude_stubs: !self.keep_stubs,
            fetch_timeout: self
                .timeout_secs
                .map_or(defaults.fetch_timeout, Duration::from_secs),
            quiet: self.quiet,
            ..defaults
        }
    }

    /// Default `log` filter for the requested verbosity.
    #[must_use]
    pub fn log_level(&self) -> log::LevelFilter {
        match (self.quiet, self.verbosity) {
            (true, _) => log::LevelFilter::Error,
            (false, 0) => log::LevelFilter::Warn,
            (false, 1) => log::LevelFilter::Info,
            (false, 2) => log::LevelFilter::Debug,
            (false, _) => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
