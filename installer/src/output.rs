//! Console output for the provisioner.
//!
//! Progress and results are written to an injected writer (stderr in the
//! binary) so tests can capture them. Diagnostic detail goes through the
//! `log` facade instead.

use crate::provision::{ComponentReport, ProvisionPlan};
use camino::Utf8Path;
use std::fmt;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Summarise what one component installed.
#[must_use]
pub fn component_summary(report: &ComponentReport) -> String {
    let files = plural(report.summary.files, "library", "libraries");
    let links = plural(report.summary.links, "link", "links");
    format!("Done. Installed {files} and {links} from {}", report.component)
}

/// Format a success message after a completed run.
#[must_use]
pub fn success_message(count: usize, target_dir: &Utf8Path) -> String {
    let components = plural(count, "component", "components");
    format!("Successfully provisioned {components} into {target_dir}")
}

fn plural(count: usize, one: &str, many: &str) -> String {
    let noun = if count == 1 { one } else { many };
    format!("{count} {noun}")
}

/// Dry-run rendering of a [`ProvisionPlan`].
///
/// # Example
///
/// ```
/// use camino::Utf8PathBuf;
/// use cudadeps::output::DryRunInfo;
/// use cudadeps::platform::Platform;
/// use cudadeps::provision::ProvisionPlan;
///
/// let plan = ProvisionPlan {
///     module_dir: Utf8PathBuf::from("/project/build/Release"),
///     platform: Platform::resolve(Some("x64"), Some("linux")).expect("supported"),
///     marker_present: false,
///     archives: Vec::new(),
/// };
///
/// let output = DryRunInfo { plan: &plan, force: false }.display_text();
/// assert!(output.contains("Dry run"));
/// assert!(output.contains("linux-x86_64"));
/// ```
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// The resolved plan.
    pub plan: &'a ProvisionPlan,
    /// Whether `--force` was given.
    pub force: bool,
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let naming = self.plan.platform.naming();
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Module directory: {}", self.plan.module_dir),
            format!("Platform: {} ({})", self.plan.platform, naming.subfolder()),
            format!("Library extension: {}", naming.library_ext()),
            format!("Force: {}", self.force),
        ];

        if self.plan.marker_present {
            lines.push(String::new());
            lines.push("Marker present - nothing would be downloaded".to_owned());
            return lines.join("\n");
        }

        lines.push(String::new());
        lines.push("Archives to fetch:".to_owned());
        for archive in &self.plan.archives {
            let checksum = if archive.digest.is_some() {
                " (sha256 verified)"
            } else {
                ""
            };
            lines.push(format!("  - {}{checksum}", archive.location));
        }

        lines.join("\n")
    }
}
