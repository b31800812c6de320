//! Location of the native module inside a project.
//!
//! Libraries are installed next to the native module so the platform loader
//! finds them without any search-path configuration. The project describes
//! its module in `binding-options.json`; [`BindingOptionsLocator`] probes the
//! usual build and prebuild output directories for it.

use crate::error::{ProvisionError, Result};
use crate::platform::HostTarget;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;

/// Options file read from the project directory.
pub const BINDING_OPTIONS_FILE: &str = "binding-options.json";

/// Trait for finding the directory that holds the native module.
pub trait ModuleLocator {
    /// Return the directory containing the native module built for this
    /// project.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ModuleNotFound`] when no module exists.
    fn locate(&self, project_dir: &Utf8Path) -> Result<Utf8PathBuf>;
}

#[derive(Debug, Deserialize)]
struct BindingOptions {
    name: String,
}

/// Locates `<name>.node` from the project's binding options.
///
/// Candidates are probed in order:
///
/// 1. `build/Release/<name>.node`
/// 2. `build/Debug/<name>.node`
/// 3. `prebuilds/<platform>-<arch>/<name>.node`
#[derive(Debug, Clone)]
pub struct BindingOptionsLocator {
    host: HostTarget,
}

impl BindingOptionsLocator {
    /// Create a locator probing prebuilds for `host`. The identifiers need
    /// no vendor mapping.
    #[must_use]
    pub const fn new(host: HostTarget) -> Self {
        Self { host }
    }

    fn candidates(&self, project_dir: &Utf8Path, name: &str) -> Vec<Utf8PathBuf> {
        let file = format!("{name}.node");
        vec![
            project_dir.join("build").join("Release").join(&file),
            project_dir.join("build").join("Debug").join(&file),
            project_dir
                .join("prebuilds")
                .join(self.host.to_string())
                .join(&file),
        ]
    }
}

impl ModuleLocator for BindingOptionsLocator {
    fn locate(&self, project_dir: &Utf8Path) -> Result<Utf8PathBuf> {
        let not_found = |reason: String| ProvisionError::ModuleNotFound {
            project_dir: project_dir.to_owned(),
            reason,
        };

        let options_path = project_dir.join(BINDING_OPTIONS_FILE);
        let json = fs::read_to_string(&options_path)
            .map_err(|err| not_found(format!("cannot read {options_path}: {err}")))?;
        let options: BindingOptions = serde_json::from_str(&json)
            .map_err(|err| not_found(format!("invalid {options_path}: {err}")))?;

        let candidates = self.candidates(project_dir, &options.name);
        candidates
            .iter()
            .find(|candidate| candidate.is_file())
            .and_then(|found| found.parent())
            .map(Utf8Path::to_owned)
            .ok_or_else(|| {
                let probed: Vec<&str> = candidates.iter().map(|path| path.as_str()).collect();
                not_found(format!("no {}.node in {}", options.name, probed.join(", ")))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Project {
        _temp_dir: TempDir,
        dir: Utf8PathBuf,
    }

    impl Project {
        fn with_module_at(self, relative: &str) -> Self {
            let module_dir = self.dir.join(relative);
            fs::create_dir_all(&module_dir).expect("create module dir");
            fs::write(module_dir.join("sd.node"), b"module").expect("write module");
            self
        }
    }

    #[fixture]
    fn project() -> Project {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).expect("UTF-8 path");
        fs::write(dir.join(BINDING_OPTIONS_FILE), r#"{"name": "sd"}"#).expect("write options");
        Project {
            _temp_dir: temp_dir,
            dir,
        }
    }

    fn locator() -> BindingOptionsLocator {
        BindingOptionsLocator::new(HostTarget::detect(Some("x64"), Some("linux")))
    }

    #[rstest]
    #[case::release("build/Release")]
    #[case::debug("build/Debug")]
    #[case::prebuild("prebuilds/linux-x64")]
    fn finds_module_in_each_location(project: Project, #[case] relative: &str) {
        let project = project.with_module_at(relative);
        let found = locator().locate(&project.dir).expect("module found");
        assert_eq!(found, project.dir.join(relative));
    }

    #[rstest]
    fn release_build_wins_over_prebuild(project: Project) {
        let project = project
            .with_module_at("prebuilds/linux-x64")
            .with_module_at("build/Release");
        let found = locator().locate(&project.dir).expect("module found");
        assert_eq!(found, project.dir.join("build/Release"));
    }

    #[rstest]
    fn prebuilds_for_unmapped_hosts_are_still_found(project: Project) {
        let project = project.with_module_at("prebuilds/darwin-arm64");
        let locator = BindingOptionsLocator::new(HostTarget::detect(Some("arm64"), Some("darwin")));
        let found = locator.locate(&project.dir).expect("module found");
        assert_eq!(found, project.dir.join("prebuilds/darwin-arm64"));
    }

    #[rstest]
    fn missing_module_lists_probed_paths(project: Project) {
        let err = locator().locate(&project.dir).expect_err("no module");
        let msg = err.to_string();
        assert!(matches!(err, ProvisionError::ModuleNotFound { .. }));
        assert!(msg.contains("sd.node"));
        assert!(msg.contains("prebuilds"));
    }

    #[test]
    fn missing_options_file_is_module_not_found() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).expect("UTF-8 path");
        let err = locator().locate(&dir).expect_err("no options");
        assert!(err.to_string().contains(BINDING_OPTIONS_FILE));
    }
}
