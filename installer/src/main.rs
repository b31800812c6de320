//! cudadeps CLI entrypoint.
//!
//! This binary locates a project's native module, downloads the CUDA runtime
//! redistributables listed in its version manifest, and installs the shared
//! libraries next to the module.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use cudadeps::cli::Cli;
use cudadeps::error::Result;
use cudadeps::locator::{BindingOptionsLocator, ModuleLocator};
use cudadeps::output::{DryRunInfo, success_message, write_stderr_line};
use cudadeps::platform::HostTarget;
use cudadeps::provision::{ProvisionOutcome, ProvisionRequest, plan, provision};
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// `RUST_LOG` overrides the level chosen by `-v`/`-q`.
fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let host = HostTarget::detect(cli.arch.as_deref(), cli.platform.as_deref());
    let config = cli.provision_config();
    let module_dir = resolve_module_dir(cli, &BindingOptionsLocator::new(host.clone()))?;

    // Builds without a manifest need no libraries, whatever the host.
    let manifest = module_dir.join(&config.manifest_file);
    if !manifest.exists() {
        log::info!("no version manifest at {manifest}; nothing to provision");
        if !cli.quiet {
            report_outcome(
                &ProvisionOutcome::NotApplicable { manifest },
                &module_dir,
                stderr,
            );
        }
        return Ok(());
    }

    let platform = host.resolve()?;
    log::debug!("provisioning {module_dir} for {platform}");

    let request = ProvisionRequest {
        module_dir: &module_dir,
        platform,
        config: &config,
        force: cli.force,
    };

    if cli.dry_run {
        return run_dry(&request, stderr);
    }

    let outcome = provision(&request, stderr)?;
    if !cli.quiet {
        report_outcome(&outcome, &module_dir, stderr);
    }
    Ok(())
}

/// Uses `--module-dir` when given, otherwise asks the locator.
fn resolve_module_dir(cli: &Cli, locator: &dyn ModuleLocator) -> Result<Utf8PathBuf> {
    if let Some(dir) = &cli.module_dir {
        return Ok(dir.clone());
    }
    let project_dir = cli
        .project_dir
        .clone()
        .unwrap_or_else(|| Utf8PathBuf::from("."));
    locator.locate(&project_dir)
}

/// Runs in dry-run mode, showing the plan without side effects.
fn run_dry(request: &ProvisionRequest<'_>, stderr: &mut dyn Write) -> Result<()> {
    match plan(request)? {
        Some(plan) => {
            let info = DryRunInfo {
                plan: &plan,
                force: request.force,
            };
            write_stderr_line(stderr, info.display_text());
        }
        None => write_stderr_line(
            stderr,
            format!(
                "No {} in {}; nothing to provision",
                request.config.manifest_file, request.module_dir
            ),
        ),
    }
    Ok(())
}

fn report_outcome(outcome: &ProvisionOutcome, module_dir: &Utf8Path, stderr: &mut dyn Write) {
    match outcome {
        ProvisionOutcome::NotApplicable { manifest } => {
            write_stderr_line(stderr, format!("No {manifest}; nothing to provision"));
        }
        ProvisionOutcome::AlreadyProvisioned { marker } => {
            write_stderr_line(
                stderr,
                format!("Already provisioned ({marker} exists); use --force to reinstall"),
            );
        }
        ProvisionOutcome::Provisioned { components } => {
            write_stderr_line(stderr, "");
            write_stderr_line(stderr, success_message(components.len(), module_dir));
        }
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cudadeps::component::ComponentId;
    use cudadeps::error::ProvisionError;
    use rstest::rstest;
    use std::fs;

    struct UnreachableLocator;

    impl ModuleLocator for UnreachableLocator {
        fn locate(&self, _project_dir: &Utf8Path) -> Result<Utf8PathBuf> {
            panic!("locator should not be consulted");
        }
    }

    struct FixedLocator(Utf8PathBuf);

    impl ModuleLocator for FixedLocator {
        fn locate(&self, project_dir: &Utf8Path) -> Result<Utf8PathBuf> {
            assert_eq!(project_dir, Utf8Path::new("."));
            Ok(self.0.clone())
        }
    }

    fn linux_cli(module_dir: &Utf8Path) -> Cli {
        Cli {
            module_dir: Some(module_dir.to_owned()),
            arch: Some("x64".to_owned()),
            platform: Some("linux".to_owned()),
            ..Cli::default()
        }
    }

    fn temp_module_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).expect("UTF-8 path");
        (temp_dir, dir)
    }

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = ProvisionError::ManifestEntryMissing {
            component: ComponentId::from("libcublas"),
            path: Utf8PathBuf::from("/m/cuda_version.json"),
        };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("component libcublas is missing"));
    }

    #[test]
    fn explicit_module_dir_bypasses_locator() {
        let cli = Cli {
            module_dir: Some(Utf8PathBuf::from("/m")),
            ..Cli::default()
        };
        let dir = resolve_module_dir(&cli, &UnreachableLocator).expect("module dir");
        assert_eq!(dir, Utf8PathBuf::from("/m"));
    }

    #[test]
    fn locator_searches_current_directory_by_default() {
        let locator = FixedLocator(Utf8PathBuf::from("/project/build/Release"));
        let dir = resolve_module_dir(&Cli::default(), &locator).expect("module dir");
        assert_eq!(dir, Utf8PathBuf::from("/project/build/Release"));
    }

    #[test]
    fn run_without_manifest_succeeds_and_reports() {
        let (_temp_dir, dir) = temp_module_dir();
        let mut stderr = Vec::new();
        run(&linux_cli(&dir), &mut stderr).expect("run");
        let text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(text.contains("nothing to provision"));
        assert!(!dir.join("cudadeps.done").exists());
    }

    #[test]
    fn dry_run_lists_archives_without_writing() {
        let (_temp_dir, dir) = temp_module_dir();
        fs::write(
            dir.join("cuda_version.json"),
            r#"{"libcublas": {"version": "12.4.5.8"}, "cuda_cudart": {"version": "12.4.127"}}"#,
        )
        .expect("write manifest");
        let cli = Cli {
            dry_run: true,
            repo_url: Some("https://redist.test".to_owned()),
            ..linux_cli(&dir)
        };

        let mut stderr = Vec::new();
        run(&cli, &mut stderr).expect("dry run");

        let text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(text.contains("Dry run"));
        assert!(text.contains(
            "https://redist.test/cuda_cudart/linux-x86_64/cuda_cudart-linux-x86_64-12.4.127-archive.tar.xz"
        ));
        assert!(!dir.join("cudadeps.done").exists());
    }

    #[rstest]
    #[case::without_manifest(false)]
    #[case::with_manifest(true)]
    fn unsupported_host_fails_only_when_provisioning_applies(#[case] with_manifest: bool) {
        let (_temp_dir, dir) = temp_module_dir();
        if with_manifest {
            fs::write(
                dir.join("cuda_version.json"),
                r#"{"libcublas": {"version": "12.4.5.8"}}"#,
            )
            .expect("write manifest");
        }
        let cli = Cli {
            platform: Some("darwin".to_owned()),
            ..linux_cli(&dir)
        };

        let result = run(&cli, &mut std::io::sink());

        if with_manifest {
            assert!(matches!(
                result,
                Err(ProvisionError::UnsupportedPlatform { ref value, .. }) if value == "darwin"
            ));
        } else {
            assert!(result.is_ok(), "unexpected error: {result:?}");
        }
        assert!(!dir.join("cudadeps.done").exists());
    }

    #[rstest]
    #[case::not_applicable(
        ProvisionOutcome::NotApplicable { manifest: Utf8PathBuf::from("/m/cuda_version.json") },
        "nothing to provision"
    )]
    #[case::already(
        ProvisionOutcome::AlreadyProvisioned { marker: Utf8PathBuf::from("/m/cudadeps.done") },
        "--force"
    )]
    #[case::provisioned(
        ProvisionOutcome::Provisioned { components: Vec::new() },
        "Successfully provisioned 0 components into /m"
    )]
    fn outcomes_are_reported(#[case] outcome: ProvisionOutcome, #[case] expected: &str) {
        let mut stderr = Vec::new();
        report_outcome(&outcome, Utf8Path::new("/m"), &mut stderr);
        let text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(text.contains(expected), "{text}");
    }
}
