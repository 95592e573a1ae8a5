// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build the `.xcarchive` and extract the `.app`.

use {
    crate::{
        context::Context,
        envsubst::check_resolved,
        error::{AppleReleaseError, Result},
        pipeline::Pipe,
        validate::{required_local_path, required_string},
        xcodebuild::{self, ContainerKind, XcodebuildInvocation},
    },
    duct::cmd,
    slog::info,
    std::path::{Path, PathBuf},
};

/// Validates the `build` section.
pub struct CheckPipe;

impl Pipe for CheckPipe {
    fn name(&self) -> &'static str {
        "validating build configuration"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        let cfg = &ctx.config.build;

        check_resolved(&cfg.configuration, "build.configuration")?;
        required_string(&cfg.configuration, "build.configuration")?;

        Ok(())
    }
}

/// Archives the project with xcodebuild and extracts the `.app`.
pub struct BuildPipe;

impl Pipe for BuildPipe {
    fn name(&self) -> &'static str {
        "building project"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        if ctx.version.is_empty() {
            return Err(AppleReleaseError::Precondition(
                "no version resolved — a git tag is required before building".to_string(),
            ));
        }

        // Both become path components of the output directory; a
        // hostile tag must not escape dist/.
        required_local_path(&ctx.config.project.name, "project.name")?;
        required_local_path(&ctx.version, "version")?;

        let output_dir = Path::new("dist")
            .join(&ctx.config.project.name)
            .join(&ctx.version);
        ensure_output_dir(&output_dir)?;
        ctx.artifacts.build_output_dir = output_dir.clone();

        let container = resolve_container(ctx)?;

        let scheme = ctx.config.project.scheme.clone();
        let archive_path = output_dir.join(format!("{}.xcarchive", scheme));

        info!(
            ctx.logger,
            "building scheme {:?} with configuration {:?}", scheme, ctx.config.build.configuration
        );
        info!(ctx.logger, "archive path: {}", archive_path.display());

        let invocation = XcodebuildInvocation {
            scheme,
            container,
            configuration: ctx.config.build.configuration.clone(),
            archive_path: archive_path.clone(),
            marketing_version: Some(
                ctx.version
                    .strip_prefix('v')
                    .unwrap_or(&ctx.version)
                    .to_string(),
            ),
            build_number: match ctx.git.commit_count {
                0 => None,
                count => Some(count.to_string()),
            },
        };

        invocation.run(&ctx.logger)?;
        ctx.artifacts.archive_path = archive_path.clone();

        extract_app(ctx, &archive_path, &output_dir)?;

        info!(
            ctx.logger,
            "build completed: {}",
            ctx.artifacts.app_path.display()
        );
        Ok(())
    }
}

/// Fail when the output directory already exists, then create it.
///
/// A stale directory from a previous run would otherwise surface later
/// as an opaque codesign "unsealed contents" failure.
fn ensure_output_dir(output_dir: &Path) -> Result<()> {
    if output_dir.exists() {
        return Err(AppleReleaseError::Precondition(format!(
            "output directory {} already exists — remove it or run with --clean",
            output_dir.display()
        )));
    }

    std::fs::create_dir_all(output_dir)?;

    Ok(())
}

/// Determine the workspace or project to build, from configuration or
/// by scanning the working directory.
fn resolve_container(ctx: &mut Context) -> Result<Option<(String, ContainerKind)>> {
    let configured = ctx.config.project.workspace.clone();

    if !configured.is_empty() {
        required_local_path(&configured, "project.workspace")?;

        if configured.ends_with(".xcworkspace") {
            return Ok(Some((configured, ContainerKind::Workspace)));
        }
        if configured.ends_with(".xcodeproj") {
            return Ok(Some((configured, ContainerKind::Project)));
        }

        return Err(AppleReleaseError::Validation(format!(
            "project.workspace must end with .xcworkspace or .xcodeproj, got {:?}",
            configured
        )));
    }

    info!(ctx.logger, "auto-detecting workspace/project");
    let cwd = std::env::current_dir()?;
    let detected = xcodebuild::detect_container(&cwd)?;
    info!(ctx.logger, "detected {}", detected.path);

    Ok(Some((detected.path, detected.kind)))
}

/// Locate the `.app` inside the archive and copy it into the output
/// directory.
fn extract_app(ctx: &mut Context, archive_path: &Path, output_dir: &Path) -> Result<()> {
    let apps_dir = archive_path.join("Products").join("Applications");

    let mut names = vec![];
    let entries = std::fs::read_dir(&apps_dir).map_err(|e| {
        AppleReleaseError::ExternalTool(format!(
            "failed to read .xcarchive Products/Applications: {}",
            e
        ))
    })?;
    for entry in entries {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.ends_with(".app") {
            names.push(name);
        }
    }
    names.sort();

    let app_name = names.into_iter().next().ok_or_else(|| {
        AppleReleaseError::ExternalTool(format!(
            "no .app found in {} — the archive may have failed to produce an application",
            apps_dir.display()
        ))
    })?;

    let src: PathBuf = apps_dir.join(&app_name);
    if !src.is_dir() {
        return Err(AppleReleaseError::ExternalTool(format!(
            ".app at {} is not a directory — the archive may be corrupted",
            src.display()
        )));
    }

    let dst = output_dir.join(&app_name);

    // cp -R preserves the bundle structure and metadata.
    let output = cmd(
        "cp",
        &[
            "-R",
            &src.display().to_string(),
            &dst.display().to_string(),
        ],
    )
    .stderr_to_stdout()
    .stdout_capture()
    .unchecked()
    .run()?;

    if !output.status.success() {
        return Err(AppleReleaseError::ExternalTool(format!(
            "failed to copy .app to output directory: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        )));
    }

    ctx.artifacts.app_path = dst;
    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, crate::testutil};

    #[test]
    fn check_requires_configuration() {
        let mut config = testutil::valid_config();
        config.build.configuration.clear();

        let mut ctx = testutil::test_context(config);
        let err = CheckPipe.run(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "build.configuration is required");
    }

    #[test]
    fn check_reports_unresolved_env_reference() {
        let mut config = testutil::valid_config();
        config.build.configuration = "env(UNSET_BUILD_CONFIG)".to_string();

        let mut ctx = testutil::test_context(config);
        assert!(CheckPipe.run(&mut ctx).is_err());
    }

    #[test]
    fn build_requires_version() {
        let mut ctx = testutil::test_context(testutil::valid_config());

        let err = BuildPipe.run(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("no version resolved"));
    }

    #[test]
    fn build_rejects_traversal_in_version() {
        let mut ctx = testutil::test_context(testutil::valid_config());
        ctx.version = "../v1.0.0".to_string();

        let err = BuildPipe.run(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("path traversal"));
    }

    #[test]
    fn existing_output_dir_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("MyApp").join("v1.0.0");
        std::fs::create_dir_all(&output_dir).unwrap();

        let err = ensure_output_dir(&output_dir).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(err.to_string().contains("--clean"));
    }

    #[test]
    fn fresh_output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("MyApp").join("v1.0.0");

        ensure_output_dir(&output_dir).unwrap();
        assert!(output_dir.is_dir());
    }

    #[test]
    fn configured_workspace_dispatches_on_suffix() {
        let mut config = testutil::valid_config();
        config.project.workspace = "MyApp.xcworkspace".to_string();
        let mut ctx = testutil::test_context(config);
        assert_eq!(
            resolve_container(&mut ctx).unwrap(),
            Some(("MyApp.xcworkspace".to_string(), ContainerKind::Workspace))
        );

        let mut config = testutil::valid_config();
        config.project.workspace = "MyApp.xcodeproj".to_string();
        let mut ctx = testutil::test_context(config);
        assert_eq!(
            resolve_container(&mut ctx).unwrap(),
            Some(("MyApp.xcodeproj".to_string(), ContainerKind::Project))
        );
    }

    #[test]
    fn configured_workspace_rejects_non_local_paths() {
        for bad in &["/tmp/x.xcworkspace", "../foo.xcworkspace"] {
            let mut config = testutil::valid_config();
            config.project.workspace = bad.to_string();

            let mut ctx = testutil::test_context(config);
            let err = resolve_container(&mut ctx).unwrap_err();
            assert!(err.to_string().contains("project.workspace"), "value: {}", bad);
        }
    }

    #[test]
    fn configured_workspace_rejects_unknown_suffix() {
        let mut config = testutil::valid_config();
        config.project.workspace = "MyApp.banana".to_string();

        let mut ctx = testutil::test_context(config);
        let err = resolve_container(&mut ctx).unwrap_err();
        assert!(err.to_string().contains(".xcworkspace or .xcodeproj"));
    }

    #[test]
    fn extract_app_copies_bundle_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("MyApp.xcarchive");
        let bundle = archive.join("Products").join("Applications").join("MyApp.app");
        std::fs::create_dir_all(bundle.join("Contents")).unwrap();
        std::fs::write(bundle.join("Contents").join("Info.plist"), b"plist").unwrap();

        let output_dir = dir.path().join("out");
        std::fs::create_dir_all(&output_dir).unwrap();

        let mut ctx = testutil::test_context(testutil::valid_config());
        extract_app(&mut ctx, &archive, &output_dir).unwrap();

        assert_eq!(ctx.artifacts.app_path, output_dir.join("MyApp.app"));
        assert!(output_dir
            .join("MyApp.app")
            .join("Contents")
            .join("Info.plist")
            .is_file());
    }

    #[test]
    fn extract_app_errors_without_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("MyApp.xcarchive");
        std::fs::create_dir_all(archive.join("Products").join("Applications")).unwrap();

        let output_dir = dir.path().join("out");
        std::fs::create_dir_all(&output_dir).unwrap();

        let mut ctx = testutil::test_context(testutil::valid_config());
        let err = extract_app(&mut ctx, &archive, &output_dir).unwrap_err();
        assert!(err.to_string().contains("no .app found"));
    }
}
