// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Interface to `xcodebuild archive`. */

use {
    crate::error::{AppleReleaseError, Result},
    duct::cmd,
    slog::debug,
    std::path::{Path, PathBuf},
};

/// Whether the build container is a workspace or a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    /// `.xcworkspace`, passed via `-workspace`.
    Workspace,

    /// `.xcodeproj`, passed via `-project`.
    Project,
}

/// Result of workspace/project autodetection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectedContainer {
    pub path: String,
    pub kind: ContainerKind,
}

/// Represents an invocation of `xcodebuild archive`.
#[derive(Clone, Debug, Default)]
pub struct XcodebuildInvocation {
    /// Scheme to archive. `-scheme`.
    pub scheme: String,

    /// Workspace or project container. Omitted to let xcodebuild pick.
    pub container: Option<(String, ContainerKind)>,

    /// Build configuration. `-configuration`.
    pub configuration: String,

    /// Destination `.xcarchive` path. `-archivePath`.
    pub archive_path: PathBuf,

    /// `MARKETING_VERSION` build setting (CFBundleShortVersionString).
    pub marketing_version: Option<String>,

    /// `CURRENT_PROJECT_VERSION` build setting (CFBundleVersion).
    pub build_number: Option<String>,
}

impl XcodebuildInvocation {
    /// Derive the arguments for this invocation.
    ///
    /// The archive's own code signing is disabled: the pipeline signs
    /// the extracted `.app` itself in the next stage.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![];

        if let Some((path, kind)) = &self.container {
            match kind {
                ContainerKind::Workspace => args.push("-workspace".to_string()),
                ContainerKind::Project => args.push("-project".to_string()),
            }
            args.push(path.clone());
        }

        if !self.scheme.is_empty() {
            args.push("-scheme".to_string());
            args.push(self.scheme.clone());
        }

        if !self.configuration.is_empty() {
            args.push("-configuration".to_string());
            args.push(self.configuration.clone());
        }

        args.push("-archivePath".to_string());
        args.push(self.archive_path.display().to_string());

        args.push("archive".to_string());
        args.push("CODE_SIGN_IDENTITY=-".to_string());

        if let Some(version) = &self.marketing_version {
            args.push(format!("MARKETING_VERSION={}", version));
        }

        if let Some(number) = &self.build_number {
            args.push(format!("CURRENT_PROJECT_VERSION={}", number));
        }

        args
    }

    /// Run `xcodebuild archive`, returning its combined output.
    pub fn run(&self, logger: &slog::Logger) -> Result<String> {
        if which::which("xcodebuild").is_err() {
            return Err(AppleReleaseError::ToolNotFound {
                tool: "xcodebuild",
                hint: "install Xcode Command Line Tools with: xcode-select --install",
            });
        }

        let output = cmd("xcodebuild", self.arguments())
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()?;

        let combined = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(logger, "{}", combined);

        if !output.status.success() {
            return Err(map_archive_failure(&combined, &self.scheme));
        }

        Ok(combined)
    }
}

/// Map known xcodebuild failures onto config-field-specific messages.
fn map_archive_failure(output: &str, scheme: &str) -> AppleReleaseError {
    if output.contains("xcodebuild: error: The workspace") {
        return AppleReleaseError::ExternalTool(
            "workspace not found — check project.workspace in your config".to_string(),
        );
    }

    if output.contains("xcodebuild: error: The project") {
        return AppleReleaseError::ExternalTool(
            "project not found — check project.workspace in your config".to_string(),
        );
    }

    if output.contains("Scheme") && output.contains("is not currently configured") {
        return AppleReleaseError::ExternalTool(format!(
            "scheme {:?} not found — check project.scheme in your config",
            scheme
        ));
    }

    AppleReleaseError::ExternalTool(format!("xcodebuild archive failed: {}", output.trim()))
}

/// Autodetect the Xcode workspace or project in a directory.
///
/// A unique `.xcworkspace` wins; otherwise a unique `.xcodeproj`. A
/// `Pods.xcworkspace` is ignored when another workspace exists.
/// Multiple remaining candidates are an error naming them all.
pub fn detect_container(dir: &Path) -> Result<DetectedContainer> {
    let workspaces = filter_pods_workspace(find_by_extension(dir, "xcworkspace")?);

    if workspaces.len() == 1 {
        return Ok(DetectedContainer {
            path: workspaces.into_iter().next().expect("length checked"),
            kind: ContainerKind::Workspace,
        });
    }

    if workspaces.len() > 1 {
        return Err(AppleReleaseError::Precondition(format!(
            "multiple .xcworkspace files found: {} — set project.workspace in your config to specify which one to use",
            workspaces.join(", ")
        )));
    }

    let projects = find_by_extension(dir, "xcodeproj")?;

    if projects.len() == 1 {
        return Ok(DetectedContainer {
            path: projects.into_iter().next().expect("length checked"),
            kind: ContainerKind::Project,
        });
    }

    if projects.len() > 1 {
        return Err(AppleReleaseError::Precondition(format!(
            "multiple .xcodeproj files found: {} — set project.workspace in your config to specify which one to use",
            projects.join(", ")
        )));
    }

    Err(AppleReleaseError::Precondition(format!(
        "no .xcworkspace or .xcodeproj found in {} — ensure you are in the correct directory or set project.workspace in your config",
        dir.display()
    )))
}

/// Top-level directory entries with the given extension, sorted for
/// deterministic error messages.
fn find_by_extension(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let mut matches = vec![];

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if Path::new(&name).extension().map(|e| e == extension) == Some(true) {
            matches.push(name);
        }
    }

    matches.sort();

    Ok(matches)
}

fn filter_pods_workspace(workspaces: Vec<String>) -> Vec<String> {
    if workspaces.len() <= 1 {
        return workspaces;
    }

    let filtered = workspaces
        .iter()
        .filter(|w| w.as_str() != "Pods.xcworkspace")
        .cloned()
        .collect::<Vec<_>>();

    if filtered.is_empty() {
        workspaces
    } else {
        filtered
    }
}
