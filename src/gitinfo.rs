// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Git state resolution for the working repository.
//!
//! The release version derives from the latest git tag. The full state
//! is resolved once, before the pipeline runs, and is immutable for the
//! duration of the run.

use {
    crate::error::{AppleReleaseError, Result},
    duct::cmd,
};

/// Resolved git state for the current repository.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GitInfo {
    /// Full SHA of HEAD.
    pub commit: String,

    /// Abbreviated SHA of HEAD.
    pub short_commit: String,

    /// Current branch name; empty when HEAD is detached.
    pub branch: String,

    /// Latest tag; empty when no tags exist.
    pub tag: String,

    /// Whether the working tree has uncommitted changes.
    pub dirty: bool,

    /// Number of commits reachable from HEAD.
    pub commit_count: u64,
}

/// Derive the project version from the latest git tag.
///
/// Errors actionably when no tags exist or git is unavailable.
pub fn resolve_version() -> Result<String> {
    let output = cmd("git", &["describe", "--tags", "--abbrev=0"])
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|e| {
            if which::which("git").is_err() {
                AppleReleaseError::Git("git is not installed or not in PATH".to_string())
            } else {
                AppleReleaseError::Git(format!("failed to run git describe: {}", e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No names found")
            || stderr.contains("No tags")
            || stderr.contains("fatal")
        {
            return Err(AppleReleaseError::Git(
                "no git tags found — tag your release with `git tag v1.0.0`".to_string(),
            ));
        }
        return Err(AppleReleaseError::Git(format!(
            "failed to resolve version from git tags: {}",
            stderr.trim()
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if version.is_empty() {
        return Err(AppleReleaseError::Git(
            "no git tags found — tag your release with `git tag v1.0.0`".to_string(),
        ));
    }

    Ok(version)
}

/// Gather the full git state for the current repository.
pub fn resolve_git_info() -> Result<GitInfo> {
    let commit = git_output(&["rev-parse", "HEAD"])?;
    let short_commit = git_output(&["rev-parse", "--short", "HEAD"])?;

    let branch = match git_output(&["rev-parse", "--abbrev-ref", "HEAD"])? {
        ref b if b == "HEAD" => String::new(),
        b => b,
    };

    let dirty = !git_output(&["status", "--porcelain"])?.is_empty();

    // No tag is fine; the version resolver reports it when it matters.
    let tag = resolve_version().unwrap_or_default();

    let count = git_output(&["rev-list", "--count", "HEAD"])?;
    let commit_count = count
        .parse::<u64>()
        .map_err(|e| AppleReleaseError::Git(format!("failed to parse commit count {:?}: {}", count, e)))?;

    Ok(GitInfo {
        commit,
        short_commit,
        branch,
        tag,
        dirty,
        commit_count,
    })
}

fn git_output(args: &[&str]) -> Result<String> {
    let output = cmd("git", args)
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()?;

    if !output.status.success() {
        return Err(AppleReleaseError::Git(format!(
            "git {}: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
