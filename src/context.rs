// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared state handed to every pipe.

use {
    crate::{config::Config, github::GitHubApi, gitinfo::GitInfo},
    std::path::PathBuf,
};

/// Output state populated by execution pipes.
///
/// This is the only mutable hand-off between pipes. Each field has
/// exactly one writer; downstream pipes treat it as read-only (or
/// append-only for `packages`). Validation pipes must never touch it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Artifacts {
    /// `dist/<project>/<version>`, set by Build.
    pub build_output_dir: PathBuf,

    /// Path to the produced `.xcarchive`, set by Build.
    pub archive_path: PathBuf,

    /// Path to the extracted `.app`, set by Build.
    pub app_path: PathBuf,

    /// Paths of packaged archives, appended by Archive.
    pub packages: Vec<PathBuf>,

    /// HTML URL of the created GitHub release, set by Release.
    pub release_url: String,

    /// Local path of the generated cask file, set by Homebrew.
    pub homebrew_cask_path: PathBuf,
}

/// Shared state for a pipeline run.
///
/// The driver owns the context. Pipes receive a mutable handle but only
/// write to [Artifacts] and, lazily, the optional API client fields.
pub struct Context {
    pub config: Config,
    pub logger: slog::Logger,

    /// Release version, derived from the latest git tag.
    pub version: String,

    /// Git state resolved before the pipeline started.
    pub git: GitInfo,

    /// Remove `dist/` before building.
    pub clean: bool,

    /// Skip the Release and Homebrew pipes (and their checks).
    pub skip_publish: bool,

    /// Skip the Notarize pipe and disable the hardened runtime.
    pub skip_notarize: bool,

    pub artifacts: Artifacts,

    /// GitHub API client for release publication. `None` until the
    /// Release pipe constructs one from the environment token; tests
    /// inject a fake here.
    pub github_client: Option<Box<dyn GitHubApi>>,

    /// GitHub API client for tap commits, constructed from the tap
    /// token. Separate from `github_client` because the tokens differ.
    pub homebrew_client: Option<Box<dyn GitHubApi>>,
}

impl Context {
    pub fn new(config: Config, logger: slog::Logger) -> Self {
        Self {
            config,
            logger,
            version: String::new(),
            git: GitInfo::default(),
            clean: false,
            skip_publish: false,
            skip_notarize: false,
            artifacts: Artifacts::default(),
            github_client: None,
            homebrew_client: None,
        }
    }
}
