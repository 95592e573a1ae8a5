// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared helpers for unit tests.

use {
    crate::{
        config::{
            ArchiveConfig, BuildConfig, CaskConfig, Config, GitHubConfig, HomebrewConfig,
            NotarizeConfig, ProjectConfig, ReleaseConfig, SignConfig, TapConfig,
        },
        context::Context,
        error::{AppleReleaseError, Result},
        github::{GitHubApi, NewRelease, Release, RepositoryFile},
    },
    std::{cell::RefCell, collections::HashMap, path::Path, rc::Rc},
};

pub fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

pub fn test_context(config: Config) -> Context {
    Context::new(config, test_logger())
}

/// A configuration that passes every check pipe.
pub fn valid_config() -> Config {
    Config {
        project: ProjectConfig {
            name: "MyApp".to_string(),
            scheme: "MyApp".to_string(),
            workspace: String::new(),
        },
        build: BuildConfig {
            configuration: "Release".to_string(),
        },
        sign: SignConfig {
            identity: "Developer ID Application: Jane Doe (TEAM1234)".to_string(),
        },
        notarize: NotarizeConfig {
            apple_id: "jane@example.com".to_string(),
            team_id: "TEAM1234".to_string(),
            password: "app-specific-password".to_string(),
        },
        archive: ArchiveConfig {
            formats: vec!["zip".to_string(), "dmg".to_string()],
            ..Default::default()
        },
        release: ReleaseConfig {
            github: GitHubConfig {
                owner: "yourname".to_string(),
                repo: "myapp".to_string(),
                draft: false,
            },
        },
        homebrew: HomebrewConfig {
            tap: TapConfig {
                owner: "yourname".to_string(),
                name: "homebrew-tap".to_string(),
                token: "tap-token".to_string(),
            },
            official: Default::default(),
            cask: CaskConfig {
                name: "myapp".to_string(),
                desc: "My awesome macOS application".to_string(),
                homepage: "https://github.com/yourname/myapp".to_string(),
                license: "MIT".to_string(),
            },
        },
    }
}

/// A GitHub API call observed by [FakeGitHub].
#[derive(Clone, Debug, PartialEq)]
pub enum FakeCall {
    CreateRelease {
        owner: String,
        repo: String,
        tag: String,
        name: String,
        draft: bool,
    },
    UploadAsset {
        name: String,
        content_type: String,
    },
    GetContents {
        path: String,
    },
    CreateFile {
        path: String,
        message: String,
    },
    UpdateFile {
        path: String,
        message: String,
        sha: String,
    },
}

/// Recording GitHub client for pipe tests.
#[derive(Default)]
pub struct FakeGitHub {
    calls: Rc<RefCell<Vec<FakeCall>>>,

    /// When set, `create_release` fails with this message.
    pub create_release_error: Option<String>,

    /// Contents API state: path → blob SHA. Missing paths return an
    /// error whose message contains `404`.
    pub existing_files: HashMap<String, String>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for inspecting recorded calls after the client has been
    /// moved into a context.
    pub fn calls_handle(&self) -> Rc<RefCell<Vec<FakeCall>>> {
        Rc::clone(&self.calls)
    }
}

impl GitHubApi for FakeGitHub {
    fn create_release(&self, owner: &str, repo: &str, release: &NewRelease) -> Result<Release> {
        self.calls.borrow_mut().push(FakeCall::CreateRelease {
            owner: owner.to_string(),
            repo: repo.to_string(),
            tag: release.tag_name.clone(),
            name: release.name.clone(),
            draft: release.draft,
        });

        if let Some(message) = &self.create_release_error {
            return Err(AppleReleaseError::RemoteApi(message.clone()));
        }

        Ok(Release {
            id: 1,
            html_url: format!(
                "https://github.com/{}/{}/releases/tag/{}",
                owner, repo, release.tag_name
            ),
        })
    }

    fn upload_release_asset(
        &self,
        _owner: &str,
        _repo: &str,
        _release_id: u64,
        asset_path: &Path,
        content_type: &str,
    ) -> Result<()> {
        self.calls.borrow_mut().push(FakeCall::UploadAsset {
            name: asset_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            content_type: content_type.to_string(),
        });

        Ok(())
    }

    fn get_file_contents(&self, _owner: &str, _repo: &str, path: &str) -> Result<RepositoryFile> {
        self.calls.borrow_mut().push(FakeCall::GetContents {
            path: path.to_string(),
        });

        match self.existing_files.get(path) {
            Some(sha) => Ok(RepositoryFile { sha: sha.clone() }),
            None => Err(AppleReleaseError::RemoteApi(
                "GitHub API error 404: Not Found".to_string(),
            )),
        }
    }

    fn create_file(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        message: &str,
        _content: &[u8],
    ) -> Result<()> {
        self.calls.borrow_mut().push(FakeCall::CreateFile {
            path: path.to_string(),
            message: message.to_string(),
        });

        Ok(())
    }

    fn update_file(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        message: &str,
        _content: &[u8],
        sha: &str,
    ) -> Result<()> {
        self.calls.borrow_mut().push(FakeCall::UpdateFile {
            path: path.to_string(),
            message: message.to_string(),
            sha: sha.to_string(),
        });

        Ok(())
    }
}
