// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Create the GitHub release and upload the packaged archives.

use {
    crate::{
        context::Context,
        envsubst::check_resolved,
        error::{skip, AppleReleaseError, Result},
        github::{self, GitHubClient, NewRelease},
        pipeline::Pipe,
        validate::required_string,
    },
    slog::{info, warn},
};

/// Validates the `release` section.
pub struct CheckPipe;

impl Pipe for CheckPipe {
    fn name(&self) -> &'static str {
        "validating release configuration"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        if ctx.skip_publish {
            return Err(skip("publishing skipped"));
        }

        let cfg = &ctx.config.release.github;

        check_resolved(&cfg.owner, "release.github.owner")?;
        check_resolved(&cfg.repo, "release.github.repo")?;

        required_string(&cfg.owner, "release.github.owner")?;
        required_string(&cfg.repo, "release.github.repo")?;

        Ok(())
    }
}

/// Creates the release and uploads every regular-file package.
pub struct ReleasePipe;

impl Pipe for ReleasePipe {
    fn name(&self) -> &'static str {
        "publishing GitHub release"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        if ctx.skip_publish {
            return Err(skip("publishing skipped"));
        }

        if ctx.artifacts.packages.is_empty() {
            return Err(AppleReleaseError::Precondition(
                "no packages to release — ensure the archive step completed successfully"
                    .to_string(),
            ));
        }

        if ctx.github_client.is_none() {
            let token = github::github_token_from_env().ok_or_else(|| {
                AppleReleaseError::Precondition(
                    "GITHUB_TOKEN environment variable is required for publishing — create a token at https://github.com/settings/tokens with 'repo' scope"
                        .to_string(),
                )
            })?;
            ctx.github_client = Some(Box::new(GitHubClient::new(&token)?));
        }

        let owner = ctx.config.release.github.owner.clone();
        let repo = ctx.config.release.github.repo.clone();
        let release_name = format!("{} {}", ctx.config.project.name, ctx.version);

        let request = NewRelease {
            tag_name: ctx.version.clone(),
            name: release_name.clone(),
            draft: ctx.config.release.github.draft,
        };

        let release = ctx
            .github_client
            .as_ref()
            .expect("client initialized above")
            .create_release(&owner, &repo, &request)
            .map_err(|err| {
                if err.to_string().contains("already_exists") {
                    AppleReleaseError::RemoteApi(format!(
                        "release for tag {} already exists — delete the existing release or use a different version tag",
                        ctx.version
                    ))
                } else {
                    AppleReleaseError::RemoteApi(format!("failed to create GitHub release: {}", err))
                }
            })?;

        ctx.artifacts.release_url = release.html_url.clone();
        info!(ctx.logger, "created GitHub release: {}", release_name);

        for package in ctx.artifacts.packages.clone() {
            let regular = std::fs::metadata(&package)
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !regular {
                warn!(
                    ctx.logger,
                    "skipping {}: not a regular file (only files can be uploaded as release assets)",
                    package.display()
                );
                continue;
            }

            let content_type = github::content_type_for_asset(&package);
            ctx.github_client
                .as_ref()
                .expect("client initialized above")
                .upload_release_asset(&owner, &repo, release.id, &package, content_type)
                .map_err(|err| {
                    AppleReleaseError::RemoteApi(format!(
                        "failed to upload asset {}: {}",
                        package
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        err
                    ))
                })?;

            info!(
                ctx.logger,
                "uploaded: {}",
                package
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            );
        }

        info!(
            ctx.logger,
            "release published: {}", ctx.artifacts.release_url
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testutil::{self, FakeCall, FakeGitHub},
    };

    fn publishing_context(fake: FakeGitHub) -> (crate::context::Context, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();

        let zip = dir.path().join("MyApp-v1.2.3.zip");
        std::fs::write(&zip, b"zip bytes").unwrap();
        let dmg = dir.path().join("MyApp-v1.2.3.dmg");
        std::fs::write(&dmg, b"dmg bytes").unwrap();
        let app = dir.path().join("MyApp.app");
        std::fs::create_dir(&app).unwrap();

        let mut ctx = testutil::test_context(testutil::valid_config());
        ctx.version = "v1.2.3".to_string();
        ctx.artifacts.packages = vec![zip, dmg, app];
        ctx.github_client = Some(Box::new(fake));

        (ctx, dir)
    }

    #[test]
    fn check_skips_when_publishing_disabled() {
        let mut ctx = testutil::test_context(testutil::valid_config());
        ctx.skip_publish = true;

        let err = CheckPipe.run(&mut ctx).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn check_requires_owner_and_repo() {
        let mut config = testutil::valid_config();
        config.release.github.owner.clear();

        let mut ctx = testutil::test_context(config);
        let err = CheckPipe.run(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "release.github.owner is required");
    }

    #[test]
    fn pipe_skips_when_publishing_disabled() {
        let mut ctx = testutil::test_context(testutil::valid_config());
        ctx.skip_publish = true;

        let err = ReleasePipe.run(&mut ctx).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn pipe_requires_packages() {
        let mut ctx = testutil::test_context(testutil::valid_config());
        ctx.github_client = Some(Box::new(FakeGitHub::new()));

        let err = ReleasePipe.run(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("no packages to release"));
    }

    #[test]
    fn creates_release_and_uploads_regular_files() {
        let fake = FakeGitHub::new();
        let calls = fake.calls_handle();

        let (mut ctx, _dir) = publishing_context(fake);
        ReleasePipe.run(&mut ctx).unwrap();

        assert_eq!(
            ctx.artifacts.release_url,
            "https://github.com/yourname/myapp/releases/tag/v1.2.3"
        );

        let calls = calls.borrow();
        assert_eq!(
            calls[0],
            FakeCall::CreateRelease {
                owner: "yourname".to_string(),
                repo: "myapp".to_string(),
                tag: "v1.2.3".to_string(),
                name: "MyApp v1.2.3".to_string(),
                draft: false,
            }
        );

        // The .app directory is skipped with a warning; the archives
        // upload with their extension-derived content types.
        let uploads = calls
            .iter()
            .filter_map(|c| match c {
                FakeCall::UploadAsset { name, content_type } => {
                    Some((name.clone(), content_type.clone()))
                }
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            uploads,
            vec![
                ("MyApp-v1.2.3.zip".to_string(), "application/zip".to_string()),
                (
                    "MyApp-v1.2.3.dmg".to_string(),
                    "application/x-apple-diskimage".to_string()
                ),
            ]
        );
    }

    #[test]
    fn existing_release_names_conflicting_tag() {
        let mut fake = FakeGitHub::new();
        fake.create_release_error = Some("validation failed: already_exists".to_string());
        let calls = fake.calls_handle();

        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("MyApp-v1.0.0.zip");
        std::fs::write(&zip, b"zip bytes").unwrap();

        let mut ctx = testutil::test_context(testutil::valid_config());
        ctx.version = "v1.0.0".to_string();
        ctx.artifacts.packages = vec![zip];
        ctx.github_client = Some(Box::new(fake));

        let err = ReleasePipe.run(&mut ctx).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("already exists"));
        assert!(message.contains("v1.0.0"));

        // No assets were uploaded.
        assert_eq!(calls.borrow().len(), 1);
        assert!(ctx.artifacts.release_url.is_empty());
    }
}
