// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generate the Homebrew cask and commit it to the tap.

use {
    crate::{
        cask::{self, CaskData},
        context::Context,
        envsubst::check_resolved,
        error::{skip, AppleReleaseError, Result},
        github::GitHubClient,
        pipeline::Pipe,
        validate::required_string,
    },
    slog::info,
};

/// Validates the `homebrew` section.
pub struct CheckPipe;

impl Pipe for CheckPipe {
    fn name(&self) -> &'static str {
        "validating homebrew configuration"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        if ctx.skip_publish {
            return Err(skip("homebrew publishing skipped"));
        }

        let cfg = &ctx.config.homebrew;

        check_resolved(&cfg.cask.name, "homebrew.cask.name")?;
        check_resolved(&cfg.cask.desc, "homebrew.cask.desc")?;
        check_resolved(&cfg.cask.homepage, "homebrew.cask.homepage")?;

        required_string(&cfg.cask.name, "homebrew.cask.name")?;
        required_string(&cfg.cask.desc, "homebrew.cask.desc")?;
        required_string(&cfg.cask.homepage, "homebrew.cask.homepage")?;

        // Setting any tap field commits to all of them.
        if cfg.tap.is_configured() {
            check_resolved(&cfg.tap.owner, "homebrew.tap.owner")?;
            check_resolved(&cfg.tap.name, "homebrew.tap.name")?;
            check_resolved(&cfg.tap.token, "homebrew.tap.token")?;

            required_string(&cfg.tap.owner, "homebrew.tap.owner")?;
            required_string(&cfg.tap.name, "homebrew.tap.name")?;
            required_string(&cfg.tap.token, "homebrew.tap.token")?;
        }

        Ok(())
    }
}

/// Renders the cask file locally and commits it to the configured tap.
pub struct HomebrewPipe;

impl Pipe for HomebrewPipe {
    fn name(&self) -> &'static str {
        "generating Homebrew cask"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        if ctx.skip_publish {
            return Err(skip("homebrew publishing skipped"));
        }

        if ctx.artifacts.packages.is_empty() {
            return Err(AppleReleaseError::Precondition(
                "no packages found for Homebrew cask — ensure the archive step completed successfully"
                    .to_string(),
            ));
        }

        if ctx.artifacts.app_path.as_os_str().is_empty() {
            return Err(AppleReleaseError::Precondition(
                "no .app path found — ensure the build step completed successfully".to_string(),
            ));
        }

        let package = cask::select_package(&ctx.artifacts.packages)?.clone();
        let filename = package
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(ctx.logger, "computing SHA256 hash of {}", filename);
        let hash = cask::compute_sha256(&package)?;

        let owner = ctx.config.release.github.owner.clone();
        let repo = ctx.config.release.github.repo.clone();
        let asset_url = cask::build_asset_url(&owner, &repo, &ctx.version, &filename);

        let data = CaskData {
            token: ctx.config.homebrew.cask.name.clone(),
            version: ctx
                .version
                .strip_prefix('v')
                .unwrap_or(&ctx.version)
                .to_string(),
            sha256: hash,
            url: asset_url,
            name: ctx.config.project.name.clone(),
            desc: ctx.config.homebrew.cask.desc.clone(),
            homepage: ctx.config.homebrew.cask.homepage.clone(),
            app_name: ctx
                .artifacts
                .app_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            license: ctx.config.homebrew.cask.license.clone(),
        };

        let content = cask::render_cask(&data)?;

        let local_path = ctx
            .artifacts
            .build_output_dir
            .join(format!("{}.rb", data.token));
        std::fs::write(&local_path, &content)?;
        ctx.artifacts.homebrew_cask_path = local_path.clone();
        info!(ctx.logger, "generated cask file: {}", local_path.display());

        if ctx.config.homebrew.tap.is_configured() {
            commit_to_tap(ctx, &data, &content)?;
        }

        info!(ctx.logger, "Homebrew cask generated: {}", data.token);
        Ok(())
    }
}

/// Commit the cask to the tap repository: update in place when the file
/// exists (its blob SHA acts as a compare-and-swap token), create it on
/// a 404. This makes re-runs of the same version idempotent.
fn commit_to_tap(ctx: &mut Context, data: &CaskData, content: &str) -> Result<()> {
    let tap_owner = ctx.config.homebrew.tap.owner.clone();
    let tap_name = ctx.config.homebrew.tap.name.clone();

    if ctx.homebrew_client.is_none() {
        ctx.homebrew_client = Some(Box::new(GitHubClient::new(&ctx.config.homebrew.tap.token)?));
    }

    let cask_path = format!("Casks/{}.rb", data.token);

    let existing = ctx
        .homebrew_client
        .as_ref()
        .expect("client initialized above")
        .get_file_contents(&tap_owner, &tap_name, &cask_path);

    match existing {
        Ok(existing) => {
            let message = format!("Update {} to {}", data.token, data.version);
            ctx.homebrew_client
                .as_ref()
                .expect("client initialized above")
                .update_file(
                    &tap_owner,
                    &tap_name,
                    &cask_path,
                    &message,
                    content.as_bytes(),
                    &existing.sha,
                )
                .map_err(|err| {
                    AppleReleaseError::RemoteApi(format!(
                        "failed to commit cask to tap {}/{}: {}",
                        tap_owner, tap_name, err
                    ))
                })?;
            info!(
                ctx.logger,
                "updated cask in {}/{}: {}", tap_owner, tap_name, cask_path
            );
        }
        Err(err) if err.to_string().contains("404") => {
            let message = format!("Add {} {}", data.token, data.version);
            ctx.homebrew_client
                .as_ref()
                .expect("client initialized above")
                .create_file(
                    &tap_owner,
                    &tap_name,
                    &cask_path,
                    &message,
                    content.as_bytes(),
                )
                .map_err(|err| {
                    AppleReleaseError::RemoteApi(format!(
                        "failed to commit cask to tap {}/{}: {}",
                        tap_owner, tap_name, err
                    ))
                })?;
            info!(
                ctx.logger,
                "created cask in {}/{}: {}", tap_owner, tap_name, cask_path
            );
        }
        Err(err) => {
            return Err(AppleReleaseError::RemoteApi(format!(
                "failed to check existing cask in tap {}/{}: {}",
                tap_owner, tap_name, err
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testutil::{self, FakeCall, FakeGitHub},
    };

    fn cask_context(fake: FakeGitHub) -> (crate::context::Context, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();

        let zip = dir.path().join("MyApp-v1.2.3.zip");
        std::fs::write(&zip, b"zip bytes").unwrap();
        let app = dir.path().join("MyApp.app");
        std::fs::create_dir(&app).unwrap();

        let mut ctx = testutil::test_context(testutil::valid_config());
        ctx.version = "v1.2.3".to_string();
        ctx.artifacts.build_output_dir = dir.path().to_path_buf();
        ctx.artifacts.app_path = app;
        ctx.artifacts.packages = vec![zip];
        ctx.homebrew_client = Some(Box::new(fake));

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
    fn check_requires_cask_fields() {
        let mut config = testutil::valid_config();
        config.homebrew.cask.desc.clear();

        let mut ctx = testutil::test_context(config);
        let err = CheckPipe.run(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "homebrew.cask.desc is required");
    }

    #[test]
    fn partial_tap_configuration_is_rejected() {
        let mut config = testutil::valid_config();
        config.homebrew.tap.token.clear();

        let mut ctx = testutil::test_context(config);
        let err = CheckPipe.run(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "homebrew.tap.token is required");
    }

    #[test]
    fn unconfigured_tap_passes_check() {
        let mut config = testutil::valid_config();
        config.homebrew.tap = Default::default();

        let mut ctx = testutil::test_context(config);
        assert!(CheckPipe.run(&mut ctx).is_ok());
    }

    #[test]
    fn pipe_skips_when_publishing_disabled() {
        let mut ctx = testutil::test_context(testutil::valid_config());
        ctx.skip_publish = true;

        let err = HomebrewPipe.run(&mut ctx).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn pipe_requires_packages_and_app() {
        let mut ctx = testutil::test_context(testutil::valid_config());
        let err = HomebrewPipe.run(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("no packages found"));

        let mut ctx = testutil::test_context(testutil::valid_config());
        ctx.artifacts.packages = vec!["/x/app.zip".into()];
        let err = HomebrewPipe.run(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("no .app path found"));
    }

    #[test]
    fn first_run_creates_cask_in_tap() {
        let fake = FakeGitHub::new();
        let calls = fake.calls_handle();

        let (mut ctx, dir) = cask_context(fake);
        HomebrewPipe.run(&mut ctx).unwrap();

        // Local cask file is written next to the other build products.
        let local = dir.path().join("myapp.rb");
        assert_eq!(ctx.artifacts.homebrew_cask_path, local);
        let content = std::fs::read_to_string(&local).unwrap();
        assert!(content.starts_with("cask \"myapp\" do"));
        assert!(content.contains("version \"1.2.3\""));
        assert!(content.contains("app \"MyApp.app\""));
        assert!(content.contains(
            "url \"https://github.com/yourname/myapp/releases/download/v1.2.3/MyApp-v1.2.3.zip\""
        ));

        let calls = calls.borrow();
        assert_eq!(
            calls[0],
            FakeCall::GetContents {
                path: "Casks/myapp.rb".to_string()
            }
        );
        assert_eq!(
            calls[1],
            FakeCall::CreateFile {
                path: "Casks/myapp.rb".to_string(),
                message: "Add myapp 1.2.3".to_string(),
            }
        );
    }

    #[test]
    fn second_run_updates_with_existing_blob_sha() {
        let mut fake = FakeGitHub::new();
        fake.existing_files
            .insert("Casks/myapp.rb".to_string(), "deadbeef".to_string());
        let calls = fake.calls_handle();

        let (mut ctx, _dir) = cask_context(fake);
        HomebrewPipe.run(&mut ctx).unwrap();

        let calls = calls.borrow();
        assert_eq!(
            calls[1],
            FakeCall::UpdateFile {
                path: "Casks/myapp.rb".to_string(),
                message: "Update myapp to 1.2.3".to_string(),
                sha: "deadbeef".to_string(),
            }
        );
    }

    #[test]
    fn recorded_sha256_matches_package_contents() {
        let fake = FakeGitHub::new();
        let (mut ctx, dir) = cask_context(fake);

        HomebrewPipe.run(&mut ctx).unwrap();

        let expected = cask::compute_sha256(&dir.path().join("MyApp-v1.2.3.zip")).unwrap();
        let content = std::fs::read_to_string(dir.path().join("myapp.rb")).unwrap();
        assert!(content.contains(&format!("sha256 \"{}\"", expected)));
    }

    #[test]
    fn unconfigured_tap_only_writes_local_file() {
        let fake = FakeGitHub::new();
        let calls = fake.calls_handle();

        let (mut ctx, _dir) = cask_context(fake);
        ctx.config.homebrew.tap = Default::default();

        HomebrewPipe.run(&mut ctx).unwrap();

        assert!(calls.borrow().is_empty());
        assert!(!ctx.artifacts.homebrew_cask_path.as_os_str().is_empty());
    }

    #[test]
    fn hostile_cask_field_is_rejected() {
        let fake = FakeGitHub::new();
        let (mut ctx, _dir) = cask_context(fake);
        ctx.config.homebrew.cask.desc = "pwn\" ; system(\"rm -rf\")".to_string();

        let err = HomebrewPipe.run(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("invalid desc"));
    }
}
